use brandlens_core::{AppConfig, Plan};

/// Stripe price ids for the paid plans.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PriceMap {
    pub pro: Option<String>,
    pub business: Option<String>,
}

impl PriceMap {
    #[must_use]
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            pro: config.stripe_price_pro.clone(),
            business: config.stripe_price_business.clone(),
        }
    }

    /// Price id to charge for `plan`; `None` for the free plan or an unconfigured price.
    #[must_use]
    pub fn price_for(&self, plan: Plan) -> Option<&str> {
        match plan {
            Plan::Free => None,
            Plan::Pro => self.pro.as_deref(),
            Plan::Business => self.business.as_deref(),
        }
    }

    #[must_use]
    pub fn plan_for_price(&self, price_id: &str) -> Option<Plan> {
        if self.pro.as_deref() == Some(price_id) {
            Some(Plan::Pro)
        } else if self.business.as_deref() == Some(price_id) {
            Some(Plan::Business)
        } else {
            None
        }
    }
}
