//! Minimal Stripe REST client: Checkout and Billing Portal sessions.
//!
//! Stripe takes form-encoded bodies with bearer auth and answers with JSON;
//! only the fields the app needs are decoded.

use std::time::Duration;

use reqwest::{Client, Url};
use serde::Deserialize;
use serde_json::Value;

use crate::error::BillingError;

const DEFAULT_BASE_URL: &str = "https://api.stripe.com";
const ERROR_BODY_LIMIT: usize = 500;

/// A created Checkout or Billing Portal session.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StripeSession {
    pub id: String,
    pub url: String,
}

/// Inputs for a subscription Checkout session.
#[derive(Debug, Clone)]
pub struct CheckoutParams<'a> {
    pub customer_email: &'a str,
    /// Existing Stripe customer; takes precedence over `customer_email`.
    pub customer_id: Option<&'a str>,
    pub price_id: &'a str,
    pub success_url: &'a str,
    pub cancel_url: &'a str,
    /// The app's user id, echoed back on `checkout.session.completed`.
    pub client_reference_id: &'a str,
}

pub struct StripeClient {
    client: Client,
    secret_key: String,
    base_url: Url,
}

impl StripeClient {
    /// # Errors
    ///
    /// Returns [`BillingError::Http`] if the `reqwest::Client` cannot be built.
    pub fn new(secret_key: &str, timeout_secs: u64) -> Result<Self, BillingError> {
        Self::with_base_url(secret_key, timeout_secs, DEFAULT_BASE_URL)
    }

    /// Creates a client against a custom base URL (for testing with wiremock).
    ///
    /// # Errors
    ///
    /// Returns [`BillingError::Http`] if the `reqwest::Client` cannot be built,
    /// or [`BillingError::InvalidBaseUrl`] if `base_url` does not parse.
    pub fn with_base_url(
        secret_key: &str,
        timeout_secs: u64,
        base_url: &str,
    ) -> Result<Self, BillingError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .build()?;

        let normalised = format!("{}/", base_url.trim_end_matches('/'));
        let base_url = Url::parse(&normalised).map_err(|e| BillingError::InvalidBaseUrl {
            url: base_url.to_string(),
            reason: e.to_string(),
        })?;

        Ok(Self {
            client,
            secret_key: secret_key.to_owned(),
            base_url,
        })
    }

    /// Creates a subscription-mode Checkout session and returns its hosted URL.
    ///
    /// # Errors
    ///
    /// - [`BillingError::MissingApiKey`] when no secret key is configured.
    /// - [`BillingError::Api`] on a non-2xx response.
    /// - [`BillingError::Http`] / [`BillingError::Deserialize`] on transport or decode failure.
    pub async fn create_checkout_session(
        &self,
        params: &CheckoutParams<'_>,
    ) -> Result<StripeSession, BillingError> {
        let mut form: Vec<(&str, &str)> = vec![
            ("mode", "subscription"),
            ("line_items[0][price]", params.price_id),
            ("line_items[0][quantity]", "1"),
            ("success_url", params.success_url),
            ("cancel_url", params.cancel_url),
            ("client_reference_id", params.client_reference_id),
            ("metadata[user_id]", params.client_reference_id),
            ("allow_promotion_codes", "true"),
        ];
        match params.customer_id {
            Some(customer) => form.push(("customer", customer)),
            None => form.push(("customer_email", params.customer_email)),
        }

        self.post_form("v1/checkout/sessions", &form, "checkout session")
            .await
    }

    /// Creates a Billing Portal session for an existing customer.
    ///
    /// # Errors
    ///
    /// Same as [`Self::create_checkout_session`].
    pub async fn create_portal_session(
        &self,
        customer_id: &str,
        return_url: &str,
    ) -> Result<StripeSession, BillingError> {
        let form = [("customer", customer_id), ("return_url", return_url)];
        self.post_form("v1/billing_portal/sessions", &form, "portal session")
            .await
    }

    async fn post_form(
        &self,
        path: &str,
        form: &[(&str, &str)],
        context: &str,
    ) -> Result<StripeSession, BillingError> {
        if self.secret_key.trim().is_empty() {
            return Err(BillingError::MissingApiKey);
        }
        let url = self
            .base_url
            .join(path)
            .map_err(|e| BillingError::InvalidBaseUrl {
                url: self.base_url.to_string(),
                reason: e.to_string(),
            })?;

        let response = self
            .client
            .post(url)
            .bearer_auth(&self.secret_key)
            .form(form)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(BillingError::Api {
                status: status.as_u16(),
                message: api_error_message(&body),
            });
        }

        serde_json::from_str(&body).map_err(|e| BillingError::Deserialize {
            context: context.to_string(),
            source: e,
        })
    }
}

/// Stripe's `error.message`, else the raw body (truncated).
fn api_error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v["error"]["message"].as_str().map(str::to_string))
        .unwrap_or_else(|| body.chars().take(ERROR_BODY_LIMIT).collect())
}
