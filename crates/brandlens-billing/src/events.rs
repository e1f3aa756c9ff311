//! Stripe webhook events: signature verification, decoding, and the plan
//! change each event implies.

use brandlens_core::Plan;
use hmac::{Hmac, Mac};
use serde::Deserialize;
use serde_json::Value;
use sha2::Sha256;
use subtle::ConstantTimeEq;
use uuid::Uuid;

use crate::error::BillingError;
use crate::plans::PriceMap;

type HmacSha256 = Hmac<Sha256>;

/// Maximum age of a signed webhook, in seconds.
pub const SIGNATURE_TOLERANCE_SECS: i64 = 300;

/// Verifies a `Stripe-Signature` header (`t=<unix>,v1=<hex>[,v1=...]`).
///
/// The expected signature is HMAC-SHA256 over `"{t}.{payload}"`; any `v1`
/// entry may match. Timestamps further than `tolerance_secs` from `now`
/// are rejected.
///
/// # Errors
///
/// Returns [`BillingError::InvalidSignature`] describing the first check that failed.
pub fn verify_webhook_signature(
    payload: &[u8],
    header: &str,
    secret: &str,
    tolerance_secs: i64,
    now: i64,
) -> Result<(), BillingError> {
    let mut timestamp: Option<i64> = None;
    let mut signatures: Vec<Vec<u8>> = Vec::new();

    for part in header.split(',') {
        let Some((key, value)) = part.trim().split_once('=') else {
            continue;
        };
        match key {
            "t" => timestamp = value.parse().ok(),
            "v1" => {
                if let Ok(bytes) = hex::decode(value) {
                    signatures.push(bytes);
                }
            }
            _ => {}
        }
    }

    let timestamp = timestamp.ok_or(BillingError::InvalidSignature("missing timestamp"))?;
    if signatures.is_empty() {
        return Err(BillingError::InvalidSignature("missing v1 signature"));
    }
    if (now - timestamp).abs() > tolerance_secs {
        return Err(BillingError::InvalidSignature("timestamp outside tolerance"));
    }

    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC can take key of any size");
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);
    let expected = mac.finalize().into_bytes();

    let matched = signatures
        .iter()
        .any(|sig| bool::from(sig.as_slice().ct_eq(expected.as_slice())));
    if matched {
        Ok(())
    } else {
        Err(BillingError::InvalidSignature("signature mismatch"))
    }
}

#[derive(Debug, Deserialize)]
struct RawEvent {
    id: String,
    #[serde(rename = "type")]
    event_type: String,
    data: RawEventData,
}

#[derive(Debug, Deserialize)]
struct RawEventData {
    object: Value,
}

/// The parts of a Stripe event the app acts on.
#[derive(Debug, Clone, PartialEq)]
pub struct StripeEvent {
    pub id: String,
    pub event_type: String,
    pub object: Value,
}

/// Decodes `{id, type, data.object}` from a webhook body.
///
/// # Errors
///
/// Returns [`BillingError::Deserialize`] if the body is not a Stripe event.
pub fn parse_event(payload: &[u8]) -> Result<StripeEvent, BillingError> {
    let raw: RawEvent = serde_json::from_slice(payload).map_err(|e| BillingError::Deserialize {
        context: "stripe event".to_string(),
        source: e,
    })?;
    Ok(StripeEvent {
        id: raw.id,
        event_type: raw.event_type,
        object: raw.data.object,
    })
}

/// What the app should do for a verified event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BillingAction {
    /// Checkout finished: remember the customer for the user, and apply the
    /// plan when the price is known.
    CheckoutCompleted {
        user_id: Uuid,
        customer_id: String,
        subscription_id: Option<String>,
    },
    /// Subscription created, updated or deleted for a customer.
    SubscriptionChanged {
        customer_id: String,
        subscription_id: Option<String>,
        plan: Plan,
        status: String,
    },
    Ignored,
}

fn str_field<'a>(object: &'a Value, key: &str) -> Option<&'a str> {
    object.get(key).and_then(Value::as_str).filter(|s| !s.is_empty())
}

fn first_price_id(subscription: &Value) -> Option<&str> {
    subscription["items"]["data"]
        .as_array()?
        .iter()
        .find_map(|item| item["price"]["id"].as_str())
}

/// Maps an event onto a [`BillingAction`].
///
/// Active and trialing subscriptions get the plan of their first price;
/// any other status, and deleted subscriptions, fall back to free. An active
/// subscription on an unknown price is ignored rather than downgraded.
#[must_use]
pub fn interpret_event(event: &StripeEvent, prices: &PriceMap) -> BillingAction {
    let object = &event.object;
    match event.event_type.as_str() {
        "checkout.session.completed" => {
            let user_id = str_field(object, "client_reference_id")
                .or_else(|| object["metadata"]["user_id"].as_str())
                .and_then(|s| Uuid::parse_str(s).ok());
            match (user_id, str_field(object, "customer")) {
                (Some(user_id), Some(customer)) => BillingAction::CheckoutCompleted {
                    user_id,
                    customer_id: customer.to_string(),
                    subscription_id: str_field(object, "subscription").map(str::to_string),
                },
                _ => {
                    tracing::warn!(event_id = %event.id, "checkout session without user or customer");
                    BillingAction::Ignored
                }
            }
        }
        "customer.subscription.created" | "customer.subscription.updated" => {
            let Some(customer) = str_field(object, "customer") else {
                return BillingAction::Ignored;
            };
            let status = str_field(object, "status").unwrap_or("incomplete");
            let plan = if matches!(status, "active" | "trialing") {
                match first_price_id(object).and_then(|p| prices.plan_for_price(p)) {
                    Some(plan) => plan,
                    None => {
                        tracing::warn!(event_id = %event.id, "subscription on unknown price");
                        return BillingAction::Ignored;
                    }
                }
            } else {
                Plan::Free
            };
            BillingAction::SubscriptionChanged {
                customer_id: customer.to_string(),
                subscription_id: str_field(object, "id").map(str::to_string),
                plan,
                status: status.to_string(),
            }
        }
        "customer.subscription.deleted" => match str_field(object, "customer") {
            Some(customer) => BillingAction::SubscriptionChanged {
                customer_id: customer.to_string(),
                subscription_id: None,
                plan: Plan::Free,
                status: "canceled".to_string(),
            },
            None => BillingAction::Ignored,
        },
        _ => BillingAction::Ignored,
    }
}

#[cfg(test)]
#[path = "events_test.rs"]
mod tests;
