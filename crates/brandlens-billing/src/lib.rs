//! Stripe integration: checkout and billing-portal sessions, webhook
//! signature verification, and mapping subscription events onto plans.

pub mod client;
pub mod error;
pub mod events;
pub mod plans;

pub use client::{CheckoutParams, StripeClient, StripeSession};
pub use error::BillingError;
pub use events::{
    interpret_event, parse_event, verify_webhook_signature, BillingAction, StripeEvent,
    SIGNATURE_TOLERANCE_SECS,
};
pub use plans::PriceMap;
