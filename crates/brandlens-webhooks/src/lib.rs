//! Outbound webhook delivery for mention events.
//!
//! The [`Dispatcher`] loads a user's (and team's) active webhook integrations,
//! filters them per event, renders the payload, signs and sends it, then
//! records a log row and the integration's delivery stats. Nothing it does
//! propagates an error to the caller.

pub mod dispatcher;
pub mod error;
pub mod filter;
pub mod payload;
pub mod signing;

pub use dispatcher::{DeliveryOutcome, Dispatcher, WEBHOOK_USER_AGENT};
pub use error::WebhookError;
pub use filter::should_deliver;
pub use payload::{build_payload, WebhookMention};
pub use signing::{authorization_header, sign_payload, EVENT_HEADER, SIGNATURE_HEADER};
