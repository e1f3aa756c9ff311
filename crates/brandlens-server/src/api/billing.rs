//! Stripe checkout, billing portal and the signed webhook receiver.

use axum::{
    body::Bytes,
    extract::State,
    http::HeaderMap,
    Extension, Json,
};
use brandlens_billing::{
    interpret_event, parse_event, verify_webhook_signature, BillingAction, BillingError,
    CheckoutParams, StripeClient, StripeEvent, SIGNATURE_TOLERANCE_SECS,
};
use brandlens_core::Plan;
use brandlens_db::DbError;
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::middleware::{CurrentUser, RequestId};

use super::{map_db_error, ApiError, ApiResponse, AppState};

const STRIPE_SIGNATURE_HEADER: &str = "stripe-signature";

#[derive(Debug, Deserialize)]
pub(super) struct CheckoutRequest {
    pub plan: String,
}

#[derive(Debug, Serialize)]
pub(super) struct SessionResponse {
    pub url: String,
}

#[derive(Debug, Serialize)]
pub(super) struct WebhookAck {
    pub received: bool,
    pub duplicate: bool,
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn stripe_client<'a>(state: &'a AppState, req_id: &str) -> Result<&'a StripeClient, ApiError> {
    state.stripe.as_deref().ok_or_else(|| {
        ApiError::new(
            req_id,
            "service_unavailable",
            "billing is not configured on this server",
        )
    })
}

fn upstream_error(req_id: &str, error: &BillingError) -> ApiError {
    tracing::error!(error = %error, "stripe request failed");
    ApiError::new(req_id, "upstream_error", "payment provider request failed")
}

/// Applies a verified event to profiles. A missing profile is logged and
/// treated as handled.
async fn apply_action(state: &AppState, event: &StripeEvent) -> Result<(), DbError> {
    let result = match interpret_event(event, &state.prices) {
        BillingAction::CheckoutCompleted {
            user_id,
            customer_id,
            ..
        } => brandlens_db::link_stripe_customer(&state.pool, user_id, &customer_id).await,
        BillingAction::SubscriptionChanged {
            customer_id,
            subscription_id,
            plan,
            status,
        } => {
            let applied = brandlens_db::apply_subscription_change(
                &state.pool,
                &customer_id,
                plan,
                subscription_id.as_deref(),
                &status,
            )
            .await;
            if applied.is_ok() {
                tracing::info!(%customer_id, %plan, %status, "subscription applied");
            }
            applied
        }
        BillingAction::Ignored => {
            tracing::debug!(event_id = %event.id, event_type = %event.event_type, "stripe event ignored");
            Ok(())
        }
    };

    match result {
        Err(DbError::NotFound) => {
            tracing::warn!(
                event_id = %event.id,
                event_type = %event.event_type,
                "stripe event refers to an unknown profile"
            );
            Ok(())
        }
        other => other,
    }
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// POST /api/v1/billing/checkout: subscription checkout for `pro` or `business`.
pub(super) async fn create_checkout(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Extension(user): Extension<CurrentUser>,
    Json(body): Json<CheckoutRequest>,
) -> Result<Json<ApiResponse<SessionResponse>>, ApiError> {
    let rid = &req_id.0;
    let stripe = stripe_client(&state, rid)?;

    let plan = match body.plan.trim().to_ascii_lowercase().parse::<Plan>() {
        Ok(plan @ (Plan::Pro | Plan::Business)) => plan,
        _ => {
            return Err(ApiError::new(
                rid,
                "validation_error",
                "plan must be 'pro' or 'business'",
            ))
        }
    };
    let price_id = state.prices.price_for(plan).ok_or_else(|| {
        ApiError::new(
            rid,
            "validation_error",
            format!("no Stripe price configured for plan '{plan}'"),
        )
    })?;

    let customer_id = brandlens_db::get_profile(&state.pool, user.id)
        .await
        .map_err(|e| map_db_error(rid.clone(), &e))?
        .and_then(|profile| profile.stripe_customer_id);

    let app_url = state.config.app_url.trim_end_matches('/');
    let success_url = format!("{app_url}/dashboard?checkout=success");
    let cancel_url = format!("{app_url}/pricing?checkout=cancelled");
    let user_ref = user.id.to_string();

    let session = stripe
        .create_checkout_session(&CheckoutParams {
            customer_email: &user.email,
            customer_id: customer_id.as_deref(),
            price_id,
            success_url: &success_url,
            cancel_url: &cancel_url,
            client_reference_id: &user_ref,
        })
        .await
        .map_err(|e| upstream_error(rid, &e))?;

    tracing::info!(user_id = %user.id, %plan, session_id = %session.id, "checkout session created");
    Ok(Json(ApiResponse::new(
        req_id.0,
        SessionResponse { url: session.url },
    )))
}

/// POST /api/v1/billing/portal: requires a completed checkout.
pub(super) async fn create_portal(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Extension(user): Extension<CurrentUser>,
) -> Result<Json<ApiResponse<SessionResponse>>, ApiError> {
    let rid = &req_id.0;
    let stripe = stripe_client(&state, rid)?;

    let customer_id = brandlens_db::get_profile(&state.pool, user.id)
        .await
        .map_err(|e| map_db_error(rid.clone(), &e))?
        .and_then(|profile| profile.stripe_customer_id)
        .ok_or_else(|| {
            ApiError::new(rid, "bad_request", "no billing account exists for this user yet")
        })?;

    let return_url = format!(
        "{}/settings/billing",
        state.config.app_url.trim_end_matches('/')
    );
    let session = stripe
        .create_portal_session(&customer_id, &return_url)
        .await
        .map_err(|e| upstream_error(rid, &e))?;

    Ok(Json(ApiResponse::new(
        req_id.0,
        SessionResponse { url: session.url },
    )))
}

/// POST /api/v1/billing/webhook: public, authenticated by the Stripe signature.
///
/// Each event id is processed at most once. If applying an event fails, its
/// id is released and a 500 asks Stripe to redeliver.
pub(super) async fn stripe_webhook(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<ApiResponse<WebhookAck>>, ApiError> {
    let rid = &req_id.0;
    let secret = state
        .config
        .stripe_webhook_secret
        .as_deref()
        .filter(|s| !s.is_empty())
        .ok_or_else(|| {
            ApiError::new(rid, "service_unavailable", "billing webhooks are not configured")
        })?;

    let signature = headers
        .get(STRIPE_SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ApiError::new(rid, "bad_request", "missing Stripe-Signature header"))?;
    verify_webhook_signature(
        &body,
        signature,
        secret,
        SIGNATURE_TOLERANCE_SECS,
        Utc::now().timestamp(),
    )
    .map_err(|e| {
        tracing::warn!(error = %e, "rejected stripe webhook");
        ApiError::new(rid, "bad_request", e.to_string())
    })?;

    let event = parse_event(&body).map_err(|e| ApiError::new(rid, "bad_request", e.to_string()))?;

    let fresh = brandlens_db::mark_stripe_event_processed(&state.pool, &event.id, &event.event_type)
        .await
        .map_err(|e| map_db_error(rid.clone(), &e))?;
    if !fresh {
        tracing::info!(event_id = %event.id, "duplicate stripe event skipped");
        return Ok(Json(ApiResponse::new(
            req_id.0,
            WebhookAck {
                received: true,
                duplicate: true,
            },
        )));
    }

    if let Err(e) = apply_action(&state, &event).await {
        if let Err(forget) = brandlens_db::forget_stripe_event(&state.pool, &event.id).await {
            tracing::error!(event_id = %event.id, error = %forget, "failed to release stripe event");
        }
        return Err(map_db_error(rid.clone(), &e));
    }

    tracing::info!(event_id = %event.id, event_type = %event.event_type, "stripe event processed");
    Ok(Json(ApiResponse::new(
        req_id.0,
        WebhookAck {
            received: true,
            duplicate: false,
        },
    )))
}
