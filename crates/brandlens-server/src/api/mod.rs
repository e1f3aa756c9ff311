mod auth;
mod billing;
mod contacts;
mod integrations;
mod mentions;
mod onboarding;
mod teams;
mod trackers;
mod usage;

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::State,
    http::{header, HeaderName, Method, StatusCode},
    response::IntoResponse,
    routing::{delete, get, post},
    Extension, Json, Router,
};
use brandlens_billing::{PriceMap, StripeClient};
use brandlens_core::AppConfig;
use brandlens_scraper::ContactExtractor;
use brandlens_webhooks::Dispatcher;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::PgPool;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use uuid::Uuid;

use crate::checks::{search_client, CheckService};
use crate::middleware::{
    enforce_rate_limit, request_id, require_user, AuthState, RateLimitState, RequestId,
};

const STRIPE_TIMEOUT_SECS: u64 = 30;

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Arc<AppConfig>,
    pub checks: CheckService,
    pub contacts: ContactExtractor,
    pub dispatcher: Dispatcher,
    pub stripe: Option<Arc<StripeClient>>,
    pub prices: PriceMap,
}

impl AppState {
    /// Wires every outbound client from configuration.
    ///
    /// # Errors
    ///
    /// Fails if an HTTP client cannot be built or a configured base URL is invalid.
    pub fn from_config(pool: PgPool, config: Arc<AppConfig>) -> anyhow::Result<Self> {
        let search = search_client(&config)?;
        if config.openai_api_key.is_none() {
            tracing::warn!("OPENAI_API_KEY not set; mention checks will record failed searches");
        }

        let dispatcher = Dispatcher::new(pool.clone(), config.webhook_timeout_secs)?;
        let contacts =
            ContactExtractor::new(config.contact_timeout_secs, &config.contact_user_agent)?;

        let stripe = match config.stripe_secret_key.as_deref() {
            Some(key) => Some(Arc::new(StripeClient::with_base_url(
                key,
                STRIPE_TIMEOUT_SECS,
                &config.stripe_base_url,
            )?)),
            None => {
                tracing::warn!("STRIPE_SECRET_KEY not set; billing endpoints are disabled");
                None
            }
        };

        Ok(Self {
            checks: CheckService::new(pool.clone(), search, dispatcher.clone()),
            pool,
            contacts,
            dispatcher,
            stripe,
            prices: PriceMap::from_app_config(&config),
            config,
        })
    }
}

#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub data: T,
    pub meta: ResponseMeta,
}

#[derive(Debug, Serialize)]
pub struct ResponseMeta {
    pub request_id: String,
    pub timestamp: DateTime<Utc>,
}

/// Error body: `{error, code, meta}`; `code` selects the HTTP status.
#[derive(Debug, Serialize)]
pub struct ApiError {
    pub error: String,
    pub code: String,
    pub meta: ResponseMeta,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
struct HealthData {
    status: &'static str,
    database: &'static str,
}

impl ResponseMeta {
    pub(crate) fn new(request_id: String) -> Self {
        Self {
            request_id,
            timestamp: Utc::now(),
        }
    }
}

impl<T: Serialize> ApiResponse<T> {
    pub(crate) fn new(request_id: String, data: T) -> Self {
        Self {
            data,
            meta: ResponseMeta::new(request_id),
        }
    }
}

impl ApiError {
    pub fn new(
        request_id: impl Into<String>,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            error: message.into(),
            code: code.into(),
            meta: ResponseMeta::new(request_id.into()),
        }
    }

    fn status(&self) -> StatusCode {
        match self.code.as_str() {
            "bad_request" | "validation_error" => StatusCode::BAD_REQUEST,
            "unauthorized" => StatusCode::UNAUTHORIZED,
            "limit_reached" => StatusCode::PAYMENT_REQUIRED,
            "forbidden" => StatusCode::FORBIDDEN,
            "not_found" => StatusCode::NOT_FOUND,
            "conflict" => StatusCode::CONFLICT,
            "rate_limited" => StatusCode::TOO_MANY_REQUESTS,
            "upstream_error" => StatusCode::BAD_GATEWAY,
            "service_unavailable" => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        (self.status(), Json(self)).into_response()
    }
}

pub(super) fn normalize_limit(limit: Option<i64>) -> i64 {
    limit.unwrap_or(50).clamp(1, 200)
}

pub(super) fn map_db_error(request_id: String, error: &brandlens_db::DbError) -> ApiError {
    tracing::error!(error = %error, "database query failed");
    ApiError::new(request_id, "internal_error", "database query failed")
}

/// Trims `value` and checks it is 1..=`max` characters.
pub(super) fn require_text(
    req_id: &str,
    field: &str,
    value: &str,
    max: usize,
) -> Result<String, ApiError> {
    let trimmed = value.trim();
    if trimmed.is_empty() || trimmed.chars().count() > max {
        return Err(ApiError::new(
            req_id,
            "validation_error",
            format!("{field} must be 1-{max} characters"),
        ));
    }
    Ok(trimmed.to_owned())
}

/// Writes to a record are allowed for its owner and for admins of its team.
pub(super) async fn ensure_can_write(
    state: &AppState,
    req_id: &str,
    user_id: Uuid,
    owner_id: Uuid,
    team_id: Option<Uuid>,
) -> Result<(), ApiError> {
    if owner_id == user_id {
        return Ok(());
    }
    if let Some(team_id) = team_id {
        let role = brandlens_db::member_role(&state.pool, team_id, user_id)
            .await
            .map_err(|e| map_db_error(req_id.to_owned(), &e))?;
        if role.is_some_and(brandlens_core::TeamRole::can_manage) {
            return Ok(());
        }
    }
    Err(ApiError::new(
        req_id,
        "forbidden",
        "only the owner or a team admin can change this record",
    ))
}

/// Records may only be shared with a team the caller belongs to.
pub(super) async fn ensure_team_member(
    state: &AppState,
    req_id: &str,
    user_id: Uuid,
    team_id: Uuid,
) -> Result<brandlens_core::TeamRole, ApiError> {
    brandlens_db::member_role(&state.pool, team_id, user_id)
        .await
        .map_err(|e| map_db_error(req_id.to_owned(), &e))?
        .ok_or_else(|| ApiError::new(req_id, "forbidden", "you are not a member of that team"))
}

fn build_cors() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
        ])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            HeaderName::from_static("x-request-id"),
        ])
}

fn protected_router(auth: AuthState, rate_limit: RateLimitState) -> Router<AppState> {
    Router::new()
        .route("/api/v1/auth/bootstrap", post(auth::bootstrap))
        .route("/api/v1/mentions", get(mentions::list_mentions))
        .route("/api/v1/mentions/check", post(mentions::check_mention))
        .route(
            "/api/v1/trackers",
            get(trackers::list_trackers).post(trackers::create_tracker),
        )
        .route(
            "/api/v1/trackers/{id}",
            get(trackers::get_tracker)
                .patch(trackers::update_tracker)
                .delete(trackers::delete_tracker),
        )
        .route(
            "/api/v1/teams",
            get(teams::list_teams).post(teams::create_team),
        )
        .route(
            "/api/v1/teams/{id}",
            get(teams::get_team)
                .patch(teams::rename_team)
                .delete(teams::delete_team),
        )
        .route("/api/v1/teams/{id}/invites", post(teams::invite_member))
        .route(
            "/api/v1/teams/{id}/members/{user_id}",
            delete(teams::remove_member),
        )
        .route(
            "/api/v1/teams/invites/{token}/accept",
            post(teams::accept_invite),
        )
        .route(
            "/api/v1/integrations",
            get(integrations::list_integrations).post(integrations::create_integration),
        )
        .route(
            "/api/v1/integrations/{id}",
            get(integrations::get_integration)
                .patch(integrations::update_integration)
                .delete(integrations::delete_integration),
        )
        .route(
            "/api/v1/integrations/{id}/test",
            post(integrations::test_integration),
        )
        .route(
            "/api/v1/integrations/{id}/logs",
            get(integrations::list_integration_logs),
        )
        .route("/api/v1/contacts", get(contacts::list_contacts))
        .route("/api/v1/contacts/extract", post(contacts::extract_contacts))
        .route("/api/v1/usage", get(usage::get_usage))
        .route(
            "/api/v1/onboarding/queries",
            post(onboarding::suggest_queries),
        )
        .route("/api/v1/billing/checkout", post(billing::create_checkout))
        .route("/api/v1/billing/portal", post(billing::create_portal))
        .layer(
            ServiceBuilder::new()
                .layer(axum::middleware::from_fn_with_state(
                    rate_limit,
                    enforce_rate_limit,
                ))
                .layer(axum::middleware::from_fn_with_state(auth, require_user)),
        )
}

pub fn build_app(state: AppState, auth: AuthState, rate_limit: RateLimitState) -> Router {
    let public_routes = Router::new()
        .route("/api/v1/health", get(health))
        .route("/api/v1/billing/webhook", post(billing::stripe_webhook));

    Router::new()
        .merge(public_routes)
        .merge(protected_router(auth, rate_limit))
        .layer(
            ServiceBuilder::new()
                .layer(build_cors())
                .layer(axum::middleware::from_fn(request_id)),
        )
        .with_state(state)
}

async fn health(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> impl IntoResponse {
    let meta = ResponseMeta::new(req_id.0);

    match brandlens_db::health_check(&state.pool).await {
        Ok(()) => (
            StatusCode::OK,
            Json(ApiResponse {
                data: HealthData {
                    status: "ok",
                    database: "ok",
                },
                meta,
            }),
        ),
        Err(e) => {
            tracing::warn!(error = %e, "health check: database unavailable");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(ApiResponse {
                    data: HealthData {
                        status: "degraded",
                        database: "unavailable",
                    },
                    meta,
                }),
            )
        }
    }
}

pub fn default_rate_limit_state() -> RateLimitState {
    RateLimitState::new(120, Duration::from_secs(60))
}

#[cfg(test)]
pub(crate) mod test_support;
