use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use brandlens_core::{EventFilters, IntegrationStatus, MentionEvent};
use brandlens_db::{DbError, IntegrationLogRow, IntegrationRow, IntegrationUpdate, NewIntegration};
use brandlens_webhooks::DeliveryOutcome;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::middleware::{CurrentUser, RequestId};

use super::{
    ensure_can_write, ensure_team_member, map_db_error, normalize_limit, require_text, ApiError,
    ApiResponse, AppState,
};

const MAX_NAME_LEN: usize = 100;
const MAX_URL_LEN: usize = 2048;
const ALLOWED_METHODS: [&str; 3] = ["POST", "PUT", "PATCH"];

// ---------------------------------------------------------------------------
// Request bodies
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub(super) struct CreateIntegrationRequest {
    pub name: String,
    pub webhook_url: String,
    pub webhook_method: Option<String>,
    pub webhook_secret: Option<String>,
    pub webhook_auth_header: Option<String>,
    pub event_filters: Option<Value>,
    pub payload_template: Option<Value>,
    pub team_id: Option<Uuid>,
}

// Outer None = field absent (keep), Some(None) = explicit null (clear).
#[allow(clippy::option_option)]
#[derive(Debug, Deserialize)]
pub(super) struct UpdateIntegrationRequest {
    pub name: Option<String>,
    pub webhook_url: Option<String>,
    pub webhook_method: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub webhook_secret: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub webhook_auth_header: Option<Option<String>>,
    pub event_filters: Option<Value>,
    #[serde(default, deserialize_with = "nullable")]
    pub payload_template: Option<Option<Value>>,
    pub status: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(super) struct LogListQuery {
    pub limit: Option<i64>,
}

// ---------------------------------------------------------------------------
// Response bodies
// ---------------------------------------------------------------------------

/// Integration as returned to clients; credentials are reported, never echoed.
#[derive(Debug, Serialize)]
pub(super) struct IntegrationItem {
    pub id: Uuid,
    pub team_id: Option<Uuid>,
    pub name: String,
    pub integration_type: String,
    pub webhook_url: String,
    pub webhook_method: String,
    pub has_secret: bool,
    pub has_auth_header: bool,
    pub event_filters: Value,
    pub payload_template: Option<Value>,
    pub status: String,
    pub success_count: i32,
    pub error_count: i32,
    pub last_triggered_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<IntegrationRow> for IntegrationItem {
    fn from(row: IntegrationRow) -> Self {
        Self {
            id: row.id,
            team_id: row.team_id,
            name: row.name,
            integration_type: row.integration_type,
            webhook_url: row.webhook_url,
            webhook_method: row.webhook_method,
            has_secret: row.webhook_secret.is_some_and(|s| !s.is_empty()),
            has_auth_header: row.webhook_auth_header.is_some_and(|s| !s.is_empty()),
            event_filters: row.event_filters,
            payload_template: row.payload_template,
            status: row.status,
            success_count: row.success_count,
            error_count: row.error_count,
            last_triggered_at: row.last_triggered_at,
            last_error: row.last_error,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub(super) struct IntegrationLogItem {
    pub id: Uuid,
    pub event_type: String,
    pub status: String,
    pub status_code: Option<i32>,
    pub request_payload: Value,
    pub response_body: Option<String>,
    pub error_message: Option<String>,
    pub duration_ms: i32,
    pub created_at: DateTime<Utc>,
}

impl From<IntegrationLogRow> for IntegrationLogItem {
    fn from(row: IntegrationLogRow) -> Self {
        Self {
            id: row.id,
            event_type: row.event_type,
            status: row.status,
            status_code: row.status_code,
            request_payload: row.request_payload,
            response_body: row.response_body,
            error_message: row.error_message,
            duration_ms: row.duration_ms,
            created_at: row.created_at,
        }
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

fn validate_url(req_id: &str, raw: &str) -> Result<String, ApiError> {
    let trimmed = require_text(req_id, "webhook_url", raw, MAX_URL_LEN)?;
    match reqwest::Url::parse(&trimmed) {
        Ok(url) if matches!(url.scheme(), "http" | "https") && url.host_str().is_some() => {
            Ok(trimmed)
        }
        _ => Err(ApiError::new(
            req_id,
            "validation_error",
            "webhook_url must be an absolute http(s) URL",
        )),
    }
}

fn validate_method(req_id: &str, raw: &str) -> Result<String, ApiError> {
    let method = raw.trim().to_ascii_uppercase();
    if ALLOWED_METHODS.contains(&method.as_str()) {
        Ok(method)
    } else {
        Err(ApiError::new(
            req_id,
            "validation_error",
            "webhook_method must be POST, PUT or PATCH",
        ))
    }
}

/// Accepts `{events?, min_position?, mentioned_only?}` with known event names.
fn validate_filters(req_id: &str, raw: &Value) -> Result<Value, ApiError> {
    let invalid = |message: &str| ApiError::new(req_id, "validation_error", message);
    if !raw.is_object() {
        return Err(invalid("event_filters must be an object"));
    }
    let filters: EventFilters = serde_json::from_value(raw.clone())
        .map_err(|e| invalid(&format!("event_filters: {e}")))?;

    for event in filters.events.iter().flatten() {
        match event.parse::<MentionEvent>() {
            Ok(MentionEvent::Test) | Err(_) => {
                return Err(invalid(&format!("unknown event '{event}'")));
            }
            Ok(_) => {}
        }
    }
    if filters.min_position.is_some_and(|p| p < 1) {
        return Err(invalid("min_position must be at least 1"));
    }

    serde_json::to_value(&filters).map_err(|e| invalid(&format!("event_filters: {e}")))
}

fn validate_template(req_id: &str, raw: &Value) -> Result<(), ApiError> {
    if raw.is_object() || raw.is_array() || raw.is_string() {
        Ok(())
    } else {
        Err(ApiError::new(
            req_id,
            "validation_error",
            "payload_template must be a JSON object, array or string",
        ))
    }
}

fn validate_status(req_id: &str, raw: &str) -> Result<IntegrationStatus, ApiError> {
    match raw.trim().parse::<IntegrationStatus>() {
        Ok(status @ (IntegrationStatus::Active | IntegrationStatus::Paused)) => Ok(status),
        _ => Err(ApiError::new(
            req_id,
            "validation_error",
            "status must be 'active' or 'paused'",
        )),
    }
}

fn non_blank(value: Option<&String>) -> Option<&str> {
    value.map(|s| s.trim()).filter(|s| !s.is_empty())
}

/// Keeps a present `null` distinct from an absent field.
#[allow(clippy::option_option)]
fn nullable<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// PATCH value for a credential column: `null` or blank clears it.
#[allow(clippy::option_option)]
fn credential_patch(value: Option<&Option<String>>) -> Option<Option<&str>> {
    value.map(|inner| non_blank(inner.as_ref()))
}

async fn load_visible(
    state: &AppState,
    req_id: &str,
    integration_id: Uuid,
    user_id: Uuid,
) -> Result<IntegrationRow, ApiError> {
    brandlens_db::get_integration_for_user(&state.pool, integration_id, user_id)
        .await
        .map_err(|e| map_db_error(req_id.to_owned(), &e))?
        .ok_or_else(|| ApiError::new(req_id, "not_found", "integration not found"))
}

fn integration_not_found_or(req_id: &str, error: &DbError) -> ApiError {
    match error {
        DbError::NotFound => ApiError::new(req_id, "not_found", "integration not found"),
        other => map_db_error(req_id.to_owned(), other),
    }
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

pub(super) async fn list_integrations(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Extension(user): Extension<CurrentUser>,
) -> Result<Json<ApiResponse<Vec<IntegrationItem>>>, ApiError> {
    let rows = brandlens_db::list_integrations_for_user(&state.pool, user.id)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;
    Ok(Json(ApiResponse::new(
        req_id.0,
        rows.into_iter().map(IntegrationItem::from).collect(),
    )))
}

pub(super) async fn create_integration(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Extension(user): Extension<CurrentUser>,
    Json(body): Json<CreateIntegrationRequest>,
) -> Result<(StatusCode, Json<ApiResponse<IntegrationItem>>), ApiError> {
    let rid = &req_id.0;
    let name = require_text(rid, "name", &body.name, MAX_NAME_LEN)?;
    let webhook_url = validate_url(rid, &body.webhook_url)?;
    let webhook_method = match non_blank(body.webhook_method.as_ref()) {
        Some(raw) => validate_method(rid, raw)?,
        None => "POST".to_string(),
    };
    let event_filters = match &body.event_filters {
        Some(raw) if !raw.is_null() => validate_filters(rid, raw)?,
        _ => Value::Object(serde_json::Map::new()),
    };
    let payload_template = body.payload_template.as_ref();
    if let Some(template) = payload_template {
        validate_template(rid, template)?;
    }
    if let Some(team_id) = body.team_id {
        ensure_team_member(&state, rid, user.id, team_id).await?;
    }

    let row = brandlens_db::create_integration(
        &state.pool,
        &NewIntegration {
            user_id: user.id,
            team_id: body.team_id,
            name: &name,
            webhook_url: &webhook_url,
            webhook_method: &webhook_method,
            webhook_secret: non_blank(body.webhook_secret.as_ref()),
            webhook_auth_header: non_blank(body.webhook_auth_header.as_ref()),
            event_filters: &event_filters,
            payload_template,
        },
    )
    .await
    .map_err(|e| map_db_error(rid.clone(), &e))?;

    tracing::info!(integration_id = %row.id, user_id = %user.id, "integration created");
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::new(req_id.0, IntegrationItem::from(row))),
    ))
}

pub(super) async fn get_integration(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Extension(user): Extension<CurrentUser>,
    Path(integration_id): Path<Uuid>,
) -> Result<Json<ApiResponse<IntegrationItem>>, ApiError> {
    let row = load_visible(&state, &req_id.0, integration_id, user.id).await?;
    Ok(Json(ApiResponse::new(req_id.0, IntegrationItem::from(row))))
}

/// PATCH /api/v1/integrations/{id}: re-activating clears the failure streak.
pub(super) async fn update_integration(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Extension(user): Extension<CurrentUser>,
    Path(integration_id): Path<Uuid>,
    Json(body): Json<UpdateIntegrationRequest>,
) -> Result<Json<ApiResponse<IntegrationItem>>, ApiError> {
    let rid = &req_id.0;
    let existing = load_visible(&state, rid, integration_id, user.id).await?;
    ensure_can_write(&state, rid, user.id, existing.user_id, existing.team_id).await?;

    let name = body
        .name
        .as_deref()
        .map(|n| require_text(rid, "name", n, MAX_NAME_LEN))
        .transpose()?;
    let webhook_url = body
        .webhook_url
        .as_deref()
        .map(|u| validate_url(rid, u))
        .transpose()?;
    let webhook_method = body
        .webhook_method
        .as_deref()
        .map(|m| validate_method(rid, m))
        .transpose()?;
    let event_filters = body
        .event_filters
        .as_ref()
        .filter(|f| !f.is_null())
        .map(|f| validate_filters(rid, f))
        .transpose()?;
    let payload_template = body.payload_template.as_ref().map(Option::as_ref);
    if let Some(Some(template)) = payload_template {
        validate_template(rid, template)?;
    }
    let status = body
        .status
        .as_deref()
        .map(|s| validate_status(rid, s))
        .transpose()?;

    let row = brandlens_db::update_integration(
        &state.pool,
        integration_id,
        &IntegrationUpdate {
            name: name.as_deref(),
            webhook_url: webhook_url.as_deref(),
            webhook_method: webhook_method.as_deref(),
            webhook_secret: credential_patch(body.webhook_secret.as_ref()),
            webhook_auth_header: credential_patch(body.webhook_auth_header.as_ref()),
            event_filters: event_filters.as_ref(),
            payload_template,
            status: status.map(|s| s.as_str()),
        },
    )
    .await
    .map_err(|e| integration_not_found_or(rid, &e))?;

    Ok(Json(ApiResponse::new(req_id.0, IntegrationItem::from(row))))
}

pub(super) async fn delete_integration(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Extension(user): Extension<CurrentUser>,
    Path(integration_id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    let rid = &req_id.0;
    let existing = load_visible(&state, rid, integration_id, user.id).await?;
    ensure_can_write(&state, rid, user.id, existing.user_id, existing.team_id).await?;

    brandlens_db::delete_integration(&state.pool, integration_id)
        .await
        .map_err(|e| integration_not_found_or(rid, &e))?;

    tracing::info!(%integration_id, "integration deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/v1/integrations/{id}/test: synchronous sample delivery.
///
/// A failed delivery is still a 200; the outcome says what went wrong.
pub(super) async fn test_integration(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Extension(user): Extension<CurrentUser>,
    Path(integration_id): Path<Uuid>,
) -> Result<Json<ApiResponse<DeliveryOutcome>>, ApiError> {
    let rid = &req_id.0;
    let integration = load_visible(&state, rid, integration_id, user.id).await?;
    ensure_can_write(&state, rid, user.id, integration.user_id, integration.team_id).await?;

    let outcome = state.dispatcher.send_test(&integration).await;
    tracing::info!(
        %integration_id,
        success = outcome.success,
        status_code = ?outcome.status_code,
        "test delivery sent"
    );
    Ok(Json(ApiResponse::new(req_id.0, outcome)))
}

pub(super) async fn list_integration_logs(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Extension(user): Extension<CurrentUser>,
    Path(integration_id): Path<Uuid>,
    Query(params): Query<LogListQuery>,
) -> Result<Json<ApiResponse<Vec<IntegrationLogItem>>>, ApiError> {
    let rid = &req_id.0;
    load_visible(&state, rid, integration_id, user.id).await?;

    let rows =
        brandlens_db::list_integration_logs(&state.pool, integration_id, normalize_limit(params.limit))
            .await
            .map_err(|e| map_db_error(rid.clone(), &e))?;

    Ok(Json(ApiResponse::new(
        req_id.0,
        rows.into_iter().map(IntegrationLogItem::from).collect(),
    )))
}
