//! Database operations for `integrations` and the append-only `integration_logs`.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::DbError;

/// Consecutive delivery failures after which an integration is parked in `error`.
pub const INTEGRATION_ERROR_THRESHOLD: i32 = 5;

// ---------------------------------------------------------------------------
// Row types
// ---------------------------------------------------------------------------

/// A row from the `integrations` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct IntegrationRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub team_id: Option<Uuid>,
    pub name: String,
    pub integration_type: String,
    pub webhook_url: String,
    pub webhook_method: String,
    pub webhook_secret: Option<String>,
    pub webhook_auth_header: Option<String>,
    pub event_filters: serde_json::Value,
    pub payload_template: Option<serde_json::Value>,
    pub status: String,
    pub success_count: i32,
    pub error_count: i32,
    pub last_triggered_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A row from the `integration_logs` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct IntegrationLogRow {
    pub id: Uuid,
    pub integration_id: Uuid,
    pub event_type: String,
    pub status: String,
    pub status_code: Option<i32>,
    pub request_payload: serde_json::Value,
    pub response_body: Option<String>,
    pub error_message: Option<String>,
    pub duration_ms: i32,
    pub created_at: DateTime<Utc>,
}

pub struct NewIntegration<'a> {
    pub user_id: Uuid,
    pub team_id: Option<Uuid>,
    pub name: &'a str,
    pub webhook_url: &'a str,
    pub webhook_method: &'a str,
    pub webhook_secret: Option<&'a str>,
    pub webhook_auth_header: Option<&'a str>,
    pub event_filters: &'a serde_json::Value,
    pub payload_template: Option<&'a serde_json::Value>,
}

/// Sparse update: `None` keeps the current value. For the nullable columns
/// `Some(None)` clears the column.
#[allow(clippy::option_option)]
#[derive(Debug, Default)]
pub struct IntegrationUpdate<'a> {
    pub name: Option<&'a str>,
    pub webhook_url: Option<&'a str>,
    pub webhook_method: Option<&'a str>,
    pub webhook_secret: Option<Option<&'a str>>,
    pub webhook_auth_header: Option<Option<&'a str>>,
    pub event_filters: Option<&'a serde_json::Value>,
    pub payload_template: Option<Option<&'a serde_json::Value>>,
    pub status: Option<&'a str>,
}

pub struct NewIntegrationLog<'a> {
    pub integration_id: Uuid,
    pub event_type: &'a str,
    pub status: &'a str,
    pub status_code: Option<i32>,
    pub request_payload: &'a serde_json::Value,
    pub response_body: Option<&'a str>,
    pub error_message: Option<&'a str>,
    pub duration_ms: i32,
}

const INTEGRATION_COLUMNS: &str = "id, user_id, team_id, name, integration_type, webhook_url, \
                                   webhook_method, webhook_secret, webhook_auth_header, \
                                   event_filters, payload_template, status, success_count, \
                                   error_count, last_triggered_at, last_error, created_at, updated_at";

// ---------------------------------------------------------------------------
// Integrations
// ---------------------------------------------------------------------------

/// Inserts a new active webhook integration.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails.
pub async fn create_integration(
    pool: &PgPool,
    integration: &NewIntegration<'_>,
) -> Result<IntegrationRow, DbError> {
    let sql = format!(
        "INSERT INTO integrations \
             (user_id, team_id, name, webhook_url, webhook_method, webhook_secret, \
              webhook_auth_header, event_filters, payload_template) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) \
         RETURNING {INTEGRATION_COLUMNS}"
    );
    let row = sqlx::query_as::<_, IntegrationRow>(&sql)
        .bind(integration.user_id)
        .bind(integration.team_id)
        .bind(integration.name)
        .bind(integration.webhook_url)
        .bind(integration.webhook_method)
        .bind(integration.webhook_secret)
        .bind(integration.webhook_auth_header)
        .bind(integration.event_filters)
        .bind(integration.payload_template)
        .fetch_one(pool)
        .await?;

    Ok(row)
}

/// Returns integrations the user owns plus those shared with their teams.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_integrations_for_user(
    pool: &PgPool,
    user_id: Uuid,
) -> Result<Vec<IntegrationRow>, DbError> {
    let sql = format!(
        "SELECT {INTEGRATION_COLUMNS} FROM integrations \
         WHERE user_id = $1 \
            OR team_id IN (SELECT team_id FROM team_members WHERE user_id = $1) \
         ORDER BY created_at DESC, id"
    );
    let rows = sqlx::query_as::<_, IntegrationRow>(&sql)
        .bind(user_id)
        .fetch_all(pool)
        .await?;

    Ok(rows)
}

/// Returns one integration visible to the user, or `None`.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_integration_for_user(
    pool: &PgPool,
    integration_id: Uuid,
    user_id: Uuid,
) -> Result<Option<IntegrationRow>, DbError> {
    let sql = format!(
        "SELECT {INTEGRATION_COLUMNS} FROM integrations \
         WHERE id = $1 \
           AND (user_id = $2 \
                OR team_id IN (SELECT team_id FROM team_members WHERE user_id = $2))"
    );
    let row = sqlx::query_as::<_, IntegrationRow>(&sql)
        .bind(integration_id)
        .bind(user_id)
        .fetch_optional(pool)
        .await?;

    Ok(row)
}

/// Applies a sparse update and returns the updated row.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if the integration does not exist, or
/// [`DbError::Sqlx`] if the update fails.
pub async fn update_integration(
    pool: &PgPool,
    integration_id: Uuid,
    update: &IntegrationUpdate<'_>,
) -> Result<IntegrationRow, DbError> {
    let sql = format!(
        "UPDATE integrations SET \
             name = COALESCE($2, name), \
             webhook_url = COALESCE($3, webhook_url), \
             webhook_method = COALESCE($4, webhook_method), \
             webhook_secret = CASE WHEN $5::BOOL THEN $6 ELSE webhook_secret END, \
             webhook_auth_header = CASE WHEN $7::BOOL THEN $8 ELSE webhook_auth_header END, \
             event_filters = COALESCE($9, event_filters), \
             payload_template = CASE WHEN $10::BOOL THEN $11 ELSE payload_template END, \
             status = COALESCE($12, status), \
             error_count = CASE WHEN $12 = 'active' THEN 0 ELSE error_count END, \
             updated_at = NOW() \
         WHERE id = $1 \
         RETURNING {INTEGRATION_COLUMNS}"
    );
    sqlx::query_as::<_, IntegrationRow>(&sql)
        .bind(integration_id)
        .bind(update.name)
        .bind(update.webhook_url)
        .bind(update.webhook_method)
        .bind(update.webhook_secret.is_some())
        .bind(update.webhook_secret.flatten())
        .bind(update.webhook_auth_header.is_some())
        .bind(update.webhook_auth_header.flatten())
        .bind(update.event_filters)
        .bind(update.payload_template.is_some())
        .bind(update.payload_template.flatten())
        .bind(update.status)
        .fetch_optional(pool)
        .await?
        .ok_or(DbError::NotFound)
}

/// Deletes an integration and, by cascade, its delivery logs.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if the integration does not exist, or
/// [`DbError::Sqlx`] if the delete fails.
pub async fn delete_integration(pool: &PgPool, integration_id: Uuid) -> Result<(), DbError> {
    let result = sqlx::query("DELETE FROM integrations WHERE id = $1")
        .bind(integration_id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::NotFound);
    }
    Ok(())
}

/// Returns active webhook integrations owned by `user_id`, plus the team's
/// integrations when `team_id` is given.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_active_webhooks_for(
    pool: &PgPool,
    user_id: Uuid,
    team_id: Option<Uuid>,
) -> Result<Vec<IntegrationRow>, DbError> {
    let sql = format!(
        "SELECT {INTEGRATION_COLUMNS} FROM integrations \
         WHERE integration_type = 'webhook' \
           AND status = 'active' \
           AND (user_id = $1 OR ($2::uuid IS NOT NULL AND team_id = $2)) \
         ORDER BY created_at, id"
    );
    let rows = sqlx::query_as::<_, IntegrationRow>(&sql)
        .bind(user_id)
        .bind(team_id)
        .fetch_all(pool)
        .await?;

    Ok(rows)
}

// ---------------------------------------------------------------------------
// Delivery bookkeeping
// ---------------------------------------------------------------------------

/// Records a successful delivery: bumps `success_count`, clears the failure
/// streak and puts the integration back to `active`.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the update fails.
pub async fn record_delivery_success(pool: &PgPool, integration_id: Uuid) -> Result<(), DbError> {
    sqlx::query(
        "UPDATE integrations SET \
             success_count = success_count + 1, \
             error_count = 0, \
             last_error = NULL, \
             status = 'active', \
             last_triggered_at = NOW(), \
             updated_at = NOW() \
         WHERE id = $1",
    )
    .bind(integration_id)
    .execute(pool)
    .await?;
    Ok(())
}

/// Records a failed delivery. Reaching [`INTEGRATION_ERROR_THRESHOLD`]
/// consecutive failures moves the integration to `error`.
///
/// Returns the new `error_count`.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if the integration does not exist, or
/// [`DbError::Sqlx`] if the update fails.
pub async fn record_delivery_failure(
    pool: &PgPool,
    integration_id: Uuid,
    error: &str,
) -> Result<i32, DbError> {
    sqlx::query_scalar::<_, i32>(
        "UPDATE integrations SET \
             error_count = error_count + 1, \
             last_error = $2, \
             status = CASE WHEN error_count + 1 >= $3 THEN 'error' ELSE status END, \
             last_triggered_at = NOW(), \
             updated_at = NOW() \
         WHERE id = $1 \
         RETURNING error_count",
    )
    .bind(integration_id)
    .bind(error)
    .bind(INTEGRATION_ERROR_THRESHOLD)
    .fetch_optional(pool)
    .await?
    .ok_or(DbError::NotFound)
}

/// Appends one delivery attempt to `integration_logs`.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails.
pub async fn insert_integration_log(
    pool: &PgPool,
    log: &NewIntegrationLog<'_>,
) -> Result<Uuid, DbError> {
    let id = sqlx::query_scalar::<_, Uuid>(
        "INSERT INTO integration_logs \
             (integration_id, event_type, status, status_code, request_payload, response_body, \
              error_message, duration_ms) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
         RETURNING id",
    )
    .bind(log.integration_id)
    .bind(log.event_type)
    .bind(log.status)
    .bind(log.status_code)
    .bind(log.request_payload)
    .bind(log.response_body)
    .bind(log.error_message)
    .bind(log.duration_ms)
    .fetch_one(pool)
    .await?;
    Ok(id)
}

/// Returns the most recent delivery attempts for an integration.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_integration_logs(
    pool: &PgPool,
    integration_id: Uuid,
    limit: i64,
) -> Result<Vec<IntegrationLogRow>, DbError> {
    let rows = sqlx::query_as::<_, IntegrationLogRow>(
        "SELECT id, integration_id, event_type, status, status_code, request_payload, \
                response_body, error_message, duration_ms, created_at \
         FROM integration_logs \
         WHERE integration_id = $1 \
         ORDER BY created_at DESC, id \
         LIMIT $2",
    )
    .bind(integration_id)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}
