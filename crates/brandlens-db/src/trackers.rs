//! Database operations for the `trackers` table.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::DbError;

/// A row from the `trackers` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct TrackerRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub user_email: String,
    pub team_id: Option<Uuid>,
    pub brand: String,
    pub query: String,
    pub interval_minutes: i32,
    pub active: bool,
    pub last_checked_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

pub struct NewTracker<'a> {
    pub user_id: Uuid,
    pub user_email: &'a str,
    pub team_id: Option<Uuid>,
    pub brand: &'a str,
    pub query: &'a str,
    pub interval_minutes: i32,
}

/// Sparse update: `None` keeps the current value.
#[derive(Debug, Default)]
pub struct TrackerUpdate<'a> {
    pub brand: Option<&'a str>,
    pub query: Option<&'a str>,
    pub interval_minutes: Option<i32>,
    pub active: Option<bool>,
}

const TRACKER_COLUMNS: &str = "id, user_id, user_email, team_id, brand, query, interval_minutes, \
                               active, last_checked_at, created_at, updated_at";

/// Inserts a new active tracker.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails.
pub async fn create_tracker(pool: &PgPool, tracker: &NewTracker<'_>) -> Result<TrackerRow, DbError> {
    let sql = format!(
        "INSERT INTO trackers (user_id, user_email, team_id, brand, query, interval_minutes) \
         VALUES ($1, $2, $3, $4, $5, $6) \
         RETURNING {TRACKER_COLUMNS}"
    );
    let row = sqlx::query_as::<_, TrackerRow>(&sql)
        .bind(tracker.user_id)
        .bind(tracker.user_email)
        .bind(tracker.team_id)
        .bind(tracker.brand)
        .bind(tracker.query)
        .bind(tracker.interval_minutes)
        .fetch_one(pool)
        .await?;

    Ok(row)
}

/// Returns trackers the user owns plus trackers shared with any of their teams.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_trackers_for_user(
    pool: &PgPool,
    user_id: Uuid,
) -> Result<Vec<TrackerRow>, DbError> {
    let sql = format!(
        "SELECT {TRACKER_COLUMNS} FROM trackers \
         WHERE user_id = $1 \
            OR team_id IN (SELECT team_id FROM team_members WHERE user_id = $1) \
         ORDER BY created_at DESC, id"
    );
    let rows = sqlx::query_as::<_, TrackerRow>(&sql)
        .bind(user_id)
        .fetch_all(pool)
        .await?;

    Ok(rows)
}

/// Returns a tracker visible to the user (own or team-shared), or `None`.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_tracker_for_user(
    pool: &PgPool,
    tracker_id: Uuid,
    user_id: Uuid,
) -> Result<Option<TrackerRow>, DbError> {
    let sql = format!(
        "SELECT {TRACKER_COLUMNS} FROM trackers \
         WHERE id = $1 \
           AND (user_id = $2 \
                OR team_id IN (SELECT team_id FROM team_members WHERE user_id = $2))"
    );
    let row = sqlx::query_as::<_, TrackerRow>(&sql)
        .bind(tracker_id)
        .bind(user_id)
        .fetch_optional(pool)
        .await?;

    Ok(row)
}

/// Counts trackers owned by the user, active or not. Used for plan limits.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn count_trackers_for_user(pool: &PgPool, user_id: Uuid) -> Result<i64, DbError> {
    let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM trackers WHERE user_id = $1")
        .bind(user_id)
        .fetch_one(pool)
        .await?;
    Ok(count)
}

/// Applies a sparse update and returns the updated row.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if the tracker does not exist, or
/// [`DbError::Sqlx`] if the update fails.
pub async fn update_tracker(
    pool: &PgPool,
    tracker_id: Uuid,
    update: &TrackerUpdate<'_>,
) -> Result<TrackerRow, DbError> {
    let sql = format!(
        "UPDATE trackers SET \
             brand = COALESCE($2, brand), \
             query = COALESCE($3, query), \
             interval_minutes = COALESCE($4, interval_minutes), \
             active = COALESCE($5, active), \
             updated_at = NOW() \
         WHERE id = $1 \
         RETURNING {TRACKER_COLUMNS}"
    );
    sqlx::query_as::<_, TrackerRow>(&sql)
        .bind(tracker_id)
        .bind(update.brand)
        .bind(update.query)
        .bind(update.interval_minutes)
        .bind(update.active)
        .fetch_optional(pool)
        .await?
        .ok_or(DbError::NotFound)
}

/// Hard-deletes a tracker. Its mention history survives with `tracker_id = NULL`.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if the tracker does not exist, or
/// [`DbError::Sqlx`] if the delete fails.
pub async fn delete_tracker(pool: &PgPool, tracker_id: Uuid) -> Result<(), DbError> {
    let result = sqlx::query("DELETE FROM trackers WHERE id = $1")
        .bind(tracker_id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::NotFound);
    }
    Ok(())
}

/// Returns active trackers whose interval has elapsed since their last check,
/// never-checked trackers first.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_due_trackers(pool: &PgPool) -> Result<Vec<TrackerRow>, DbError> {
    let sql = format!(
        "SELECT {TRACKER_COLUMNS} FROM trackers \
         WHERE active = true \
           AND (last_checked_at IS NULL \
                OR last_checked_at <= NOW() - make_interval(mins => interval_minutes)) \
         ORDER BY last_checked_at ASC NULLS FIRST, id"
    );
    let rows = sqlx::query_as::<_, TrackerRow>(&sql)
        .fetch_all(pool)
        .await?;

    Ok(rows)
}

/// Stamps `last_checked_at = NOW()`.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the update fails.
pub async fn mark_tracker_checked(pool: &PgPool, tracker_id: Uuid) -> Result<(), DbError> {
    sqlx::query("UPDATE trackers SET last_checked_at = NOW() WHERE id = $1")
        .bind(tracker_id)
        .execute(pool)
        .await?;
    Ok(())
}
