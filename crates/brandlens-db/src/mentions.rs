//! Database operations for the append-only `mentions` table.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::DbError;

/// A row from the `mentions` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct MentionRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub user_email: String,
    pub team_id: Option<Uuid>,
    pub tracker_id: Option<Uuid>,
    pub brand: String,
    pub query: String,
    pub mentioned: bool,
    pub evidence: String,
    pub position: Option<i32>,
    pub raw_output: serde_json::Value,
    pub source_urls: Vec<String>,
    pub created_at: DateTime<Utc>,
}

pub struct NewMention<'a> {
    pub user_id: Uuid,
    pub user_email: &'a str,
    pub team_id: Option<Uuid>,
    pub tracker_id: Option<Uuid>,
    pub brand: &'a str,
    pub query: &'a str,
    pub mentioned: bool,
    pub evidence: &'a str,
    pub position: Option<i32>,
    pub raw_output: &'a serde_json::Value,
    pub source_urls: &'a [String],
}

const MENTION_COLUMNS: &str = "id, user_id, user_email, team_id, tracker_id, brand, query, \
                               mentioned, evidence, position, raw_output, source_urls, created_at";

/// Appends one check result.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails.
pub async fn insert_mention(pool: &PgPool, mention: &NewMention<'_>) -> Result<MentionRow, DbError> {
    let sql = format!(
        "INSERT INTO mentions \
             (user_id, user_email, team_id, tracker_id, brand, query, mentioned, evidence, \
              position, raw_output, source_urls) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11) \
         RETURNING {MENTION_COLUMNS}"
    );
    let row = sqlx::query_as::<_, MentionRow>(&sql)
        .bind(mention.user_id)
        .bind(mention.user_email)
        .bind(mention.team_id)
        .bind(mention.tracker_id)
        .bind(mention.brand)
        .bind(mention.query)
        .bind(mention.mentioned)
        .bind(mention.evidence)
        .bind(mention.position)
        .bind(mention.raw_output)
        .bind(mention.source_urls)
        .fetch_one(pool)
        .await?;

    Ok(row)
}

/// Lists the user's mention records newest first, optionally filtered by
/// brand (case-insensitive) or tracker, paging backwards from `before`.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_mentions(
    pool: &PgPool,
    user_id: Uuid,
    brand: Option<&str>,
    tracker_id: Option<Uuid>,
    before: Option<DateTime<Utc>>,
    limit: i64,
) -> Result<Vec<MentionRow>, DbError> {
    let sql = format!(
        "SELECT {MENTION_COLUMNS} FROM mentions \
         WHERE (user_id = $1 \
                OR team_id IN (SELECT team_id FROM team_members WHERE user_id = $1)) \
           AND ($2::text IS NULL OR LOWER(brand) = LOWER($2)) \
           AND ($3::uuid IS NULL OR tracker_id = $3) \
           AND ($4::timestamptz IS NULL OR created_at < $4) \
         ORDER BY created_at DESC, id DESC \
         LIMIT $5"
    );
    let rows = sqlx::query_as::<_, MentionRow>(&sql)
        .bind(user_id)
        .bind(brand)
        .bind(tracker_id)
        .bind(before)
        .bind(limit)
        .fetch_all(pool)
        .await?;

    Ok(rows)
}

/// Returns the most recent record for a tracker, if any.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn latest_mention_for_tracker(
    pool: &PgPool,
    tracker_id: Uuid,
) -> Result<Option<MentionRow>, DbError> {
    let sql = format!(
        "SELECT {MENTION_COLUMNS} FROM mentions \
         WHERE tracker_id = $1 \
         ORDER BY created_at DESC, id DESC \
         LIMIT 1"
    );
    let row = sqlx::query_as::<_, MentionRow>(&sql)
        .bind(tracker_id)
        .fetch_optional(pool)
        .await?;

    Ok(row)
}

/// Counts checks the user ran since `since`. Failed searches count too.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn count_checks_since(
    pool: &PgPool,
    user_id: Uuid,
    since: DateTime<Utc>,
) -> Result<i64, DbError> {
    let count = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM mentions WHERE user_id = $1 AND created_at >= $2",
    )
    .bind(user_id)
    .bind(since)
    .fetch_one(pool)
    .await?;
    Ok(count)
}

/// Returns distinct cited source URLs from the user's records, most recently
/// seen first. Feeds the contact extraction batch.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn recent_source_urls(
    pool: &PgPool,
    user_id: Uuid,
    limit: i64,
) -> Result<Vec<String>, DbError> {
    let urls = sqlx::query_scalar::<_, String>(
        "SELECT url FROM ( \
             SELECT u.url, MAX(m.created_at) AS last_seen \
             FROM mentions m, UNNEST(m.source_urls) AS u(url) \
             WHERE m.user_id = $1 \
             GROUP BY u.url \
         ) s \
         ORDER BY last_seen DESC, url \
         LIMIT $2",
    )
    .bind(user_id)
    .bind(limit)
    .fetch_all(pool)
    .await?;
    Ok(urls)
}
