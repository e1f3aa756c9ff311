pub mod contacts;
pub mod integrations;
pub mod mentions;
pub mod profiles;
pub mod stripe_events;
pub mod teams;
pub mod trackers;

pub use contacts::{list_contacts, upsert_contact, ContactRow, NewContact};
pub use integrations::{
    create_integration, delete_integration, get_integration_for_user, insert_integration_log,
    list_active_webhooks_for, list_integration_logs, list_integrations_for_user,
    record_delivery_failure, record_delivery_success, update_integration, IntegrationLogRow,
    IntegrationRow, IntegrationUpdate, NewIntegration, NewIntegrationLog,
    INTEGRATION_ERROR_THRESHOLD,
};
pub use mentions::{
    count_checks_since, insert_mention, latest_mention_for_tracker, list_mentions,
    recent_source_urls, MentionRow, NewMention,
};
pub use profiles::{
    apply_subscription_change, get_profile, link_stripe_customer, plan_for_user, upsert_profile,
    ProfileRow,
};
pub use stripe_events::{forget_stripe_event, mark_stripe_event_processed};
pub use teams::{
    accept_invite, create_invite, create_team, delete_team, get_invite_by_token, get_team,
    list_members, list_pending_invites_for_email, list_teams_for_user, member_role, remove_member,
    rename_team, TeamInviteRow, TeamMemberRow, TeamRow,
};
pub use trackers::{
    count_trackers_for_user, create_tracker, delete_tracker, get_tracker_for_user,
    list_due_trackers, list_trackers_for_user, mark_tracker_checked, update_tracker, NewTracker,
    TrackerRow, TrackerUpdate,
};

use sqlx::{postgres::PgPoolOptions, PgPool};
use std::time::Duration;
use thiserror::Error;

const DEFAULT_MAX_CONNECTIONS: u32 = 10;
const DEFAULT_MIN_CONNECTIONS: u32 = 1;
const DEFAULT_ACQUIRE_TIMEOUT_SECS: u64 = 10;

// Path relative to crates/brandlens-db/Cargo.toml; resolves to <workspace-root>/migrations/
static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("../../migrations");

#[derive(Debug, Clone, Copy)]
pub struct PoolConfig {
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout_secs: u64,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_connections: DEFAULT_MAX_CONNECTIONS,
            min_connections: DEFAULT_MIN_CONNECTIONS,
            acquire_timeout_secs: DEFAULT_ACQUIRE_TIMEOUT_SECS,
        }
    }
}

impl PoolConfig {
    #[must_use]
    pub fn from_app_config(config: &brandlens_core::AppConfig) -> Self {
        Self {
            max_connections: config.db_max_connections,
            min_connections: config.db_min_connections,
            acquire_timeout_secs: config.db_acquire_timeout_secs,
        }
    }
}

#[derive(Debug, Error)]
pub enum DbError {
    #[error("record not found")]
    NotFound,
    #[error("invite is expired or no longer pending")]
    InviteUnavailable,
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
    #[error(transparent)]
    Migration(#[from] sqlx::migrate::MigrateError),
}

impl DbError {
    /// True when the underlying error is a Postgres unique-constraint violation.
    #[must_use]
    pub fn is_unique_violation(&self) -> bool {
        if let DbError::Sqlx(sqlx::Error::Database(db_err)) = self {
            return db_err.code().as_deref() == Some("23505");
        }
        false
    }
}

/// Connect to a Postgres pool using explicit URL and config.
///
/// # Errors
///
/// Returns [`sqlx::Error`] if the connection cannot be established.
pub async fn connect_pool(database_url: &str, config: PoolConfig) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(Duration::from_secs(config.acquire_timeout_secs))
        .connect(database_url)
        .await
}

/// Run all pending migrations against the pool.
///
/// Returns the number of migrations that were applied.
///
/// # Errors
///
/// Returns [`sqlx::migrate::MigrateError`] if any migration fails.
pub async fn run_migrations(pool: &PgPool) -> Result<usize, sqlx::migrate::MigrateError> {
    // The _sqlx_migrations table does not exist on a fresh database; treat that as zero.
    let applied_before: i64 =
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM _sqlx_migrations WHERE success = true")
            .fetch_one(pool)
            .await
            .unwrap_or(0);

    MIGRATOR.run(pool).await?;

    let applied_after: i64 =
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM _sqlx_migrations WHERE success = true")
            .fetch_one(pool)
            .await
            .unwrap_or(0);

    let delta = (applied_after - applied_before).max(0);
    Ok(usize::try_from(delta).unwrap_or(0))
}

/// Run a full health check: `SELECT 1` against the pool.
///
/// # Errors
///
/// Returns [`DbError`] if the ping fails.
pub async fn health_check(pool: &PgPool) -> Result<(), DbError> {
    sqlx::query_scalar::<_, i32>("SELECT 1")
        .fetch_one(pool)
        .await?;
    Ok(())
}
