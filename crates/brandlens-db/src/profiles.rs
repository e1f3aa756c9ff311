//! Database operations for the `profiles` table.

use brandlens_core::Plan;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::DbError;

/// A row from the `profiles` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ProfileRow {
    pub user_id: Uuid,
    pub email: String,
    pub full_name: Option<String>,
    pub plan: String,
    pub stripe_customer_id: Option<String>,
    pub stripe_subscription_id: Option<String>,
    pub subscription_status: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ProfileRow {
    /// The stored plan, falling back to `free` for unknown values.
    #[must_use]
    pub fn plan(&self) -> Plan {
        self.plan.parse().unwrap_or(Plan::Free)
    }
}

/// Creates the profile on first login or refreshes email/name on later logins.
///
/// The plan and Stripe columns are never touched here.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the upsert fails.
pub async fn upsert_profile(
    pool: &PgPool,
    user_id: Uuid,
    email: &str,
    full_name: Option<&str>,
) -> Result<ProfileRow, DbError> {
    let row = sqlx::query_as::<_, ProfileRow>(
        "INSERT INTO profiles (user_id, email, full_name) \
         VALUES ($1, $2, $3) \
         ON CONFLICT (user_id) DO UPDATE SET \
             email = EXCLUDED.email, \
             full_name = COALESCE(EXCLUDED.full_name, profiles.full_name), \
             updated_at = NOW() \
         RETURNING user_id, email, full_name, plan, stripe_customer_id, \
                   stripe_subscription_id, subscription_status, created_at, updated_at",
    )
    .bind(user_id)
    .bind(email)
    .bind(full_name)
    .fetch_one(pool)
    .await?;

    Ok(row)
}

/// Returns the profile for `user_id`, or `None` if the user never bootstrapped.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_profile(pool: &PgPool, user_id: Uuid) -> Result<Option<ProfileRow>, DbError> {
    let row = sqlx::query_as::<_, ProfileRow>(
        "SELECT user_id, email, full_name, plan, stripe_customer_id, \
                stripe_subscription_id, subscription_status, created_at, updated_at \
         FROM profiles \
         WHERE user_id = $1",
    )
    .bind(user_id)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

/// Returns the user's effective plan. Users without a profile are on `free`.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn plan_for_user(pool: &PgPool, user_id: Uuid) -> Result<Plan, DbError> {
    Ok(get_profile(pool, user_id)
        .await?
        .map_or(Plan::Free, |profile| profile.plan()))
}

/// Records the Stripe customer created during checkout against a user.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if the user has no profile, or
/// [`DbError::Sqlx`] if the update fails.
pub async fn link_stripe_customer(
    pool: &PgPool,
    user_id: Uuid,
    customer_id: &str,
) -> Result<(), DbError> {
    let result = sqlx::query(
        "UPDATE profiles \
         SET stripe_customer_id = $1, updated_at = NOW() \
         WHERE user_id = $2",
    )
    .bind(customer_id)
    .bind(user_id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::NotFound);
    }
    Ok(())
}

/// Applies a subscription state change reported by Stripe for a customer.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if no profile carries `customer_id`, or
/// [`DbError::Sqlx`] if the update fails.
pub async fn apply_subscription_change(
    pool: &PgPool,
    customer_id: &str,
    plan: Plan,
    subscription_id: Option<&str>,
    status: &str,
) -> Result<(), DbError> {
    let result = sqlx::query(
        "UPDATE profiles \
         SET plan = $1, stripe_subscription_id = $2, subscription_status = $3, updated_at = NOW() \
         WHERE stripe_customer_id = $4",
    )
    .bind(plan.as_str())
    .bind(subscription_id)
    .bind(status)
    .bind(customer_id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::NotFound);
    }
    Ok(())
}
