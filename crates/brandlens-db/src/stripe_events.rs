//! Idempotency ledger for Stripe webhook deliveries.

use sqlx::PgPool;

use crate::DbError;

/// Records a Stripe event id as processed.
///
/// Returns `false` when the id was already recorded, meaning the event is a
/// redelivery and should be acknowledged without reprocessing.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails.
pub async fn mark_stripe_event_processed(
    pool: &PgPool,
    event_id: &str,
    event_type: &str,
) -> Result<bool, DbError> {
    let result = sqlx::query(
        "INSERT INTO stripe_events (id, event_type) VALUES ($1, $2) ON CONFLICT (id) DO NOTHING",
    )
    .bind(event_id)
    .bind(event_type)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() == 1)
}

/// Removes a recorded event id so a failed event is reprocessed on Stripe's retry.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the delete fails.
pub async fn forget_stripe_event(pool: &PgPool, event_id: &str) -> Result<(), DbError> {
    sqlx::query("DELETE FROM stripe_events WHERE id = $1")
        .bind(event_id)
        .execute(pool)
        .await?;
    Ok(())
}
