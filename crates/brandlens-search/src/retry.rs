//! Retry with exponential back-off and jitter for search API calls.
//!
//! Rate limits and transient network or 5xx failures are retried; anything
//! else (bad key, malformed body, 4xx) is returned immediately.

use std::future::Future;
use std::time::Duration;

use crate::error::SearchError;

const MAX_DELAY_MS: u64 = 60_000;

/// Returns `true` for errors that are worth retrying after a back-off delay.
pub(crate) fn is_retriable(err: &SearchError) -> bool {
    match err {
        SearchError::RateLimited { .. } => true,
        SearchError::Http(e) => {
            e.is_timeout() || e.is_connect() || e.status().is_some_and(|s| s.is_server_error())
        }
        SearchError::UnexpectedStatus { status, .. } => *status >= 500,
        SearchError::Deserialize { .. }
        | SearchError::MissingApiKey
        | SearchError::InvalidBaseUrl { .. } => false,
    }
}

/// Runs `operation` with up to `max_retries` additional attempts on transient errors.
///
/// The n-th retry sleeps `backoff_base_secs * 2^(n-1)` seconds, capped at 60 s,
/// with ±25 % jitter. A rate-limit response that names a longer `Retry-After`
/// wins over the computed delay (still capped).
pub(crate) async fn retry_with_backoff<T, F, Fut>(
    max_retries: u32,
    backoff_base_secs: u64,
    mut operation: F,
) -> Result<T, SearchError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, SearchError>>,
{
    let mut attempt = 0u32;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                if !is_retriable(&err) || attempt >= max_retries {
                    return Err(err);
                }
                attempt += 1;
                let computed = backoff_base_secs
                    .saturating_mul(1000)
                    .saturating_mul(1u64 << (attempt - 1).min(10));
                let floor = match &err {
                    SearchError::RateLimited { retry_after_secs } => {
                        retry_after_secs.saturating_mul(1000)
                    }
                    _ => 0,
                };
                let capped = computed.max(floor).min(MAX_DELAY_MS);
                #[allow(
                    clippy::cast_possible_truncation,
                    clippy::cast_sign_loss,
                    clippy::cast_precision_loss
                )]
                let delay_ms = (capped as f64 * (rand::random::<f64>() * 0.5 + 0.75)) as u64;
                tracing::warn!(
                    attempt,
                    max_retries,
                    delay_ms,
                    error = %err,
                    "search API transient error, retrying after back-off"
                );
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            }
        }
    }
}
