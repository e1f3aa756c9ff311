//! Mention check pipeline shared by the API, the tracker scheduler and the CLI.
//!
//! A check enforces the owner's monthly quota, asks the search API, appends a
//! mention record (also when the search failed), stamps the tracker and fires
//! the resulting webhook events.

use std::time::Duration;

use brandlens_core::{AppConfig, MentionEvent, Plan};
use brandlens_db::{DbError, MentionRow, NewMention, TrackerRow};
use brandlens_search::{SearchClient, SearchError};
use brandlens_webhooks::{Dispatcher, WebhookMention};
use chrono::{DateTime, Datelike, Utc};
use sqlx::PgPool;
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum CheckError {
    #[error("monthly check limit of {limit} reached for the {plan} plan")]
    LimitReached { plan: Plan, limit: i64 },
    #[error(transparent)]
    Db(#[from] DbError),
}

/// Search client with the configured model, timeout and retry policy.
///
/// # Errors
///
/// Returns [`SearchError`] if the HTTP client cannot be built or the base URL
/// is invalid.
pub fn search_client(config: &AppConfig) -> Result<SearchClient, SearchError> {
    Ok(SearchClient::with_base_url(
        config.openai_api_key.as_deref().unwrap_or_default(),
        &config.search_model,
        config.search_timeout_secs,
        &config.openai_base_url,
    )?
    .with_retries(config.search_max_retries, config.search_backoff_base_secs))
}

/// Who is checking what.
#[derive(Debug, Clone, Copy)]
pub struct CheckRequest<'a> {
    pub user_id: Uuid,
    pub user_email: &'a str,
    pub team_id: Option<Uuid>,
    pub tracker_id: Option<Uuid>,
    pub brand: &'a str,
    pub query: &'a str,
}

impl<'a> CheckRequest<'a> {
    #[must_use]
    pub fn for_tracker(tracker: &'a TrackerRow) -> Self {
        Self {
            user_id: tracker.user_id,
            user_email: &tracker.user_email,
            team_id: tracker.team_id,
            tracker_id: Some(tracker.id),
            brand: &tracker.brand,
            query: &tracker.query,
        }
    }
}

/// A stored check and the events it produced.
#[derive(Debug, Clone)]
pub struct CheckResult {
    pub mention: MentionRow,
    pub events: Vec<MentionEvent>,
    pub search_failed: bool,
}

/// Totals for one polling pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct PollSummary {
    pub due: usize,
    pub checked: usize,
    pub skipped: usize,
    pub failed: usize,
}

#[derive(Clone)]
pub struct CheckService {
    pool: PgPool,
    search: SearchClient,
    dispatcher: Dispatcher,
    wait_for_webhooks: bool,
}

impl CheckService {
    #[must_use]
    pub fn new(pool: PgPool, search: SearchClient, dispatcher: Dispatcher) -> Self {
        Self {
            pool,
            search,
            dispatcher,
            wait_for_webhooks: false,
        }
    }

    /// Awaits webhook deliveries instead of spawning them (for short-lived processes).
    #[must_use]
    pub fn waiting_for_webhooks(mut self) -> Self {
        self.wait_for_webhooks = true;
        self
    }

    #[must_use]
    pub fn search(&self) -> &SearchClient {
        &self.search
    }

    /// Runs one check end to end.
    ///
    /// # Errors
    ///
    /// Returns [`CheckError::LimitReached`] when the owner has used the month's
    /// checks, or [`CheckError::Db`] if the quota lookup or the insert fails.
    pub async fn run(&self, request: CheckRequest<'_>) -> Result<CheckResult, CheckError> {
        let plan = brandlens_db::plan_for_user(&self.pool, request.user_id).await?;
        let used =
            brandlens_db::count_checks_since(&self.pool, request.user_id, month_start(Utc::now()))
                .await?;
        let limit = plan.monthly_check_limit();
        if used >= limit {
            return Err(CheckError::LimitReached { plan, limit });
        }

        let previous = match request.tracker_id {
            Some(tracker_id) => {
                brandlens_db::latest_mention_for_tracker(&self.pool, tracker_id).await?
            }
            None => None,
        };

        let outcome = self.search.check(request.brand, request.query).await;

        let mention = brandlens_db::insert_mention(
            &self.pool,
            &NewMention {
                user_id: request.user_id,
                user_email: request.user_email,
                team_id: request.team_id,
                tracker_id: request.tracker_id,
                brand: request.brand,
                query: request.query,
                mentioned: outcome.mentioned,
                evidence: &outcome.evidence,
                position: outcome.position,
                raw_output: &outcome.raw_output,
                source_urls: &outcome.source_urls,
            },
        )
        .await?;

        if let Some(tracker_id) = request.tracker_id {
            if let Err(e) = brandlens_db::mark_tracker_checked(&self.pool, tracker_id).await {
                tracing::warn!(%tracker_id, error = %e, "failed to stamp tracker check time");
            }
        }

        let events = mention_events(
            previous.map(|row| row.mentioned),
            mention.mentioned,
            outcome.search_failed,
        );
        self.dispatch(&mention, &events).await;

        tracing::info!(
            user_id = %request.user_id,
            brand = request.brand,
            mentioned = mention.mentioned,
            sources = mention.source_urls.len(),
            search_failed = outcome.search_failed,
            "mention check recorded"
        );

        Ok(CheckResult {
            mention,
            events,
            search_failed: outcome.search_failed,
        })
    }

    async fn dispatch(&self, mention: &MentionRow, events: &[MentionEvent]) {
        let payload = WebhookMention::from(mention);
        for &event in events {
            if self.wait_for_webhooks {
                self.dispatcher
                    .trigger_and_wait(mention.user_id, event, &payload, mention.team_id)
                    .await;
            } else {
                self.dispatcher
                    .trigger(mention.user_id, event, payload.clone(), mention.team_id);
            }
        }
    }

    /// Checks every due tracker one after another, pausing `delay` between them.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] only if the due trackers cannot be listed; per-tracker
    /// failures are logged and counted.
    pub async fn poll_due_trackers(&self, delay: Duration) -> Result<PollSummary, DbError> {
        let trackers = brandlens_db::list_due_trackers(&self.pool).await?;
        let mut summary = PollSummary {
            due: trackers.len(),
            ..PollSummary::default()
        };

        for (index, tracker) in trackers.iter().enumerate() {
            if index > 0 && !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }

            match self.run(CheckRequest::for_tracker(tracker)).await {
                Ok(_) => summary.checked += 1,
                Err(CheckError::LimitReached { plan, limit }) => {
                    tracing::warn!(
                        tracker_id = %tracker.id,
                        user_id = %tracker.user_id,
                        %plan,
                        limit,
                        "skipping tracker: monthly check limit reached"
                    );
                    // Stamped so the tracker waits a full interval before the next attempt.
                    if let Err(e) =
                        brandlens_db::mark_tracker_checked(&self.pool, tracker.id).await
                    {
                        tracing::warn!(
                            tracker_id = %tracker.id,
                            error = %e,
                            "failed to stamp skipped tracker"
                        );
                    }
                    summary.skipped += 1;
                }
                Err(CheckError::Db(e)) => {
                    tracing::error!(tracker_id = %tracker.id, error = %e, "tracker check failed");
                    summary.failed += 1;
                }
            }
        }

        Ok(summary)
    }
}

/// Events for a new check given the tracker's previous result.
///
/// `mention.lost` needs a previous positive result and a completed search; a
/// failed search is not evidence that the brand dropped out.
#[must_use]
pub fn mention_events(
    previous: Option<bool>,
    mentioned: bool,
    search_failed: bool,
) -> Vec<MentionEvent> {
    let mut events = vec![MentionEvent::Checked];
    if mentioned {
        events.push(MentionEvent::Found);
    } else if previous == Some(true) && !search_failed {
        events.push(MentionEvent::Lost);
    }
    events
}

/// Midnight UTC on the first day of `now`'s month; the usage window start.
#[must_use]
pub fn month_start(now: DateTime<Utc>) -> DateTime<Utc> {
    now.date_naive()
        .with_day(1)
        .and_then(|day| day.and_hms_opt(0, 0, 0))
        .map_or(now, |start| start.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    use crate::api::test_support::{seed_profile, test_state};

    #[sqlx::test(migrations = "../../migrations")]
    async fn over_quota_tracker_is_skipped_once_per_interval(pool: PgPool) {
        let user_id = Uuid::new_v4();
        seed_profile(&pool, user_id, "owner@smallbiz.io", "free").await;
        sqlx::query(
            "INSERT INTO mentions (user_id, user_email, brand, query, mentioned, evidence, raw_output, source_urls) \
             SELECT $1, 'owner@smallbiz.io', 'Acme', 'q', false, 'No mention found', '{}'::jsonb, '{}' \
             FROM generate_series(1, 100)",
        )
        .bind(user_id)
        .execute(&pool)
        .await
        .unwrap_or_else(|e| panic!("seed mentions: {e}"));
        let tracker = brandlens_db::create_tracker(
            &pool,
            &brandlens_db::NewTracker {
                user_id,
                user_email: "owner@smallbiz.io",
                team_id: None,
                brand: "Acme",
                query: "best anvil brands",
                interval_minutes: 60,
            },
        )
        .await
        .unwrap_or_else(|e| panic!("create tracker: {e}"));

        let checks = test_state(pool.clone()).checks;
        let first = checks
            .poll_due_trackers(Duration::ZERO)
            .await
            .unwrap_or_else(|e| panic!("first poll: {e}"));
        assert_eq!(first.due, 1);
        assert_eq!(first.skipped, 1);
        assert_eq!(first.checked, 0);

        let stamped = brandlens_db::get_tracker_for_user(&pool, tracker.id, user_id)
            .await
            .unwrap_or_else(|e| panic!("reload tracker: {e}"))
            .unwrap_or_else(|| panic!("tracker missing"));
        assert!(stamped.last_checked_at.is_some());

        let second = checks
            .poll_due_trackers(Duration::ZERO)
            .await
            .unwrap_or_else(|e| panic!("second poll: {e}"));
        assert_eq!(second, PollSummary::default());
    }

    #[test]
    fn every_check_emits_checked() {
        assert_eq!(
            mention_events(None, false, false),
            vec![MentionEvent::Checked]
        );
        assert_eq!(
            mention_events(Some(true), true, false),
            vec![MentionEvent::Checked, MentionEvent::Found]
        );
    }

    #[test]
    fn lost_requires_previous_positive_and_real_answer() {
        assert_eq!(
            mention_events(Some(true), false, false),
            vec![MentionEvent::Checked, MentionEvent::Lost]
        );
        assert_eq!(
            mention_events(Some(false), false, false),
            vec![MentionEvent::Checked]
        );
        assert_eq!(
            mention_events(Some(true), false, true),
            vec![MentionEvent::Checked]
        );
    }

    #[test]
    fn month_start_truncates_to_first_day() {
        let now = Utc.with_ymd_and_hms(2026, 3, 17, 15, 42, 9).unwrap();
        assert_eq!(
            month_start(now),
            Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap()
        );
    }
}
