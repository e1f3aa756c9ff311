//! Background job scheduler.
//!
//! Runs the tracker poll on a cron schedule. Each run checks every due
//! tracker sequentially; a run that starts while the previous one is still
//! going is skipped.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio_cron_scheduler::{Job, JobScheduler, JobSchedulerError};

use crate::checks::CheckService;

/// Builds and starts the background job scheduler.
///
/// Returns the running [`JobScheduler`] handle, which must be kept alive for
/// the lifetime of the process. Dropping it stops the jobs.
///
/// # Errors
///
/// Returns [`JobSchedulerError`] if the scheduler cannot be initialised, the
/// cron expression is invalid, or the scheduler fails to start.
pub async fn build_scheduler(
    checks: CheckService,
    config: Arc<brandlens_core::AppConfig>,
) -> Result<JobScheduler, JobSchedulerError> {
    let scheduler = JobScheduler::new().await?;

    register_tracker_poll_job(
        &scheduler,
        checks,
        &config.tracker_poll_cron,
        Duration::from_millis(config.tracker_poll_delay_ms),
    )
    .await?;

    scheduler.start().await?;
    Ok(scheduler)
}

async fn register_tracker_poll_job(
    scheduler: &JobScheduler,
    checks: CheckService,
    cron: &str,
    delay: Duration,
) -> Result<(), JobSchedulerError> {
    let running = Arc::new(Mutex::new(()));

    let job = Job::new_async(cron, move |_uuid, _lock| {
        let checks = checks.clone();
        let running = Arc::clone(&running);

        Box::pin(async move {
            let Ok(_guard) = running.try_lock() else {
                tracing::warn!("scheduler: previous tracker poll still running; skipping");
                return;
            };
            run_tracker_poll(&checks, delay).await;
        })
    })?;

    scheduler.add(job).await?;
    tracing::info!(cron, "scheduler: registered tracker poll job");
    Ok(())
}

async fn run_tracker_poll(checks: &CheckService, delay: Duration) {
    match checks.poll_due_trackers(delay).await {
        Ok(summary) if summary.due == 0 => {
            tracing::debug!("scheduler: no trackers due");
        }
        Ok(summary) => {
            tracing::info!(
                due = summary.due,
                checked = summary.checked,
                skipped = summary.skipped,
                failed = summary.failed,
                "scheduler: tracker poll complete"
            );
        }
        Err(e) => {
            tracing::error!(error = %e, "scheduler: failed to list due trackers");
        }
    }
}
