//! Scheduled background tasks using tokio-cron-scheduler.
//!
//! The escalation scan runs on a fixed five-minute cadence, independent of any
//! request. It reads and mutates the same store the request-facing managers
//! use; each run is bounded and idempotent (claimed instances are skipped by
//! later runs), so an overlapping or retried trigger drains the same backlog
//! without double-notifying.

use anyhow::Result;
use tokio_cron_scheduler::{Job, JobScheduler};

use crate::domains::escalation::actions::{scan, ScanParams};
use crate::kernel::ServerDeps;

/// Start all scheduled tasks
pub async fn start_scheduler(deps: ServerDeps, params: ScanParams) -> Result<JobScheduler> {
    let scheduler = JobScheduler::new().await?;

    let scan_job = Job::new_async("0 */5 * * * *", move |_uuid, _lock| {
        let deps = deps.clone();
        Box::pin(async move {
            match scan(params, &deps).await {
                Ok(outcome) if outcome.processed > 0 => {
                    tracing::info!(
                        processed = outcome.processed,
                        notified = outcome.notified,
                        "Escalation scan processed overdue doses"
                    );
                }
                Ok(_) => {}
                Err(e) => tracing::error!(error = %e, "Escalation scan failed"),
            }
        })
    })?;

    scheduler.add(scan_job).await?;
    scheduler.start().await?;

    tracing::info!("Scheduled tasks started (escalation scan every 5 minutes)");
    Ok(scheduler)
}
