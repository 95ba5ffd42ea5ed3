//! Escalation scan action
//!
//! Periodic sweep over LINKED profiles: any dose instance still DUE past its
//! scheduled time plus the grace period is marked MISSED and the consenting
//! caregivers are told. The status write happens BEFORE notification, as a
//! conditional claim, so two overlapping runs can never notify for the same
//! instance twice. A missed or failed notification is an accepted loss; a
//! double notification is not.

use chrono::Duration;
use serde_json::json;
use tracing::{error, info};

use crate::common::CoreError;
use crate::domains::escalation::models::{OverdueDose, ScanOutcome};
use crate::kernel::{
    AuditActor, AuditEntry, NotificationKind, NotificationRecord, ServerDeps,
};

pub const DEFAULT_GRACE_MINUTES: i64 = 60;
pub const DEFAULT_BATCH_LIMIT: i64 = 100;

#[derive(Debug, Clone, Copy)]
pub struct ScanParams {
    /// How long past the scheduled time a dose may stay DUE before escalating.
    pub grace: Duration,
    /// Maximum instances handled per run; a larger backlog drains over the
    /// following runs.
    pub batch_limit: i64,
}

impl Default for ScanParams {
    fn default() -> Self {
        Self {
            grace: Duration::minutes(DEFAULT_GRACE_MINUTES),
            batch_limit: DEFAULT_BATCH_LIMIT,
        }
    }
}

pub async fn scan(params: ScanParams, deps: &ServerDeps) -> Result<ScanOutcome, CoreError> {
    let now = deps.clock.now();
    let cutoff = now - params.grace;

    let overdue = deps
        .store
        .overdue_due_instances(cutoff, params.batch_limit)
        .await?;

    let mut outcome = ScanOutcome::default();
    for dose in &overdue {
        // Claim first. If the conditional update loses (late confirmation, or
        // a concurrent run), this instance is someone else's.
        if !deps.store.claim_due_instance(dose.instance_id, now).await? {
            continue;
        }
        outcome.processed += 1;

        // Per-instance isolation: a notification failure must not stall the
        // rest of the batch, and the MISSED status stands regardless.
        match notify_caregivers(dose, deps).await {
            Ok(n) => outcome.notified += n,
            Err(e) => error!(
                error = %e,
                instance_id = %dose.instance_id,
                "Failed to notify caregivers for missed dose"
            ),
        }
    }

    if outcome.processed > 0 {
        deps.record_audit(AuditEntry {
            actor: AuditActor::System,
            action: "ESCALATION_SENT",
            metadata: json!({
                "processed": outcome.processed,
                "notified": outcome.notified,
                "cutoff": cutoff,
            }),
            target_profile_id: None,
            source_ip: None,
        })
        .await;

        info!(
            processed = outcome.processed,
            notified = outcome.notified,
            "Escalated overdue doses"
        );
    }

    Ok(outcome)
}

/// Notify every consenting caregiver of one missed dose. Returns how many
/// notifications went out.
async fn notify_caregivers(dose: &OverdueDose, deps: &ServerDeps) -> anyhow::Result<u32> {
    let caregivers = deps.store.consenting_caregivers(dose.profile_id).await?;

    let mut sent = 0;
    for caregiver_id in caregivers {
        let notification = NotificationRecord {
            kind: NotificationKind::DoseMissed,
            title: "Missed dose".to_string(),
            body: format!(
                "{} did not confirm {} scheduled at {}",
                dose.profile_name, dose.medication_name, dose.scheduled_time_local
            ),
            data: json!({
                "profile_id": dose.profile_id,
                "medication_id": dose.medication_id,
                "instance_id": dose.instance_id,
                "action": "dose_missed",
            }),
        };
        match deps.dispatcher.dispatch(caregiver_id, notification).await {
            Ok(()) => sent += 1,
            Err(e) => error!(
                error = %e,
                caregiver_id = %caregiver_id,
                instance_id = %dose.instance_id,
                "Failed to dispatch missed-dose notification"
            ),
        }
    }
    Ok(sent)
}
