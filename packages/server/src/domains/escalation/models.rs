use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle of one scheduled occurrence of a medication. TAKEN/SKIPPED are
/// written by the confirmation flow; the scanner owns only DUE → MISSED.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "dose_status", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DoseStatus {
    Due,
    Taken,
    Skipped,
    Missed,
}

/// An overdue DUE instance on a LINKED profile, as selected by the scan.
/// Carries the joined display fields the notification needs.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct OverdueDose {
    pub instance_id: Uuid,
    pub profile_id: Uuid,
    pub medication_id: Uuid,
    pub medication_name: String,
    pub profile_name: String,
    pub scheduled_time_utc: DateTime<Utc>,
    pub scheduled_time_local: String,
}

/// Summary of one scan run.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct ScanOutcome {
    pub processed: u32,
    pub notified: u32,
}
