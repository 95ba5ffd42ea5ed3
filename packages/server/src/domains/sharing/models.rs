use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Scoped, anonymous, time-limited read grant. The token is the sole
/// credential.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ShareSession {
    pub id: Uuid,
    pub profile_id: Uuid,
    pub created_by_user_id: Uuid,
    pub scope: ShareScope,
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub revoked_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl ShareSession {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at < now
    }

    /// Validity is a pure function of `now`; expiry is never written back.
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        self.revoked_at.is_none() && !self.is_expired(now)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "share_scope", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ShareScope {
    MedsOnly,
    MedsAndLog,
}

/// Subscription tier gating the share feature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "subscription_plan", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Plan {
    Free,
    Pro,
}

/// Active medication as exposed on the share surface (read-only here; the
/// medication CRUD flow lives outside this core).
#[derive(Debug, Clone)]
pub struct Medication {
    pub id: Uuid,
    pub profile_id: Uuid,
    pub name: String,
    pub instructions_text: Option<String>,
    pub pill_photo_path: Option<String>,
    pub box_photo_path: Option<String>,
    pub visual_tags: Vec<String>,
    pub schedules: Vec<MedSchedule>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MedSchedule {
    pub schedule_type: String,
    pub times_local: Vec<String>,
    pub days_of_week: Option<Vec<i16>>,
    pub every_x_hours: Option<i32>,
}

/// TAKEN/SKIP tallies for a trailing window. Missed-dose detail is
/// deliberately absent from the anonymous surface.
#[derive(Debug, Clone, Copy, Default)]
pub struct AdherenceCounts {
    pub taken: i64,
    pub skipped: i64,
}

// ---------------------------------------------------------------------------
// Share payload (response types for the anonymous viewer)
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub struct SharePayload {
    pub profile_name: String,
    pub timezone: String,
    pub language: String,
    pub medications: Vec<SharedMedication>,
    pub medication_count: usize,
    pub generated_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub adherence_summary: Option<AdherenceSummary>,
    pub disclaimer: &'static str,
}

#[derive(Debug, Serialize)]
pub struct SharedMedication {
    pub id: Uuid,
    pub name: String,
    pub instructions_text: Option<String>,
    pub pill_photo_url: Option<String>,
    pub box_photo_url: Option<String>,
    pub visual_tags: Vec<String>,
    pub schedules: Vec<ScheduleDescriptor>,
}

#[derive(Debug, Serialize)]
pub struct ScheduleDescriptor {
    #[serde(rename = "type")]
    pub schedule_type: String,
    pub times: Vec<String>,
    pub days_of_week: Option<Vec<i16>>,
    pub every_x_hours: Option<i32>,
}

#[derive(Debug, Serialize)]
pub struct AdherenceSummary {
    pub last_7_days: AdherenceWindow,
    pub last_30_days: AdherenceWindow,
}

/// Aggregate counts only: no per-event timestamps, no missed counts.
#[derive(Debug, Serialize)]
pub struct AdherenceWindow {
    pub total_doses: i64,
    pub taken_count: i64,
    pub skipped_count: i64,
    pub adherence_rate: i64,
}

impl AdherenceWindow {
    pub fn from_counts(counts: AdherenceCounts) -> Self {
        let total = counts.taken + counts.skipped;
        let rate = if total > 0 {
            (counts.taken * 100 + total / 2) / total
        } else {
            0
        };
        Self {
            total_doses: total,
            taken_count: counts.taken,
            skipped_count: counts.skipped,
            adherence_rate: rate,
        }
    }
}

pub const SHARE_DISCLAIMER: &str = "This app is for reminders and tracking only and does not \
provide medical advice. Always follow your clinician's instructions.";

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn session(expires_in: Duration, revoked: bool) -> ShareSession {
        let now = Utc::now();
        ShareSession {
            id: Uuid::new_v4(),
            profile_id: Uuid::new_v4(),
            created_by_user_id: Uuid::new_v4(),
            scope: ShareScope::MedsOnly,
            token: "a".repeat(64),
            expires_at: now + expires_in,
            revoked_at: revoked.then_some(now),
            created_at: now,
        }
    }

    #[test]
    fn active_requires_unrevoked_and_unexpired() {
        let now = Utc::now();
        assert!(session(Duration::minutes(15), false).is_active(now));
        assert!(!session(Duration::minutes(15), true).is_active(now));
        assert!(!session(Duration::minutes(-1), false).is_active(now));
    }

    #[test]
    fn adherence_rate_rounds_to_nearest_percent() {
        let window = AdherenceWindow::from_counts(AdherenceCounts { taken: 2, skipped: 1 });
        assert_eq!(window.total_doses, 3);
        assert_eq!(window.adherence_rate, 67);

        let empty = AdherenceWindow::from_counts(AdherenceCounts::default());
        assert_eq!(empty.adherence_rate, 0);
    }
}
