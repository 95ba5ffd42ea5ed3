// Trait definitions for dependency injection
//
// These are INFRASTRUCTURE traits only - no business logic.
// Business logic (pairing, sharing, escalation) lives in domain actions that
// use these traits.
//
// Naming convention: Base* for trait names (e.g., BaseStore, BaseClock)

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::domains::escalation::models::OverdueDose;
use crate::domains::pairing::models::{
    CapabilityGrants, PairingInvite, Profile, ProfileMember,
};
use crate::domains::sharing::models::{AdherenceCounts, Medication, Plan, ShareSession};

// =============================================================================
// Entity Store Trait (Infrastructure - abstract transactional store)
// =============================================================================

/// The abstract entity store the three managers run against.
///
/// Point lookups by natural key, conditional updates, and inserts with
/// uniqueness. No multi-entity transaction surface is assumed: every
/// multi-step flow in the domain layer is a sequence of these calls, with
/// compensation where a partial result would be worse than none.
#[async_trait]
pub trait BaseStore: Send + Sync {
    // -- profiles --------------------------------------------------------

    async fn profile_by_id(&self, profile_id: Uuid) -> Result<Option<Profile>>;

    /// Conditionally link a patient account to a profile. Succeeds only while
    /// the profile is unlinked; returns false if the condition did not hold.
    async fn link_profile(&self, profile_id: Uuid, patient_user_id: Uuid) -> Result<bool>;

    /// Revert a link (compensation for a failed pairing acceptance).
    async fn unlink_profile(&self, profile_id: Uuid) -> Result<()>;

    // -- pairing invites -------------------------------------------------

    /// The at-most-one PENDING, unexpired invite for a profile.
    async fn pending_invite_for_profile(
        &self,
        profile_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Option<PairingInvite>>;

    /// Insert a new invite. The pair code must be unique among PENDING
    /// invites; a collision is a storage error.
    async fn insert_invite(&self, invite: &PairingInvite) -> Result<()>;

    async fn invite_by_code(&self, pair_code: &str) -> Result<Option<PairingInvite>>;

    async fn set_invite_status(
        &self,
        invite_id: Uuid,
        status: crate::domains::pairing::models::InviteStatus,
    ) -> Result<()>;

    // -- profile members -------------------------------------------------

    async fn member(&self, profile_id: Uuid, user_id: Uuid) -> Result<Option<ProfileMember>>;

    async fn insert_member(&self, member: &ProfileMember) -> Result<()>;

    async fn update_member_grants(
        &self,
        profile_id: Uuid,
        user_id: Uuid,
        grants: &CapabilityGrants,
    ) -> Result<()>;

    /// Caregiver members that opted into no-confirmation notifications.
    async fn consenting_caregivers(&self, profile_id: Uuid) -> Result<Vec<Uuid>>;

    // -- subscriptions ---------------------------------------------------

    /// Active subscription plan for a user; FREE when none exists.
    async fn user_plan(&self, user_id: Uuid) -> Result<Plan>;

    // -- share sessions --------------------------------------------------

    /// Revoke every active (unrevoked, unexpired) session for a profile.
    /// Returns the number of sessions revoked.
    async fn revoke_active_sessions(&self, profile_id: Uuid, now: DateTime<Utc>) -> Result<u64>;

    async fn insert_session(&self, session: &ShareSession) -> Result<()>;

    async fn session_by_token(&self, token: &str) -> Result<Option<ShareSession>>;

    async fn revoke_session(&self, session_id: Uuid, now: DateTime<Utc>) -> Result<()>;

    // -- medications and adherence (share payload reads) -----------------

    async fn active_medications(&self, profile_id: Uuid) -> Result<Vec<Medication>>;

    /// TAKEN/SKIP tallies for events at or after `since`.
    async fn adherence_counts_since(
        &self,
        profile_id: Uuid,
        since: DateTime<Utc>,
    ) -> Result<AdherenceCounts>;

    // -- dose instances --------------------------------------------------

    /// DUE instances scheduled before `cutoff` on LINKED profiles, bounded to
    /// `limit` rows so large backlogs drain across scan cycles.
    async fn overdue_due_instances(
        &self,
        cutoff: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<OverdueDose>>;

    /// Claim an overdue instance with a conditional DUE → MISSED update.
    /// Returns false if the instance was no longer DUE (another scan run, or
    /// a late confirmation, got there first).
    async fn claim_due_instance(&self, instance_id: Uuid, now: DateTime<Utc>) -> Result<bool>;
}

// =============================================================================
// Audit Log Trait (Infrastructure)
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuditActor {
    User(Uuid),
    System,
}

impl Serialize for AuditActor {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            AuditActor::User(id) => serializer.serialize_str(&id.to_string()),
            AuditActor::System => serializer.serialize_str("system"),
        }
    }
}

/// One audit row, written as a side effect of every state-changing operation.
#[derive(Debug, Clone, Serialize)]
pub struct AuditEntry {
    pub actor: AuditActor,
    pub action: &'static str,
    pub metadata: serde_json::Value,
    pub target_profile_id: Option<Uuid>,
    pub source_ip: Option<std::net::IpAddr>,
}

#[async_trait]
pub trait BaseAuditLog: Send + Sync {
    async fn record(&self, entry: AuditEntry) -> Result<()>;
}

// =============================================================================
// Notification Dispatcher Trait (Infrastructure)
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationKind {
    InviteAccepted,
    DoseMissed,
}

/// A notification to be delivered to one user. Delivery mechanics
/// (in-app inbox, push, SMS) are behind the dispatcher.
#[derive(Debug, Clone, Serialize)]
pub struct NotificationRecord {
    pub kind: NotificationKind,
    pub title: String,
    pub body: String,
    pub data: serde_json::Value,
}

#[async_trait]
pub trait BaseNotificationDispatcher: Send + Sync {
    /// Deliver one notification to one user.
    async fn dispatch(&self, user_id: Uuid, notification: NotificationRecord) -> Result<()>;

    /// Deliver a batch; the default loops over `dispatch`.
    async fn dispatch_batch(
        &self,
        notifications: Vec<(Uuid, NotificationRecord)>,
    ) -> Result<()> {
        for (user_id, notification) in notifications {
            self.dispatch(user_id, notification).await?;
        }
        Ok(())
    }
}

// =============================================================================
// Media Store Trait (Infrastructure - signed URLs for photo blobs)
// =============================================================================

#[async_trait]
pub trait BaseMediaStore: Send + Sync {
    /// Produce a time-limited signed URL for a stored object.
    async fn signed_url(&self, path: &str, ttl: Duration) -> Result<String>;
}

// =============================================================================
// Clock Trait (Infrastructure)
// =============================================================================

pub trait BaseClock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

pub struct SystemClock;

impl BaseClock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

// =============================================================================
// Token Source Trait (Infrastructure - unguessable codes and tokens)
// =============================================================================

pub trait BaseTokenSource: Send + Sync {
    /// 6-digit human-entry pairing code.
    fn pair_code(&self) -> String;

    /// High-entropy bearer token: 32 random bytes, hex-encoded. Never derived
    /// from any entity id.
    fn share_token(&self) -> String;
}
