// TestDependencies - mock implementations for testing
//
// Provides an in-memory store plus mock collaborators that can be injected
// into ServerDeps for tests. The MemoryStore honors the same conditional-
// update contracts as the Postgres implementation, so the domain flows can be
// exercised end to end without a database.

use anyhow::{bail, Result};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

use crate::common::rate_limit::BaseRateLimiter;
use crate::domains::escalation::models::{DoseStatus, OverdueDose};
use crate::domains::pairing::models::{
    CapabilityGrants, InviteStatus, MemberRole, PairingInvite, Profile, ProfileMember, ProfileType,
};
use crate::domains::sharing::models::{AdherenceCounts, Medication, Plan, ShareSession};
use crate::kernel::traits::{
    AuditEntry, BaseAuditLog, BaseClock, BaseMediaStore, BaseNotificationDispatcher, BaseStore,
    BaseTokenSource, NotificationRecord,
};
use crate::kernel::ServerDeps;

// =============================================================================
// Memory Store
// =============================================================================

#[derive(Debug, Clone)]
struct DoseRecord {
    instance_id: Uuid,
    profile_id: Uuid,
    medication_id: Uuid,
    scheduled_time_utc: DateTime<Utc>,
    status: DoseStatus,
}

#[derive(Debug, Clone, Copy)]
struct AdherenceEvent {
    profile_id: Uuid,
    taken: bool,
    at: DateTime<Utc>,
}

#[derive(Default)]
pub struct MemoryStore {
    profiles: Mutex<HashMap<Uuid, Profile>>,
    invites: Mutex<Vec<PairingInvite>>,
    members: Mutex<Vec<ProfileMember>>,
    plans: Mutex<HashMap<Uuid, Plan>>,
    sessions: Mutex<Vec<ShareSession>>,
    medications: Mutex<Vec<Medication>>,
    adherence: Mutex<Vec<AdherenceEvent>>,
    doses: Mutex<Vec<DoseRecord>>,
    fail_next_insert_member: Mutex<bool>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    // -- seed helpers ----------------------------------------------------

    pub fn add_profile(&self, profile: Profile) {
        self.profiles.lock().unwrap().insert(profile.id, profile);
    }

    pub fn add_member(&self, member: ProfileMember) {
        self.members.lock().unwrap().push(member);
    }

    pub fn set_plan(&self, user_id: Uuid, plan: Plan) {
        self.plans.lock().unwrap().insert(user_id, plan);
    }

    pub fn add_medication(&self, medication: Medication) {
        self.medications.lock().unwrap().push(medication);
    }

    pub fn add_adherence_event(&self, profile_id: Uuid, taken: bool, at: DateTime<Utc>) {
        self.adherence.lock().unwrap().push(AdherenceEvent {
            profile_id,
            taken,
            at,
        });
    }

    /// Seed a DUE dose instance; returns its id.
    pub fn add_dose(
        &self,
        profile_id: Uuid,
        medication_id: Uuid,
        scheduled_time_utc: DateTime<Utc>,
    ) -> Uuid {
        let instance_id = Uuid::new_v4();
        self.doses.lock().unwrap().push(DoseRecord {
            instance_id,
            profile_id,
            medication_id,
            scheduled_time_utc,
            status: DoseStatus::Due,
        });
        instance_id
    }

    pub fn set_dose_status(&self, instance_id: Uuid, status: DoseStatus) {
        let mut doses = self.doses.lock().unwrap();
        if let Some(dose) = doses.iter_mut().find(|d| d.instance_id == instance_id) {
            dose.status = status;
        }
    }

    /// Fail the next `insert_member` call (pairing rollback tests).
    pub fn fail_next_insert_member(&self) {
        *self.fail_next_insert_member.lock().unwrap() = true;
    }

    // -- inspection ------------------------------------------------------

    pub fn invites(&self) -> Vec<PairingInvite> {
        self.invites.lock().unwrap().clone()
    }

    pub fn sessions(&self) -> Vec<ShareSession> {
        self.sessions.lock().unwrap().clone()
    }

    pub fn members(&self) -> Vec<ProfileMember> {
        self.members.lock().unwrap().clone()
    }

    pub fn profile(&self, profile_id: Uuid) -> Option<Profile> {
        self.profiles.lock().unwrap().get(&profile_id).cloned()
    }

    pub fn dose_status(&self, instance_id: Uuid) -> Option<DoseStatus> {
        self.doses
            .lock()
            .unwrap()
            .iter()
            .find(|d| d.instance_id == instance_id)
            .map(|d| d.status)
    }
}

#[async_trait]
impl BaseStore for MemoryStore {
    async fn profile_by_id(&self, profile_id: Uuid) -> Result<Option<Profile>> {
        Ok(self.profiles.lock().unwrap().get(&profile_id).cloned())
    }

    async fn link_profile(&self, profile_id: Uuid, patient_user_id: Uuid) -> Result<bool> {
        let mut profiles = self.profiles.lock().unwrap();
        match profiles.get_mut(&profile_id) {
            Some(profile) if profile.linked_user_id.is_none() => {
                profile.linked_user_id = Some(patient_user_id);
                profile.profile_type = ProfileType::Linked;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn unlink_profile(&self, profile_id: Uuid) -> Result<()> {
        let mut profiles = self.profiles.lock().unwrap();
        if let Some(profile) = profiles.get_mut(&profile_id) {
            profile.linked_user_id = None;
            profile.profile_type = ProfileType::Managed;
        }
        Ok(())
    }

    async fn pending_invite_for_profile(
        &self,
        profile_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Option<PairingInvite>> {
        Ok(self
            .invites
            .lock()
            .unwrap()
            .iter()
            .find(|i| {
                i.profile_id == profile_id
                    && i.status == InviteStatus::Pending
                    && !i.is_expired(now)
            })
            .cloned())
    }

    async fn insert_invite(&self, invite: &PairingInvite) -> Result<()> {
        let mut invites = self.invites.lock().unwrap();
        if invites
            .iter()
            .any(|i| i.pair_code == invite.pair_code && i.status == InviteStatus::Pending)
        {
            bail!("duplicate pending pair code");
        }
        invites.push(invite.clone());
        Ok(())
    }

    async fn invite_by_code(&self, pair_code: &str) -> Result<Option<PairingInvite>> {
        Ok(self
            .invites
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|i| i.pair_code == pair_code)
            .cloned())
    }

    async fn set_invite_status(&self, invite_id: Uuid, status: InviteStatus) -> Result<()> {
        let mut invites = self.invites.lock().unwrap();
        if let Some(invite) = invites.iter_mut().find(|i| i.id == invite_id) {
            invite.status = status;
        }
        Ok(())
    }

    async fn member(&self, profile_id: Uuid, user_id: Uuid) -> Result<Option<ProfileMember>> {
        Ok(self
            .members
            .lock()
            .unwrap()
            .iter()
            .find(|m| m.profile_id == profile_id && m.member_user_id == user_id)
            .cloned())
    }

    async fn insert_member(&self, member: &ProfileMember) -> Result<()> {
        {
            let mut fail = self.fail_next_insert_member.lock().unwrap();
            if *fail {
                *fail = false;
                bail!("injected membership insert failure");
            }
        }
        let mut members = self.members.lock().unwrap();
        if members
            .iter()
            .any(|m| m.profile_id == member.profile_id && m.member_user_id == member.member_user_id)
        {
            bail!("duplicate membership");
        }
        members.push(member.clone());
        Ok(())
    }

    async fn update_member_grants(
        &self,
        profile_id: Uuid,
        user_id: Uuid,
        grants: &CapabilityGrants,
    ) -> Result<()> {
        let mut members = self.members.lock().unwrap();
        if let Some(member) = members
            .iter_mut()
            .find(|m| m.profile_id == profile_id && m.member_user_id == user_id)
        {
            member.can_add_edit_meds = grants.can_add_edit_meds;
            member.can_view_log = grants.can_view_log;
            member.notify_if_no_confirmation = grants.notify_if_no_confirmation;
        }
        Ok(())
    }

    async fn consenting_caregivers(&self, profile_id: Uuid) -> Result<Vec<Uuid>> {
        Ok(self
            .members
            .lock()
            .unwrap()
            .iter()
            .filter(|m| {
                m.profile_id == profile_id
                    && m.role == MemberRole::Caregiver
                    && m.notify_if_no_confirmation
            })
            .map(|m| m.member_user_id)
            .collect())
    }

    async fn user_plan(&self, user_id: Uuid) -> Result<Plan> {
        Ok(self
            .plans
            .lock()
            .unwrap()
            .get(&user_id)
            .copied()
            .unwrap_or(Plan::Free))
    }

    async fn revoke_active_sessions(&self, profile_id: Uuid, now: DateTime<Utc>) -> Result<u64> {
        let mut sessions = self.sessions.lock().unwrap();
        let mut revoked = 0;
        for session in sessions
            .iter_mut()
            .filter(|s| s.profile_id == profile_id && s.is_active(now))
        {
            session.revoked_at = Some(now);
            revoked += 1;
        }
        Ok(revoked)
    }

    async fn insert_session(&self, session: &ShareSession) -> Result<()> {
        self.sessions.lock().unwrap().push(session.clone());
        Ok(())
    }

    async fn session_by_token(&self, token: &str) -> Result<Option<ShareSession>> {
        Ok(self
            .sessions
            .lock()
            .unwrap()
            .iter()
            .find(|s| s.token == token)
            .cloned())
    }

    async fn revoke_session(&self, session_id: Uuid, now: DateTime<Utc>) -> Result<()> {
        let mut sessions = self.sessions.lock().unwrap();
        if let Some(session) = sessions.iter_mut().find(|s| s.id == session_id) {
            session.revoked_at = Some(now);
        }
        Ok(())
    }

    async fn active_medications(&self, profile_id: Uuid) -> Result<Vec<Medication>> {
        Ok(self
            .medications
            .lock()
            .unwrap()
            .iter()
            .filter(|m| m.profile_id == profile_id)
            .cloned()
            .collect())
    }

    async fn adherence_counts_since(
        &self,
        profile_id: Uuid,
        since: DateTime<Utc>,
    ) -> Result<AdherenceCounts> {
        let mut counts = AdherenceCounts::default();
        for event in self
            .adherence
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.profile_id == profile_id && e.at >= since)
        {
            if event.taken {
                counts.taken += 1;
            } else {
                counts.skipped += 1;
            }
        }
        Ok(counts)
    }

    async fn overdue_due_instances(
        &self,
        cutoff: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<OverdueDose>> {
        let profiles = self.profiles.lock().unwrap();
        let medications = self.medications.lock().unwrap();
        let mut overdue: Vec<&DoseRecord> = Vec::new();
        let doses = self.doses.lock().unwrap();
        for dose in doses.iter() {
            if dose.status != DoseStatus::Due || dose.scheduled_time_utc >= cutoff {
                continue;
            }
            let linked = profiles
                .get(&dose.profile_id)
                .map(|p| p.profile_type == ProfileType::Linked)
                .unwrap_or(false);
            if linked {
                overdue.push(dose);
            }
        }
        overdue.sort_by_key(|d| d.scheduled_time_utc);
        overdue.truncate(limit as usize);

        Ok(overdue
            .into_iter()
            .map(|dose| OverdueDose {
                instance_id: dose.instance_id,
                profile_id: dose.profile_id,
                medication_id: dose.medication_id,
                medication_name: medications
                    .iter()
                    .find(|m| m.id == dose.medication_id)
                    .map(|m| m.name.clone())
                    .unwrap_or_else(|| "Unknown medication".to_string()),
                profile_name: profiles
                    .get(&dose.profile_id)
                    .map(|p| p.display_name.clone())
                    .unwrap_or_else(|| "Unknown profile".to_string()),
                scheduled_time_utc: dose.scheduled_time_utc,
                scheduled_time_local: dose.scheduled_time_utc.format("%H:%M").to_string(),
            })
            .collect())
    }

    async fn claim_due_instance(&self, instance_id: Uuid, _now: DateTime<Utc>) -> Result<bool> {
        let mut doses = self.doses.lock().unwrap();
        match doses.iter_mut().find(|d| d.instance_id == instance_id) {
            Some(dose) if dose.status == DoseStatus::Due => {
                dose.status = DoseStatus::Missed;
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

// =============================================================================
// Mock Audit Log
// =============================================================================

#[derive(Default)]
pub struct MemoryAuditLog {
    entries: Mutex<Vec<AuditEntry>>,
    fail_next: Mutex<bool>,
}

impl MemoryAuditLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<AuditEntry> {
        self.entries.lock().unwrap().clone()
    }

    pub fn actions(&self) -> Vec<&'static str> {
        self.entries.lock().unwrap().iter().map(|e| e.action).collect()
    }

    pub fn fail_next(&self) {
        *self.fail_next.lock().unwrap() = true;
    }
}

#[async_trait]
impl BaseAuditLog for MemoryAuditLog {
    async fn record(&self, entry: AuditEntry) -> Result<()> {
        {
            let mut fail = self.fail_next.lock().unwrap();
            if *fail {
                *fail = false;
                bail!("injected audit failure");
            }
        }
        self.entries.lock().unwrap().push(entry);
        Ok(())
    }
}

// =============================================================================
// Mock Notification Dispatcher
// =============================================================================

#[derive(Default)]
pub struct MockDispatcher {
    sent: Mutex<Vec<(Uuid, NotificationRecord)>>,
    fail_next: Mutex<bool>,
}

impl MockDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<(Uuid, NotificationRecord)> {
        self.sent.lock().unwrap().clone()
    }

    pub fn fail_next(&self) {
        *self.fail_next.lock().unwrap() = true;
    }
}

#[async_trait]
impl BaseNotificationDispatcher for MockDispatcher {
    async fn dispatch(&self, user_id: Uuid, notification: NotificationRecord) -> Result<()> {
        {
            let mut fail = self.fail_next.lock().unwrap();
            if *fail {
                *fail = false;
                bail!("injected dispatch failure");
            }
        }
        self.sent.lock().unwrap().push((user_id, notification));
        Ok(())
    }
}

// =============================================================================
// Mock Media Store
// =============================================================================

#[derive(Default)]
pub struct MockMediaStore {
    signed_paths: Mutex<Vec<String>>,
}

impl MockMediaStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn signed_paths(&self) -> Vec<String> {
        self.signed_paths.lock().unwrap().clone()
    }
}

#[async_trait]
impl BaseMediaStore for MockMediaStore {
    async fn signed_url(&self, path: &str, ttl: Duration) -> Result<String> {
        self.signed_paths.lock().unwrap().push(path.to_string());
        Ok(format!(
            "https://media.test/{}?exp={}&sig=mock",
            path,
            ttl.num_seconds()
        ))
    }
}

// =============================================================================
// Mock Clock
// =============================================================================

pub struct MockClock {
    now: Mutex<DateTime<Utc>>,
}

impl MockClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.lock().unwrap() = now;
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap();
        *now = *now + by;
    }
}

impl BaseClock for MockClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }
}

// =============================================================================
// Mock Token Source
// =============================================================================

/// Deterministic tokens: queued values are handed out first, then a counter
/// keeps generating unique fallbacks.
#[derive(Default)]
pub struct MockTokenSource {
    pair_codes: Mutex<VecDeque<String>>,
    share_tokens: Mutex<VecDeque<String>>,
    counter: AtomicU64,
}

impl MockTokenSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_pair_code(self, code: &str) -> Self {
        self.pair_codes.lock().unwrap().push_back(code.to_string());
        self
    }

    pub fn with_share_token(self, token: &str) -> Self {
        self.share_tokens
            .lock()
            .unwrap()
            .push_back(token.to_string());
        self
    }
}

impl BaseTokenSource for MockTokenSource {
    fn pair_code(&self) -> String {
        if let Some(code) = self.pair_codes.lock().unwrap().pop_front() {
            return code;
        }
        format!("{:06}", self.counter.fetch_add(1, Ordering::Relaxed) % 1_000_000)
    }

    fn share_token(&self) -> String {
        if let Some(token) = self.share_tokens.lock().unwrap().pop_front() {
            return token;
        }
        format!("{:064x}", self.counter.fetch_add(1, Ordering::Relaxed))
    }
}

// =============================================================================
// Mock Rate Limiter
// =============================================================================

/// Allows everything until told to deny; records every key checked.
pub struct MockRateLimiter {
    allow: Mutex<bool>,
    keys: Mutex<Vec<String>>,
}

impl MockRateLimiter {
    pub fn new() -> Self {
        Self {
            allow: Mutex::new(true),
            keys: Mutex::new(Vec::new()),
        }
    }

    pub fn deny(&self) {
        *self.allow.lock().unwrap() = false;
    }

    pub fn keys(&self) -> Vec<String> {
        self.keys.lock().unwrap().clone()
    }
}

impl Default for MockRateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

impl BaseRateLimiter for MockRateLimiter {
    fn check(&self, key: &str, _max_requests: u32, _window: std::time::Duration) -> bool {
        self.keys.lock().unwrap().push(key.to_string());
        *self.allow.lock().unwrap()
    }
}

// =============================================================================
// Test Dependencies
// =============================================================================

/// Bundle of mock collaborators plus a `deps()` view for handing to actions.
/// Keep the bundle around to inspect state after the action runs.
pub struct TestDependencies {
    pub store: Arc<MemoryStore>,
    pub audit_log: Arc<MemoryAuditLog>,
    pub dispatcher: Arc<MockDispatcher>,
    pub media: Arc<MockMediaStore>,
    pub clock: Arc<MockClock>,
    pub tokens: Arc<MockTokenSource>,
    pub rate_limiter: Arc<MockRateLimiter>,
}

impl TestDependencies {
    pub fn new() -> Self {
        Self {
            store: Arc::new(MemoryStore::new()),
            audit_log: Arc::new(MemoryAuditLog::new()),
            dispatcher: Arc::new(MockDispatcher::new()),
            media: Arc::new(MockMediaStore::new()),
            clock: Arc::new(MockClock::new(Utc::now())),
            tokens: Arc::new(MockTokenSource::new()),
            rate_limiter: Arc::new(MockRateLimiter::new()),
        }
    }

    pub fn with_tokens(mut self, tokens: MockTokenSource) -> Self {
        self.tokens = Arc::new(tokens);
        self
    }

    pub fn deps(&self) -> ServerDeps {
        ServerDeps::new(
            self.store.clone(),
            self.audit_log.clone(),
            self.dispatcher.clone(),
            self.media.clone(),
            self.clock.clone(),
            self.tokens.clone(),
            self.rate_limiter.clone(),
            "https://carelink.test".to_string(),
        )
    }
}

impl Default for TestDependencies {
    fn default() -> Self {
        Self::new()
    }
}
