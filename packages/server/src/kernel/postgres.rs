//! sqlx-backed implementations of the infrastructure traits.
//!
//! Conditional updates carry their predicates in SQL and report affected rows,
//! so the domain layer can detect lost races without a transaction surface.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::domains::escalation::models::OverdueDose;
use crate::domains::pairing::models::{
    CapabilityGrants, InviteStatus, PairingInvite, Profile, ProfileMember,
};
use crate::domains::sharing::models::{
    AdherenceCounts, MedSchedule, Medication, Plan, ShareSession,
};
use crate::kernel::traits::{
    AuditEntry, BaseAuditLog, BaseNotificationDispatcher, BaseStore, NotificationKind,
    NotificationRecord,
};

pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct MedicationRow {
    id: Uuid,
    profile_id: Uuid,
    name: String,
    instructions_text: Option<String>,
    pill_photo_path: Option<String>,
    box_photo_path: Option<String>,
    visual_tags: Vec<String>,
}

#[derive(sqlx::FromRow)]
struct ScheduleRow {
    medication_id: Uuid,
    schedule_type: String,
    times_local: Vec<String>,
    days_of_week: Option<Vec<i16>>,
    every_x_hours: Option<i32>,
}

#[async_trait]
impl BaseStore for PostgresStore {
    async fn profile_by_id(&self, profile_id: Uuid) -> Result<Option<Profile>> {
        sqlx::query_as::<_, Profile>("SELECT * FROM profiles WHERE id = $1")
            .bind(profile_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(Into::into)
    }

    async fn link_profile(&self, profile_id: Uuid, patient_user_id: Uuid) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE profiles
             SET linked_user_id = $2, profile_type = 'LINKED'
             WHERE id = $1
               AND linked_user_id IS NULL",
        )
        .bind(profile_id)
        .bind(patient_user_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn unlink_profile(&self, profile_id: Uuid) -> Result<()> {
        sqlx::query(
            "UPDATE profiles
             SET linked_user_id = NULL, profile_type = 'MANAGED'
             WHERE id = $1",
        )
        .bind(profile_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn pending_invite_for_profile(
        &self,
        profile_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Option<PairingInvite>> {
        sqlx::query_as::<_, PairingInvite>(
            "SELECT * FROM pairing_invites
             WHERE profile_id = $1
               AND status = 'PENDING'
               AND expires_at > $2",
        )
        .bind(profile_id)
        .bind(now)
        .fetch_optional(&self.pool)
        .await
        .map_err(Into::into)
    }

    async fn insert_invite(&self, invite: &PairingInvite) -> Result<()> {
        sqlx::query(
            "INSERT INTO pairing_invites (
                id, profile_id, caregiver_user_id, patient_phone_e164,
                pair_code, link_url, status, expires_at, created_at
             )
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
        )
        .bind(invite.id)
        .bind(invite.profile_id)
        .bind(invite.caregiver_user_id)
        .bind(&invite.patient_phone_e164)
        .bind(&invite.pair_code)
        .bind(&invite.link_url)
        .bind(invite.status)
        .bind(invite.expires_at)
        .bind(invite.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn invite_by_code(&self, pair_code: &str) -> Result<Option<PairingInvite>> {
        sqlx::query_as::<_, PairingInvite>(
            "SELECT * FROM pairing_invites
             WHERE pair_code = $1
             ORDER BY created_at DESC
             LIMIT 1",
        )
        .bind(pair_code)
        .fetch_optional(&self.pool)
        .await
        .map_err(Into::into)
    }

    async fn set_invite_status(&self, invite_id: Uuid, status: InviteStatus) -> Result<()> {
        sqlx::query("UPDATE pairing_invites SET status = $2 WHERE id = $1")
            .bind(invite_id)
            .bind(status)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn member(&self, profile_id: Uuid, user_id: Uuid) -> Result<Option<ProfileMember>> {
        sqlx::query_as::<_, ProfileMember>(
            "SELECT * FROM profile_members
             WHERE profile_id = $1 AND member_user_id = $2",
        )
        .bind(profile_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Into::into)
    }

    async fn insert_member(&self, member: &ProfileMember) -> Result<()> {
        sqlx::query(
            "INSERT INTO profile_members (
                profile_id, member_user_id, role,
                can_add_edit_meds, can_view_log, notify_if_no_confirmation
             )
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(member.profile_id)
        .bind(member.member_user_id)
        .bind(member.role)
        .bind(member.can_add_edit_meds)
        .bind(member.can_view_log)
        .bind(member.notify_if_no_confirmation)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn update_member_grants(
        &self,
        profile_id: Uuid,
        user_id: Uuid,
        grants: &CapabilityGrants,
    ) -> Result<()> {
        sqlx::query(
            "UPDATE profile_members
             SET can_add_edit_meds = $3,
                 can_view_log = $4,
                 notify_if_no_confirmation = $5
             WHERE profile_id = $1 AND member_user_id = $2",
        )
        .bind(profile_id)
        .bind(user_id)
        .bind(grants.can_add_edit_meds)
        .bind(grants.can_view_log)
        .bind(grants.notify_if_no_confirmation)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn consenting_caregivers(&self, profile_id: Uuid) -> Result<Vec<Uuid>> {
        sqlx::query_scalar::<_, Uuid>(
            "SELECT member_user_id FROM profile_members
             WHERE profile_id = $1
               AND role = 'CAREGIVER'
               AND notify_if_no_confirmation = true",
        )
        .bind(profile_id)
        .fetch_all(&self.pool)
        .await
        .map_err(Into::into)
    }

    async fn user_plan(&self, user_id: Uuid) -> Result<Plan> {
        let plan = sqlx::query_scalar::<_, Plan>(
            "SELECT plan FROM subscriptions
             WHERE user_id = $1 AND status = 'ACTIVE'",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(plan.unwrap_or(Plan::Free))
    }

    async fn revoke_active_sessions(&self, profile_id: Uuid, now: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query(
            "UPDATE share_sessions
             SET revoked_at = $2
             WHERE profile_id = $1
               AND revoked_at IS NULL
               AND expires_at > $2",
        )
        .bind(profile_id)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    async fn insert_session(&self, session: &ShareSession) -> Result<()> {
        sqlx::query(
            "INSERT INTO share_sessions (
                id, profile_id, created_by_user_id, scope,
                token, expires_at, revoked_at, created_at
             )
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(session.id)
        .bind(session.profile_id)
        .bind(session.created_by_user_id)
        .bind(session.scope)
        .bind(&session.token)
        .bind(session.expires_at)
        .bind(session.revoked_at)
        .bind(session.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn session_by_token(&self, token: &str) -> Result<Option<ShareSession>> {
        sqlx::query_as::<_, ShareSession>("SELECT * FROM share_sessions WHERE token = $1")
            .bind(token)
            .fetch_optional(&self.pool)
            .await
            .map_err(Into::into)
    }

    async fn revoke_session(&self, session_id: Uuid, now: DateTime<Utc>) -> Result<()> {
        sqlx::query("UPDATE share_sessions SET revoked_at = $2 WHERE id = $1")
            .bind(session_id)
            .bind(now)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn active_medications(&self, profile_id: Uuid) -> Result<Vec<Medication>> {
        let rows = sqlx::query_as::<_, MedicationRow>(
            "SELECT id, profile_id, name, instructions_text,
                    pill_photo_path, box_photo_path, visual_tags
             FROM medications
             WHERE profile_id = $1 AND status = 'ACTIVE'
             ORDER BY name",
        )
        .bind(profile_id)
        .fetch_all(&self.pool)
        .await?;

        let ids: Vec<Uuid> = rows.iter().map(|m| m.id).collect();
        let schedules = sqlx::query_as::<_, ScheduleRow>(
            "SELECT medication_id, schedule_type, times_local, days_of_week, every_x_hours
             FROM med_schedules
             WHERE medication_id = ANY($1)",
        )
        .bind(&ids)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| Medication {
                schedules: schedules
                    .iter()
                    .filter(|s| s.medication_id == row.id)
                    .map(|s| MedSchedule {
                        schedule_type: s.schedule_type.clone(),
                        times_local: s.times_local.clone(),
                        days_of_week: s.days_of_week.clone(),
                        every_x_hours: s.every_x_hours,
                    })
                    .collect(),
                id: row.id,
                profile_id: row.profile_id,
                name: row.name,
                instructions_text: row.instructions_text,
                pill_photo_path: row.pill_photo_path,
                box_photo_path: row.box_photo_path,
                visual_tags: row.visual_tags,
            })
            .collect())
    }

    async fn adherence_counts_since(
        &self,
        profile_id: Uuid,
        since: DateTime<Utc>,
    ) -> Result<AdherenceCounts> {
        let (taken, skipped) = sqlx::query_as::<_, (i64, i64)>(
            "SELECT COUNT(*) FILTER (WHERE event_type = 'TAKEN'),
                    COUNT(*) FILTER (WHERE event_type = 'SKIP')
             FROM adherence_events
             WHERE profile_id = $1 AND timestamp_utc >= $2",
        )
        .bind(profile_id)
        .bind(since)
        .fetch_one(&self.pool)
        .await?;

        Ok(AdherenceCounts { taken, skipped })
    }

    async fn overdue_due_instances(
        &self,
        cutoff: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<OverdueDose>> {
        sqlx::query_as::<_, OverdueDose>(
            "SELECT di.id AS instance_id,
                    di.profile_id,
                    di.medication_id,
                    m.name AS medication_name,
                    p.display_name AS profile_name,
                    di.scheduled_time_utc,
                    di.scheduled_time_local
             FROM dose_instances di
             JOIN medications m ON m.id = di.medication_id
             JOIN profiles p ON p.id = di.profile_id
             WHERE di.status = 'DUE'
               AND di.scheduled_time_utc < $1
               AND p.profile_type = 'LINKED'
             ORDER BY di.scheduled_time_utc
             LIMIT $2",
        )
        .bind(cutoff)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(Into::into)
    }

    async fn claim_due_instance(&self, instance_id: Uuid, now: DateTime<Utc>) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE dose_instances
             SET status = 'MISSED', status_updated_at = $2
             WHERE id = $1
               AND status = 'DUE'",
        )
        .bind(instance_id)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }
}

// =============================================================================
// Audit log
// =============================================================================

pub struct PostgresAuditLog {
    pool: PgPool,
}

impl PostgresAuditLog {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl BaseAuditLog for PostgresAuditLog {
    async fn record(&self, entry: AuditEntry) -> Result<()> {
        let actor = serde_json::to_value(&entry.actor)?
            .as_str()
            .unwrap_or("system")
            .to_string();

        sqlx::query(
            "INSERT INTO audit_logs (actor, action, metadata, target_profile_id, ip_address)
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(actor)
        .bind(entry.action)
        .bind(entry.metadata)
        .bind(entry.target_profile_id)
        .bind(entry.source_ip.map(|ip| ip.to_string()))
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

// =============================================================================
// Notification dispatcher (in-app inbox rows; push delivery out of scope)
// =============================================================================

pub struct PostgresDispatcher {
    pool: PgPool,
}

impl PostgresDispatcher {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn kind_tag(kind: NotificationKind) -> &'static str {
    match kind {
        NotificationKind::InviteAccepted => "INVITE_ACCEPTED",
        NotificationKind::DoseMissed => "DOSE_MISSED",
    }
}

#[async_trait]
impl BaseNotificationDispatcher for PostgresDispatcher {
    async fn dispatch(&self, user_id: Uuid, notification: NotificationRecord) -> Result<()> {
        sqlx::query(
            "INSERT INTO in_app_notifications (user_id, type, title, body, data)
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(user_id)
        .bind(kind_tag(notification.kind))
        .bind(&notification.title)
        .bind(&notification.body)
        .bind(&notification.data)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
