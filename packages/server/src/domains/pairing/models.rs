use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A tracked individual. MANAGED until a patient account is paired, then
/// LINKED permanently — there is no unlink path.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Profile {
    pub id: Uuid,
    pub owner_user_id: Uuid,
    pub display_name: String,
    pub profile_type: ProfileType,
    pub linked_user_id: Option<Uuid>,
    pub language_pref: String,
    pub timezone: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "profile_type", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProfileType {
    Managed,
    Linked,
}

/// One-time offer to link a profile to a patient account.
///
/// At most one PENDING unexpired invite exists per profile. Expiry is
/// re-validated at read time; the EXPIRED write is a lazy side effect of
/// detection, never a background sweep.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PairingInvite {
    pub id: Uuid,
    pub profile_id: Uuid,
    pub caregiver_user_id: Uuid,
    pub patient_phone_e164: String,
    pub pair_code: String,
    pub link_url: String,
    pub status: InviteStatus,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl PairingInvite {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at < now
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "invite_status", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InviteStatus {
    Pending,
    Accepted,
    Expired,
    Revoked,
}

/// A (profile, user) membership edge with capability grants.
///
/// Caregiver grants are set by patient consent at acceptance time, never by
/// the caregiver themselves.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ProfileMember {
    pub profile_id: Uuid,
    pub member_user_id: Uuid,
    pub role: MemberRole,
    pub can_add_edit_meds: bool,
    pub can_view_log: bool,
    pub notify_if_no_confirmation: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "member_role", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MemberRole {
    OwnerPatient,
    Caregiver,
}

/// The three independent capability grants on a membership edge.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CapabilityGrants {
    pub can_add_edit_meds: bool,
    pub can_view_log: bool,
    pub notify_if_no_confirmation: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn invite_expiry_is_a_pure_predicate() {
        let now = Utc::now();
        let invite = PairingInvite {
            id: Uuid::new_v4(),
            profile_id: Uuid::new_v4(),
            caregiver_user_id: Uuid::new_v4(),
            patient_phone_e164: "+966501234567".to_string(),
            pair_code: "482913".to_string(),
            link_url: "https://carelink.app/pair?code=482913".to_string(),
            status: InviteStatus::Pending,
            expires_at: now + Duration::hours(72),
            created_at: now,
        };

        assert!(!invite.is_expired(now));
        assert!(invite.is_expired(now + Duration::hours(73)));
    }

    #[test]
    fn enum_wire_format_is_screaming_snake() {
        assert_eq!(
            serde_json::to_string(&InviteStatus::Pending).unwrap(),
            "\"PENDING\""
        );
        assert_eq!(
            serde_json::to_string(&MemberRole::OwnerPatient).unwrap(),
            "\"OWNER_PATIENT\""
        );
    }
}
