//! Accept pairing invite action
//!
//! The patient redeems a 6-digit code to link their account to the profile.
//! Applied as an ordered sequence of compensating steps: no multi-entity
//! transaction is assumed, and the one explicit rollback in the system lives
//! here (unlink on membership-insert failure).

use serde::{Deserialize, Serialize};
use serde_json::json;
use std::net::IpAddr;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::common::CoreError;
use crate::domains::pairing::models::{
    CapabilityGrants, InviteStatus, MemberRole, ProfileMember,
};
use crate::kernel::{
    AuditActor, AuditEntry, NotificationKind, NotificationRecord, ServerDeps,
};

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct ConsentGrants {
    pub caregiver_can_add_edit_meds: bool,
    pub caregiver_can_view_log: bool,
    pub caregiver_notify_if_no_confirmation: bool,
}

impl From<ConsentGrants> for CapabilityGrants {
    fn from(consent: ConsentGrants) -> Self {
        Self {
            can_add_edit_meds: consent.caregiver_can_add_edit_meds,
            can_view_log: consent.caregiver_can_view_log,
            notify_if_no_confirmation: consent.caregiver_notify_if_no_confirmation,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct AcceptInviteRequest {
    pub pair_code: String,
    pub consent: ConsentGrants,
}

#[derive(Debug, Serialize)]
pub struct AcceptInviteResponse {
    pub profile_id: Uuid,
    pub profile_name: String,
}

pub async fn accept_invite(
    req: AcceptInviteRequest,
    patient_id: Uuid,
    source_ip: Option<IpAddr>,
    deps: &ServerDeps,
) -> Result<AcceptInviteResponse, CoreError> {
    if req.pair_code.len() != 6 || !req.pair_code.chars().all(|c| c.is_ascii_digit()) {
        return Err(CoreError::invalid_input("Valid 6-digit pair_code is required"));
    }

    let invite = deps
        .store
        .invite_by_code(&req.pair_code)
        .await?
        .ok_or(CoreError::NotFound("Pair code"))?;

    if invite.status != InviteStatus::Pending {
        return Err(CoreError::InviteNotPending);
    }

    let now = deps.clock.now();
    if invite.is_expired(now) {
        // Lazy expiry: the terminal write is a side effect of detection,
        // not a background sweep.
        deps.store
            .set_invite_status(invite.id, InviteStatus::Expired)
            .await?;
        return Err(CoreError::InviteExpired);
    }

    if patient_id == invite.caregiver_user_id {
        return Err(CoreError::PatientIsCaregiver);
    }

    let profile = deps
        .store
        .profile_by_id(invite.profile_id)
        .await?
        .ok_or(CoreError::NotFound("Profile"))?;

    if profile.linked_user_id.is_some() {
        return Err(CoreError::ProfileAlreadyLinked);
    }

    // Step 1: link the profile. Conditional on being unlinked, so a racing
    // accept against a second invite surfaces here instead of corrupting the
    // link.
    if !deps.store.link_profile(invite.profile_id, patient_id).await? {
        return Err(CoreError::ProfileAlreadyLinked);
    }

    // Step 2: insert the patient membership. Partial pairing (linked profile
    // without a patient member) is worse than no pairing, so failure reverts
    // step 1.
    let patient_member = ProfileMember {
        profile_id: invite.profile_id,
        member_user_id: patient_id,
        role: MemberRole::OwnerPatient,
        can_add_edit_meds: true,
        can_view_log: true,
        notify_if_no_confirmation: false,
    };
    if let Err(e) = deps.store.insert_member(&patient_member).await {
        error!(
            error = %e,
            profile_id = %invite.profile_id,
            "Failed to insert patient membership, reverting profile link"
        );
        if let Err(revert) = deps.store.unlink_profile(invite.profile_id).await {
            error!(
                error = %revert,
                profile_id = %invite.profile_id,
                "Rollback of profile link failed"
            );
        }
        return Err(CoreError::Storage(e));
    }

    // Step 3: apply patient consent to the caregiver's grants. Best-effort:
    // the pairing matters more than the precise grant values, which the
    // patient can adjust later.
    let grants = CapabilityGrants::from(req.consent);
    if let Err(e) = deps
        .store
        .update_member_grants(invite.profile_id, invite.caregiver_user_id, &grants)
        .await
    {
        warn!(error = %e, profile_id = %invite.profile_id, "Failed to apply caregiver consent grants");
    }

    // Step 4: invite to its terminal state. Past the point of no return; a
    // stuck-PENDING invite on a linked profile is inert because acceptance
    // re-checks the link.
    if let Err(e) = deps
        .store
        .set_invite_status(invite.id, InviteStatus::Accepted)
        .await
    {
        warn!(error = %e, invite_id = %invite.id, "Failed to mark invite accepted");
    }

    // Step 5: tell the caregiver.
    let notification = NotificationRecord {
        kind: NotificationKind::InviteAccepted,
        title: "Invite accepted".to_string(),
        body: format!("Profile \"{}\" was linked successfully", profile.display_name),
        data: json!({
            "profile_id": invite.profile_id,
            "action": "invite_accepted",
        }),
    };
    if let Err(e) = deps
        .dispatcher
        .dispatch(invite.caregiver_user_id, notification)
        .await
    {
        warn!(error = %e, "Failed to notify caregiver of accepted invite");
    }

    deps.record_audit(AuditEntry {
        actor: AuditActor::User(patient_id),
        action: "PAIR_INVITE_ACCEPTED",
        metadata: json!({
            "invite_id": invite.id,
            "caregiver_user_id": invite.caregiver_user_id,
            "consent": grants,
        }),
        target_profile_id: Some(invite.profile_id),
        source_ip,
    })
    .await;

    info!(profile_id = %invite.profile_id, "Profile linked to patient account");

    Ok(AcceptInviteResponse {
        profile_id: invite.profile_id,
        profile_name: profile.display_name,
    })
}
