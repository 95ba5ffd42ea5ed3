//! Create pairing invite action
//!
//! A caregiver offers to link one of their managed profiles to a patient
//! account. At most one PENDING unexpired invite exists per profile: creating
//! a new one revokes the prior one before inserting.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::net::IpAddr;
use tracing::info;
use uuid::Uuid;

use crate::common::{auth, phone, CoreError};
use crate::domains::pairing::models::{InviteStatus, PairingInvite};
use crate::kernel::{AuditActor, AuditEntry, ServerDeps};

pub const INVITE_TTL_HOURS: i64 = 72;

const INVITES_PER_PROFILE_PER_HOUR: u32 = 5;

#[derive(Debug, Deserialize)]
pub struct CreateInviteRequest {
    pub profile_id: Uuid,
    pub patient_phone_e164: String,
}

#[derive(Debug, Serialize)]
pub struct CreateInviteResponse {
    pub pair_code: String,
    pub link_url: String,
    pub whatsapp_link: String,
    pub expires_at: DateTime<Utc>,
}

pub async fn create_invite(
    req: CreateInviteRequest,
    caregiver_id: Uuid,
    source_ip: Option<IpAddr>,
    deps: &ServerDeps,
) -> Result<CreateInviteResponse, CoreError> {
    if !phone::is_valid_e164(&req.patient_phone_e164) {
        return Err(CoreError::invalid_input(
            "Invalid phone number format. Use E.164 format (e.g., +966501234567)",
        ));
    }

    if !deps.rate_limiter.check(
        &format!("pairing:{}", req.profile_id),
        INVITES_PER_PROFILE_PER_HOUR,
        std::time::Duration::from_secs(60 * 60),
    ) {
        return Err(CoreError::RateLimited);
    }

    if !auth::can_edit_meds(deps.store.as_ref(), req.profile_id, caregiver_id).await? {
        return Err(CoreError::Forbidden);
    }

    let profile = deps
        .store
        .profile_by_id(req.profile_id)
        .await?
        .ok_or(CoreError::NotFound("Profile"))?;

    if profile.linked_user_id.is_some() {
        return Err(CoreError::ProfileAlreadyLinked);
    }

    let now = deps.clock.now();

    // Supersede any prior pending invite; at most one can exist, so this is a
    // single conditional update.
    if let Some(existing) = deps
        .store
        .pending_invite_for_profile(req.profile_id, now)
        .await?
    {
        deps.store
            .set_invite_status(existing.id, InviteStatus::Revoked)
            .await?;
    }

    let pair_code = deps.tokens.pair_code();
    let expires_at = now + chrono::Duration::hours(INVITE_TTL_HOURS);
    let link_url = format!("{}/pair?code={}", deps.app_domain, pair_code);

    let invite = PairingInvite {
        id: Uuid::new_v4(),
        profile_id: req.profile_id,
        caregiver_user_id: caregiver_id,
        patient_phone_e164: req.patient_phone_e164.clone(),
        pair_code: pair_code.clone(),
        link_url: link_url.clone(),
        status: InviteStatus::Pending,
        expires_at,
        created_at: now,
    };
    deps.store.insert_invite(&invite).await?;

    deps.record_audit(AuditEntry {
        actor: AuditActor::User(caregiver_id),
        action: "PAIR_INVITE_CREATED",
        metadata: json!({
            "invite_id": invite.id,
            "profile_name": profile.display_name,
            "expires_at": expires_at,
        }),
        target_profile_id: Some(req.profile_id),
        source_ip,
    })
    .await;

    let message = format!(
        "You've been added on CareLink to track medications. Pairing code: {}\n\nGet the app: {}",
        pair_code, link_url
    );
    let whatsapp_link = format!(
        "https://wa.me/{}?text={}",
        req.patient_phone_e164.trim_start_matches('+'),
        urlencoding::encode(&message)
    );

    info!(profile_id = %req.profile_id, invite_id = %invite.id, "Pairing invite created");

    Ok(CreateInviteResponse {
        pair_code,
        link_url,
        whatsapp_link,
        expires_at,
    })
}
