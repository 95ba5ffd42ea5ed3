//! Redeem share session action
//!
//! The anonymous viewer path. The token is the only credential, so this is the
//! most defended surface in the system: length check before any lookup, rate
//! limits on both the token and the caller's IP, and a payload that exposes
//! aggregates only.

use chrono::Duration;
use serde_json::json;
use std::net::IpAddr;
use tracing::warn;

use crate::common::CoreError;
use crate::domains::sharing::models::{
    AdherenceSummary, AdherenceWindow, Medication, ScheduleDescriptor, SharePayload, ShareScope,
    SharedMedication, SHARE_DISCLAIMER,
};
use crate::kernel::{AuditActor, AuditEntry, ServerDeps};

const REDEEMS_PER_TOKEN: u32 = 10;
const REDEEMS_PER_IP: u32 = 50;
const REDEEM_WINDOW_SECS: u64 = 5 * 60;

/// Signed photo URLs handed to the viewer outlive the session by design; the
/// viewer may keep the page open past session expiry.
const PHOTO_URL_TTL_MINUTES: i64 = 30;

pub async fn redeem_session(
    token: &str,
    source_ip: Option<IpAddr>,
    deps: &ServerDeps,
) -> Result<SharePayload, CoreError> {
    if token.len() < 32 {
        return Err(CoreError::invalid_input("Valid token is required"));
    }

    let window = std::time::Duration::from_secs(REDEEM_WINDOW_SECS);
    if !deps
        .rate_limiter
        .check(&format!("share:token:{token}"), REDEEMS_PER_TOKEN, window)
    {
        return Err(CoreError::RateLimited);
    }
    let ip_key = source_ip
        .map(|ip| ip.to_string())
        .unwrap_or_else(|| "unknown".to_string());
    if !deps
        .rate_limiter
        .check(&format!("share:ip:{ip_key}"), REDEEMS_PER_IP, window)
    {
        return Err(CoreError::RateLimited);
    }

    let session = deps
        .store
        .session_by_token(token)
        .await?
        .ok_or(CoreError::NotFound("Share link"))?;

    // Revocation outranks expiry when both hold.
    if session.revoked_at.is_some() {
        return Err(CoreError::SessionRevoked);
    }
    let now = deps.clock.now();
    if session.is_expired(now) {
        return Err(CoreError::SessionExpired);
    }

    let profile = deps
        .store
        .profile_by_id(session.profile_id)
        .await?
        .ok_or(CoreError::NotFound("Profile"))?;

    let medications = deps.store.active_medications(session.profile_id).await?;
    let mut shared = Vec::with_capacity(medications.len());
    for med in medications {
        shared.push(present_medication(med, deps).await);
    }

    let adherence_summary = match session.scope {
        ShareScope::MedsOnly => None,
        ShareScope::MedsAndLog => {
            let last_7 = deps
                .store
                .adherence_counts_since(session.profile_id, now - Duration::days(7))
                .await?;
            let last_30 = deps
                .store
                .adherence_counts_since(session.profile_id, now - Duration::days(30))
                .await?;
            Some(AdherenceSummary {
                last_7_days: AdherenceWindow::from_counts(last_7),
                last_30_days: AdherenceWindow::from_counts(last_30),
            })
        }
    };

    // Attributed to the session creator; the viewer has no identity.
    deps.record_audit(AuditEntry {
        actor: AuditActor::User(session.created_by_user_id),
        action: "SHARE_SESSION_ACCESSED",
        metadata: json!({
            "session_id": session.id,
            "scope": session.scope,
            "client_ip": ip_key,
        }),
        target_profile_id: Some(session.profile_id),
        source_ip,
    })
    .await;

    Ok(SharePayload {
        profile_name: profile.display_name,
        timezone: profile.timezone,
        language: profile.language_pref,
        medication_count: shared.len(),
        medications: shared,
        generated_at: now,
        expires_at: session.expires_at,
        adherence_summary,
        disclaimer: SHARE_DISCLAIMER,
    })
}

/// Shape one medication for the anonymous viewer, resolving photo paths to
/// signed URLs. A signing failure degrades to no photo rather than failing
/// the whole payload.
async fn present_medication(med: Medication, deps: &ServerDeps) -> SharedMedication {
    let ttl = Duration::minutes(PHOTO_URL_TTL_MINUTES);

    let mut pill_photo_url = None;
    if let Some(path) = &med.pill_photo_path {
        match deps.media.signed_url(path, ttl).await {
            Ok(url) => pill_photo_url = Some(url),
            Err(e) => warn!(error = %e, medication_id = %med.id, "Failed to sign pill photo URL"),
        }
    }
    let mut box_photo_url = None;
    if let Some(path) = &med.box_photo_path {
        match deps.media.signed_url(path, ttl).await {
            Ok(url) => box_photo_url = Some(url),
            Err(e) => warn!(error = %e, medication_id = %med.id, "Failed to sign box photo URL"),
        }
    }

    let schedules = med
        .schedules
        .into_iter()
        .map(|s| ScheduleDescriptor {
            schedule_type: s.schedule_type,
            times: s.times_local,
            days_of_week: s.days_of_week,
            every_x_hours: s.every_x_hours,
        })
        .collect();

    SharedMedication {
        id: med.id,
        name: med.name,
        instructions_text: med.instructions_text,
        pill_photo_url,
        box_photo_url,
        visual_tags: med.visual_tags,
        schedules,
    }
}
