//! Create share session action
//!
//! A paired member on a Pro plan mints a time-limited anonymous read grant
//! (e.g., for a clinician visit). Creating a session revokes every active one
//! for the profile first: at most one session is ever live per profile.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::net::IpAddr;
use tracing::info;
use uuid::Uuid;

use crate::common::{auth, CoreError};
use crate::domains::sharing::models::{Plan, ShareScope, ShareSession};
use crate::kernel::{AuditActor, AuditEntry, ServerDeps};

pub const MIN_EXPIRY_MINUTES: i64 = 10;
pub const MAX_EXPIRY_MINUTES: i64 = 30;

#[derive(Debug, Deserialize)]
pub struct CreateSessionRequest {
    pub profile_id: Uuid,
    pub scope: ShareScope,
    pub expiry_minutes: i64,
}

#[derive(Debug, Serialize)]
pub struct CreateSessionResponse {
    pub token: String,
    pub viewer_url: String,
    pub scope: ShareScope,
    pub expiry_minutes: i64,
    pub expires_at: DateTime<Utc>,
}

pub async fn create_session(
    req: CreateSessionRequest,
    creator_id: Uuid,
    source_ip: Option<IpAddr>,
    deps: &ServerDeps,
) -> Result<CreateSessionResponse, CoreError> {
    if !(MIN_EXPIRY_MINUTES..=MAX_EXPIRY_MINUTES).contains(&req.expiry_minutes) {
        return Err(CoreError::invalid_input(
            "expiry_minutes must be between 10 and 30",
        ));
    }

    if deps.store.user_plan(creator_id).await? != Plan::Pro {
        return Err(CoreError::UpgradeRequired);
    }

    if !auth::is_member(deps.store.as_ref(), req.profile_id, creator_id).await? {
        return Err(CoreError::Forbidden);
    }

    deps.store
        .profile_by_id(req.profile_id)
        .await?
        .ok_or(CoreError::NotFound("Profile"))?;

    let now = deps.clock.now();

    // Single-active-session invariant: revoke whatever is live, then insert.
    // The narrow window with no active session between the two writes is
    // acceptable; no reader depends on one always existing.
    let revoked = deps.store.revoke_active_sessions(req.profile_id, now).await?;
    if revoked > 0 {
        info!(profile_id = %req.profile_id, revoked, "Rotated active share sessions");
    }

    let token = deps.tokens.share_token();
    let expires_at = now + chrono::Duration::minutes(req.expiry_minutes);

    let session = ShareSession {
        id: Uuid::new_v4(),
        profile_id: req.profile_id,
        created_by_user_id: creator_id,
        scope: req.scope,
        token: token.clone(),
        expires_at,
        revoked_at: None,
        created_at: now,
    };
    deps.store.insert_session(&session).await?;

    deps.record_audit(AuditEntry {
        actor: AuditActor::User(creator_id),
        action: "SHARE_SESSION_CREATED",
        metadata: json!({
            "session_id": session.id,
            "scope": req.scope,
            "expiry_minutes": req.expiry_minutes,
            "expires_at": expires_at,
        }),
        target_profile_id: Some(req.profile_id),
        source_ip,
    })
    .await;

    let viewer_url = format!("{}/share/{}", deps.app_domain, token);

    Ok(CreateSessionResponse {
        token,
        viewer_url,
        scope: req.scope,
        expiry_minutes: req.expiry_minutes,
        expires_at,
    })
}
