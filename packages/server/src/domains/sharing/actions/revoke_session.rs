//! Revoke share session action
//!
//! Immediate kill switch for a live share link. Any member of the profile (or
//! the creator, or the profile owner) may revoke; a revoked session stays
//! revoked even if it has also expired.

use serde_json::json;
use std::net::IpAddr;
use tracing::info;
use uuid::Uuid;

use crate::common::{auth, CoreError};
use crate::kernel::{AuditActor, AuditEntry, ServerDeps};

pub async fn revoke_session(
    token: &str,
    requester_id: Uuid,
    source_ip: Option<IpAddr>,
    deps: &ServerDeps,
) -> Result<(), CoreError> {
    if token.is_empty() {
        return Err(CoreError::invalid_input("token is required"));
    }

    let session = deps
        .store
        .session_by_token(token)
        .await?
        .ok_or(CoreError::NotFound("Share session"))?;

    if session.revoked_at.is_some() {
        return Err(CoreError::AlreadyRevoked);
    }

    let permitted = session.created_by_user_id == requester_id
        || auth::is_owner(deps.store.as_ref(), session.profile_id, requester_id).await?
        || auth::is_member(deps.store.as_ref(), session.profile_id, requester_id).await?;
    if !permitted {
        return Err(CoreError::Forbidden);
    }

    let now = deps.clock.now();
    deps.store.revoke_session(session.id, now).await?;

    deps.record_audit(AuditEntry {
        actor: AuditActor::User(requester_id),
        action: "SHARE_SESSION_REVOKED",
        metadata: json!({
            "session_id": session.id,
            "was_expired": session.is_expired(now),
        }),
        target_profile_id: Some(session.profile_id),
        source_ip,
    })
    .await;

    info!(session_id = %session.id, profile_id = %session.profile_id, "Share session revoked");

    Ok(())
}
