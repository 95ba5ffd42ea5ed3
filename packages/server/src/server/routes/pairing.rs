use axum::{extract::Extension, Json};

use crate::common::CoreError;
use crate::domains::pairing::actions::{
    accept_invite, create_invite, AcceptInviteRequest, AcceptInviteResponse, CreateInviteRequest,
    CreateInviteResponse,
};
use crate::server::app::AxumAppState;
use crate::server::middleware::{AuthUser, ClientIp};

/// POST /api/pairing/invites
pub async fn create_invite_handler(
    Extension(state): Extension<AxumAppState>,
    auth: Option<Extension<AuthUser>>,
    client_ip: Option<Extension<ClientIp>>,
    Json(req): Json<CreateInviteRequest>,
) -> Result<Json<CreateInviteResponse>, CoreError> {
    let Extension(user) = auth.ok_or(CoreError::Unauthorized)?;
    let ip = client_ip.map(|Extension(ClientIp(ip))| ip);

    let response = create_invite(req, user.user_id, ip, &state.deps).await?;
    Ok(Json(response))
}

/// POST /api/pairing/accept
pub async fn accept_invite_handler(
    Extension(state): Extension<AxumAppState>,
    auth: Option<Extension<AuthUser>>,
    client_ip: Option<Extension<ClientIp>>,
    Json(req): Json<AcceptInviteRequest>,
) -> Result<Json<AcceptInviteResponse>, CoreError> {
    let Extension(user) = auth.ok_or(CoreError::Unauthorized)?;
    let ip = client_ip.map(|Extension(ClientIp(ip))| ip);

    let response = accept_invite(req, user.user_id, ip, &state.deps).await?;
    Ok(Json(response))
}
