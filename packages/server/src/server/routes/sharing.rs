use axum::{
    extract::{Extension, Query},
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::common::CoreError;
use crate::domains::sharing::actions::{
    create_session, redeem_session, revoke_session, CreateSessionRequest, CreateSessionResponse,
};
use crate::domains::sharing::models::SharePayload;
use crate::server::app::AxumAppState;
use crate::server::middleware::{AuthUser, ClientIp};

#[derive(Debug, Deserialize)]
pub struct TokenParams {
    pub token: String,
}

/// POST /api/share/sessions
pub async fn create_session_handler(
    Extension(state): Extension<AxumAppState>,
    auth: Option<Extension<AuthUser>>,
    client_ip: Option<Extension<ClientIp>>,
    Json(req): Json<CreateSessionRequest>,
) -> Result<Json<CreateSessionResponse>, CoreError> {
    let Extension(user) = auth.ok_or(CoreError::Unauthorized)?;
    let ip = client_ip.map(|Extension(ClientIp(ip))| ip);

    let response = create_session(req, user.user_id, ip, &state.deps).await?;
    Ok(Json(response))
}

/// GET /api/share/payload?token=...
///
/// Anonymous: the token is the only credential.
pub async fn redeem_session_get_handler(
    Extension(state): Extension<AxumAppState>,
    client_ip: Option<Extension<ClientIp>>,
    Query(params): Query<TokenParams>,
) -> Result<Json<SharePayload>, CoreError> {
    let ip = client_ip.map(|Extension(ClientIp(ip))| ip);

    let payload = redeem_session(&params.token, ip, &state.deps).await?;
    Ok(Json(payload))
}

/// POST /api/share/payload
pub async fn redeem_session_post_handler(
    Extension(state): Extension<AxumAppState>,
    client_ip: Option<Extension<ClientIp>>,
    Json(params): Json<TokenParams>,
) -> Result<Json<SharePayload>, CoreError> {
    let ip = client_ip.map(|Extension(ClientIp(ip))| ip);

    let payload = redeem_session(&params.token, ip, &state.deps).await?;
    Ok(Json(payload))
}

/// POST /api/share/revoke
pub async fn revoke_session_handler(
    Extension(state): Extension<AxumAppState>,
    auth: Option<Extension<AuthUser>>,
    client_ip: Option<Extension<ClientIp>>,
    Json(params): Json<TokenParams>,
) -> Result<Json<Value>, CoreError> {
    let Extension(user) = auth.ok_or(CoreError::Unauthorized)?;
    let ip = client_ip.map(|Extension(ClientIp(ip))| ip);

    revoke_session(&params.token, user.user_id, ip, &state.deps).await?;
    Ok(Json(json!({ "success": true })))
}
