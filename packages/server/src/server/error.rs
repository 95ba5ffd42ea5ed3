//! HTTP status mapping for the core error taxonomy.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::error;

use crate::common::CoreError;

impl IntoResponse for CoreError {
    fn into_response(self) -> Response {
        let status = match &self {
            CoreError::InvalidInput(_)
            | CoreError::ProfileAlreadyLinked
            | CoreError::InviteNotPending
            | CoreError::InviteExpired
            | CoreError::PatientIsCaregiver
            | CoreError::AlreadyRevoked => StatusCode::BAD_REQUEST,
            CoreError::Unauthorized => StatusCode::UNAUTHORIZED,
            CoreError::Forbidden
            | CoreError::UpgradeRequired
            | CoreError::SessionRevoked
            | CoreError::SessionExpired => StatusCode::FORBIDDEN,
            CoreError::NotFound(_) => StatusCode::NOT_FOUND,
            CoreError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            CoreError::Storage(e) => {
                // Internal detail stays in the logs; the client sees the
                // generic Display message.
                error!(error = %e, "Request failed with storage error");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}
