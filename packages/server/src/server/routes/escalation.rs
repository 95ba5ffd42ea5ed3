use axum::{extract::Extension, http::HeaderMap, Json};

use crate::common::CoreError;
use crate::domains::escalation::actions::scan;
use crate::domains::escalation::models::ScanOutcome;
use crate::server::app::AxumAppState;

/// POST /internal/escalation/run
///
/// Manual trigger for the escalation scan, guarded by a shared secret header
/// rather than user auth. The scheduler uses the same `scan` entry point;
/// running both concurrently is safe because instances are claimed.
pub async fn run_escalation_handler(
    Extension(state): Extension<AxumAppState>,
    headers: HeaderMap,
) -> Result<Json<ScanOutcome>, CoreError> {
    let provided = headers
        .get("x-cron-secret")
        .and_then(|v| v.to_str().ok())
        .ok_or(CoreError::Unauthorized)?;
    if provided != state.cron_secret {
        return Err(CoreError::Unauthorized);
    }

    let outcome = scan(state.scan_params, &state.deps).await?;
    Ok(Json(outcome))
}
