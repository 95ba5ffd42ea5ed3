//! Application setup and server configuration.

use std::sync::Arc;

use axum::{
    extract::Extension,
    http::{
        header::{AUTHORIZATION, CONTENT_TYPE},
        Method,
    },
    middleware,
    routing::{get, post},
    Router,
};
use sqlx::PgPool;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::common::auth::JwtService;
use crate::domains::escalation::actions::ScanParams;
use crate::kernel::ServerDeps;
use crate::server::middleware::{extract_client_ip, jwt_auth_middleware};
use crate::server::routes::{
    accept_invite_handler, create_invite_handler, create_session_handler, health_handler,
    redeem_session_get_handler, redeem_session_post_handler, revoke_session_handler,
    run_escalation_handler,
};

/// Shared application state
#[derive(Clone)]
pub struct AxumAppState {
    pub db_pool: PgPool,
    pub deps: ServerDeps,
    pub jwt_service: Arc<JwtService>,
    pub cron_secret: String,
    pub scan_params: ScanParams,
}

/// Build the Axum application router
pub fn build_app(
    pool: PgPool,
    deps: ServerDeps,
    jwt_service: Arc<JwtService>,
    cron_secret: String,
    scan_params: ScanParams,
) -> Router {
    let app_state = AxumAppState {
        db_pool: pool,
        deps,
        jwt_service: jwt_service.clone(),
        cron_secret,
        scan_params,
    };

    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE]);

    let jwt_service_for_middleware = jwt_service.clone();

    Router::new()
        .route("/api/pairing/invites", post(create_invite_handler))
        .route("/api/pairing/accept", post(accept_invite_handler))
        .route("/api/share/sessions", post(create_session_handler))
        .route(
            "/api/share/payload",
            get(redeem_session_get_handler).post(redeem_session_post_handler),
        )
        .route("/api/share/revoke", post(revoke_session_handler))
        .route("/internal/escalation/run", post(run_escalation_handler))
        .route("/health", get(health_handler))
        .layer(middleware::from_fn(move |request, next| {
            let jwt = jwt_service_for_middleware.clone();
            jwt_auth_middleware(jwt, request, next)
        }))
        .layer(middleware::from_fn(extract_client_ip))
        .layer(Extension(app_state))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}
