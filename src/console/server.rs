use axum::{
    extract::Request,
    http::{header, StatusCode},
    middleware::Next,
    response::{IntoResponse, Json, Response},
    routing::{delete, get, post},
    Router,
};
use serde_json::json;
use tracing::info;

use super::handlers;
use crate::error::{AppError, AppResult};
use crate::modules::persistence::admin;
use crate::proxy::instance::InstanceManager;
use crate::proxy::middleware::cors_layer;

#[derive(Clone)]
pub struct ConsoleState {
    pub instances: InstanceManager,
    pub proxy_port: u16,
}

/// Admin routes require a valid console session token; setup/login and the
/// bootstrap config probe stay public.
async fn admin_auth_middleware(request: Request, next: Next) -> Response {
    let token = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .map(|s| s.strip_prefix("Bearer ").unwrap_or(s));

    let Some(token) = token else {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "error": "missing authorization header" })),
        )
            .into_response();
    };

    if !admin::validate_session(token) {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "error": "invalid or expired session" })),
        )
            .into_response();
    }

    next.run(request).await
}

pub fn build_router(state: ConsoleState) -> Router {
    let public = Router::new()
        .route("/api/config", get(handlers::get_config))
        .route("/api/auth/setup", post(handlers::auth_setup))
        .route("/api/auth/login", post(handlers::auth_login));

    let protected = Router::new()
        .route("/api/auth/check", get(handlers::auth_check))
        // Accounts
        .route(
            "/api/accounts",
            get(handlers::list_accounts).post(handlers::add_account),
        )
        .route("/api/accounts/usage", get(handlers::get_all_usage))
        .route(
            "/api/accounts/:id",
            get(handlers::get_account)
                .put(handlers::update_account)
                .delete(handlers::delete_account),
        )
        .route(
            "/api/accounts/:id/regenerate-key",
            post(handlers::regenerate_account_key),
        )
        .route("/api/accounts/:id/start", post(handlers::start_account))
        .route("/api/accounts/:id/stop", post(handlers::stop_account))
        .route("/api/accounts/:id/user", get(handlers::get_account_user))
        // Device-code login
        .route("/api/auth/device-code", post(handlers::start_device_code))
        .route("/api/auth/poll/:session_id", get(handlers::poll_session))
        .route("/api/auth/complete", post(handlers::complete_auth))
        // Pool
        .route(
            "/api/pool",
            get(handlers::get_pool).put(handlers::update_pool),
        )
        .route(
            "/api/pool/regenerate-key",
            post(handlers::regenerate_pool_key),
        )
        // Model mappings
        .route(
            "/api/model-map",
            get(handlers::get_model_map)
                .put(handlers::set_model_map)
                .post(handlers::add_model_mapping),
        )
        .route(
            "/api/model-map/:copilot_id",
            delete(handlers::delete_model_mapping),
        )
        .layer(axum::middleware::from_fn(admin_auth_middleware));

    public
        .merge(protected)
        .layer(cors_layer())
        .with_state(state)
}

pub async fn serve(state: ConsoleState, port: u16) -> AppResult<()> {
    let app = build_router(state);
    let addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| AppError::Config(format!("console bind failed on {}: {}", addr, e)))?;

    info!("Web console listening on :{}", port);
    axum::serve(listener, app)
        .await
        .map_err(|e| AppError::Config(format!("console server error: {}", e)))
}
