use axum::{
    routing::{get, post},
    Router,
};
use tracing::info;

use crate::error::{AppError, AppResult};
use crate::proxy::handlers;
use crate::proxy::instance::InstanceManager;
use crate::proxy::middleware::{cors_layer, proxy_auth_middleware};

#[derive(Clone)]
pub struct AppState {
    pub instances: InstanceManager,
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        // OpenAI protocol (bare and /v1 twins)
        .route(
            "/chat/completions",
            post(handlers::openai::handle_chat_completions),
        )
        .route(
            "/v1/chat/completions",
            post(handlers::openai::handle_chat_completions),
        )
        .route("/models", get(handlers::openai::handle_models))
        .route("/v1/models", get(handlers::openai::handle_models))
        .route("/embeddings", post(handlers::openai::handle_embeddings))
        .route("/v1/embeddings", post(handlers::openai::handle_embeddings))
        // Anthropic protocol
        .route("/v1/messages", post(handlers::claude::handle_messages))
        .route(
            "/v1/messages/count_tokens",
            post(handlers::claude::handle_count_tokens),
        )
        .layer(axum::middleware::from_fn(proxy_auth_middleware))
        .layer(cors_layer())
        .with_state(state)
}

pub async fn serve(state: AppState, port: u16) -> AppResult<()> {
    let app = build_router(state);
    let addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| AppError::Config(format!("proxy bind failed on {}: {}", addr, e)))?;

    info!("Proxy listening on :{}", port);
    axum::serve(listener, app)
        .await
        .map_err(|e| AppError::Config(format!("proxy server error: {}", e)))
}
