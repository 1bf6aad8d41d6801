use axum::{
    extract::Request,
    http::{header, StatusCode},
    middleware::Next,
    response::{IntoResponse, Json, Response},
};
use serde_json::json;

use crate::models::PoolStrategy;
use crate::modules::persistence::{accounts, pool};

/// Outcome of API-key resolution, attached as a request extension. A key
/// authenticates to exactly one of the pool or a single account.
#[derive(Debug, Clone)]
pub enum AuthContext {
    Pool { strategy: PoolStrategy },
    Account { account_id: String },
}

fn unauthorized(message: &str) -> Response {
    (StatusCode::UNAUTHORIZED, Json(json!({ "error": message }))).into_response()
}

/// Resolve `Authorization: Bearer <k>` (or `x-api-key: <k>` promoted to
/// bearer form) against the pool key first, then account keys.
pub async fn proxy_auth_middleware(mut request: Request, next: Next) -> Response {
    let token = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .map(|s| s.strip_prefix("Bearer ").unwrap_or(s).to_string())
        .or_else(|| {
            request
                .headers()
                .get("x-api-key")
                .and_then(|h| h.to_str().ok())
                .map(str::to_string)
        });

    let Some(token) = token else {
        return unauthorized("missing authorization");
    };

    let pool_config = pool::get_pool_config();
    if pool_config.enabled && !pool_config.api_key.is_empty() && pool_config.api_key == token {
        request.extensions_mut().insert(AuthContext::Pool {
            strategy: pool_config.strategy,
        });
        return next.run(request).await;
    }

    match accounts::get_account_by_api_key(&token) {
        Ok(Some(account)) => {
            request.extensions_mut().insert(AuthContext::Account {
                account_id: account.id,
            });
            next.run(request).await
        }
        _ => unauthorized("invalid API key"),
    }
}
