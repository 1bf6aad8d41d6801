use std::sync::Arc;

use axum::{http::StatusCode, response::Response};
use tokio::sync::RwLock;

use super::streaming::error_response;
use crate::proxy::instance::{select_account, RuntimeState};
use crate::proxy::middleware::AuthContext;
use crate::proxy::server::AppState;

/// Bind the authenticated request to an instance runtime: pool keys go
/// through the selector, account keys straight to their own instance.
pub fn resolve_runtime(
    state: &AppState,
    context: &AuthContext,
) -> Result<Arc<RwLock<RuntimeState>>, Response> {
    match context {
        AuthContext::Pool { strategy } => {
            let account = select_account(&state.instances, *strategy, None)
                .ok()
                .flatten()
                .ok_or_else(|| {
                    error_response(
                        StatusCode::SERVICE_UNAVAILABLE,
                        "no available accounts in pool",
                    )
                })?;
            state.instances.state(&account.id).ok_or_else(|| {
                error_response(
                    StatusCode::SERVICE_UNAVAILABLE,
                    "selected account instance not running",
                )
            })
        }
        AuthContext::Account { account_id } => {
            state.instances.state(account_id).ok_or_else(|| {
                error_response(
                    StatusCode::SERVICE_UNAVAILABLE,
                    "account instance not running",
                )
            })
        }
    }
}
