use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::server::ConsoleState;
use crate::models::{Account, AccountKind, ModelMapping, PoolConfig};
use crate::modules::auth::device_flow::{self, SessionStatus};
use crate::modules::persistence::{accounts, admin, model_map, pool};
use crate::proxy::instance::InstanceStatus;

fn error_json(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(json!({ "error": message.into() }))).into_response()
}

fn internal_error(e: impl std::fmt::Display) -> Response {
    error_json(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
}

// --- Auth ---

pub async fn get_config(State(state): State<ConsoleState>) -> Response {
    Json(json!({
        "proxyPort": state.proxy_port,
        "needsSetup": admin::is_setup_required(),
    }))
    .into_response()
}

#[derive(Deserialize)]
pub struct PasswordRequest {
    #[serde(default)]
    password: String,
}

pub async fn auth_setup(Json(body): Json<PasswordRequest>) -> Response {
    if body.password.is_empty() {
        return error_json(StatusCode::BAD_REQUEST, "password is required");
    }
    if !admin::is_setup_required() {
        return error_json(StatusCode::BAD_REQUEST, "admin already configured");
    }
    match admin::setup_admin(&body.password) {
        Ok(()) => Json(json!({ "success": true })).into_response(),
        Err(e) => internal_error(e),
    }
}

pub async fn auth_login(Json(body): Json<PasswordRequest>) -> Response {
    match admin::login_admin(&body.password) {
        Ok(token) => Json(json!({ "token": token })).into_response(),
        Err(_) => error_json(StatusCode::UNAUTHORIZED, "invalid password"),
    }
}

pub async fn auth_check() -> Response {
    Json(json!({ "valid": true })).into_response()
}

// --- Accounts ---

/// Account plus its live instance view; the raw credential never leaves the
/// store through this surface.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountView {
    pub id: String,
    pub name: String,
    pub account_type: AccountKind,
    pub api_key: String,
    pub enabled: bool,
    pub created_at: String,
    pub priority: i32,
    pub status: InstanceStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

fn to_account_view(state: &ConsoleState, account: Account) -> AccountView {
    AccountView {
        status: state.instances.status(&account.id),
        last_error: state.instances.error(&account.id),
        id: account.id,
        name: account.name,
        account_type: account.account_type,
        api_key: account.api_key,
        enabled: account.enabled,
        created_at: account.created_at,
        priority: account.priority,
    }
}

pub async fn list_accounts(State(state): State<ConsoleState>) -> Response {
    match accounts::get_accounts() {
        Ok(list) => {
            let views: Vec<AccountView> = list
                .into_iter()
                .map(|account| to_account_view(&state, account))
                .collect();
            Json(json!({ "accounts": views })).into_response()
        }
        Err(e) => internal_error(e),
    }
}

pub async fn get_account(State(state): State<ConsoleState>, Path(id): Path<String>) -> Response {
    match accounts::get_account(&id) {
        Ok(Some(account)) => Json(to_account_view(&state, account)).into_response(),
        Ok(None) => error_json(StatusCode::NOT_FOUND, "account not found"),
        Err(e) => internal_error(e),
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddAccountRequest {
    name: String,
    github_token: String,
    #[serde(default)]
    account_type: AccountKind,
}

pub async fn add_account(
    State(state): State<ConsoleState>,
    Json(body): Json<AddAccountRequest>,
) -> Response {
    if body.name.is_empty() || body.github_token.is_empty() {
        return error_json(StatusCode::BAD_REQUEST, "name and githubToken are required");
    }
    match accounts::add_account(body.name, body.github_token, body.account_type) {
        Ok(account) => Json(to_account_view(&state, account)).into_response(),
        Err(e) => internal_error(e),
    }
}

pub async fn update_account(
    State(state): State<ConsoleState>,
    Path(id): Path<String>,
    Json(update): Json<accounts::AccountUpdate>,
) -> Response {
    match accounts::update_account(&id, update) {
        Ok(Some(account)) => {
            if !account.enabled {
                state.instances.stop(&account.id);
            }
            Json(to_account_view(&state, account)).into_response()
        }
        Ok(None) => error_json(StatusCode::NOT_FOUND, "account not found"),
        Err(e) => internal_error(e),
    }
}

pub async fn delete_account(State(state): State<ConsoleState>, Path(id): Path<String>) -> Response {
    state.instances.stop(&id);
    state.instances.remove(&id);
    match accounts::delete_account(&id) {
        Ok(()) => Json(json!({ "success": true })).into_response(),
        Err(e) => internal_error(e),
    }
}

pub async fn regenerate_account_key(Path(id): Path<String>) -> Response {
    match accounts::regenerate_api_key(&id) {
        Ok(Some(api_key)) => Json(json!({ "apiKey": api_key })).into_response(),
        Ok(None) => error_json(StatusCode::NOT_FOUND, "account not found"),
        Err(e) => internal_error(e),
    }
}

pub async fn start_account(State(state): State<ConsoleState>, Path(id): Path<String>) -> Response {
    let account = match accounts::get_account(&id) {
        Ok(Some(account)) => account,
        Ok(None) => return error_json(StatusCode::NOT_FOUND, "account not found"),
        Err(e) => return internal_error(e),
    };

    match state.instances.start(account).await {
        Ok(()) => Json(json!({ "status": state.instances.status(&id) })).into_response(),
        // Failure detail is recorded on the instance; report it directly too.
        Err(e) => internal_error(e),
    }
}

pub async fn stop_account(State(state): State<ConsoleState>, Path(id): Path<String>) -> Response {
    state.instances.stop(&id);
    Json(json!({ "status": state.instances.status(&id) })).into_response()
}

pub async fn get_account_user(
    State(state): State<ConsoleState>,
    Path(id): Path<String>,
) -> Response {
    match state.instances.user(&id).await {
        Ok(user) => Json(user).into_response(),
        Err(e) => error_json(StatusCode::BAD_GATEWAY, e.to_string()),
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchUsageItem {
    pub account_id: String,
    pub name: String,
    pub status: InstanceStatus,
    pub usage: Option<serde_json::Value>,
}

/// Usage snapshot across every account. Only running instances are queried
/// upstream; everything else (and any fetch failure) reports `usage: null`.
pub async fn get_all_usage(State(state): State<ConsoleState>) -> Response {
    let accounts = match accounts::get_accounts() {
        Ok(accounts) => accounts,
        Err(e) => return internal_error(e),
    };

    let mut result = Vec::with_capacity(accounts.len());
    for account in accounts {
        let status = state.instances.status(&account.id);
        let usage = if status == InstanceStatus::Running {
            state.instances.usage(&account.id).await.ok()
        } else {
            None
        };
        result.push(BatchUsageItem {
            account_id: account.id,
            name: account.name,
            status,
            usage,
        });
    }
    Json(result).into_response()
}

// --- Device-code login ---

pub async fn start_device_code() -> Response {
    match device_flow::start_device_flow().await {
        Ok(session) => Json(session).into_response(),
        Err(e) => internal_error(e),
    }
}

pub async fn poll_session(Path(session_id): Path<String>) -> Response {
    match device_flow::get_session(&session_id) {
        Some(session) => Json(session).into_response(),
        None => error_json(StatusCode::NOT_FOUND, "session not found"),
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompleteAuthRequest {
    session_id: String,
    name: String,
    #[serde(default)]
    account_type: AccountKind,
}

/// Turn a completed device-flow session into a stored account.
pub async fn complete_auth(
    State(state): State<ConsoleState>,
    Json(body): Json<CompleteAuthRequest>,
) -> Response {
    let Some(session) = device_flow::get_session(&body.session_id) else {
        return error_json(StatusCode::NOT_FOUND, "session not found");
    };
    if session.status != SessionStatus::Complete {
        return error_json(StatusCode::BAD_REQUEST, "authorization not complete");
    }
    let Some(access_token) = session.access_token else {
        return error_json(StatusCode::BAD_REQUEST, "session has no access token");
    };

    match accounts::add_account(body.name, access_token, body.account_type) {
        Ok(account) => {
            device_flow::cleanup_session(&body.session_id);
            Json(to_account_view(&state, account)).into_response()
        }
        Err(e) => internal_error(e),
    }
}

// --- Pool ---

pub async fn get_pool() -> Response {
    Json(pool::get_pool_config()).into_response()
}

pub async fn update_pool(Json(config): Json<PoolConfig>) -> Response {
    match pool::update_pool_config(&config) {
        Ok(()) => Json(config).into_response(),
        Err(e) => internal_error(e),
    }
}

pub async fn regenerate_pool_key() -> Response {
    match pool::regenerate_pool_api_key() {
        Ok(api_key) => Json(json!({ "apiKey": api_key })).into_response(),
        Err(e) => internal_error(e),
    }
}

// --- Model mappings ---

pub async fn get_model_map() -> Response {
    Json(json!({ "mappings": model_map::get_model_mappings() })).into_response()
}

#[derive(Deserialize)]
pub struct SetModelMapRequest {
    #[serde(default)]
    mappings: Vec<ModelMapping>,
}

pub async fn set_model_map(Json(body): Json<SetModelMapRequest>) -> Response {
    match model_map::set_model_mappings(body.mappings) {
        Ok(()) => Json(json!({ "success": true })).into_response(),
        Err(e) => internal_error(e),
    }
}

pub async fn add_model_mapping(Json(mapping): Json<ModelMapping>) -> Response {
    if mapping.copilot_id.is_empty() || mapping.display_id.is_empty() {
        return error_json(StatusCode::BAD_REQUEST, "copilotId and displayId are required");
    }
    match model_map::add_model_mapping(mapping) {
        Ok(()) => Json(json!({ "success": true })).into_response(),
        Err(e) => internal_error(e),
    }
}

pub async fn delete_model_mapping(Path(copilot_id): Path<String>) -> Response {
    match model_map::delete_model_mapping(&copilot_id) {
        Ok(()) => Json(json!({ "success": true })).into_response(),
        Err(e) => internal_error(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::persistence::paths;
    use crate::proxy::instance::InstanceManager;
    use crate::proxy::upstream::UpstreamClient;
    use crate::test_utils::scoped_data_dir;
    use std::sync::Arc;

    fn test_state() -> ConsoleState {
        ConsoleState {
            instances: InstanceManager::new(Arc::new(UpstreamClient::new().unwrap())),
            proxy_port: 4141,
        }
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_config_reports_setup_state() {
        let _dir = scoped_data_dir("console-config");
        paths::ensure_files().unwrap();

        let response = get_config(State(test_state())).await;
        let value = body_json(response).await;
        assert_eq!(value["proxyPort"], 4141);
        assert_eq!(value["needsSetup"], true);
    }

    #[tokio::test]
    async fn test_setup_then_login_round_trip() {
        let _dir = scoped_data_dir("console-setup-login");
        paths::ensure_files().unwrap();

        let response = auth_setup(Json(PasswordRequest {
            password: "secret".to_string(),
        }))
        .await;
        assert_eq!(response.status(), StatusCode::OK);

        // second setup attempt is rejected
        let response = auth_setup(Json(PasswordRequest {
            password: "other".to_string(),
        }))
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = auth_login(Json(PasswordRequest {
            password: "secret".to_string(),
        }))
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        let value = body_json(response).await;
        assert!(admin::validate_session(value["token"].as_str().unwrap()));
    }

    #[tokio::test]
    async fn test_account_views_hide_credential_and_carry_status() {
        let _dir = scoped_data_dir("console-account-view");
        paths::ensure_files().unwrap();
        let state = test_state();

        let response = add_account(
            State(state.clone()),
            Json(AddAccountRequest {
                name: "work".to_string(),
                github_token: "ghu_secret".to_string(),
                account_type: AccountKind::Business,
            }),
        )
        .await;
        let value = body_json(response).await;
        assert_eq!(value["name"], "work");
        assert_eq!(value["status"], "stopped");
        assert!(value.get("githubToken").is_none());

        let response = list_accounts(State(state)).await;
        let value = body_json(response).await;
        assert_eq!(value["accounts"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_unknown_account_is_not_found() {
        let _dir = scoped_data_dir("console-account-404");
        paths::ensure_files().unwrap();

        let response = get_account(State(test_state()), Path("missing".to_string())).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = regenerate_account_key(Path("missing".to_string())).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_batch_usage_covers_every_account() {
        let _dir = scoped_data_dir("console-usage");
        paths::ensure_files().unwrap();
        let state = test_state();

        accounts::add_account(
            "one".to_string(),
            "ghu_a".to_string(),
            AccountKind::Individual,
        )
        .unwrap();
        accounts::add_account(
            "two".to_string(),
            "ghu_b".to_string(),
            AccountKind::Business,
        )
        .unwrap();

        let response = get_all_usage(State(state)).await;
        assert_eq!(response.status(), StatusCode::OK);
        let value = body_json(response).await;
        let items = value.as_array().unwrap();
        assert_eq!(items.len(), 2);
        for item in items {
            // no instance is running, so nothing is queried upstream
            assert_eq!(item["status"], "stopped");
            assert!(item["usage"].is_null());
            assert!(item["accountId"].is_string());
            assert!(item["name"].is_string());
        }
    }

    #[tokio::test]
    async fn test_disabling_account_stops_instance() {
        let _dir = scoped_data_dir("console-disable");
        paths::ensure_files().unwrap();
        let state = test_state();

        let account = accounts::add_account(
            "main".to_string(),
            "ghu_x".to_string(),
            AccountKind::Individual,
        )
        .unwrap();
        state.instances.insert_running_for_test(account.clone());
        assert!(state.instances.is_running(&account.id));

        let response = update_account(
            State(state.clone()),
            Path(account.id.clone()),
            Json(accounts::AccountUpdate {
                enabled: Some(false),
                ..Default::default()
            }),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            state.instances.status(&account.id),
            InstanceStatus::Stopped
        );
    }
}
