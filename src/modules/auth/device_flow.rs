use dashmap::DashMap;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;
use uuid::Uuid;

use crate::constants::{GITHUB_ACCESS_TOKEN_URL, GITHUB_CLIENT_ID, GITHUB_DEVICE_CODE_URL};
use crate::error::{AppError, AppResult};

static SESSIONS: Lazy<DashMap<String, AuthSession>> = Lazy::new(DashMap::new);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Pending,
    Complete,
    Expired,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthSession {
    pub id: String,
    pub device_code: String,
    pub user_code: String,
    pub verification_uri: String,
    pub expires_at: chrono::DateTime<chrono::Utc>,
    pub interval: u64,
    pub status: SessionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DeviceCodeResponse {
    device_code: String,
    user_code: String,
    verification_uri: String,
    expires_in: i64,
    #[serde(default)]
    interval: u64,
}

#[derive(Debug, Default, Deserialize)]
struct AccessTokenResponse {
    #[serde(default)]
    access_token: String,
    #[serde(default)]
    error: String,
}

/// Kick off the GitHub device-authorization flow. The returned session carries
/// the user code to display; a background task polls for completion.
pub async fn start_device_flow() -> AppResult<AuthSession> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(10))
        .build()?;

    let response = client
        .post(GITHUB_DEVICE_CODE_URL)
        .header("Accept", "application/json")
        .json(&json!({
            "client_id": GITHUB_CLIENT_ID,
            "scope": "read:user",
        }))
        .send()
        .await?;

    let device: DeviceCodeResponse = response
        .json()
        .await
        .map_err(|e| AppError::Auth(format!("failed to parse device code response: {}", e)))?;

    let session = AuthSession {
        id: Uuid::new_v4().to_string(),
        device_code: device.device_code,
        user_code: device.user_code,
        verification_uri: device.verification_uri,
        expires_at: chrono::Utc::now() + chrono::Duration::seconds(device.expires_in),
        // GitHub asks for at least 5 seconds between polls.
        interval: device.interval.max(5),
        status: SessionStatus::Pending,
        access_token: None,
        error: None,
    };

    SESSIONS.insert(session.id.clone(), session.clone());
    tokio::spawn(poll_for_token(session.clone()));

    Ok(session)
}

async fn poll_for_token(mut session: AuthSession) {
    let client = match reqwest::Client::builder()
        .timeout(Duration::from_secs(10))
        .build()
    {
        Ok(c) => c,
        Err(e) => {
            tracing::warn!("Device flow poll client build failed: {}", e);
            return;
        }
    };

    let mut interval = tokio::time::interval(Duration::from_secs(session.interval));
    interval.tick().await;

    loop {
        interval.tick().await;

        if chrono::Utc::now() > session.expires_at {
            session.status = SessionStatus::Expired;
            session.error = Some("device code expired".to_string());
            SESSIONS.insert(session.id.clone(), session);
            return;
        }

        match request_access_token(&client, &session.device_code).await {
            // authorization_pending / slow_down; keep polling
            Err(_) => continue,
            Ok(token) if token.is_empty() => continue,
            Ok(token) => {
                session.status = SessionStatus::Complete;
                session.access_token = Some(token);
                SESSIONS.insert(session.id.clone(), session);
                return;
            }
        }
    }
}

async fn request_access_token(client: &reqwest::Client, device_code: &str) -> AppResult<String> {
    let response = client
        .post(GITHUB_ACCESS_TOKEN_URL)
        .header("Accept", "application/json")
        .json(&json!({
            "client_id": GITHUB_CLIENT_ID,
            "device_code": device_code,
            "grant_type": "urn:ietf:params:oauth:grant-type:device_code",
        }))
        .send()
        .await?;

    let token: AccessTokenResponse = response.json().await?;
    if !token.error.is_empty() {
        return Err(AppError::Auth(token.error));
    }
    Ok(token.access_token)
}

pub fn get_session(session_id: &str) -> Option<AuthSession> {
    SESSIONS.get(session_id).map(|s| s.clone())
}

pub fn cleanup_session(session_id: &str) {
    SESSIONS.remove(session_id);
}
