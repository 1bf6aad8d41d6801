use reqwest::Client;
use tokio::time::Duration;

use super::header_policy::{
    copilot_base_url, copilot_headers, github_headers, CopilotHeaderContext,
};
use crate::constants::{GITHUB_TOKEN_EXCHANGE_URL, GITHUB_USAGE_URL, GITHUB_USER_URL};
use crate::error::{AppError, AppResult};
use crate::models::{AccountKind, CopilotTokenResponse, GithubUser, ModelEntry, ModelsResponse};

/// Snapshot of the per-instance fields a single upstream call needs. Taken
/// under the runtime-state read lock, then released before any I/O.
#[derive(Debug, Clone)]
pub struct UpstreamContext {
    pub account_kind: AccountKind,
    pub copilot_token: String,
    pub editor_version: String,
}

pub struct UpstreamClient {
    // Chat/embeddings calls may stream for minutes; management calls are
    // short-lived and get a tight deadline instead.
    chat_client: Client,
    management_client: Client,
}

impl UpstreamClient {
    pub fn new() -> AppResult<Self> {
        let chat_client = Client::builder()
            .connect_timeout(Duration::from_secs(20))
            .timeout(Duration::from_secs(5 * 60))
            .build()?;
        let management_client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            chat_client,
            management_client,
        })
    }

    /// Exchange the persistent GitHub credential for a short-lived Copilot
    /// session token. Failure here is the one condition that marks an
    /// instance `error`.
    pub async fn exchange_copilot_token(
        &self,
        github_token: &str,
    ) -> AppResult<CopilotTokenResponse> {
        let response = self
            .management_client
            .get(GITHUB_TOKEN_EXCHANGE_URL)
            .headers(github_headers(github_token))
            .send()
            .await
            .map_err(|e| AppError::Upstream(format!("failed to get copilot token: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Upstream(format!(
                "copilot token request failed (status {}): {}",
                status.as_u16(),
                body
            )));
        }

        response
            .json()
            .await
            .map_err(|e| AppError::Upstream(format!("failed to decode copilot token: {}", e)))
    }

    /// Fetch the model catalog. Accepts either the `{object, data}` wrapper or
    /// a bare entry array.
    pub async fn fetch_models(&self, context: &UpstreamContext) -> AppResult<ModelsResponse> {
        let url = format!("{}/models", copilot_base_url(context.account_kind));
        let response = self
            .management_client
            .get(url)
            .headers(copilot_headers(&CopilotHeaderContext {
                copilot_token: &context.copilot_token,
                editor_version: &context.editor_version,
                vision: false,
            }))
            .send()
            .await?;

        let body = response.bytes().await?;
        let mut models = match serde_json::from_slice::<ModelsResponse>(&body) {
            Ok(models) => models,
            Err(e) => {
                let entries: Vec<ModelEntry> = serde_json::from_slice(&body)
                    .map_err(|_| AppError::Upstream(format!("failed to parse models: {}", e)))?;
                ModelsResponse {
                    object: "list".to_string(),
                    data: entries,
                }
            }
        };
        if models.object.is_empty() {
            models.object = "list".to_string();
        }
        Ok(models)
    }

    /// Profile lookup against the identity provider, using the persistent
    /// credential rather than the session token.
    pub async fn fetch_user(&self, github_token: &str) -> AppResult<GithubUser> {
        let response = self
            .management_client
            .get(GITHUB_USER_URL)
            .headers(github_headers(github_token))
            .send()
            .await?;
        Ok(response.json().await?)
    }

    /// Raw usage/quota snapshot from the Copilot billing endpoint. The shape
    /// is not ours to define, so it passes through as untyped JSON.
    pub async fn fetch_usage(&self, github_token: &str) -> AppResult<serde_json::Value> {
        let response = self
            .management_client
            .get(GITHUB_USAGE_URL)
            .headers(github_headers(github_token))
            .send()
            .await?;
        Ok(response.json().await?)
    }

    /// Forward a prepared body to the Copilot chat surface. The caller decides
    /// what to do with the response (stream, translate, or pass through).
    pub async fn proxy_request(
        &self,
        context: &UpstreamContext,
        path: &str,
        body: Vec<u8>,
        vision: bool,
    ) -> AppResult<reqwest::Response> {
        let url = format!("{}{}", copilot_base_url(context.account_kind), path);
        let response = self
            .chat_client
            .post(url)
            .headers(copilot_headers(&CopilotHeaderContext {
                copilot_token: &context.copilot_token,
                editor_version: &context.editor_version,
                vision,
            }))
            .body(body)
            .send()
            .await
            .map_err(|e| AppError::Upstream(format!("proxy request failed: {}", e)))?;
        Ok(response)
    }
}
