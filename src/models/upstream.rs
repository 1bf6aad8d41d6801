use serde::{Deserialize, Serialize};

/// Model catalog as returned by the Copilot `/models` endpoint. Some upstream
/// deployments return a bare array instead of the list wrapper; the fetch path
/// accepts both.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ModelsResponse {
    #[serde(default)]
    pub object: String,
    #[serde(default)]
    pub data: Vec<ModelEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ModelEntry {
    pub id: String,
    #[serde(default)]
    pub object: String,
    #[serde(default)]
    pub created: i64,
    #[serde(default)]
    pub owned_by: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CopilotTokenResponse {
    pub token: String,
    #[serde(default)]
    pub expires_at: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GithubUser {
    pub login: String,
    #[serde(default)]
    pub avatar_url: String,
}
