use reqwest::header::{self, HeaderMap, HeaderName, HeaderValue};

use crate::constants::{COPILOT_BUSINESS_CHAT_URL, COPILOT_CHAT_URL, COPILOT_PLUGIN_VERSION};
use crate::models::AccountKind;

pub fn copilot_base_url(kind: AccountKind) -> &'static str {
    match kind {
        AccountKind::Business => COPILOT_BUSINESS_CHAT_URL,
        AccountKind::Individual => COPILOT_CHAT_URL,
    }
}

pub struct CopilotHeaderContext<'a> {
    pub copilot_token: &'a str,
    pub editor_version: &'a str,
    pub vision: bool,
}

/// Headers for Copilot chat/embeddings/model calls. The editor identity set is
/// fixed; only the bearer token and the vision pair vary per request.
pub fn copilot_headers(context: &CopilotHeaderContext<'_>) -> HeaderMap {
    let mut headers = HeaderMap::new();

    if let Ok(value) = HeaderValue::from_str(&format!("Bearer {}", context.copilot_token)) {
        headers.insert(header::AUTHORIZATION, value);
    }
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/json"),
    );
    headers.insert(header::ACCEPT, HeaderValue::from_static("application/json"));
    headers.insert(
        HeaderName::from_static("copilot-integration-id"),
        HeaderValue::from_static("vscode-chat"),
    );
    insert_header(
        &mut headers,
        "editor-version",
        &format!("vscode/{}", context.editor_version),
    );
    insert_header(
        &mut headers,
        "editor-plugin-version",
        &format!("copilot-chat/{}", COPILOT_PLUGIN_VERSION),
    );
    insert_header(
        &mut headers,
        "user-agent",
        &format!("GitHubCopilotChat/{}", COPILOT_PLUGIN_VERSION),
    );
    headers.insert(
        HeaderName::from_static("openai-intent"),
        HeaderValue::from_static("conversation-panel"),
    );

    if context.vision {
        headers.insert(
            HeaderName::from_static("copilot-vision-enabled"),
            HeaderValue::from_static("true"),
        );
        headers.insert(
            HeaderName::from_static("copilot-vision-request"),
            HeaderValue::from_static("true"),
        );
    }

    headers
}

/// Headers for GitHub identity-provider calls; these carry the persistent
/// account credential in `token` form, not the short-lived session bearer.
pub fn github_headers(github_token: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    if let Ok(value) = HeaderValue::from_str(&format!("token {}", github_token)) {
        headers.insert(header::AUTHORIZATION, value);
    }
    headers.insert(header::ACCEPT, HeaderValue::from_static("application/json"));
    insert_header(
        &mut headers,
        "user-agent",
        &format!("GitHubCopilotChat/{}", COPILOT_PLUGIN_VERSION),
    );
    headers
}

fn insert_header(headers: &mut HeaderMap, name: &'static str, value: &str) {
    match HeaderValue::from_str(value) {
        Ok(v) => {
            headers.insert(HeaderName::from_static(name), v);
        }
        Err(e) => {
            tracing::warn!("Invalid {} header value skipped: {}", name, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context(vision: bool) -> CopilotHeaderContext<'static> {
        CopilotHeaderContext {
            copilot_token: "tid=abc",
            editor_version: "1.104.3",
            vision,
        }
    }

    #[test]
    fn test_copilot_headers_baseline() {
        let headers = copilot_headers(&context(false));

        assert_eq!(
            headers
                .get(header::AUTHORIZATION)
                .and_then(|v| v.to_str().ok()),
            Some("Bearer tid=abc")
        );
        assert_eq!(
            headers
                .get("copilot-integration-id")
                .and_then(|v| v.to_str().ok()),
            Some("vscode-chat")
        );
        assert_eq!(
            headers.get("editor-version").and_then(|v| v.to_str().ok()),
            Some("vscode/1.104.3")
        );
        assert_eq!(
            headers
                .get("editor-plugin-version")
                .and_then(|v| v.to_str().ok()),
            Some("copilot-chat/0.26.7")
        );
        assert_eq!(
            headers.get("openai-intent").and_then(|v| v.to_str().ok()),
            Some("conversation-panel")
        );
        assert!(headers.get("copilot-vision-enabled").is_none());
        assert!(headers.get("copilot-vision-request").is_none());
    }

    #[test]
    fn test_vision_pair_set_only_on_vision_requests() {
        let headers = copilot_headers(&context(true));
        assert_eq!(
            headers
                .get("copilot-vision-enabled")
                .and_then(|v| v.to_str().ok()),
            Some("true")
        );
        assert_eq!(
            headers
                .get("copilot-vision-request")
                .and_then(|v| v.to_str().ok()),
            Some("true")
        );
    }

    #[test]
    fn test_github_headers_use_token_scheme() {
        let headers = github_headers("ghu_xyz");
        assert_eq!(
            headers
                .get(header::AUTHORIZATION)
                .and_then(|v| v.to_str().ok()),
            Some("token ghu_xyz")
        );
        assert!(headers.get("copilot-integration-id").is_none());
    }

    #[test]
    fn test_base_url_by_account_kind() {
        assert_eq!(
            copilot_base_url(AccountKind::Individual),
            "https://api.individual.githubcopilot.com"
        );
        assert_eq!(
            copilot_base_url(AccountKind::Business),
            "https://api.business.githubcopilot.com"
        );
    }
}
