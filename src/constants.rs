use regex::Regex;
use std::sync::LazyLock;

pub const COPILOT_PLUGIN_VERSION: &str = "0.26.7";
pub const GITHUB_CLIENT_ID: &str = "Iv1.b507a08c87ecfe98";

pub const COPILOT_CHAT_URL: &str = "https://api.individual.githubcopilot.com";
pub const COPILOT_BUSINESS_CHAT_URL: &str = "https://api.business.githubcopilot.com";

pub const GITHUB_TOKEN_EXCHANGE_URL: &str = "https://api.github.com/copilot_internal/v2/token";
pub const GITHUB_USAGE_URL: &str = "https://api.github.com/copilot_internal/user/usage";
pub const GITHUB_DEVICE_CODE_URL: &str = "https://github.com/login/device/code";
pub const GITHUB_ACCESS_TOKEN_URL: &str = "https://github.com/login/oauth/access_token";
pub const GITHUB_USER_URL: &str = "https://api.github.com/user";

const EDITOR_VERSION_URL: &str =
    "https://aur.archlinux.org/cgit/aur.git/plain/PKGBUILD?h=visual-studio-code-bin";
const FALLBACK_EDITOR_VERSION: &str = "1.104.3";

static PKGVER_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"pkgver=(\d+\.\d+\.\d+)").expect("Invalid pkgver regex"));

fn parse_editor_version(text: &str) -> Option<String> {
    PKGVER_REGEX
        .captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

/// Probe the published VS Code version. Falls back to a pinned version on any
/// failure; the upstream only uses it to shape the `Editor-Version` header.
pub fn fetch_editor_version() -> String {
    let handle = std::thread::Builder::new()
        .name("editor-version-fetch".to_string())
        .spawn(|| {
            let client = reqwest::blocking::Client::builder()
                .timeout(std::time::Duration::from_secs(5))
                .build()
                .ok()?;

            let response = client.get(EDITOR_VERSION_URL).send().ok()?;
            let text = response.text().ok()?;
            parse_editor_version(&text)
        });

    match handle {
        Ok(h) => h
            .join()
            .ok()
            .flatten()
            .unwrap_or_else(|| FALLBACK_EDITOR_VERSION.to_string()),
        Err(e) => {
            tracing::debug!("Failed to spawn editor-version-fetch thread: {}", e);
            FALLBACK_EDITOR_VERSION.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_editor_version_from_pkgbuild() {
        let text = "pkgname=visual-studio-code-bin\npkgver=1.104.3\npkgrel=1";
        assert_eq!(parse_editor_version(text), Some("1.104.3".to_string()));
    }

    #[test]
    fn test_parse_editor_version_ignores_other_versions() {
        let text = "electronver=30.1.2\npkgver=1.99.0";
        assert_eq!(parse_editor_version(text), Some("1.99.0".to_string()));
    }

    #[test]
    fn test_parse_editor_version_invalid() {
        assert_eq!(parse_editor_version("no version here"), None);
        assert_eq!(parse_editor_version(""), None);
        assert_eq!(parse_editor_version("pkgver=1.2"), None);
    }
}
