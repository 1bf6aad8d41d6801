use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AccountKind {
    #[default]
    Individual,
    Business,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    pub id: String,
    pub name: String,
    pub github_token: String,
    #[serde(default)]
    pub account_type: AccountKind,
    pub api_key: String,
    pub enabled: bool,
    pub created_at: String,
    #[serde(default)]
    pub priority: i32,
}

impl Account {
    pub fn new(name: String, github_token: String, account_type: AccountKind) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name,
            github_token,
            account_type,
            api_key: generate_account_key(),
            enabled: true,
            created_at: chrono::Utc::now().to_rfc3339(),
            priority: 0,
        }
    }
}

pub fn generate_account_key() -> String {
    format!("sk-{}", Uuid::new_v4())
}

pub fn generate_pool_key() -> String {
    format!("sk-pool-{}", Uuid::new_v4())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum PoolStrategy {
    #[default]
    RoundRobin,
    Priority,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct PoolConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub strategy: PoolStrategy,
    #[serde(default)]
    pub api_key: String,
}

/// At most one mapping per `copilot_id`; a display id without a mapping
/// resolves to itself in both directions.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ModelMapping {
    pub copilot_id: String,
    pub display_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_account_defaults() {
        let account = Account::new(
            "work".to_string(),
            "ghu_token".to_string(),
            AccountKind::Business,
        );
        assert!(account.enabled);
        assert_eq!(account.priority, 0);
        assert!(account.api_key.starts_with("sk-"));
        assert_ne!(account.id, account.api_key);
    }

    #[test]
    fn test_pool_strategy_wire_format() {
        let cfg: PoolConfig =
            serde_json::from_str(r#"{"enabled":true,"strategy":"priority","apiKey":"sk-pool-x"}"#)
                .unwrap();
        assert_eq!(cfg.strategy, PoolStrategy::Priority);

        let out = serde_json::to_value(&PoolConfig::default()).unwrap();
        assert_eq!(out["strategy"], "round-robin");
    }

    #[test]
    fn test_account_kind_default_on_missing_field() {
        let account: Account = serde_json::from_str(
            r#"{"id":"1","name":"a","githubToken":"t","apiKey":"sk-1","enabled":true,"createdAt":"now"}"#,
        )
        .unwrap();
        assert_eq!(account.account_type, AccountKind::Individual);
    }
}
