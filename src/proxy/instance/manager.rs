use std::collections::HashMap;
use std::sync::{Arc, RwLock, Weak};
use std::time::Duration;

use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::constants::fetch_editor_version;
use crate::error::{AppError, AppResult};
use crate::models::{Account, AccountKind, GithubUser, ModelsResponse};
use crate::proxy::upstream::client::UpstreamContext;
use crate::proxy::upstream::UpstreamClient;

const TOKEN_REFRESH_INTERVAL: Duration = Duration::from_secs(25 * 60);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum InstanceStatus {
    Running,
    Stopped,
    Error,
}

/// Mutable per-instance runtime. The session token and model catalog are the
/// only fields written after construction (by the refresh loop).
#[derive(Debug)]
pub struct RuntimeState {
    pub github_token: String,
    pub account_kind: AccountKind,
    pub copilot_token: String,
    pub token_expires_at: i64,
    pub editor_version: String,
    pub models: Option<ModelsResponse>,
}

impl RuntimeState {
    pub fn upstream_context(&self) -> UpstreamContext {
        UpstreamContext {
            account_kind: self.account_kind,
            copilot_token: self.copilot_token.clone(),
            editor_version: self.editor_version.clone(),
        }
    }
}

struct ProxyInstance {
    account: Account,
    state: Arc<tokio::sync::RwLock<RuntimeState>>,
    status: InstanceStatus,
    error: Option<String>,
    cancel: CancellationToken,
}

struct ManagerInner {
    // One entry per account id; status transitions are serialized by this lock.
    instances: RwLock<HashMap<String, ProxyInstance>>,
    upstream: Arc<UpstreamClient>,
}

impl ManagerInner {
    fn set_error(&self, account_id: &str, message: String) {
        let mut instances = self.instances.write().unwrap();
        if let Some(instance) = instances.get_mut(account_id) {
            instance.status = InstanceStatus::Error;
            instance.error = Some(message);
        }
    }

    fn clear_error(&self, account_id: &str) {
        let mut instances = self.instances.write().unwrap();
        if let Some(instance) = instances.get_mut(account_id) {
            if instance.status == InstanceStatus::Error {
                instance.status = InstanceStatus::Running;
                instance.error = None;
            }
        }
    }
}

/// Registry of per-account instances. Cheap to clone; all clones share the
/// same registry.
#[derive(Clone)]
pub struct InstanceManager {
    inner: Arc<ManagerInner>,
}

impl InstanceManager {
    pub fn new(upstream: Arc<UpstreamClient>) -> Self {
        Self {
            inner: Arc::new(ManagerInner {
                instances: RwLock::new(HashMap::new()),
                upstream,
            }),
        }
    }

    pub fn upstream(&self) -> &Arc<UpstreamClient> {
        &self.inner.upstream
    }

    /// Idempotent: an already-running instance for this account is left alone.
    /// A failed session-token exchange installs the instance in `error` state
    /// and surfaces the failure; model-catalog fetch stays best-effort.
    pub async fn start(&self, account: Account) -> AppResult<()> {
        {
            let instances = self.inner.instances.read().unwrap();
            if let Some(instance) = instances.get(&account.id) {
                if instance.status == InstanceStatus::Running {
                    return Ok(());
                }
            }
        }

        let editor_version = tokio::task::spawn_blocking(fetch_editor_version)
            .await
            .map_err(|e| AppError::Upstream(format!("editor version probe panicked: {}", e)))?;

        let mut runtime = RuntimeState {
            github_token: account.github_token.clone(),
            account_kind: account.account_type,
            copilot_token: String::new(),
            token_expires_at: 0,
            editor_version,
            models: None,
        };

        match self
            .inner
            .upstream
            .exchange_copilot_token(&runtime.github_token)
            .await
        {
            Ok(token) => {
                runtime.copilot_token = token.token;
                runtime.token_expires_at = token.expires_at;
            }
            Err(e) => {
                let message = e.to_string();
                let mut instances = self.inner.instances.write().unwrap();
                instances.insert(
                    account.id.clone(),
                    ProxyInstance {
                        account,
                        state: Arc::new(tokio::sync::RwLock::new(runtime)),
                        status: InstanceStatus::Error,
                        error: Some(message),
                        cancel: CancellationToken::new(),
                    },
                );
                return Err(e);
            }
        }

        match self
            .inner
            .upstream
            .fetch_models(&runtime.upstream_context())
            .await
        {
            Ok(models) => runtime.models = Some(models),
            Err(e) => warn!("Failed to fetch models for account {}: {}", account.name, e),
        }

        let state = Arc::new(tokio::sync::RwLock::new(runtime));
        let cancel = CancellationToken::new();
        {
            let mut instances = self.inner.instances.write().unwrap();
            instances.insert(
                account.id.clone(),
                ProxyInstance {
                    account: account.clone(),
                    state: state.clone(),
                    status: InstanceStatus::Running,
                    error: None,
                    cancel: cancel.clone(),
                },
            );
        }

        tokio::spawn(token_refresh_loop(
            Arc::downgrade(&self.inner),
            account.id.clone(),
            account.name.clone(),
            state,
            cancel,
        ));

        info!("Instance started for account: {}", account.name);
        Ok(())
    }

    /// Signals the refresh loop and marks the instance stopped. Safe on
    /// unknown ids.
    pub fn stop(&self, account_id: &str) {
        let mut instances = self.inner.instances.write().unwrap();
        let Some(instance) = instances.get_mut(account_id) else {
            return;
        };
        if instance.status == InstanceStatus::Running {
            instance.cancel.cancel();
        }
        instance.status = InstanceStatus::Stopped;
        info!("Instance stopped for account: {}", instance.account.name);
    }

    /// Removes the instance entirely (account deletion).
    pub fn remove(&self, account_id: &str) {
        let mut instances = self.inner.instances.write().unwrap();
        if let Some(instance) = instances.remove(account_id) {
            instance.cancel.cancel();
        }
    }

    pub fn status(&self, account_id: &str) -> InstanceStatus {
        let instances = self.inner.instances.read().unwrap();
        instances
            .get(account_id)
            .map(|i| i.status)
            .unwrap_or(InstanceStatus::Stopped)
    }

    pub fn error(&self, account_id: &str) -> Option<String> {
        let instances = self.inner.instances.read().unwrap();
        instances.get(account_id).and_then(|i| i.error.clone())
    }

    pub fn is_running(&self, account_id: &str) -> bool {
        self.status(account_id) == InstanceStatus::Running
    }

    /// Read-only view of the instance runtime, regardless of status.
    pub fn state(&self, account_id: &str) -> Option<Arc<tokio::sync::RwLock<RuntimeState>>> {
        let instances = self.inner.instances.read().unwrap();
        instances.get(account_id).map(|i| i.state.clone())
    }

    pub async fn user(&self, account_id: &str) -> AppResult<GithubUser> {
        let state = self
            .state(account_id)
            .ok_or_else(|| AppError::Account("instance not found".to_string()))?;
        let github_token = state.read().await.github_token.clone();
        self.inner.upstream.fetch_user(&github_token).await
    }

    pub async fn usage(&self, account_id: &str) -> AppResult<serde_json::Value> {
        let state = self
            .state(account_id)
            .ok_or_else(|| AppError::Account("instance not running".to_string()))?;
        let github_token = state.read().await.github_token.clone();
        self.inner.upstream.fetch_usage(&github_token).await
    }

    #[cfg(test)]
    pub(crate) fn insert_running_for_test(&self, account: Account) {
        let runtime = RuntimeState {
            github_token: account.github_token.clone(),
            account_kind: account.account_type,
            copilot_token: "test-token".to_string(),
            token_expires_at: 0,
            editor_version: "1.104.3".to_string(),
            models: None,
        };
        let mut instances = self.inner.instances.write().unwrap();
        instances.insert(
            account.id.clone(),
            ProxyInstance {
                account,
                state: Arc::new(tokio::sync::RwLock::new(runtime)),
                status: InstanceStatus::Running,
                error: None,
                cancel: CancellationToken::new(),
            },
        );
    }
}

/// Copilot session tokens live ~30 minutes; re-exchange every 25. Refresh
/// failure flags the instance but keeps the loop alive so a later tick can
/// recover it. The model catalog rides along opportunistically. The loop holds
/// only a weak handle to the registry and its own state Arc, so a dropped
/// manager tears it down.
async fn token_refresh_loop(
    manager: Weak<ManagerInner>,
    account_id: String,
    account_name: String,
    state: Arc<tokio::sync::RwLock<RuntimeState>>,
    cancel: CancellationToken,
) {
    let mut interval = tokio::time::interval(TOKEN_REFRESH_INTERVAL);
    // Consume the immediate first tick; the token from start() is fresh.
    interval.tick().await;

    loop {
        tokio::select! {
            _ = cancel.cancelled() => return,
            _ = interval.tick() => {}
        }

        let Some(manager) = manager.upgrade() else {
            return;
        };

        let github_token = state.read().await.github_token.clone();
        match manager.upstream.exchange_copilot_token(&github_token).await {
            Ok(token) => {
                {
                    let mut runtime = state.write().await;
                    runtime.copilot_token = token.token;
                    runtime.token_expires_at = token.expires_at;
                }
                manager.clear_error(&account_id);
            }
            Err(e) => {
                warn!("Token refresh failed for {}: {}", account_name, e);
                manager.set_error(&account_id, e.to_string());
                continue;
            }
        }

        let context = state.read().await.upstream_context();
        match manager.upstream.fetch_models(&context).await {
            Ok(models) => {
                state.write().await.models = Some(models);
            }
            Err(e) => warn!("Models refresh failed for {}: {}", account_name, e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_manager() -> InstanceManager {
        InstanceManager::new(Arc::new(UpstreamClient::new().unwrap()))
    }

    fn account(id: &str) -> Account {
        Account {
            id: id.to_string(),
            name: format!("acct-{}", id),
            github_token: "ghu_test".to_string(),
            account_type: AccountKind::Individual,
            api_key: format!("sk-{}", id),
            enabled: true,
            created_at: "2024-01-01T00:00:00Z".to_string(),
            priority: 0,
        }
    }

    #[tokio::test]
    async fn test_unknown_instance_reads_as_stopped() {
        let manager = test_manager();
        assert_eq!(manager.status("nope"), InstanceStatus::Stopped);
        assert!(manager.error("nope").is_none());
        assert!(manager.state("nope").is_none());
        // stop on a nonexistent id is a no-op, not a panic
        manager.stop("nope");
    }

    #[tokio::test]
    async fn test_stop_transitions_running_instance() {
        let manager = test_manager();
        manager.insert_running_for_test(account("a1"));
        assert!(manager.is_running("a1"));

        manager.stop("a1");
        assert_eq!(manager.status("a1"), InstanceStatus::Stopped);
        // runtime state stays readable after stop
        assert!(manager.state("a1").is_some());
    }

    #[tokio::test]
    async fn test_error_set_and_cleared() {
        let manager = test_manager();
        manager.insert_running_for_test(account("a2"));

        manager
            .inner
            .set_error("a2", "token exchange failed".to_string());
        assert_eq!(manager.status("a2"), InstanceStatus::Error);
        assert_eq!(manager.error("a2").as_deref(), Some("token exchange failed"));

        manager.inner.clear_error("a2");
        assert!(manager.is_running("a2"));
        assert!(manager.error("a2").is_none());

        // clear_error only resurrects errored instances, never stopped ones
        manager.stop("a2");
        manager.inner.clear_error("a2");
        assert_eq!(manager.status("a2"), InstanceStatus::Stopped);
    }

    #[tokio::test]
    async fn test_remove_drops_instance() {
        let manager = test_manager();
        manager.insert_running_for_test(account("a3"));
        manager.remove("a3");
        assert!(manager.state("a3").is_none());
    }

    #[tokio::test]
    async fn test_clones_share_one_registry() {
        let manager = test_manager();
        let view = manager.clone();
        manager.insert_running_for_test(account("a4"));
        assert!(view.is_running("a4"));
    }
}
