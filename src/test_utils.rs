#[cfg(test)]
use std::sync::{Mutex, MutexGuard, OnceLock};

#[cfg(test)]
fn global_env_lock() -> &'static Mutex<()> {
    static LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    LOCK.get_or_init(|| Mutex::new(()))
}

#[cfg(test)]
pub(crate) struct ScopedDataDir {
    _guard: MutexGuard<'static, ()>,
    original: Option<String>,
}

/// Point the persistence layer at a fresh per-test directory. Holds the global
/// env lock for the lifetime of the guard since the data dir is process-wide.
#[cfg(test)]
pub(crate) fn scoped_data_dir(tag: &str) -> ScopedDataDir {
    let guard = global_env_lock()
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner());

    let dir = std::env::temp_dir().join(format!(
        ".copilot-relay-test-{}-{}",
        std::process::id(),
        tag
    ));
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir).expect("create test data dir");

    let original = std::env::var("COPILOT_RELAY_DATA_DIR").ok();
    std::env::set_var("COPILOT_RELAY_DATA_DIR", &dir);

    ScopedDataDir {
        _guard: guard,
        original,
    }
}

#[cfg(test)]
impl Drop for ScopedDataDir {
    fn drop(&mut self) {
        if let Some(value) = self.original.as_deref() {
            std::env::set_var("COPILOT_RELAY_DATA_DIR", value);
        } else {
            std::env::remove_var("COPILOT_RELAY_DATA_DIR");
        }
    }
}
