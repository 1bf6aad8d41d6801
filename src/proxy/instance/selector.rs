use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};

use super::InstanceManager;
use crate::error::AppResult;
use crate::models::{Account, PoolStrategy};
use crate::modules::persistence::accounts;

static ROUND_ROBIN: AtomicUsize = AtomicUsize::new(0);

/// Pick an enabled account whose instance is running, skipping any id in
/// `exclude`. Returns `None` when nothing qualifies; the dispatcher surfaces
/// that as 503.
pub fn select_account(
    manager: &InstanceManager,
    strategy: PoolStrategy,
    exclude: Option<&HashSet<String>>,
) -> AppResult<Option<Account>> {
    let enabled = accounts::get_enabled_accounts()?;

    let available: Vec<Account> = enabled
        .into_iter()
        .filter(|a| !exclude.map(|e| e.contains(&a.id)).unwrap_or(false))
        .filter(|a| manager.is_running(&a.id))
        .collect();

    if available.is_empty() {
        return Ok(None);
    }

    let selected = match strategy {
        PoolStrategy::Priority => select_by_priority(&available),
        PoolStrategy::RoundRobin => select_round_robin(&available),
    };
    Ok(Some(selected))
}

fn select_round_robin(available: &[Account]) -> Account {
    let index = ROUND_ROBIN.fetch_add(1, Ordering::Relaxed);
    available[index % available.len()].clone()
}

/// Numerically highest priority wins; ties keep the earliest position.
fn select_by_priority(available: &[Account]) -> Account {
    let mut best = &available[0];
    for account in &available[1..] {
        if account.priority > best.priority {
            best = account;
        }
    }
    best.clone()
}
