use std::fs;
use std::sync::RwLock;

use dashmap::DashMap;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::paths;
use crate::error::{AppError, AppResult};

const SESSION_TTL_SECS: i64 = 7 * 24 * 60 * 60;

static ADMIN_LOCK: Lazy<RwLock<()>> = Lazy::new(|| RwLock::new(()));
// Session token → unix expiry. Expiry is checked lazily on lookup.
static SESSIONS: Lazy<DashMap<String, i64>> = Lazy::new(DashMap::new);

#[derive(Debug, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct AdminData {
    #[serde(default)]
    password_hash: String,
}

fn read_admin() -> AdminData {
    let Ok(path) = paths::admin_file() else {
        return AdminData::default();
    };
    let Ok(data) = fs::read_to_string(path) else {
        return AdminData::default();
    };
    if data.is_empty() || data == "{}" {
        return AdminData::default();
    }
    serde_json::from_str(&data).unwrap_or_default()
}

pub fn is_setup_required() -> bool {
    let _guard = ADMIN_LOCK.read().unwrap();
    read_admin().password_hash.is_empty()
}

pub fn setup_admin(password: &str) -> AppResult<()> {
    let _guard = ADMIN_LOCK.write().unwrap();
    let hash = bcrypt::hash(password, bcrypt::DEFAULT_COST)
        .map_err(|e| AppError::Auth(format!("failed to hash password: {}", e)))?;
    let data = serde_json::to_string_pretty(&AdminData {
        password_hash: hash,
    })?;
    fs::write(paths::admin_file()?, data)?;
    Ok(())
}

pub fn login_admin(password: &str) -> AppResult<String> {
    let admin = {
        let _guard = ADMIN_LOCK.read().unwrap();
        read_admin()
    };

    let valid = bcrypt::verify(password, &admin.password_hash)
        .map_err(|e| AppError::Auth(format!("failed to verify password: {}", e)))?;
    if !valid {
        return Err(AppError::Auth("invalid password".to_string()));
    }

    let token = Uuid::new_v4().to_string();
    SESSIONS.insert(
        token.clone(),
        chrono::Utc::now().timestamp() + SESSION_TTL_SECS,
    );
    Ok(token)
}

pub fn validate_session(token: &str) -> bool {
    let Some(expires_at) = SESSIONS.get(token).map(|e| *e) else {
        return false;
    };
    if chrono::Utc::now().timestamp() > expires_at {
        SESSIONS.remove(token);
        return false;
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::scoped_data_dir;

    #[test]
    fn test_setup_login_validate_flow() {
        let _dir = scoped_data_dir("admin-flow");
        paths::ensure_files().unwrap();

        assert!(is_setup_required());
        setup_admin("hunter2").unwrap();
        assert!(!is_setup_required());

        assert!(login_admin("wrong").is_err());
        let token = login_admin("hunter2").unwrap();
        assert!(validate_session(&token));
        assert!(!validate_session("not-a-session"));
    }

    #[test]
    fn test_expired_session_is_evicted() {
        let token = Uuid::new_v4().to_string();
        SESSIONS.insert(token.clone(), chrono::Utc::now().timestamp() - 1);
        assert!(!validate_session(&token));
        assert!(!SESSIONS.contains_key(&token));
    }
}
