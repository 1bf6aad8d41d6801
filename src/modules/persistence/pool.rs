use std::fs;
use std::sync::RwLock;

use once_cell::sync::Lazy;

use super::paths;
use crate::error::AppResult;
use crate::models::account::{generate_pool_key, PoolConfig};

static POOL_LOCK: Lazy<RwLock<()>> = Lazy::new(|| RwLock::new(()));

fn read_pool_config() -> PoolConfig {
    let Ok(path) = paths::pool_config_file() else {
        return PoolConfig::default();
    };
    let Ok(data) = fs::read_to_string(path) else {
        return PoolConfig::default();
    };
    if data.is_empty() || data == "{}" {
        return PoolConfig::default();
    }
    serde_json::from_str(&data).unwrap_or_default()
}

pub fn get_pool_config() -> PoolConfig {
    let _guard = POOL_LOCK.read().unwrap();
    read_pool_config()
}

pub fn update_pool_config(config: &PoolConfig) -> AppResult<()> {
    let _guard = POOL_LOCK.write().unwrap();
    let data = serde_json::to_string_pretty(config)?;
    fs::write(paths::pool_config_file()?, data)?;
    Ok(())
}

pub fn regenerate_pool_api_key() -> AppResult<String> {
    let _guard = POOL_LOCK.write().unwrap();
    let mut config = read_pool_config();
    config.api_key = generate_pool_key();
    let data = serde_json::to_string_pretty(&config)?;
    fs::write(paths::pool_config_file()?, data)?;
    Ok(config.api_key)
}
