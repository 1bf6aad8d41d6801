use std::fs;
use std::path::PathBuf;

use crate::error::{AppError, AppResult};

fn ensure_dir(path: &PathBuf) -> AppResult<()> {
    if !path.exists() {
        fs::create_dir_all(path)?;
    }
    Ok(())
}

pub fn data_dir() -> AppResult<PathBuf> {
    if let Ok(env_path) = std::env::var("COPILOT_RELAY_DATA_DIR") {
        if !env_path.trim().is_empty() {
            let dir = PathBuf::from(env_path);
            ensure_dir(&dir)?;
            return Ok(dir);
        }
    }
    if cfg!(test) {
        let dir = std::env::temp_dir().join(format!(".copilot-relay-test-{}", std::process::id()));
        ensure_dir(&dir)?;
        return Ok(dir);
    }

    let home = dirs::home_dir()
        .ok_or_else(|| AppError::Config("unable to resolve home directory".to_string()))?;
    let dir = home.join(".local").join("share").join("copilot-api");
    ensure_dir(&dir)?;
    Ok(dir)
}

pub fn accounts_file() -> AppResult<PathBuf> {
    Ok(data_dir()?.join("accounts.json"))
}

pub fn pool_config_file() -> AppResult<PathBuf> {
    Ok(data_dir()?.join("pool-config.json"))
}

pub fn admin_file() -> AppResult<PathBuf> {
    Ok(data_dir()?.join("admin.json"))
}

pub fn model_map_file() -> AppResult<PathBuf> {
    Ok(data_dir()?.join("model_map.json"))
}

/// Seed any missing store file with an empty object; every reader treats `{}`
/// as a fresh store.
pub fn ensure_files() -> AppResult<()> {
    for file in [
        accounts_file()?,
        pool_config_file()?,
        admin_file()?,
        model_map_file()?,
    ] {
        if !file.exists() {
            fs::write(&file, b"{}")?;
        }
    }
    Ok(())
}
