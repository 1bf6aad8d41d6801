use std::fs;
use std::sync::RwLock;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use super::paths;
use crate::error::AppResult;
use crate::models::account::ModelMapping;

static MODEL_MAP_LOCK: Lazy<RwLock<()>> = Lazy::new(|| RwLock::new(()));

#[derive(Debug, Serialize, Deserialize, Default)]
struct ModelMapStore {
    #[serde(default)]
    mappings: Vec<ModelMapping>,
}

fn read_model_map() -> ModelMapStore {
    let Ok(path) = paths::model_map_file() else {
        return ModelMapStore::default();
    };
    let Ok(data) = fs::read_to_string(path) else {
        return ModelMapStore::default();
    };
    if data.is_empty() || data == "{}" {
        return ModelMapStore::default();
    }
    serde_json::from_str(&data).unwrap_or_default()
}

fn write_model_map(store: &ModelMapStore) -> AppResult<()> {
    let data = serde_json::to_string_pretty(store)?;
    fs::write(paths::model_map_file()?, data)?;
    Ok(())
}

pub fn get_model_mappings() -> Vec<ModelMapping> {
    let _guard = MODEL_MAP_LOCK.read().unwrap();
    read_model_map().mappings
}

pub fn set_model_mappings(mappings: Vec<ModelMapping>) -> AppResult<()> {
    let _guard = MODEL_MAP_LOCK.write().unwrap();
    write_model_map(&ModelMapStore { mappings })
}

/// Insert or replace; uniqueness is keyed on `copilot_id`.
pub fn add_model_mapping(mapping: ModelMapping) -> AppResult<()> {
    let _guard = MODEL_MAP_LOCK.write().unwrap();
    let mut store = read_model_map();
    match store
        .mappings
        .iter_mut()
        .find(|m| m.copilot_id == mapping.copilot_id)
    {
        Some(existing) => *existing = mapping,
        None => store.mappings.push(mapping),
    }
    write_model_map(&store)
}

pub fn delete_model_mapping(copilot_id: &str) -> AppResult<()> {
    let _guard = MODEL_MAP_LOCK.write().unwrap();
    let mut store = read_model_map();
    store.mappings.retain(|m| m.copilot_id != copilot_id);
    write_model_map(&store)
}

/// Display id → upstream id; unmapped ids pass through unchanged.
pub fn to_copilot_id(display_id: &str) -> String {
    let _guard = MODEL_MAP_LOCK.read().unwrap();
    read_model_map()
        .mappings
        .into_iter()
        .find(|m| m.display_id == display_id)
        .map(|m| m.copilot_id)
        .unwrap_or_else(|| display_id.to_string())
}

/// Upstream id → display id; unmapped ids pass through unchanged.
pub fn to_display_id(copilot_id: &str) -> String {
    let _guard = MODEL_MAP_LOCK.read().unwrap();
    read_model_map()
        .mappings
        .into_iter()
        .find(|m| m.copilot_id == copilot_id)
        .map(|m| m.display_id)
        .unwrap_or_else(|| copilot_id.to_string())
}
