//! Configuration file checks and in-place upgrades.
//!
//! Works on the raw YAML mapping rather than on `Config`, so that files written
//! by older releases (which fail strict deserialization) can still be
//! inspected and repaired.

use super::{CONFIG_VERSION, StoragePaths};
use crate::errors::{AppError, AppResult};
use serde_yaml::{Mapping, Value};
use std::fs;
use std::path::Path;

/// Keys every configuration must carry; a file missing one cannot be migrated.
const REQUIRED_KEYS: [&str; 9] = [
    "calendar_type",
    "calendar_look_ahead_hours",
    "calendar_look_back_hours",
    "focustime_event_name",
    "start_commands",
    "stop_commands",
    "dnd_profile_name",
    "set_event_reminder",
    "event_reminder_time_minutes",
];

/// Keys added after the first release, with the value a migration fills in.
fn optional_keys() -> Vec<(&'static str, Value)> {
    vec![
        ("version", Value::Number(CONFIG_VERSION.into())),
        ("show_notification", Value::Bool(true)),
    ]
}

fn read_mapping(path: &Path) -> AppResult<Mapping> {
    let content = fs::read_to_string(path)?;
    let yaml: Value = serde_yaml::from_str(&content)?;
    match yaml {
        Value::Mapping(map) => Ok(map),
        _ => Err(AppError::Config(format!(
            "{} does not contain a YAML mapping",
            path.display()
        ))),
    }
}

fn has_key(map: &Mapping, key: &str) -> bool {
    map.contains_key(Value::String(key.to_string()))
}

/// Report of a configuration check.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct ConfigCheck {
    pub missing_required: Vec<String>,
    pub missing_optional: Vec<String>,
}

impl ConfigCheck {
    pub fn is_complete(&self) -> bool {
        self.missing_required.is_empty() && self.missing_optional.is_empty()
    }
}

/// List the keys absent from the configuration file.
pub fn check_config_file(paths: &StoragePaths) -> AppResult<ConfigCheck> {
    let path = paths.config_file();
    if !path.exists() {
        return Err(AppError::ConfigMissing);
    }
    let map = read_mapping(&path)?;

    let missing_required = REQUIRED_KEYS
        .iter()
        .filter(|k| !has_key(&map, k))
        .map(|k| k.to_string())
        .collect();
    let missing_optional = optional_keys()
        .into_iter()
        .filter(|(k, _)| !has_key(&map, k))
        .map(|(k, _)| k.to_string())
        .collect();

    Ok(ConfigCheck {
        missing_required,
        missing_optional,
    })
}

/// Add missing optional keys with their defaults.
/// Returns:
///   Ok(true)  → config updated
///   Ok(false) → no change needed
pub fn migrate_config_file(paths: &StoragePaths) -> AppResult<bool> {
    let path = paths.config_file();
    if !path.exists() {
        return Err(AppError::ConfigMissing);
    }
    let mut map = read_mapping(&path)?;

    let missing: Vec<&str> = REQUIRED_KEYS
        .iter()
        .copied()
        .filter(|k| !has_key(&map, k))
        .collect();
    if !missing.is_empty() {
        return Err(AppError::Config(format!(
            "cannot migrate, required keys are missing: {}",
            missing.join(", ")
        )));
    }

    let mut changed = false;
    for (key, default) in optional_keys() {
        if !has_key(&map, key) {
            map.insert(Value::String(key.to_string()), default);
            changed = true;
        }
    }

    if changed {
        let serialized = serde_yaml::to_string(&Value::Mapping(map))?;
        fs::write(&path, serialized)?;
    }

    Ok(changed)
}
