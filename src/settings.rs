use serde_json::{json, Map, Value};
use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

const SETTINGS_SCHEMA_VERSION: i64 = 1;
const DATA_DIR_ENV: &str = "BUGTRACK_DATA_DIR";
const DEFAULT_DATA_DIR: &str = ".bugtrack";
const DEFAULT_BIND_ADDRESS: &str = "127.0.0.1:3001";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageKind {
    Sqlite,
    Memory,
}

#[derive(Debug, Clone)]
pub struct EffectiveSettings {
    pub bind_address: SocketAddr,
    pub storage: StorageKind,
    pub database_path: PathBuf,
    pub log_level: String,
    pub debug_log_capacity: usize,
    pub allow_direct_resolve: bool,
}

/// Directory holding `settings.json` and the database.
pub fn data_dir() -> PathBuf {
    std::env::var_os(DATA_DIR_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR))
}

const LOG_LEVELS: &[&str] = &["error", "warn", "info", "debug", "trace"];

/// Log level from `settings.json`, read without side effects so logging can
/// start before the full load (which may warn about the file).
pub fn configured_log_level(data_dir: &Path) -> String {
    fs::read_to_string(settings_path(data_dir))
        .ok()
        .and_then(|raw| serde_json::from_str::<Value>(&raw).ok())
        .and_then(|settings| settings.get("logLevel").and_then(Value::as_str).map(str::to_string))
        .filter(|level| LOG_LEVELS.contains(&level.as_str()))
        .unwrap_or_else(|| "info".to_string())
}

pub fn load_effective_settings(data_dir: &Path) -> Result<EffectiveSettings, String> {
    let settings = load_settings_from_disk(data_dir)?;

    // Sanitized on load, so the fallbacks below only guard hand edits made
    // while the process is running.
    let bind_address = settings["bindAddress"]
        .as_str()
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| "Invalid bindAddress in settings.json".to_string())?;

    let storage = match settings["storage"].as_str() {
        Some("memory") => StorageKind::Memory,
        _ => StorageKind::Sqlite,
    };

    let database_file = settings["databaseFile"].as_str().unwrap_or("state.db");

    Ok(EffectiveSettings {
        bind_address,
        storage,
        database_path: data_dir.join(database_file),
        log_level: settings["logLevel"].as_str().unwrap_or("info").to_string(),
        debug_log_capacity: settings["debugLogCapacity"].as_u64().unwrap_or(200) as usize,
        allow_direct_resolve: settings["allowDirectResolve"].as_bool().unwrap_or(false),
    })
}

pub fn load_settings_from_disk(data_dir: &Path) -> Result<Value, String> {
    let path = settings_path(data_dir);
    ensure_data_dir(data_dir)?;

    let original = if path.exists() {
        let raw = fs::read_to_string(&path)
            .map_err(|e| format!("Failed to read settings.json: {e}"))?;
        serde_json::from_str::<Value>(&raw).unwrap_or_else(|e| {
            log::warn!("settings.json is not valid JSON, using defaults: {e}");
            json!({})
        })
    } else {
        json!({})
    };

    let migrated = migrate_settings(original.clone());
    if migrated != original || !path.exists() {
        write_settings_file(&path, &migrated)?;
    }

    Ok(migrated)
}

pub fn save_settings_to_disk(data_dir: &Path, settings: Value) -> Result<Value, String> {
    let path = settings_path(data_dir);
    ensure_data_dir(data_dir)?;

    let mut merged = load_settings_from_disk(data_dir).unwrap_or_else(|_| default_settings());
    merge_settings(&mut merged, &settings);

    let migrated = migrate_settings(merged);
    write_settings_file(&path, &migrated)?;
    log::info!("saved settings to {}", path.display());
    Ok(migrated)
}

fn settings_path(data_dir: &Path) -> PathBuf {
    data_dir.join("settings.json")
}

fn ensure_data_dir(data_dir: &Path) -> Result<(), String> {
    fs::create_dir_all(data_dir)
        .map_err(|e| format!("Failed to create data directory {}: {e}", data_dir.display()))
}

fn write_settings_file(path: &Path, settings: &Value) -> Result<(), String> {
    let raw = serde_json::to_string_pretty(settings)
        .map_err(|e| format!("Failed to serialize settings: {e}"))?;
    fs::write(path, raw)
        .map_err(|e| format!("Failed to write settings.json: {e}"))
}

fn migrate_settings(input: Value) -> Value {
    let defaults = default_settings();
    let mut out = match input {
        Value::Object(map) => Value::Object(map),
        _ => Value::Object(Map::new()),
    };

    deep_merge_defaults(&mut out, &defaults);
    sanitize_settings(&mut out);
    if let Some(obj) = out.as_object_mut() {
        obj.insert("schema_version".to_string(), json!(SETTINGS_SCHEMA_VERSION));
    }

    out
}

fn default_settings() -> Value {
    json!({
        "schema_version": SETTINGS_SCHEMA_VERSION,
        "bindAddress": DEFAULT_BIND_ADDRESS,
        "storage": "sqlite",
        "databaseFile": "state.db",
        "logLevel": "info",
        "debugLogCapacity": 200,
        "allowDirectResolve": false
    })
}

fn deep_merge_defaults(target: &mut Value, defaults: &Value) {
    let (Some(target_obj), Some(default_obj)) = (target.as_object_mut(), defaults.as_object()) else {
        return;
    };

    for (key, default_value) in default_obj {
        match target_obj.get_mut(key) {
            Some(existing) => {
                if existing.is_object() && default_value.is_object() {
                    deep_merge_defaults(existing, default_value);
                }
            }
            None => {
                target_obj.insert(key.clone(), default_value.clone());
            }
        }
    }
}

fn merge_settings(target: &mut Value, incoming: &Value) {
    match (target, incoming) {
        (Value::Object(target_obj), Value::Object(incoming_obj)) => {
            for (key, value) in incoming_obj {
                if let Some(existing) = target_obj.get_mut(key) {
                    merge_settings(existing, value);
                } else {
                    target_obj.insert(key.clone(), value.clone());
                }
            }
        }
        (target_slot, incoming_value) => {
            *target_slot = incoming_value.clone();
        }
    }
}

fn sanitize_settings(settings: &mut Value) {
    let Some(obj) = settings.as_object_mut() else {
        return;
    };

    clamp_u64(obj, "debugLogCapacity", 10, 5000, 200);

    sanitize_enum(obj, "storage", &["sqlite", "memory"], "sqlite");
    sanitize_enum(obj, "logLevel", LOG_LEVELS, "info");

    ensure_bool(obj, "allowDirectResolve", false);

    let bind_ok = obj
        .get("bindAddress")
        .and_then(Value::as_str)
        .is_some_and(|s| s.parse::<SocketAddr>().is_ok());
    if !bind_ok {
        obj.insert("bindAddress".to_string(), json!(DEFAULT_BIND_ADDRESS));
    }

    // The database lives inside the data directory.
    let file_ok = obj
        .get("databaseFile")
        .and_then(Value::as_str)
        .is_some_and(|s| !s.is_empty() && !s.contains(['/', '\\']) && s != "..");
    if !file_ok {
        obj.insert("databaseFile".to_string(), json!("state.db"));
    }
}

fn clamp_u64(map: &mut Map<String, Value>, key: &str, min: u64, max: u64, default: u64) {
    let raw = map.get(key).and_then(Value::as_u64).unwrap_or(default);
    map.insert(key.to_string(), json!(raw.clamp(min, max)));
}

fn sanitize_enum(map: &mut Map<String, Value>, key: &str, allowed: &[&str], default: &str) {
    let valid = map
        .get(key)
        .and_then(Value::as_str)
        .filter(|value| allowed.contains(value))
        .unwrap_or(default);
    map.insert(key.to_string(), json!(valid));
}

fn ensure_bool(map: &mut Map<String, Value>, key: &str, default: bool) {
    let value = map.get(key).and_then(Value::as_bool).unwrap_or(default);
    map.insert(key.to_string(), json!(value));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fills_missing_keys_and_stamps_version() {
        let migrated = migrate_settings(json!({ "storage": "memory" }));

        assert_eq!(migrated["storage"], json!("memory"));
        assert_eq!(migrated["bindAddress"], json!(DEFAULT_BIND_ADDRESS));
        assert_eq!(migrated["allowDirectResolve"], json!(false));
        assert_eq!(migrated["debugLogCapacity"], json!(200));
        assert_eq!(migrated["schema_version"], json!(SETTINGS_SCHEMA_VERSION));

        let from_garbage = migrate_settings(json!("not an object"));
        assert_eq!(from_garbage["logLevel"], json!("info"));
    }

    #[test]
    fn log_level_is_read_without_loading() {
        let dir = tempfile::tempdir().expect("temp dir");
        assert_eq!(configured_log_level(dir.path()), "info");

        fs::write(dir.path().join("settings.json"), r#"{"logLevel":"debug"}"#).expect("write");
        assert_eq!(configured_log_level(dir.path()), "debug");

        fs::write(dir.path().join("settings.json"), "{broken").expect("write");
        assert_eq!(configured_log_level(dir.path()), "info");
        let untouched = fs::read_to_string(dir.path().join("settings.json")).expect("read");
        assert_eq!(untouched, "{broken");
    }

    #[test]
    fn sanitizes_out_of_range_and_unknown_values() {
        let migrated = migrate_settings(json!({
            "schema_version": 1,
            "bindAddress": "not an address",
            "storage": "postgres",
            "logLevel": "loud",
            "debugLogCapacity": 1,
            "databaseFile": "../escape.db",
            "allowDirectResolve": "yes"
        }));

        assert_eq!(migrated["bindAddress"], json!(DEFAULT_BIND_ADDRESS));
        assert_eq!(migrated["storage"], json!("sqlite"));
        assert_eq!(migrated["logLevel"], json!("info"));
        assert_eq!(migrated["debugLogCapacity"], json!(10));
        assert_eq!(migrated["databaseFile"], json!("state.db"));
        assert_eq!(migrated["allowDirectResolve"], json!(false));
    }

    #[test]
    fn merges_partial_settings_without_losing_existing_values() {
        let mut existing = default_settings();
        merge_settings(&mut existing, &json!({ "allowDirectResolve": true }));
        let migrated = migrate_settings(existing);

        assert_eq!(migrated["allowDirectResolve"], json!(true));
        assert_eq!(migrated["bindAddress"], json!(DEFAULT_BIND_ADDRESS));
    }

    #[test]
    fn effective_settings_are_written_and_read_back() {
        let dir = tempfile::tempdir().expect("temp dir");
        let saved = save_settings_to_disk(dir.path(), json!({ "storage": "memory", "debugLogCapacity": 50 }))
            .expect("save settings");
        assert_eq!(saved["debugLogCapacity"], json!(50));

        let effective = load_effective_settings(dir.path()).expect("load settings");
        assert_eq!(effective.storage, StorageKind::Memory);
        assert_eq!(effective.debug_log_capacity, 50);
        assert_eq!(effective.database_path, dir.path().join("state.db"));
        assert!(dir.path().join("settings.json").exists());
    }
}
