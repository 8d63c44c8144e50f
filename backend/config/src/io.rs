//! Settings read/write through the key-value store.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde_json::Value;
use tracing::{debug, info};
use veil_core::KeyValueStore;

use crate::defaults::apply_all_defaults;
use crate::schema::{RawSettings, Settings};
use crate::validation::ValidationReport;

/// Key holding the JSON settings object.
pub const SETTINGS_KEY: &str = "veilSettings_v1";

/// File name of the on-disk key-value store within the data directory.
const STORE_FILE_NAME: &str = "store.json";

/// Resolve the Veil data directory.
/// Priority: `VEIL_DATA_DIR` env > `~/.veil/` > `./.veil`
pub fn data_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("VEIL_DATA_DIR") {
        return PathBuf::from(dir);
    }
    match dirs::home_dir() {
        Some(home) => home.join(".veil"),
        None => PathBuf::from(".veil"),
    }
}

/// Resolve the full path to the key-value store file.
pub fn store_file_path(data_dir: &Path) -> PathBuf {
    data_dir.join(STORE_FILE_NAME)
}

/// Parse a stored settings blob. Never fails: an unparsable blob yields the
/// defaults with an error in the report.
pub fn parse_settings(raw: &str) -> (Settings, ValidationReport) {
    let mut report = ValidationReport::default();
    let raw: RawSettings = match serde_json::from_str::<Value>(raw) {
        Ok(Value::Object(map)) => match serde_json::from_value(Value::Object(map)) {
            Ok(raw) => raw,
            Err(e) => {
                report.error("settings", format!("unreadable settings object: {e}"));
                RawSettings::default()
            }
        },
        Ok(other) => {
            report.error("settings", format!("expected an object, got {other}"));
            RawSettings::default()
        }
        Err(e) => {
            report.error("settings", format!("invalid JSON: {e}"));
            RawSettings::default()
        }
    };
    let settings = apply_all_defaults(raw, &mut report);
    (settings, report)
}

/// Load settings from the store.
///
/// Missing settings are the defaults. Only a failed read is an error; the
/// caller decides whether to continue on defaults.
pub async fn load_settings(kv: &dyn KeyValueStore) -> Result<Settings> {
    let Some(raw) = kv
        .get(SETTINGS_KEY)
        .await
        .context("Failed to read settings")?
    else {
        debug!("No stored settings; using defaults");
        return Ok(Settings::default());
    };

    let (settings, report) = parse_settings(&raw);
    report.log();
    info!(?settings, "Loaded settings");
    Ok(settings)
}

pub async fn save_settings(kv: &dyn KeyValueStore, settings: &Settings) -> Result<()> {
    let json = serde_json::to_string(settings).context("Failed to serialize settings")?;
    kv.set(SETTINGS_KEY, &json)
        .await
        .context("Failed to save settings")?;
    debug!("Saved settings");
    Ok(())
}

/// Patch settings with a JSON Merge Patch (RFC 7396).
///
/// The patch is applied to the serialized JSON of the settings, then
/// deserialized back, so field types are enforced. Ranges are not; run
/// [`crate::validate`] on the result.
pub fn apply_merge_patch(settings: &Settings, patch: &Value) -> Result<Settings> {
    let mut value =
        serde_json::to_value(settings).context("Failed to serialize settings for merge patch")?;
    json_merge_patch(&mut value, patch);
    let defaults =
        serde_json::to_value(Settings::default()).context("Failed to serialize defaults")?;
    // A `null` in the patch removes the field, which means "back to default".
    let missing = missing_from(&value, &defaults);
    json_merge_patch(&mut value, &missing);
    serde_json::from_value(value).context("Failed to deserialize settings after merge patch")
}

/// Fields of `defaults` that `value` lacks.
fn missing_from(value: &Value, defaults: &Value) -> Value {
    let (Value::Object(have), Value::Object(all)) = (value, defaults) else {
        return Value::Null;
    };
    Value::Object(
        all.iter()
            .filter(|(key, _)| !have.contains_key(*key))
            .map(|(key, v)| (key.clone(), v.clone()))
            .collect(),
    )
}

/// RFC 7396 JSON Merge Patch algorithm.
fn json_merge_patch(target: &mut Value, patch: &Value) {
    if let Value::Object(patch_map) = patch {
        if let Value::Object(target_map) = target {
            for (key, patch_val) in patch_map {
                if patch_val.is_null() {
                    target_map.remove(key);
                } else {
                    let entry = target_map.entry(key.clone()).or_insert(Value::Null);
                    json_merge_patch(entry, patch_val);
                }
            }
        } else {
            *target = patch.clone();
        }
    } else {
        *target = patch.clone();
    }
}
