//! Settings loading: defaults ← file ← environment.
//!
//! The file layer is deep-merged over the compiled defaults so a partial
//! `settings.json` only overrides what it names. Environment overrides
//! apply last and are limited to the documented `VOX_*` variables.

use std::path::{Path, PathBuf};

use serde_json::Value;

use crate::errors::{Result, SettingsError};
use crate::types::VoxSettings;

/// Default settings file location: `~/.vox/settings.json`.
///
/// `VOX_SETTINGS_PATH` overrides the location entirely.
#[must_use]
pub fn settings_path() -> PathBuf {
    if let Ok(p) = std::env::var("VOX_SETTINGS_PATH") {
        return PathBuf::from(p);
    }
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    PathBuf::from(home).join(".vox").join("settings.json")
}

/// Deep-merge `overlay` into `base`. Objects merge recursively; any
/// other value in `overlay` replaces the one in `base`.
#[must_use]
pub fn deep_merge(base: Value, overlay: Value) -> Value {
    match (base, overlay) {
        (Value::Object(mut base_map), Value::Object(overlay_map)) => {
            for (key, overlay_val) in overlay_map {
                let merged = match base_map.remove(&key) {
                    Some(base_val) => deep_merge(base_val, overlay_val),
                    None => overlay_val,
                };
                let _ = base_map.insert(key, merged);
            }
            Value::Object(base_map)
        }
        (_, overlay) => overlay,
    }
}

/// Apply `VOX_*` environment overrides to a parsed settings value.
///
/// Supported: `VOX_SESSION_DURATION_SECS`, `VOX_MEDIA_FRAME_RATE_HZ`.
/// Unparseable values are ignored with a warning.
fn apply_env_overrides(settings: &mut VoxSettings) {
    if let Ok(v) = std::env::var("VOX_SESSION_DURATION_SECS") {
        match v.parse::<u64>() {
            Ok(secs) => settings.session.duration_budget_secs = secs,
            Err(_) => tracing::warn!(value = %v, "ignoring unparseable VOX_SESSION_DURATION_SECS"),
        }
    }
    if let Ok(v) = std::env::var("VOX_MEDIA_FRAME_RATE_HZ") {
        match v.parse::<u32>() {
            Ok(hz) => settings.media.frame_rate_hz = hz,
            Err(_) => tracing::warn!(value = %v, "ignoring unparseable VOX_MEDIA_FRAME_RATE_HZ"),
        }
    }
}

/// Load settings from the default path with env overrides applied.
///
/// A missing file is not an error — defaults are used.
pub fn load_settings() -> Result<VoxSettings> {
    load_settings_from_path(&settings_path())
}

/// Load settings from a specific file path.
///
/// Reads the file (missing file ⇒ defaults), deep-merges over defaults,
/// applies env overrides, and validates.
pub fn load_settings_from_path(path: &Path) -> Result<VoxSettings> {
    let defaults = serde_json::to_value(VoxSettings::default())
        .unwrap_or_else(|_| Value::Object(serde_json::Map::new()));

    let merged = if path.exists() {
        let raw = std::fs::read_to_string(path).map_err(|source| SettingsError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let file_val: Value =
            serde_json::from_str(&raw).map_err(|source| SettingsError::Parse {
                path: path.display().to_string(),
                source,
            })?;
        deep_merge(defaults, file_val)
    } else {
        defaults
    };

    let mut settings: VoxSettings = serde_json::from_value(merged).map_err(|source| {
        SettingsError::Parse {
            path: path.display().to_string(),
            source,
        }
    })?;

    apply_env_overrides(&mut settings);
    settings.validate();
    Ok(settings)
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deep_merge_disjoint_keys() {
        let merged = deep_merge(
            serde_json::json!({"x": 1}),
            serde_json::json!({"y": 2}),
        );
        assert_eq!(merged["x"], 1);
        assert_eq!(merged["y"], 2);
    }

    #[test]
    fn deep_merge_nested_objects() {
        let merged = deep_merge(
            serde_json::json!({"media": {"canvasWidth": 1280, "frameRateHz": 30}}),
            serde_json::json!({"media": {"frameRateHz": 24}}),
        );
        assert_eq!(merged["media"]["canvasWidth"], 1280);
        assert_eq!(merged["media"]["frameRateHz"], 24);
    }

    #[test]
    fn deep_merge_scalar_replaces() {
        let merged = deep_merge(
            serde_json::json!({"x": {"nested": true}}),
            serde_json::json!({"x": 5}),
        );
        assert_eq!(merged["x"], 5);
    }

    #[test]
    fn load_missing_file_yields_defaults() {
        let s = load_settings_from_path(Path::new("/nonexistent/vox/settings.json")).unwrap();
        assert_eq!(s.session.duration_budget_secs, 2700);
    }

    #[test]
    fn load_partial_file_merges_over_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{"connection": {"maxAttempts": 3}}"#).unwrap();

        let s = load_settings_from_path(&path).unwrap();
        assert_eq!(s.connection.max_attempts, 3);
        // Everything else default
        assert_eq!(s.connection.base_delay_ms, 2000);
        assert_eq!(s.media.canvas_width, 1280);
    }

    #[test]
    fn load_invalid_json_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "not json {").unwrap();

        let err = load_settings_from_path(&path).unwrap_err();
        assert!(matches!(err, SettingsError::Parse { .. }));
    }

    #[test]
    fn load_validates_out_of_range_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{"media": {"frameRateHz": 500}}"#).unwrap();

        let s = load_settings_from_path(&path).unwrap();
        assert_eq!(s.media.frame_rate_hz, 60);
    }
}
