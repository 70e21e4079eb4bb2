//! Persistent settings
//!
//! Settings are stored in `{config_dir}/dingcad/settings.json`. A missing or
//! unreadable file means defaults; unknown or absent fields take their
//! default value.

use anyhow::{Context, Result, bail};
use dingcad_script::ScriptLimits;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Settings that persist across runs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    // Export defaults
    /// Directory for exports without an explicit path
    pub export_dir: PathBuf,
    /// File name for exports without an explicit path
    pub export_file_name: String,

    // Reload
    /// Interval between dependency polls in `watch`
    pub poll_interval_ms: u64,
    /// Debounce for filesystem notifications
    pub debounce_ms: u64,

    // Scripts
    /// File name looked up by default scene discovery
    pub scene_file_name: String,
    pub max_expr_depth: usize,
    pub max_call_levels: usize,
}

impl Default for Settings {
    fn default() -> Self {
        let limits = ScriptLimits::default();
        Self {
            export_dir: dirs::home_dir()
                .map(|home| home.join("Downloads"))
                .unwrap_or_else(|| PathBuf::from(".")),
            export_file_name: "ding.stl".to_string(),

            poll_interval_ms: 250,
            debounce_ms: 100,

            scene_file_name: "scene.rhai".to_string(),
            max_expr_depth: limits.max_expr_depth,
            max_call_levels: limits.max_call_levels,
        }
    }
}

impl Settings {
    /// Where exports go when no path is given
    pub fn default_export_path(&self) -> PathBuf {
        self.export_dir.join(&self.export_file_name)
    }

    pub fn limits(&self) -> ScriptLimits {
        ScriptLimits {
            max_expr_depth: self.max_expr_depth,
            max_call_levels: self.max_call_levels,
        }
    }

    /// Scene candidates in lookup order: working directory, then home
    pub fn scene_candidates(&self) -> Vec<PathBuf> {
        let mut candidates = Vec::new();
        if let Ok(cwd) = std::env::current_dir() {
            candidates.push(cwd.join(&self.scene_file_name));
        }
        if let Some(home) = dirs::home_dir() {
            candidates.push(home.join(&self.scene_file_name));
        }
        candidates
    }

    /// First existing default scene
    pub fn find_default_scene(&self) -> Option<PathBuf> {
        self.scene_candidates().into_iter().find(|p| p.is_file())
    }

    /// Read settings from `path`, falling back to defaults
    pub fn load_from(path: &Path) -> Settings {
        match fs::read_to_string(path) {
            Ok(contents) => serde_json::from_str(&contents).unwrap_or_else(|e| {
                tracing::warn!("Ignoring invalid settings file {}: {}", path.display(), e);
                Settings::default()
            }),
            Err(_) => Settings::default(),
        }
    }

    /// Write settings to `path` as pretty JSON
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).context("Failed to create config directory")?;
        }
        let json = serde_json::to_string_pretty(self).context("Failed to serialize settings")?;
        fs::write(path, json).context("Failed to write settings file")
    }
}

/// Get the path to the settings file
pub fn settings_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("dingcad").join("settings.json"))
}

/// Load settings from disk, returning defaults if the file doesn't exist or is invalid
pub fn load_settings() -> Settings {
    settings_path().map_or_else(Settings::default, |path| Settings::load_from(&path))
}

/// Save settings to disk
pub fn save_settings(settings: &Settings) -> Result<()> {
    let Some(path) = settings_path() else {
        bail!("Could not determine config directory");
    };
    settings.save_to(&path)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.export_file_name, "ding.stl");
        assert_eq!(settings.poll_interval_ms, 250);
        assert_eq!(settings.debounce_ms, 100);
        assert_eq!(settings.limits(), ScriptLimits::default());
        assert!(settings.default_export_path().ends_with("ding.stl"));
    }

    #[test]
    fn test_round_trip_and_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("settings.json");
        let settings = Settings {
            poll_interval_ms: 40,
            ..Settings::default()
        };
        settings.save_to(&path).unwrap();
        assert_eq!(Settings::load_from(&path), settings);

        fs::write(&path, r#"{ "export_file_name": "part.stl" }"#).unwrap();
        let partial = Settings::load_from(&path);
        assert_eq!(partial.export_file_name, "part.stl");
        assert_eq!(partial.poll_interval_ms, 250);
    }

    #[test]
    fn test_invalid_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, "not json").unwrap();
        assert_eq!(Settings::load_from(&path), Settings::default());
        assert_eq!(Settings::load_from(&dir.path().join("absent.json")), Settings::default());
    }
}
