use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::camera::{DEFAULT_DAMPING, DEFAULT_DISTANCE};
use crate::error::{Result, ViewerError};
use crate::input::DEFAULT_DRAG_SENSITIVITY;
use crate::theme::{ThemeCatalog, DEFAULT_THEMES};

/// Optional settings file looked up in the asset root.
pub const CONFIG_FILE: &str = "viewer.json";

/// Viewer settings. Every field has a default so a partial (or missing)
/// `viewer.json` is fine.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ViewerConfig {
    #[serde(skip)]
    pub asset_root: PathBuf,
    pub themes: Vec<String>,
    pub initial_theme: Option<String>,
    pub mesh: MeshSettings,
    pub camera: CameraSettings,
    pub window: WindowSettings,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct MeshSettings {
    pub vertical: u32,
    pub horizontal: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CameraSettings {
    pub distance: f32,
    pub damping: f32,
    pub drag_sensitivity: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct WindowSettings {
    pub width: u32,
    pub height: u32,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            asset_root: PathBuf::from("public"),
            themes: DEFAULT_THEMES.iter().map(|name| name.to_string()).collect(),
            initial_theme: None,
            mesh: MeshSettings::default(),
            camera: CameraSettings::default(),
            window: WindowSettings::default(),
        }
    }
}

impl Default for MeshSettings {
    fn default() -> Self {
        Self {
            vertical: 30,
            horizontal: 40,
        }
    }
}

impl Default for CameraSettings {
    fn default() -> Self {
        Self {
            distance: DEFAULT_DISTANCE,
            damping: DEFAULT_DAMPING,
            drag_sensitivity: DEFAULT_DRAG_SENSITIVITY,
        }
    }
}

impl Default for WindowSettings {
    fn default() -> Self {
        Self {
            width: 800,
            height: 800,
        }
    }
}

impl ViewerConfig {
    /// Reads `viewer.json` from `asset_root`, falling back to defaults when
    /// the file does not exist.
    pub fn load(asset_root: impl Into<PathBuf>) -> Result<Self> {
        let asset_root = asset_root.into();
        let path = asset_root.join(CONFIG_FILE);
        let mut config = match fs::read_to_string(&path) {
            Ok(text) => Self::from_json(&path, &text)?,
            Err(err) if err.kind() == io::ErrorKind::NotFound => Self::default(),
            Err(err) => return Err(config_error(&path, err)),
        };
        config.asset_root = asset_root;
        Ok(config)
    }

    pub fn from_json(path: &Path, text: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(text).map_err(|err| config_error(path, err))?;
        config.validate().map_err(|reason| config_error(path, reason))?;
        Ok(config)
    }

    fn validate(&self) -> std::result::Result<(), String> {
        if self.themes.is_empty() {
            return Err("at least one theme is required".into());
        }
        if let Some(initial) = &self.initial_theme {
            if !self.themes.contains(initial) {
                return Err(format!("initial theme {initial} is not in the theme list"));
            }
        }
        if self.mesh.vertical == 0 || self.mesh.horizontal == 0 {
            return Err("mesh resolution must be at least 1x1".into());
        }
        let camera = self.camera;
        if !(camera.distance.is_finite() && camera.distance > 0.0) {
            return Err(format!("camera distance must be positive (got {})", camera.distance));
        }
        if !(camera.damping.is_finite() && camera.damping >= 0.0) {
            return Err(format!("camera damping must be non-negative (got {})", camera.damping));
        }
        if !camera.drag_sensitivity.is_finite() {
            return Err("drag sensitivity must be finite".into());
        }
        Ok(())
    }

    pub fn catalog(&self) -> ThemeCatalog {
        ThemeCatalog::new(self.themes.clone())
    }

    /// Theme shown on startup: the configured one, or the first in the list.
    pub fn startup_theme(&self) -> Option<&str> {
        self.initial_theme
            .as_deref()
            .or_else(|| self.themes.first().map(String::as_str))
    }
}

fn config_error(path: &Path, reason: impl ToString) -> ViewerError {
    ViewerError::Config {
        path: path.to_path_buf(),
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = ViewerConfig::load(dir.path()).unwrap();
        assert_eq!(config.asset_root, dir.path());
        assert_eq!(config.themes.len(), 4);
        assert_eq!(config.mesh, MeshSettings { vertical: 30, horizontal: 40 });
        assert_eq!(config.startup_theme(), Some("realistic-day"));
    }

    #[test]
    fn partial_file_overrides_fields() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join(CONFIG_FILE),
            r#"{ "themes": ["mars", "moon"], "initialTheme": "moon", "camera": { "distance": 4 } }"#,
        )
        .unwrap();
        let config = ViewerConfig::load(dir.path()).unwrap();
        assert_eq!(config.startup_theme(), Some("moon"));
        assert_eq!(config.camera.distance, 4.0);
        assert_eq!(config.camera.damping, DEFAULT_DAMPING);
        assert_eq!(config.catalog().names(), &["mars".to_string(), "moon".to_string()]);
    }

    #[test]
    fn invalid_values_name_the_file() {
        let path = Path::new("assets/viewer.json");
        let err = ViewerConfig::from_json(path, r#"{ "themes": [] }"#).unwrap_err();
        assert!(matches!(
            err,
            ViewerError::Config { ref path, .. } if path.ends_with("viewer.json")
        ));

        let err = ViewerConfig::from_json(path, r#"{ "initialTheme": "pluto" }"#).unwrap_err();
        assert!(err.to_string().contains("pluto"));

        assert!(ViewerConfig::from_json(path, r#"{ "mesh": { "vertical": 0 } }"#).is_err());
        assert!(ViewerConfig::from_json(path, "[").is_err());
    }
}
