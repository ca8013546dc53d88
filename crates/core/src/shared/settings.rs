use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::shared::backend_identity::{BackendConfig, DetectorBackend, FaceModel};
use crate::shared::constants::{APP_DIR_NAME, DEFAULT_THRESHOLD};

#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("threshold must be between 0.0 and 1.0, got {0}")]
    InvalidThreshold(f64),
    #[error("could not determine config directory")]
    NoConfigDir,
    #[error("failed to write settings to {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to serialize settings: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Persisted defaults for a verification run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerifySettings {
    #[serde(default = "default_threshold")]
    pub threshold: f64,
    #[serde(default)]
    pub detector: DetectorBackend,
    #[serde(default)]
    pub model: FaceModel,
}

fn default_threshold() -> f64 {
    DEFAULT_THRESHOLD
}

impl Default for VerifySettings {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
            detector: DetectorBackend::default(),
            model: FaceModel::default(),
        }
    }
}

impl VerifySettings {
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join(APP_DIR_NAME).join("settings.json"))
    }

    /// Loads settings from the default location, falling back to defaults.
    pub fn load() -> Self {
        Self::default_path()
            .map(|p| Self::load_from(&p))
            .unwrap_or_default()
    }

    /// Loads settings from `path`. Missing or malformed files yield defaults.
    pub fn load_from(path: &Path) -> Self {
        let Ok(json) = fs::read_to_string(path) else {
            return Self::default();
        };
        match serde_json::from_str::<Self>(&json) {
            Ok(settings) if settings.validate().is_ok() => settings,
            Ok(settings) => {
                log::warn!(
                    "Ignoring {}: threshold {} out of range",
                    path.display(),
                    settings.threshold
                );
                Self::default()
            }
            Err(e) => {
                log::warn!("Ignoring malformed settings at {}: {e}", path.display());
                Self::default()
            }
        }
    }

    pub fn save(&self) -> Result<(), SettingsError> {
        let path = Self::default_path().ok_or(SettingsError::NoConfigDir)?;
        self.save_to(&path)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), SettingsError> {
        self.validate()?;
        let json = serde_json::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|source| SettingsError::Write {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        fs::write(path, json).map_err(|source| SettingsError::Write {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        validate_threshold(self.threshold)
    }

    pub fn backend_config(&self) -> BackendConfig {
        BackendConfig::new(self.detector, self.model)
    }
}

pub fn validate_threshold(threshold: f64) -> Result<(), SettingsError> {
    if (0.0..=1.0).contains(&threshold) {
        Ok(())
    } else {
        Err(SettingsError::InvalidThreshold(threshold))
    }
}
