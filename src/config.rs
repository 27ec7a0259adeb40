use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::PathBuf;

use crate::recovery::default_recovery_dir;
use crate::session::CaptureConfig;

const ENV_PREFIX: &str = "VOICE_CAPTURE";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub capture: CaptureConfig,
    pub recovery: RecoverySettings,
    pub export: ExportSettings,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RecoverySettings {
    pub dir: String,
}

impl Default for RecoverySettings {
    fn default() -> Self {
        Self {
            dir: default_recovery_dir().display().to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ExportSettings {
    pub dir: String,
}

impl Default for ExportSettings {
    fn default() -> Self {
        Self {
            dir: "./recordings".to_string(),
        }
    }
}

impl Settings {
    /// Load from an optional config file, then `VOICE_CAPTURE__*` overrides.
    ///
    /// A missing file is not an error; every field has a default.
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path).required(false))
            .add_source(config::Environment::with_prefix(ENV_PREFIX).separator("__"))
            .build()
            .with_context(|| format!("Failed to load settings from {}", path))?;

        let settings: Self = settings
            .try_deserialize()
            .context("Invalid settings")?;
        settings.capture.validate()?;

        Ok(settings)
    }

    pub fn recovery_dir(&self) -> PathBuf {
        expand(&self.recovery.dir)
    }

    pub fn export_dir(&self) -> PathBuf {
        expand(&self.export.dir)
    }
}

fn expand(path: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(path).as_ref())
}
