//! Configuration management for soundpanel
//!
//! This module provides:
//! - Panel settings (module routing, command timeouts, recording window)
//! - Settings for the simulated backend
//! - TOML loading and saving
//! - A manager for the config file under the user's config directory

use crate::domain::client::CommandTimeouts;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tokio::fs;
use tracing::{debug, error, info, instrument};

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Errors that can occur during configuration operations
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// How the panel addresses the backend module
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModuleSettings {
    /// Backend module the panel is bound to
    pub name: String,

    /// Timeout for quick commands, in seconds
    pub default_timeout_secs: f64,

    /// Timeout for device switching and recording tests, in seconds
    pub extended_timeout_secs: f64,

    /// Length of the backend recording test, in seconds
    pub recording_window_secs: u64,
}

impl Default for ModuleSettings {
    fn default() -> Self {
        Self {
            name: "audio".to_string(),
            default_timeout_secs: 5.0,
            extended_timeout_secs: 30.0,
            recording_window_secs: 5,
        }
    }
}

impl ModuleSettings {
    /// Command timeouts
    ///
    /// Values [`PanelConfig::validate`] would reject fall back to the
    /// factory timeouts.
    pub fn timeouts(&self) -> CommandTimeouts {
        let fallback = CommandTimeouts::default();
        CommandTimeouts {
            default: timeout_secs(self.default_timeout_secs).unwrap_or(fallback.default),
            extended: timeout_secs(self.extended_timeout_secs).unwrap_or(fallback.extended),
        }
    }

    pub fn recording_window(&self) -> Duration {
        Duration::from_secs(self.recording_window_secs)
    }
}

fn timeout_secs(secs: f64) -> Option<Duration> {
    if secs <= 0.0 {
        return None;
    }
    Duration::try_from_secs_f64(secs).ok()
}

/// Behaviour of the in-memory backend used by the CLI and tests
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulatorSettings {
    /// Highest level the simulated mixer accepts; larger requests are clamped
    pub volume_ceiling: u32,

    /// Publish a fresh snapshot on the bus after each mutating command
    pub push_changes: bool,
}

impl Default for SimulatorSettings {
    fn default() -> Self {
        Self {
            volume_ceiling: 100,
            push_changes: true,
        }
    }
}

/// Complete soundpanel configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PanelConfig {
    #[serde(default)]
    pub module: ModuleSettings,

    #[serde(default)]
    pub simulator: SimulatorSettings,
}

impl PanelConfig {
    /// Load configuration from TOML file
    #[instrument(skip(path))]
    pub async fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!(path = %path.display(), "Loading configuration");

        let contents = fs::read_to_string(path).await?;
        let config: Self = toml::from_str(&contents)?;
        config.validate()?;

        debug!("Configuration loaded successfully");
        Ok(config)
    }

    /// Save configuration to TOML file
    #[instrument(skip(self, path))]
    pub async fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        info!(path = %path.display(), "Saving configuration");

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let toml_str = toml::to_string_pretty(self)?;
        fs::write(path, toml_str).await?;

        debug!("Configuration saved successfully");
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.module.name.trim().is_empty() {
            return Err(ConfigError::Invalid("module name cannot be empty".to_string()));
        }
        for (field, secs) in [
            ("default_timeout_secs", self.module.default_timeout_secs),
            ("extended_timeout_secs", self.module.extended_timeout_secs),
        ] {
            if timeout_secs(secs).is_none() {
                return Err(ConfigError::Invalid(format!(
                    "{} must be a positive, representable number of seconds (got {})",
                    field, secs
                )));
            }
        }
        Ok(())
    }
}

/// Manages the config file at `~/.config/soundpanel/config.toml`
pub struct ConfigManager {
    config_dir: PathBuf,
    config_path: PathBuf,
}

impl ConfigManager {
    pub fn new(config_dir: PathBuf) -> Self {
        let config_path = config_dir.join("config.toml");
        Self {
            config_dir,
            config_path,
        }
    }

    /// Default config directory
    ///
    /// `~/.config/soundpanel` on Linux, the platform equivalent elsewhere.
    pub fn default_config_dir() -> Result<PathBuf> {
        dirs::config_dir()
            .map(|p| p.join("soundpanel"))
            .ok_or_else(|| ConfigError::Invalid("Could not determine config directory".to_string()))
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// Load configuration from file
    ///
    /// A missing file is replaced by the defaults, which are written back.
    /// A corrupt file is kept aside as `config.toml.corrupt` and the
    /// defaults are used.
    #[instrument(skip(self))]
    pub async fn load(&self) -> PanelConfig {
        if !self.config_path.exists() {
            info!(
                path = %self.config_path.display(),
                "Config file not found, creating default"
            );

            let config = PanelConfig::default();
            if let Err(e) = self.save(&config).await {
                error!(
                    path = %self.config_path.display(),
                    error = %e,
                    "Failed to save default config"
                );
            }
            return config;
        }

        match PanelConfig::load_from_file(&self.config_path).await {
            Ok(config) => config,
            Err(e) => {
                error!(
                    path = %self.config_path.display(),
                    error = %e,
                    "Failed to load config, using defaults"
                );

                let backup_path = self.config_path.with_extension("toml.corrupt");
                if let Err(copy_err) = fs::copy(&self.config_path, &backup_path).await {
                    error!(
                        path = %backup_path.display(),
                        error = %copy_err,
                        "Failed to backup corrupt config"
                    );
                }

                PanelConfig::default()
            }
        }
    }

    #[instrument(skip(self, config))]
    pub async fn save(&self, config: &PanelConfig) -> Result<()> {
        fs::create_dir_all(&self.config_dir).await?;
        config.save_to_file(&self.config_path).await
    }
}
