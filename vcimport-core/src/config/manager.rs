//! Settings file location and persistence

use std::fs;
use std::path::{Path, PathBuf};

use super::settings::AppSettings;
use crate::error::{ConfigError, ConfigResult};
use crate::tracing::span_names;

/// Directory name below the user configuration directory
const APP_DIR: &str = "vcimport";
/// Settings file name
const SETTINGS_FILE: &str = "config.toml";

/// Loads and saves `config.toml`
#[derive(Debug, Clone)]
pub struct ConfigManager {
    config_dir: PathBuf,
}

impl ConfigManager {
    /// Uses `<user config dir>/vcimport`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::NoConfigDir` if the platform has no
    /// configuration directory.
    pub fn new() -> ConfigResult<Self> {
        let base = dirs::config_dir().ok_or(ConfigError::NoConfigDir)?;
        Ok(Self::with_config_dir(base.join(APP_DIR)))
    }

    /// Uses an explicit directory (the `--config` flag)
    #[must_use]
    pub const fn with_config_dir(config_dir: PathBuf) -> Self {
        Self { config_dir }
    }

    /// Configuration directory
    #[must_use]
    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    /// Full path of the settings file
    #[must_use]
    pub fn settings_path(&self) -> PathBuf {
        self.config_dir.join(SETTINGS_FILE)
    }

    /// Reads the settings file; a missing file yields the defaults
    ///
    /// Environment overrides are not applied here, see
    /// [`load_effective_settings`](Self::load_effective_settings).
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Parse` for malformed TOML and `ConfigError::Io`
    /// if the file exists but cannot be read.
    pub fn load_settings(&self) -> ConfigResult<AppSettings> {
        let path = self.settings_path();
        let _span = crate::trace_operation!(span_names::CONFIG_LOAD, path = %path.display()).entered();
        if !path.exists() {
            tracing::debug!("no settings file, using defaults");
            return Ok(AppSettings::default());
        }
        let content = fs::read_to_string(&path)?;
        toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path,
            reason: e.to_string(),
        })
    }

    /// Reads the settings file and applies `ONE_XMLRPC` / `ONE_AUTH`
    ///
    /// # Errors
    ///
    /// As [`load_settings`](Self::load_settings).
    pub fn load_effective_settings(&self) -> ConfigResult<AppSettings> {
        let mut settings = self.load_settings()?;
        settings.apply_env(|key| std::env::var(key).ok());
        Ok(settings)
    }

    /// Writes the settings file, creating the directory if needed
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Serialize` or `ConfigError::Io`.
    pub fn save_settings(&self, settings: &AppSettings) -> ConfigResult<()> {
        let path = self.settings_path();
        let _span = crate::trace_operation!(span_names::CONFIG_SAVE, path = %path.display()).entered();
        fs::create_dir_all(&self.config_dir)?;
        let content =
            toml::to_string_pretty(settings).map_err(|e| ConfigError::Serialize(e.to_string()))?;
        fs::write(&path, content)?;
        Ok(())
    }
}
