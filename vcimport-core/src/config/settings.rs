//! Settings file contents

use std::path::{Path, PathBuf};
use std::time::Duration;

use secrecy::SecretString;
use serde::{Deserialize, Serialize};

use crate::connection::DEFAULT_API_RELEASE;
use crate::error::{ConfigError, ConfigResult};
use crate::secret::CipherConfig;
use crate::tracing::{TracingConfig, TracingLevel, TracingOutput};

/// Environment variable overriding [`OneSettings::endpoint`]
pub const ENV_ONE_XMLRPC: &str = "ONE_XMLRPC";
/// Environment variable overriding [`OneSettings::auth_file`]
pub const ENV_ONE_AUTH: &str = "ONE_AUTH";

const DEFAULT_ENDPOINT: &str = "http://localhost:2633/RPC2";
const DEFAULT_AUTH_FILE: &str = "~/.one/one_auth";
const DEFAULT_POLL_INTERVAL_MS: u64 = 500;

/// Complete settings file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppSettings {
    /// Target system access
    pub one: OneSettings,
    /// Remote endpoint defaults
    pub vcenter: VcenterSettings,
    /// Credential cipher parameters
    pub cipher: CipherConfig,
    /// Diagnostic logging
    pub logging: LoggingSettings,
}

impl AppSettings {
    /// Applies `ONE_XMLRPC` and `ONE_AUTH` from `lookup`
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(endpoint) = lookup(ENV_ONE_XMLRPC).filter(|v| !v.is_empty()) {
            tracing::debug!(%endpoint, "endpoint overridden from environment");
            self.one.endpoint = endpoint;
        }
        if let Some(auth_file) = lookup(ENV_ONE_AUTH).filter(|v| !v.is_empty()) {
            self.one.auth_file = auth_file;
        }
    }
}

/// `[one]` table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OneSettings {
    /// XML-RPC endpoint
    pub endpoint: String,
    /// File holding `user:password`; `~` and `$VARS` are expanded
    pub auth_file: String,
}

impl Default for OneSettings {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            auth_file: DEFAULT_AUTH_FILE.to_string(),
        }
    }
}

impl OneSettings {
    /// Auth file path after expansion
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::AuthFile` if a referenced variable is unset.
    pub fn auth_path(&self) -> ConfigResult<PathBuf> {
        shellexpand::full(&self.auth_file)
            .map(|p| PathBuf::from(p.as_ref()))
            .map_err(|e| ConfigError::AuthFile {
                path: PathBuf::from(&self.auth_file),
                reason: e.to_string(),
            })
    }

    /// Reads the session string from the auth file
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::AuthFile` if the file is missing, empty or not
    /// of the form `user:password`.
    pub fn read_session(&self) -> ConfigResult<SecretString> {
        let path = self.auth_path()?;
        read_auth_file(&path)
    }
}

fn read_auth_file(path: &Path) -> ConfigResult<SecretString> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::AuthFile {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    let line = content.lines().next().unwrap_or_default().trim();
    if !line.contains(':') {
        return Err(ConfigError::AuthFile {
            path: path.to_path_buf(),
            reason: "expected user:password on the first line".to_string(),
        });
    }
    Ok(SecretString::from(line.to_string()))
}

/// `[vcenter]` table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VcenterSettings {
    /// API release sent with every request
    pub api_release: String,
    /// Accept self-signed certificates unless `--strict-tls` is given
    pub accept_invalid_certs: bool,
    /// Interval between two task-state polls
    pub task_poll_interval_ms: u64,
}

impl Default for VcenterSettings {
    fn default() -> Self {
        Self {
            api_release: DEFAULT_API_RELEASE.to_string(),
            accept_invalid_certs: true,
            task_poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
        }
    }
}

impl VcenterSettings {
    /// Poll interval, never zero
    #[must_use]
    pub fn task_poll_interval(&self) -> Duration {
        Duration::from_millis(self.task_poll_interval_ms.max(1))
    }
}

/// `[logging]` table
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Base level, raised by `-v` flags
    pub level: TracingLevel,
    /// Log file; stderr when unset
    pub file: Option<PathBuf>,
    /// Raw `EnvFilter` directive, overrides `level`
    pub filter: Option<String>,
}

impl LoggingSettings {
    /// Tracing configuration for the given number of `-v` flags
    ///
    /// `quiet` keeps errors only.
    #[must_use]
    pub fn tracing_config(&self, verbosity: u8, quiet: bool) -> TracingConfig {
        let level = if quiet {
            TracingLevel::Error
        } else {
            TracingLevel::raised_by(self.level, verbosity)
        };
        let mut config = TracingConfig::new().with_level(level);
        if let Some(path) = &self.file {
            config = config.with_output(TracingOutput::File { path: path.clone() });
        }
        if let Some(filter) = &self.filter {
            config = config.with_filter(filter.clone());
        }
        config
    }
}
