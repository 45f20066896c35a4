//! Connection manager

use std::time::Duration;

use secrecy::SecretString;

use super::{ConnectOptions, Connection, DEFAULT_API_RELEASE};
use crate::config::AppSettings;
use crate::error::{
    ConnectionError, ConnectionResult, CredentialError, CredentialResult, ImportResult,
};
use crate::one::OneRepository;
use crate::secret::CredentialCipher;
use crate::tracing::span_names;
use crate::vim::{DEFAULT_TASK_POLL_INTERVAL, JsonApiSession, LoginParams};

/// Host template attributes holding the stored credentials
pub mod host_attrs {
    /// Endpoint host
    pub const HOST: &str = "VCENTER_HOST";
    /// User name
    pub const USER: &str = "VCENTER_USER";
    /// Encrypted password
    pub const PASSWORD: &str = "VCENTER_PASSWORD";
    /// Optional resource pool ref
    pub const RESOURCE_POOL: &str = "VCENTER_RESOURCE_POOL";
}

/// System configuration key holding the shared cipher token
pub const ONE_KEY: &str = "ONE_KEY";

/// Opens and closes remote sessions
#[derive(Debug, Clone)]
pub struct ConnectionManager {
    cipher: CredentialCipher,
    api_release: String,
    accept_invalid_certs: bool,
    poll_interval: Duration,
}

impl Default for ConnectionManager {
    fn default() -> Self {
        Self::new(CredentialCipher::default())
    }
}

impl ConnectionManager {
    /// Creates a manager with default endpoint settings
    #[must_use]
    pub fn new(cipher: CredentialCipher) -> Self {
        Self {
            cipher,
            api_release: DEFAULT_API_RELEASE.to_string(),
            accept_invalid_certs: true,
            poll_interval: DEFAULT_TASK_POLL_INTERVAL,
        }
    }

    /// Creates a manager from the `[vcenter]` and `[cipher]` settings
    #[must_use]
    pub fn from_settings(settings: &AppSettings) -> Self {
        Self {
            cipher: CredentialCipher::new(settings.cipher),
            api_release: settings.vcenter.api_release.clone(),
            accept_invalid_certs: settings.vcenter.accept_invalid_certs,
            poll_interval: settings.vcenter.task_poll_interval(),
        }
    }

    /// Credential cipher used for stored passwords
    #[must_use]
    pub const fn cipher(&self) -> &CredentialCipher {
        &self.cipher
    }

    /// Builds options for a host, user and password with the configured defaults
    #[must_use]
    pub fn options(&self, host: &str, user: &str, password: SecretString) -> ConnectOptions {
        ConnectOptions::new(host, user, password)
            .with_api_release(self.api_release.clone())
            .with_strict_tls(!self.accept_invalid_certs)
    }

    /// Opens a session
    ///
    /// # Errors
    ///
    /// Returns `ConnectionError` for invalid options, unreachable endpoints
    /// and rejected credentials.
    pub fn connect(&self, options: &ConnectOptions) -> ConnectionResult<Connection> {
        options.validate()?;
        let _span = crate::trace_operation!(span_names::CONNECTION_OPEN, host = %options.host, user = %options.user).entered();

        let session = JsonApiSession::login(LoginParams {
            host: &options.host,
            user: &options.user,
            password: &options.password,
            release: &options.api_release,
            accept_invalid_certs: options.accept_invalid_certs,
        })?;
        let connection = Connection::with_session(Box::new(session), options)
            .with_poll_interval(self.poll_interval);

        tracing::info!(
            instance_uuid = %connection.instance_uuid(),
            api_version = %connection.api_version(),
            rp_confined = connection.rp_confined(),
            "connected"
        );
        Ok(connection)
    }

    /// Resolves the stored credentials of a managed host
    ///
    /// # Errors
    ///
    /// Returns `CredentialError::Lookup` if the host, one of its attributes
    /// or the shared token cannot be read, `CredentialError::Crypto` if the
    /// password cannot be decrypted.
    pub fn managed_host_options(
        &self,
        repo: &dyn OneRepository,
        host_id: i64,
    ) -> CredentialResult<ConnectOptions> {
        let host = repo
            .host(host_id)
            .map_err(|e| CredentialError::Lookup(format!("host {host_id}: {e}")))?;
        let attr = |key: &str| {
            host.attr(key)
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .ok_or_else(|| {
                    CredentialError::Lookup(format!("host {host_id} ({}) has no {key}", host.name))
                })
        };
        let endpoint = attr(host_attrs::HOST)?;
        let user = attr(host_attrs::USER)?;
        let encrypted = attr(host_attrs::PASSWORD)?;

        let config = repo
            .system_config()
            .map_err(|e| CredentialError::Lookup(format!("system configuration: {e}")))?;
        let token = config
            .get(ONE_KEY)
            .filter(|v| !v.is_empty())
            .map(|v| SecretString::from(v.clone()))
            .ok_or_else(|| {
                CredentialError::Lookup(format!("system configuration has no {ONE_KEY}"))
            })?;

        let password = self.cipher.decrypt(&token, encrypted)?;
        tracing::debug!(host_id, endpoint, user, "resolved managed host credentials");

        let mut options = self.options(endpoint, user, password);
        options.resource_pool = attr(host_attrs::RESOURCE_POOL).ok().map(str::to_string);
        Ok(options)
    }

    /// Opens a session with the stored credentials of a managed host
    ///
    /// # Errors
    ///
    /// Returns `ImportError::Credential` if the credentials cannot be
    /// resolved, `ImportError::Connection` if the session cannot be opened.
    pub fn connect_from_managed_host(
        &self,
        repo: &dyn OneRepository,
        host_id: i64,
    ) -> ImportResult<Connection> {
        let options = self.managed_host_options(repo, host_id)?;
        Ok(self.connect(&options)?)
    }

    /// Opens a session with the stored credentials of a host found by name
    ///
    /// # Errors
    ///
    /// Returns `ImportError::Credential` if no host has that name, otherwise
    /// as [`connect_from_managed_host`](Self::connect_from_managed_host).
    pub fn connect_from_host_name(
        &self,
        repo: &dyn OneRepository,
        name: &str,
    ) -> ImportResult<Connection> {
        let host_id = repo
            .host_id_by_name(name)
            .map_err(|e| CredentialError::Lookup(e.to_string()))?;
        self.connect_from_managed_host(repo, host_id)
    }

    /// Encrypts a password with the target system's shared token
    ///
    /// # Errors
    ///
    /// Returns `CredentialError` if the token cannot be read or used.
    pub fn encrypt_for_target(
        &self,
        repo: &dyn OneRepository,
        password: &SecretString,
    ) -> CredentialResult<String> {
        let config = repo
            .system_config()
            .map_err(|e| CredentialError::Lookup(format!("system configuration: {e}")))?;
        let token = config
            .get(ONE_KEY)
            .filter(|v| !v.is_empty())
            .ok_or_else(|| {
                CredentialError::Lookup(format!("system configuration has no {ONE_KEY}"))
            })?;
        self.cipher
            .encrypt(&SecretString::from(token.clone()), password)
    }

    /// Closes a connection
    ///
    /// # Errors
    ///
    /// Returns `ConnectionError` if the logout fails.
    pub fn close(&self, connection: Connection) -> ConnectionResult<()> {
        let host = connection.host().to_string();
        let _span = crate::trace_operation!(span_names::CONNECTION_CLOSE, host = %host).entered();
        connection.close()?;
        tracing::info!(host = %host, "connection closed");
        Ok(())
    }

    /// Connects, runs `f` and closes the connection whatever `f` returned
    ///
    /// # Errors
    ///
    /// Returns the connection error, or the error of `f`.
    pub fn run<T, E, F>(&self, options: &ConnectOptions, f: F) -> Result<T, E>
    where
        F: FnOnce(&Connection) -> Result<T, E>,
        E: From<ConnectionError>,
    {
        let connection = self.connect(options)?;
        self.scoped(connection, f)
    }

    /// Runs `f` on an open connection and closes it afterwards
    ///
    /// A failing close is logged; the result of `f` is returned unchanged.
    ///
    /// # Errors
    ///
    /// Returns the error of `f`.
    pub fn scoped<T, E, F>(&self, connection: Connection, f: F) -> Result<T, E>
    where
        F: FnOnce(&Connection) -> Result<T, E>,
    {
        let result = f(&connection);
        if let Err(e) = self.close(connection) {
            tracing::warn!(error = %e, "closing the connection failed");
        }
        result
    }
}
