//! Remote session lifecycle
//!
//! [`ConnectionManager`] opens sessions from explicit options or from the
//! credentials stored on a managed host of the target system, and closes
//! them. A [`Connection`] lives for one pipeline run; if it is dropped
//! without an explicit close, its `Drop` guard still logs out.

mod manager;

use std::fmt;
use std::time::Duration;

use secrecy::SecretString;

use crate::error::{ConnectionError, ConnectionResult};
use crate::vim::{DEFAULT_TASK_POLL_INTERVAL, ManagedObjectRef, VimSession, kinds};

pub use manager::{ConnectionManager, ONE_KEY, host_attrs};

/// Default vSphere API release used in JSON API URLs
pub const DEFAULT_API_RELEASE: &str = "8.0.1.0";

/// Parameters for opening a session
#[derive(Clone)]
pub struct ConnectOptions {
    /// Endpoint host name or address
    pub host: String,
    /// User name
    pub user: String,
    /// Plain (already decrypted) password
    pub password: SecretString,
    /// Resource pool ref the session is confined to
    pub resource_pool: Option<String>,
    /// Accept self-signed or otherwise invalid certificates
    pub accept_invalid_certs: bool,
    /// API release segment of the endpoint URLs
    pub api_release: String,
}

impl fmt::Debug for ConnectOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectOptions")
            .field("host", &self.host)
            .field("user", &self.user)
            .field("password", &"[REDACTED]")
            .field("resource_pool", &self.resource_pool)
            .field("accept_invalid_certs", &self.accept_invalid_certs)
            .field("api_release", &self.api_release)
            .finish()
    }
}

impl ConnectOptions {
    /// Creates options with the default TLS behaviour (accept all) and release
    #[must_use]
    pub fn new(host: impl Into<String>, user: impl Into<String>, password: SecretString) -> Self {
        Self {
            host: host.into(),
            user: user.into(),
            password,
            resource_pool: None,
            accept_invalid_certs: true,
            api_release: DEFAULT_API_RELEASE.to_string(),
        }
    }

    /// Confines the session to a resource pool
    #[must_use]
    pub fn with_resource_pool(mut self, resource_pool: impl Into<String>) -> Self {
        self.resource_pool = Some(resource_pool.into());
        self
    }

    /// Enables or disables certificate verification
    #[must_use]
    pub const fn with_strict_tls(mut self, strict: bool) -> Self {
        self.accept_invalid_certs = !strict;
        self
    }

    /// Overrides the API release
    #[must_use]
    pub fn with_api_release(mut self, release: impl Into<String>) -> Self {
        self.api_release = release.into();
        self
    }

    /// Checks that the options can be used to log in
    ///
    /// # Errors
    ///
    /// Returns `ConnectionError::InvalidOptions` for an empty host or user.
    pub fn validate(&self) -> ConnectionResult<()> {
        if self.host.trim().is_empty() {
            return Err(ConnectionError::InvalidOptions("endpoint host is empty".to_string()));
        }
        if self.user.trim().is_empty() {
            return Err(ConnectionError::InvalidOptions("user is empty".to_string()));
        }
        if self.resource_pool.as_deref().is_some_and(|rp| rp.trim().is_empty()) {
            return Err(ConnectionError::InvalidOptions(
                "resource pool ref is empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// An open session plus the data the pipeline needs from it
pub struct Connection {
    session: Box<dyn VimSession>,
    user: String,
    password: SecretString,
    resource_pool: Option<ManagedObjectRef>,
    poll_interval: Duration,
    closed: bool,
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("endpoint", &self.session.endpoint())
            .field("user", &self.user)
            .field("resource_pool", &self.resource_pool)
            .field("closed", &self.closed)
            .finish_non_exhaustive()
    }
}

impl Connection {
    /// Wraps an already authenticated session
    #[must_use]
    pub fn with_session(session: Box<dyn VimSession>, options: &ConnectOptions) -> Self {
        Self {
            session,
            user: options.user.clone(),
            password: options.password.clone(),
            resource_pool: options
                .resource_pool
                .as_ref()
                .map(|rp| ManagedObjectRef::new(kinds::RESOURCE_POOL, rp.trim())),
            poll_interval: DEFAULT_TASK_POLL_INTERVAL,
            closed: false,
        }
    }

    /// Sets the task poll interval
    #[must_use]
    pub const fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Remote session
    #[must_use]
    pub fn session(&self) -> &dyn VimSession {
        self.session.as_ref()
    }

    /// Endpoint host
    #[must_use]
    pub fn host(&self) -> &str {
        self.session.endpoint()
    }

    /// Logged in user
    #[must_use]
    pub fn user(&self) -> &str {
        &self.user
    }

    /// Password the session was opened with
    #[must_use]
    pub const fn password(&self) -> &SecretString {
        &self.password
    }

    /// Instance uuid of the remote domain
    #[must_use]
    pub fn instance_uuid(&self) -> &str {
        &self.session.service_content().about.instance_uuid
    }

    /// API version of the remote domain
    #[must_use]
    pub fn api_version(&self) -> &str {
        &self.session.service_content().about.api_version
    }

    /// Resource pool scope, if confined
    #[must_use]
    pub const fn resource_pool(&self) -> Option<&ManagedObjectRef> {
        self.resource_pool.as_ref()
    }

    /// Returns true if the session is confined to a resource pool
    #[must_use]
    pub const fn rp_confined(&self) -> bool {
        self.resource_pool.is_some()
    }

    /// Interval between task state polls
    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// Logs out
    ///
    /// # Errors
    ///
    /// Returns `ConnectionError::Transport` if the logout request fails; the
    /// connection counts as closed either way.
    pub fn close(mut self) -> ConnectionResult<()> {
        self.closed = true;
        self.session
            .logout()
            .map_err(|e| ConnectionError::Transport {
                endpoint: self.session.endpoint().to_string(),
                reason: e.to_string(),
            })
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        tracing::warn!(endpoint = %self.session.endpoint(), "connection dropped without close, logging out");
        if let Err(e) = self.session.logout() {
            tracing::warn!(endpoint = %self.session.endpoint(), error = %e, "logout failed");
        }
    }
}
