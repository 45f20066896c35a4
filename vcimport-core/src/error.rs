//! Error types for `vcimport-core`
//!
//! Each concern owns an error enum with a matching `*Result<T>` alias.
//! `VcImportError` aggregates them for callers that only need to report
//! and exit.

use std::path::PathBuf;

use thiserror::Error;

use crate::vim::VimError;

/// Errors raised while establishing or tearing down a remote session
#[derive(Debug, Error)]
pub enum ConnectionError {
    /// The endpoint could not be reached or answered garbage
    #[error("Transport error talking to {endpoint}: {reason}")]
    Transport {
        /// Endpoint host the session was opened against
        endpoint: String,
        /// Underlying transport failure
        reason: String,
    },

    /// The endpoint rejected the credentials
    #[error("Authentication failed for {user}@{endpoint}: {reason}")]
    Authentication {
        /// User that attempted to log in
        user: String,
        /// Endpoint host
        endpoint: String,
        /// Fault text returned by the endpoint
        reason: String,
    },

    /// Connection options are unusable (empty host, empty user, ...)
    #[error("Invalid connection options: {0}")]
    InvalidOptions(String),
}

/// Result type alias for connection operations
pub type ConnectionResult<T> = std::result::Result<T, ConnectionError>;

/// Errors raised while resolving stored credentials
#[derive(Debug, Error)]
pub enum CredentialError {
    /// A host record, attribute or system configuration value is missing
    #[error("Lookup failed: {0}")]
    Lookup(String),

    /// The secret could not be decrypted (or encrypted) with the token
    #[error("Crypto error: {0}")]
    Crypto(String),
}

/// Result type alias for credential operations
pub type CredentialResult<T> = std::result::Result<T, CredentialError>;

/// Errors raised while walking or operating on the remote inventory
#[derive(Debug, Error)]
pub enum InventoryError {
    /// The inventory graph is malformed (no owning datacenter, cycles, ...)
    #[error("Malformed inventory: {0}")]
    Structure(String),

    /// A remote datastore search task failed
    #[error("Datastore search failed: {0}")]
    Search(String),

    /// A remote task (copy, delete, mkdir) failed
    #[error("Remote task failed: {0}")]
    Task(String),

    /// Low-level failure of the remote session
    #[error(transparent)]
    Remote(#[from] VimError),
}

/// Result type alias for inventory operations
pub type InventoryResult<T> = std::result::Result<T, InventoryError>;

/// Errors raised by the target system's allocate operation
#[derive(Debug, Clone, Error)]
pub enum AllocateError {
    /// The target system refused the record
    #[error("{0}")]
    Rejected(String),

    /// The target system could not be reached
    #[error("Target system unreachable: {0}")]
    Transport(String),
}

impl AllocateError {
    /// Message fragment the target system uses for its capacity check
    pub const CAPACITY_CHECK_MESSAGE: &'static str = "Not enough space in datastore";

    /// Message fragment of a duplicate-name rejection
    pub const NAME_TAKEN_MESSAGE: &'static str = "already taken";

    /// Returns true if this rejection comes from the datastore capacity check
    #[must_use]
    pub fn is_capacity_check(&self) -> bool {
        matches!(self, Self::Rejected(msg) if msg.contains(Self::CAPACITY_CHECK_MESSAGE))
    }

    /// Returns true if an element with the same name already exists
    #[must_use]
    pub fn is_name_taken(&self) -> bool {
        matches!(self, Self::Rejected(msg) if msg.contains(Self::NAME_TAKEN_MESSAGE))
    }
}

/// Errors raised while reading from the target system
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Transport failure
    #[error("Target system unreachable: {0}")]
    Transport(String),

    /// The target system answered with an error
    #[error("Target system error: {0}")]
    Remote(String),

    /// The response could not be parsed
    #[error("Malformed target system response: {0}")]
    Parse(String),

    /// No element with the requested id or name
    #[error("{kind} not found: {key}")]
    NotFound {
        /// Pool kind searched
        kind: &'static str,
        /// Id or name that was looked up
        key: String,
    },
}

/// Result type alias for repository reads
pub type RepositoryResult<T> = std::result::Result<T, RepositoryError>;

/// Errors that abort a whole import operation
#[derive(Debug, Error)]
pub enum ImportError {
    /// Session could not be established
    #[error(transparent)]
    Connection(#[from] ConnectionError),

    /// Credentials could not be resolved
    #[error(transparent)]
    Credential(#[from] CredentialError),

    /// Inventory walk failed
    #[error(transparent)]
    Inventory(#[from] InventoryError),

    /// Target system pools could not be read
    #[error("Could not read target system pools: {0}")]
    Repository(#[from] RepositoryError),

    /// The operator prompt failed for a reason other than interruption
    #[error("Prompt failed: {0}")]
    Prompt(String),

    /// The operator cancelled the run
    #[error("Import cancelled by operator")]
    Interrupted,
}

/// Result type alias for import operations
pub type ImportResult<T> = std::result::Result<T, ImportError>;

/// Errors related to configuration files
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be parsed
    #[error("Failed to parse {path}: {reason}")]
    Parse {
        /// File that failed to parse
        path: PathBuf,
        /// Parser message
        reason: String,
    },

    /// The configuration could not be serialized
    #[error("Failed to serialize settings: {0}")]
    Serialize(String),

    /// No configuration directory could be determined
    #[error("Could not determine configuration directory")]
    NoConfigDir,

    /// The target system authentication file is missing or empty
    #[error("Invalid auth file {path}: {reason}")]
    AuthFile {
        /// Auth file path
        path: PathBuf,
        /// What is wrong with it
        reason: String,
    },

    /// IO error while reading or writing configuration
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Top-level error for `vcimport`
#[derive(Debug, Error)]
pub enum VcImportError {
    /// Configuration error
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Connection error
    #[error(transparent)]
    Connection(#[from] ConnectionError),

    /// Credential error
    #[error(transparent)]
    Credential(#[from] CredentialError),

    /// Inventory error
    #[error(transparent)]
    Inventory(#[from] InventoryError),

    /// Target system read error
    #[error(transparent)]
    Repository(#[from] RepositoryError),

    /// Import pipeline error
    #[error(transparent)]
    Import(#[from] ImportError),

    /// IO error
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capacity_check_is_recognized() {
        let err = AllocateError::Rejected(
            "[one.image.allocate] Not enough space in datastore".to_string(),
        );
        assert!(err.is_capacity_check());

        let other = AllocateError::Rejected("NAME is already taken".to_string());
        assert!(!other.is_capacity_check());
        assert!(other.is_name_taken());
        assert!(!AllocateError::Transport("refused".to_string()).is_capacity_check());
    }
}
