//! CLI error types and exit codes.

use vcimport_core::error::{ImportError, VcImportError};

/// Exit codes for CLI operations
pub mod exit_codes {
    /// General error - configuration, credentials, inventory or target system
    pub const GENERAL_ERROR: i32 = 1;
    /// Connection failure - the vCenter session could not be established
    pub const CONNECTION_FAILURE: i32 = 2;
    /// The operator cancelled the run (Ctrl+C)
    pub const CANCELLED: i32 = 130;
}

/// CLI error type
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// vCenter session could not be opened
    #[error("Connection error: {0}")]
    Connection(String),

    /// Stored credentials could not be resolved
    #[error("Credential error: {0}")]
    Credential(String),

    /// OpenNebula could not be read
    #[error("OpenNebula error: {0}")]
    Target(String),

    /// Import failed as a whole
    #[error("Import error: {0}")]
    Import(String),

    /// Operator cancelled the run
    #[error("Cancelled by operator")]
    Cancelled,

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<VcImportError> for CliError {
    fn from(err: VcImportError) -> Self {
        match err {
            VcImportError::Config(e) => Self::Config(e.to_string()),
            VcImportError::Connection(e) => Self::Connection(e.to_string()),
            VcImportError::Credential(e) => Self::Credential(e.to_string()),
            VcImportError::Inventory(e) => Self::Import(e.to_string()),
            VcImportError::Repository(e) => Self::Target(e.to_string()),
            VcImportError::Import(e) => e.into(),
            VcImportError::Io(e) => Self::Io(e),
        }
    }
}

impl From<ImportError> for CliError {
    fn from(err: ImportError) -> Self {
        match err {
            ImportError::Connection(e) => Self::Connection(e.to_string()),
            ImportError::Credential(e) => Self::Credential(e.to_string()),
            ImportError::Repository(e) => Self::Target(e.to_string()),
            ImportError::Interrupted => Self::Cancelled,
            e @ (ImportError::Inventory(_) | ImportError::Prompt(_)) => Self::Import(e.to_string()),
        }
    }
}

impl CliError {
    /// Returns the appropriate exit code for this error type.
    ///
    /// Exit codes:
    /// - 0: Success (not an error)
    /// - 1: General error (configuration, credentials, inventory, target system, IO)
    /// - 2: Connection failure
    /// - 130: Cancelled by the operator
    #[must_use]
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::Connection(_) => exit_codes::CONNECTION_FAILURE,
            Self::Cancelled => exit_codes::CANCELLED,
            Self::Config(_)
            | Self::Credential(_)
            | Self::Target(_)
            | Self::Import(_)
            | Self::Io(_) => exit_codes::GENERAL_ERROR,
        }
    }
}
