//! `vcimport` Core Library
//!
//! Imports the inventory of a vCenter management plane (clusters, VM
//! templates, networks, datastores, storage pods, disk images) into an
//! OpenNebula cloud as hosts, templates, virtual networks, datastores and
//! images, without creating duplicates on repeated runs.
//!
//! # Crate Structure
//!
//! - [`vim`] - Remote session port, JSON API client and in-memory fake
//! - [`connection`] - Session lifecycle and stored credentials
//! - [`secret`] - Credential cipher shared with the target system
//! - [`one`] - Target system port, XML-RPC client and record format
//! - [`storage`] - Datastores and storage pods behind one contract
//! - [`inventory`] - Inventory walks and the run-scoped storage cache
//! - [`import`] - Per-family import pipeline and the operator port
//! - [`config`] - Settings file and environment overrides
//! - [`tracing`] - Subscriber setup and span names

#![warn(missing_docs)]

pub mod config;
pub mod connection;
pub mod error;
pub mod import;
pub mod inventory;
pub mod one;
pub mod secret;
pub mod storage;
pub mod tracing;
pub mod vim;

pub use config::{AppSettings, ConfigManager};
pub use connection::{ConnectOptions, Connection, ConnectionManager};
pub use error::{
    AllocateError, ConfigError, ConfigResult, ConnectionError, ConnectionResult, CredentialError,
    CredentialResult, ImportError, ImportResult, InventoryError, InventoryResult, RepositoryError,
    RepositoryResult, VcImportError,
};
pub use import::{
    AlwaysYes, CancelHandle, ConnectTarget, ImportFamily, ImportReport, Operator, Pipeline,
    PipelineState, ScriptedOperator,
};
pub use inventory::{InventoryCache, StorageId, monitor_datastores};
pub use one::{OneClient, OneRepository, PoolKind, TargetRecord};
pub use secret::{CipherConfig, CredentialCipher};
pub use storage::{DatastoreType, StorageEntity, StorageKind, Usage};
pub use tracing::{TracingConfig, TracingError, TracingLevel, TracingOutput, init_tracing, span_names};
pub use vim::{ManagedObjectRef, VimError, VimSession};
