//! Storage entities
//!
//! A [`StorageEntity`] wraps either a single datastore (`Volume`) or a
//! storage DRS pod (`Aggregate`). Both expose the same monitoring and
//! record-generation contract; only volumes hold files.
//!
//! The kind is decided once, from the remote type reported at discovery.
//! Bare refs that were never discovered fall back to the `group-` prefix
//! rule (see [`StorageEntity::from_bare_ref`]).

mod files;
mod images;
mod owner;
mod record;

use serde_json::Value;

use crate::error::InventoryResult;
use crate::one::PoolElement;
use crate::vim::{ManagedObjectRef, VimSession, kinds, object_name, property_path};

pub use images::{ImageType, image_display_name, image_import_record, strip_folder_prefix};
pub use owner::{datacenter_path, resolve_owning_datacenter};

/// Prefix of refs living in the aggregate (folder group) namespace
pub const AGGREGATE_PREFIX: &str = "group-";

/// Bytes in one megabyte as the remote side counts them
const MB: u64 = 1024 * 1024;

/// Structural kind of a storage entity
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageKind {
    /// Single datastore
    Volume,
    /// Storage pod grouping member datastores
    Aggregate {
        /// Member datastores, in remote order
        members: Vec<ManagedObjectRef>,
    },
}

/// Target datastore flavour
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DatastoreType {
    /// Holds images
    Image,
    /// Holds running VM files
    System,
}

impl DatastoreType {
    /// Record value of the `TYPE` attribute
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Image => "IMAGE_DS",
            Self::System => "SYSTEM_DS",
        }
    }

    /// Display-name suffix shown to the operator
    #[must_use]
    pub const fn suffix(self) -> &'static str {
        match self {
            Self::Image => "(IMG)",
            Self::System => "(SYS)",
        }
    }
}

/// Capacity figures in megabytes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Usage {
    /// Used space
    pub used_mb: u64,
    /// Free space
    pub free_mb: u64,
    /// Total capacity
    pub total_mb: u64,
}

impl Usage {
    /// Derives usage from the byte counters
    ///
    /// `used` is computed from the other two so that the three figures
    /// always add up, even from an inconsistent snapshot.
    #[must_use]
    pub const fn from_bytes(capacity: u64, free_space: u64) -> Self {
        let total_mb = capacity / 1024 / 1024;
        let free_mb = free_space / 1024 / 1024;
        Self {
            used_mb: total_mb.saturating_sub(free_mb),
            free_mb,
            total_mb,
        }
    }

    /// Monitoring lines `USED_MB=`, `FREE_MB=`, `TOTAL_MB=`
    #[must_use]
    pub fn monitor_lines(&self) -> String {
        format!(
            "USED_MB={}\nFREE_MB={}\nTOTAL_MB={}",
            self.used_mb, self.free_mb, self.total_mb
        )
    }
}

/// A cached storage object
#[derive(Debug, Clone, PartialEq)]
pub struct StorageEntity {
    moref: ManagedObjectRef,
    kind: StorageKind,
    name: Option<String>,
    one_item: Option<PoolElement>,
}

impl StorageEntity {
    /// Creates a volume handle
    #[must_use]
    pub fn volume(moref: ManagedObjectRef, name: Option<String>) -> Self {
        Self {
            moref,
            kind: StorageKind::Volume,
            name,
            one_item: None,
        }
    }

    /// Creates an aggregate handle
    #[must_use]
    pub fn aggregate(
        moref: ManagedObjectRef,
        name: Option<String>,
        members: Vec<ManagedObjectRef>,
    ) -> Self {
        Self {
            moref,
            kind: StorageKind::Aggregate { members },
            name,
            one_item: None,
        }
    }

    /// Creates a handle from a bare ref that was never discovered
    ///
    /// Refs in the `group-` namespace are aggregates, anything else is a
    /// volume.
    #[must_use]
    pub fn from_bare_ref(value: &str) -> Self {
        if value.starts_with(AGGREGATE_PREFIX) {
            Self::aggregate(ManagedObjectRef::new(kinds::STORAGE_POD, value), None, Vec::new())
        } else {
            Self::volume(ManagedObjectRef::new(kinds::DATASTORE, value), None)
        }
    }

    /// Remote ref
    #[must_use]
    pub const fn moref(&self) -> &ManagedObjectRef {
        &self.moref
    }

    /// Structural kind
    #[must_use]
    pub const fn kind(&self) -> &StorageKind {
        &self.kind
    }

    /// Returns true for storage pods
    #[must_use]
    pub const fn is_aggregate(&self) -> bool {
        matches!(self.kind, StorageKind::Aggregate { .. })
    }

    /// Member datastores of an aggregate (empty for volumes)
    #[must_use]
    pub fn members(&self) -> &[ManagedObjectRef] {
        match &self.kind {
            StorageKind::Volume => &[],
            StorageKind::Aggregate { members } => members,
        }
    }

    /// Name read at discovery, if any
    #[must_use]
    pub fn known_name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Returns the name, reading it from the remote side if unknown
    ///
    /// # Errors
    ///
    /// Returns `InventoryError::Remote` if the read fails.
    pub fn name(&self, session: &dyn VimSession) -> InventoryResult<String> {
        match &self.name {
            Some(name) => Ok(name.clone()),
            None => Ok(object_name(session, &self.moref)?),
        }
    }

    /// Target system record, once imported
    #[must_use]
    pub const fn one_item(&self) -> Option<&PoolElement> {
        self.one_item.as_ref()
    }

    /// Attaches the target system record
    pub fn set_one_item(&mut self, item: PoolElement) {
        self.one_item = Some(item);
    }

    /// Copies what a fresh handle for the same ref does not know yet
    pub(crate) fn refresh_from(&mut self, fresh: Self) {
        let one_item = self.one_item.take();
        *self = fresh;
        if self.one_item.is_none() {
            self.one_item = one_item;
        }
    }

    /// Reads capacity and free space
    ///
    /// Missing counters read as zero.
    ///
    /// # Errors
    ///
    /// Returns `InventoryError::Remote` if the summary cannot be read.
    pub fn usage(&self, session: &dyn VimSession) -> InventoryResult<Usage> {
        let summary = property_path(session, &self.moref, "summary")?;
        let counter = |key: &str| summary.get(key).and_then(Value::as_u64).unwrap_or(0);
        Ok(Usage::from_bytes(counter("capacity"), counter("freeSpace")))
    }
}

/// Megabytes for a byte count, rounded down
#[must_use]
pub const fn bytes_to_mb(bytes: u64) -> u64 {
    bytes / MB
}
