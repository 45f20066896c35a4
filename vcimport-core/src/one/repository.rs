//! Target system repository port

use std::collections::BTreeMap;
use std::fmt;

use crate::error::{AllocateError, RepositoryError, RepositoryResult};

use super::TargetRecord;

/// Resource pools of the target system the importer reads and writes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PoolKind {
    /// Hosts (one per imported cluster)
    Host,
    /// Datastores
    Datastore,
    /// Images
    Image,
    /// VM templates
    Template,
    /// Virtual networks
    VirtualNetwork,
}

impl PoolKind {
    /// All pool kinds
    pub const ALL: [Self; 5] = [
        Self::Host,
        Self::Datastore,
        Self::Image,
        Self::Template,
        Self::VirtualNetwork,
    ];

    /// Short human name
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Host => "host",
            Self::Datastore => "datastore",
            Self::Image => "image",
            Self::Template => "template",
            Self::VirtualNetwork => "virtual network",
        }
    }

    /// XML element name of one pool entry
    #[must_use]
    pub const fn element_tag(self) -> &'static str {
        match self {
            Self::Host => "HOST",
            Self::Datastore => "DATASTORE",
            Self::Image => "IMAGE",
            Self::Template => "VMTEMPLATE",
            Self::VirtualNetwork => "VNET",
        }
    }

    /// XML-RPC method prefix (`one.<prefix>.allocate`, `one.<prefix>pool.info`)
    #[must_use]
    pub const fn method_prefix(self) -> &'static str {
        match self {
            Self::Host => "host",
            Self::Datastore => "datastore",
            Self::Image => "image",
            Self::Template => "template",
            Self::VirtualNetwork => "vn",
        }
    }
}

impl fmt::Display for PoolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One entry of a target system pool
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PoolElement {
    /// Numeric id assigned by the target system
    pub id: i64,
    /// Element name
    pub name: String,
    /// Scalar template attributes
    pub template: BTreeMap<String, String>,
}

impl PoolElement {
    /// Returns a template attribute
    #[must_use]
    pub fn attr(&self, key: &str) -> Option<&str> {
        self.template.get(key).map(String::as_str)
    }

    /// Returns true if every `(key, value)` pair matches a template attribute
    #[must_use]
    pub fn matches(&self, attrs: &[(&str, &str)]) -> bool {
        attrs.iter().all(|(k, v)| self.attr(k) == Some(*v))
    }
}

/// Read and allocate access to the target system
///
/// Reads are used for dedup and credential lookup; `allocate` commits one
/// record. Nothing here is transactional: a pool read followed by an
/// allocate can race with other writers.
pub trait OneRepository {
    /// Reads every element of a pool
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the pool cannot be read.
    fn pool(&self, kind: PoolKind) -> RepositoryResult<Vec<PoolElement>>;

    /// Reads one host record
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` for an unknown id.
    fn host(&self, id: i64) -> RepositoryResult<PoolElement>;

    /// Reads the target system configuration (flat key/value view)
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the configuration cannot be read.
    fn system_config(&self) -> RepositoryResult<BTreeMap<String, String>>;

    /// Submits a record and returns the new element id
    ///
    /// `placement` is the datastore id for images and the cluster id for
    /// the other kinds (`None` = default cluster).
    ///
    /// # Errors
    ///
    /// Returns `AllocateError::Rejected` with the target system's message if
    /// the record is refused.
    fn allocate(
        &self,
        kind: PoolKind,
        record: &TargetRecord,
        placement: Option<i64>,
    ) -> Result<i64, AllocateError>;

    /// Finds a pool element by exact name
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the pool cannot be read.
    fn find_by_name(&self, kind: PoolKind, name: &str) -> RepositoryResult<Option<PoolElement>> {
        Ok(self.pool(kind)?.into_iter().find(|e| e.name == name))
    }

    /// Finds a host id by name
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if no host has that name.
    fn host_id_by_name(&self, name: &str) -> RepositoryResult<i64> {
        self.find_by_name(PoolKind::Host, name)?
            .map(|h| h.id)
            .ok_or_else(|| RepositoryError::NotFound {
                kind: PoolKind::Host.label(),
                key: name.to_string(),
            })
    }
}

impl<T: OneRepository + ?Sized> OneRepository for &T {
    fn pool(&self, kind: PoolKind) -> RepositoryResult<Vec<PoolElement>> {
        (**self).pool(kind)
    }

    fn host(&self, id: i64) -> RepositoryResult<PoolElement> {
        (**self).host(id)
    }

    fn system_config(&self) -> RepositoryResult<BTreeMap<String, String>> {
        (**self).system_config()
    }

    fn allocate(
        &self,
        kind: PoolKind,
        record: &TargetRecord,
        placement: Option<i64>,
    ) -> Result<i64, AllocateError> {
        (**self).allocate(kind, record, placement)
    }
}
