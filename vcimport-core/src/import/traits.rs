//! Candidate and report types shared by the import families.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::one::TargetRecord;
use crate::storage::{DatastoreType, ImageType};
use crate::vim::ManagedObjectRef;

/// Entity family handled by one import operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportFamily {
    /// Clusters, imported as hosts
    Clusters,
    /// VM templates
    Templates,
    /// Networks of imported clusters
    Networks,
    /// Datastores and storage pods of imported clusters
    Datastores,
    /// Images stored on one imported datastore
    Images {
        /// Name of the datastore in the target system
        datastore: String,
    },
}

impl ImportFamily {
    /// Plural label used in operator messages
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Clusters => "clusters",
            Self::Templates => "VM Templates",
            Self::Networks => "Networks",
            Self::Datastores => "Datastores or StoragePods",
            Self::Images { .. } => "Images",
        }
    }
}

impl fmt::Display for ImportFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Cluster already present in the target system as a host
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportedCluster {
    /// Remote cluster ref (`VCENTER_CCR_REF`)
    pub ccr_ref: String,
    /// Target system host id
    pub host_id: i64,
    /// Host name in the target system
    pub name: String,
}

/// Family-specific data shown to the operator alongside a candidate
#[derive(Debug, Clone, PartialEq)]
pub enum CandidateDetails {
    /// A cluster
    Cluster,
    /// A VM template
    Template {
        /// Owning cluster name
        cluster_name: String,
        /// Resource pools of the owning cluster
        resource_pools: Vec<String>,
    },
    /// A network
    Network {
        /// Cluster the network is attached to
        cluster_name: String,
        /// Human readable remote network type
        network_type: String,
    },
    /// A datastore or storage pod for one cluster
    Datastore {
        /// Cluster the datastore is imported for
        cluster_name: String,
        /// Image or system datastore
        ds_type: DatastoreType,
        /// Total capacity
        total_mb: u64,
        /// Free space
        free_mb: u64,
    },
    /// An image file on a datastore
    Image {
        /// Datastore holding the file
        datastore: String,
        /// Path relative to the datastore root
        path: String,
        /// File size, when the search reported one
        size_mb: Option<u64>,
        /// Image flavour
        image_type: ImageType,
    },
}

/// A remote object about to be imported
#[derive(Debug, Clone, PartialEq)]
pub struct ImportCandidate {
    /// Name shown to the operator and used as the record `NAME`
    pub display_name: String,
    /// Remote ref of the object
    pub remote_ref: ManagedObjectRef,
    /// Record submitted on commit
    pub record: TargetRecord,
    /// Extra data for prompts
    pub details: CandidateDetails,
}

/// A record accepted by the target system
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommittedEntry {
    /// Display name of the candidate
    pub name: String,
    /// Remote ref of the imported object
    pub remote_ref: ManagedObjectRef,
    /// Id assigned by the target system
    pub id: i64,
}

/// An entry that was not imported on purpose
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedEntry {
    /// Name of the skipped item
    pub identifier: String,
    /// Why it was skipped
    pub reason: String,
}

impl SkippedEntry {
    /// Creates a new skipped entry
    #[must_use]
    pub fn new(identifier: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            reason: reason.into(),
        }
    }
}

/// An item whose import failed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemFailure {
    /// Name of the failing item
    pub identifier: String,
    /// Operator-visible message
    pub message: String,
}

impl ItemFailure {
    /// Creates a new failure entry
    #[must_use]
    pub fn new(identifier: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            message: message.into(),
        }
    }
}

/// Outcome of one import operation
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ImportReport {
    /// Records accepted by the target system
    pub committed: Vec<CommittedEntry>,
    /// Items left out (already imported, declined, missing cluster)
    pub skipped: Vec<SkippedEntry>,
    /// Items that failed
    pub errors: Vec<ItemFailure>,
}

impl ImportReport {
    /// Creates an empty report
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the total number of items processed
    #[must_use]
    pub fn total_processed(&self) -> usize {
        self.committed.len() + self.skipped.len() + self.errors.len()
    }

    /// Returns true if any item failed
    #[must_use]
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Returns true if any item was skipped
    #[must_use]
    pub fn has_skipped(&self) -> bool {
        !self.skipped.is_empty()
    }

    /// One-line summary
    #[must_use]
    pub fn summary(&self) -> String {
        format!(
            "Imported: {}, Skipped: {}, Errors: {}",
            self.committed.len(),
            self.skipped.len(),
            self.errors.len()
        )
    }

    /// Records a committed candidate
    pub fn add_committed(&mut self, candidate: &ImportCandidate, id: i64) {
        self.committed.push(CommittedEntry {
            name: candidate.display_name.clone(),
            remote_ref: candidate.remote_ref.clone(),
            id,
        });
    }

    /// Records a skipped item
    pub fn add_skipped(&mut self, entry: SkippedEntry) {
        self.skipped.push(entry);
    }

    /// Records a failed item
    pub fn add_failure(&mut self, failure: ItemFailure) {
        self.errors.push(failure);
    }

    /// Merges another report into this one
    pub fn merge(&mut self, other: Self) {
        self.committed.extend(other.committed);
        self.skipped.extend(other.skipped);
        self.errors.extend(other.errors);
    }
}

/// Cancellation flag shared with a signal handler
///
/// Clones observe the same flag.
#[derive(Debug, Clone, Default)]
pub struct CancelHandle {
    cancelled: Arc<AtomicBool>,
}

impl CancelHandle {
    /// Creates a handle that is not cancelled
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Signals cancellation
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Returns true if cancellation has been requested
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}
