//! Remote inventory discovery and the run-scoped storage cache
//!
//! [`discover`] walks a container lazily; the family helpers build on it to
//! list datacenters, clusters, templates, networks and the storage visible
//! from a cluster. [`InventoryCache`] keeps one [`StorageEntity`] per remote
//! ref for the duration of a run.
//!
//! [`StorageEntity`]: crate::storage::StorageEntity

mod cache;
mod discovery;
mod families;
mod monitor;

pub use cache::{FetchSummary, InventoryCache, StorageId};
pub use discovery::{EntityWalk, discover};
pub use families::{
    Datacenter, Discovered, RemoteObject, RemoteTemplate, datastore_folder, list_cluster_storage, list_clusters,
    list_datacenters, list_networks, list_resource_pools, list_templates,
};
pub use monitor::{DatastoreMonitor, monitor_datastores};
