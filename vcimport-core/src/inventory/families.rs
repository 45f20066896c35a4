//! Per-family discovery helpers
//!
//! Each helper walks one part of a datacenter and returns what it found
//! together with the errors met on the way. A broken folder or object costs
//! its own entry, never the whole listing.

use std::collections::HashSet;

use serde_json::Value;

use super::{InventoryCache, StorageId, discover};
use crate::error::{InventoryError, InventoryResult};
use crate::vim::{
    ManagedObjectRef, VimSession, kinds, moref_list_property, moref_property, object_name,
    property_path,
};

/// A remote datacenter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Datacenter {
    /// Remote ref
    pub moref: ManagedObjectRef,
    /// Display name
    pub name: String,
}

/// A named remote object (cluster, network)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteObject {
    /// Remote ref
    pub moref: ManagedObjectRef,
    /// Display name
    pub name: String,
}

/// A VM template and the cluster it runs on
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteTemplate {
    /// Remote ref of the template VM
    pub moref: ManagedObjectRef,
    /// Display name
    pub name: String,
    /// Owning compute resource, `None` if the template has no host
    pub cluster: Option<ManagedObjectRef>,
    /// Configured virtual CPUs
    pub num_cpu: u64,
    /// Configured memory in MB
    pub memory_mb: u64,
}

/// Items found by a helper plus the failures met while finding them
#[derive(Debug)]
pub struct Discovered<T> {
    /// Items in remote order
    pub items: Vec<T>,
    /// Failures, one per broken entry
    pub errors: Vec<InventoryError>,
}

impl<T> Default for Discovered<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            errors: Vec::new(),
        }
    }
}

impl<T> Discovered<T> {
    fn failed(error: InventoryError) -> Self {
        Self {
            items: Vec::new(),
            errors: vec![error],
        }
    }
}

fn named_children(
    session: &dyn VimSession,
    container: &ManagedObjectRef,
    kind: &str,
) -> Discovered<RemoteObject> {
    let mut found = Discovered::default();
    for item in discover(session, container, kind) {
        match item.and_then(|moref| Ok(RemoteObject { name: object_name(session, &moref)?, moref })) {
            Ok(object) => found.items.push(object),
            Err(e) => found.errors.push(e),
        }
    }
    found
}

fn folder_of(
    session: &dyn VimSession,
    datacenter: &Datacenter,
    property: &str,
) -> InventoryResult<ManagedObjectRef> {
    moref_property(session, &datacenter.moref, property)?.ok_or_else(|| {
        InventoryError::Structure(format!("datacenter {} has no {property}", datacenter.name))
    })
}

/// Datastore folder of a datacenter
///
/// # Errors
///
/// Returns `InventoryError::Structure` if the datacenter has none.
pub fn datastore_folder(
    session: &dyn VimSession,
    datacenter: &Datacenter,
) -> InventoryResult<ManagedObjectRef> {
    folder_of(session, datacenter, "datastoreFolder")
}

/// Every datacenter below the root folder
pub fn list_datacenters(session: &dyn VimSession) -> Discovered<Datacenter> {
    let root = session.service_content().root_folder.clone();
    let found = named_children(session, &root, kinds::DATACENTER);
    Discovered {
        items: found
            .items
            .into_iter()
            .map(|o| Datacenter {
                moref: o.moref,
                name: o.name,
            })
            .collect(),
        errors: found.errors,
    }
}

/// Clusters below the host folder of a datacenter
pub fn list_clusters(session: &dyn VimSession, datacenter: &Datacenter) -> Discovered<RemoteObject> {
    match folder_of(session, datacenter, "hostFolder") {
        Ok(folder) => named_children(session, &folder, kinds::CLUSTER),
        Err(e) => Discovered::failed(e),
    }
}

fn read_template(session: &dyn VimSession, moref: ManagedObjectRef) -> InventoryResult<Option<RemoteTemplate>> {
    let config = property_path(session, &moref, "config")?;
    if config.get("template").and_then(Value::as_bool) != Some(true) {
        return Ok(None);
    }
    let hardware = config.get("hardware").cloned().unwrap_or(Value::Null);
    let name = config
        .get("name")
        .and_then(Value::as_str)
        .map(ToString::to_string)
        .map_or_else(|| object_name(session, &moref), Ok)?;

    let cluster = match moref_property(session, &moref, "runtime.host")? {
        Some(host) => moref_property(session, &host, "parent")?,
        None => None,
    };

    Ok(Some(RemoteTemplate {
        name,
        cluster,
        num_cpu: hardware.get("numCPU").and_then(Value::as_u64).unwrap_or(1),
        memory_mb: hardware.get("memoryMB").and_then(Value::as_u64).unwrap_or(0),
        moref,
    }))
}

/// VM templates below the vm folder of a datacenter
///
/// Plain VMs are walked past; only objects whose `config.template` is set
/// are returned.
pub fn list_templates(session: &dyn VimSession, datacenter: &Datacenter) -> Discovered<RemoteTemplate> {
    let folder = match folder_of(session, datacenter, "vmFolder") {
        Ok(folder) => folder,
        Err(e) => return Discovered::failed(e),
    };

    let mut found = Discovered::default();
    for item in discover(session, &folder, kinds::VIRTUAL_MACHINE) {
        match item.and_then(|vm| read_template(session, vm)) {
            Ok(Some(template)) => found.items.push(template),
            Ok(None) => {}
            Err(e) => found.errors.push(e),
        }
    }
    found
}

/// Networks attached to a cluster
pub fn list_networks(session: &dyn VimSession, cluster: &ManagedObjectRef) -> Discovered<RemoteObject> {
    let networks = match moref_list_property(session, cluster, "network") {
        Ok(networks) => networks,
        Err(e) => return Discovered::failed(e.into()),
    };

    let mut found = Discovered::default();
    for moref in networks {
        match object_name(session, &moref) {
            Ok(name) => found.items.push(RemoteObject { moref, name }),
            Err(e) => found.errors.push(e.into()),
        }
    }
    found
}

/// Storage visible from a cluster: its datastores, then the pods holding any of them
///
/// The cache must have been populated for the owning datacenter; refs it
/// does not know are constructed from the bare ref.
pub fn list_cluster_storage(
    session: &dyn VimSession,
    cache: &mut InventoryCache,
    cluster: &ManagedObjectRef,
) -> InventoryResult<Vec<StorageId>> {
    let datastores = moref_list_property(session, cluster, "datastore")?;

    let mut ids = Vec::new();
    let mut pods = Vec::new();
    for ds in &datastores {
        ids.push(cache.get(&ds.value));
        for pod in cache.aggregates_containing(&ds.value) {
            if !pods.contains(&pod) {
                pods.push(pod);
            }
        }
    }
    ids.extend(pods);
    Ok(ids)
}

/// Resource pool names of a cluster, nested pools as `parent/child`
///
/// The root pool itself is not listed.
///
/// # Errors
///
/// Returns `InventoryError::Remote` if a pool cannot be read and
/// `InventoryError::Structure` if the pool tree loops.
pub fn list_resource_pools(
    session: &dyn VimSession,
    cluster: &ManagedObjectRef,
) -> InventoryResult<Vec<String>> {
    let Some(root) = moref_property(session, cluster, "resourcePool")? else {
        return Ok(Vec::new());
    };

    let mut names = Vec::new();
    let mut visited = HashSet::from([root.value.clone()]);
    let mut pending: Vec<(ManagedObjectRef, String)> = moref_list_property(session, &root, "resourcePool")?
        .into_iter()
        .rev()
        .map(|rp| (rp, String::new()))
        .collect();

    while let Some((pool, prefix)) = pending.pop() {
        if !visited.insert(pool.value.clone()) {
            return Err(InventoryError::Structure(format!(
                "resource pool tree of {cluster} reaches {pool} twice"
            )));
        }
        let name = format!("{prefix}{}", object_name(session, &pool)?);
        for child in moref_list_property(session, &pool, "resourcePool")?.into_iter().rev() {
            pending.push((child, format!("{name}/")));
        }
        names.push(name);
    }
    Ok(names)
}
