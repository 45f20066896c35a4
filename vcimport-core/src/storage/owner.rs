//! Ownership chain resolution

use std::collections::HashSet;

use super::StorageEntity;
use crate::error::{InventoryError, InventoryResult};
use crate::inventory::Datacenter;
use crate::vim::{ManagedObjectRef, VimSession, kinds, moref_property, object_name};

/// Walks `parent` links upward until a datacenter is found
///
/// A datacenter passed in is its own owner.
///
/// # Errors
///
/// Returns `InventoryError::Structure` if the chain ends without a
/// datacenter or revisits an object.
pub fn resolve_owning_datacenter(
    session: &dyn VimSession,
    obj: &ManagedObjectRef,
) -> InventoryResult<Datacenter> {
    let mut visited = HashSet::new();
    let mut current = obj.clone();

    loop {
        if current.is(kinds::DATACENTER) {
            let name = object_name(session, &current)?;
            return Ok(Datacenter {
                moref: current,
                name,
            });
        }
        if !visited.insert(current.value.clone()) {
            return Err(InventoryError::Structure(format!(
                "parent chain of {obj} loops back to {current}"
            )));
        }
        let Some(parent) = moref_property(session, &current, "parent")? else {
            return Err(InventoryError::Structure(format!(
                "{obj} has no owning datacenter"
            )));
        };
        current = parent;
    }
}

/// Folder path of a datacenter below the root folder, e.g. `Europe/DC1`
///
/// # Errors
///
/// Returns `InventoryError::Structure` if the chain loops.
pub fn datacenter_path(session: &dyn VimSession, datacenter: &Datacenter) -> InventoryResult<String> {
    let root = &session.service_content().root_folder;
    let mut visited = HashSet::new();
    let mut segments = vec![datacenter.name.clone()];
    let mut current = datacenter.moref.clone();

    while let Some(parent) = moref_property(session, &current, "parent")? {
        if parent == *root {
            break;
        }
        if !visited.insert(parent.value.clone()) {
            return Err(InventoryError::Structure(format!(
                "folder chain of {} loops back to {parent}",
                datacenter.moref
            )));
        }
        segments.push(object_name(session, &parent)?);
        current = parent;
    }

    segments.reverse();
    Ok(segments.join("/"))
}

impl StorageEntity {
    /// Datacenter owning this datastore or pod
    ///
    /// # Errors
    ///
    /// Returns `InventoryError::Structure` for malformed inventories.
    pub fn resolve_owning_datacenter(&self, session: &dyn VimSession) -> InventoryResult<Datacenter> {
        resolve_owning_datacenter(session, self.moref())
    }
}
