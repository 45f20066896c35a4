//! Run-scoped storage cache

use std::collections::HashMap;
use std::fmt::Write as _;

use super::discover;
use crate::error::InventoryError;
use crate::storage::StorageEntity;
use crate::tracing::span_names;
use crate::vim::{ManagedObjectRef, VimSession, kinds, moref_list_property, string_property};

/// Stable handle to a cache slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StorageId(usize);

impl StorageId {
    /// Slot index
    #[must_use]
    pub const fn index(self) -> usize {
        self.0
    }
}

/// Outcome of a bulk populate
#[derive(Debug, Default)]
pub struct FetchSummary {
    /// Datastores inserted or refreshed
    pub volumes: usize,
    /// Storage pods inserted or refreshed
    pub aggregates: usize,
    /// Failures met on the way; the remaining objects were still cached
    pub errors: Vec<InventoryError>,
}

/// Arena of storage entities keyed by remote ref
///
/// Slots are never removed during a run, so a [`StorageId`] stays valid
/// for the lifetime of the cache.
#[derive(Debug, Default)]
pub struct InventoryCache {
    slots: Vec<StorageEntity>,
    index: HashMap<String, StorageId>,
    fallback_constructions: usize,
}

impl InventoryCache {
    /// Creates an empty cache
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the slot of `reference`, constructing a handle on a miss
    ///
    /// Misses are classified by the `group-` prefix rule and counted.
    pub fn get(&mut self, reference: &str) -> StorageId {
        if let Some(id) = self.index.get(reference) {
            return *id;
        }
        self.fallback_constructions += 1;
        tracing::debug!(reference, "storage cache miss, constructing from bare ref");
        self.push(StorageEntity::from_bare_ref(reference))
    }

    /// Returns the slot of `reference` without constructing anything
    #[must_use]
    pub fn lookup(&self, reference: &str) -> Option<StorageId> {
        self.index.get(reference).copied()
    }

    /// Inserts an entity, refreshing the existing slot for the same ref
    pub fn insert(&mut self, entity: StorageEntity) -> StorageId {
        match self.index.get(&entity.moref().value) {
            Some(&id) => {
                self.slots[id.0].refresh_from(entity);
                id
            }
            None => self.push(entity),
        }
    }

    fn push(&mut self, entity: StorageEntity) -> StorageId {
        let id = StorageId(self.slots.len());
        self.index.insert(entity.moref().value.clone(), id);
        self.slots.push(entity);
        id
    }

    /// Entity in a slot
    ///
    /// # Panics
    ///
    /// Panics if `id` comes from another cache.
    #[must_use]
    pub fn entity(&self, id: StorageId) -> &StorageEntity {
        &self.slots[id.0]
    }

    /// Mutable entity in a slot
    ///
    /// # Panics
    ///
    /// Panics if `id` comes from another cache.
    pub fn entity_mut(&mut self, id: StorageId) -> &mut StorageEntity {
        &mut self.slots[id.0]
    }

    /// Number of cached entities
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Returns true if nothing is cached
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// All slot ids in insertion order
    pub fn ids(&self) -> impl Iterator<Item = StorageId> + use<> {
        (0..self.slots.len()).map(StorageId)
    }

    /// Number of misses resolved from a bare ref
    #[must_use]
    pub const fn fallback_constructions(&self) -> usize {
        self.fallback_constructions
    }

    /// Aggregates listing `member` among their datastores
    #[must_use]
    pub fn aggregates_containing(&self, member: &str) -> Vec<StorageId> {
        self.ids()
            .filter(|id| self.entity(*id).members().iter().any(|m| m.value == member))
            .collect()
    }

    /// Populates the cache with every datastore and pod below `container`
    ///
    /// Each entity is classified by the remote type reported by the walk.
    /// Pod members are cached as volumes too. Running it again refreshes the
    /// existing slots.
    pub fn fetch_all(&mut self, session: &dyn VimSession, container: &ManagedObjectRef) -> FetchSummary {
        let _span = crate::trace_operation!(span_names::INVENTORY_FETCH, container = %container).entered();
        let mut summary = FetchSummary::default();

        for item in discover(session, container, kinds::DATASTORE) {
            match item.and_then(|ds| Ok((string_property(session, &ds, "name")?, ds))) {
                Ok((name, ds)) => {
                    self.insert(StorageEntity::volume(ds, name));
                    summary.volumes += 1;
                }
                Err(e) => summary.errors.push(e),
            }
        }

        for item in discover(session, container, kinds::STORAGE_POD) {
            let pod = match item {
                Ok(pod) => pod,
                Err(e) => {
                    summary.errors.push(e);
                    continue;
                }
            };
            let listed = string_property(session, &pod, "name").and_then(|name| {
                Ok((name, moref_list_property(session, &pod, "childEntity")?))
            });
            match listed {
                Ok((name, children)) => {
                    let members: Vec<ManagedObjectRef> = children
                        .into_iter()
                        .filter(|c| c.is(kinds::DATASTORE))
                        .collect();
                    for member in &members {
                        if self.lookup(&member.value).is_none() {
                            self.insert(StorageEntity::volume(member.clone(), None));
                            summary.volumes += 1;
                        }
                    }
                    self.insert(StorageEntity::aggregate(pod, name, members));
                    summary.aggregates += 1;
                }
                Err(e) => summary.errors.push(InventoryError::Remote(e)),
            }
        }

        for error in &summary.errors {
            tracing::warn!(container = %container, error = %error, "storage discovery error");
        }
        tracing::debug!(
            container = %container,
            volumes = summary.volumes,
            aggregates = summary.aggregates,
            cached = self.len(),
            "storage cache populated"
        );
        summary
    }

    /// One `VCENTER_DS_REF="<ref>"` line per cached entity
    #[must_use]
    pub fn monitor_report(&self) -> String {
        let mut report = String::new();
        for entity in &self.slots {
            let _ = writeln!(report, "VCENTER_DS_REF=\"{}\"", entity.moref().value);
        }
        report
    }
}
