//! In-memory target system

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;

use super::record::RecordValue;
use super::repository::{OneRepository, PoolElement, PoolKind};
use super::TargetRecord;
use crate::error::{AllocateError, RepositoryError, RepositoryResult};

/// One accepted allocate call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Allocation {
    /// Pool the record went to
    pub kind: PoolKind,
    /// Submitted record
    pub record: TargetRecord,
    /// Datastore or cluster id passed along
    pub placement: Option<i64>,
    /// Id handed out
    pub id: i64,
}

/// In-memory [`OneRepository`]
///
/// Allocations are stored as pool elements so that a second run sees the
/// first run's records.
#[derive(Debug, Default)]
pub struct MemoryRepository {
    pools: RefCell<BTreeMap<PoolKind, Vec<PoolElement>>>,
    system_config: BTreeMap<String, String>,
    rejections: BTreeMap<PoolKind, String>,
    allocations: RefCell<Vec<Allocation>>,
    next_id: Cell<i64>,
}

impl MemoryRepository {
    /// Creates an empty target system
    #[must_use]
    pub fn new() -> Self {
        Self {
            next_id: Cell::new(100),
            ..Self::default()
        }
    }

    /// Adds an existing pool element
    #[must_use]
    pub fn with_element(self, kind: PoolKind, element: PoolElement) -> Self {
        self.pools.borrow_mut().entry(kind).or_default().push(element);
        self
    }

    /// Sets a system configuration value (e.g. `ONE_KEY`)
    #[must_use]
    pub fn with_config(mut self, key: &str, value: &str) -> Self {
        self.system_config
            .insert(key.to_string(), value.to_string());
        self
    }

    /// Makes every allocation into `kind` fail with `message`
    #[must_use]
    pub fn with_rejection(mut self, kind: PoolKind, message: &str) -> Self {
        self.rejections.insert(kind, message.to_string());
        self
    }

    /// Every successful allocation, in order
    #[must_use]
    pub fn allocations(&self) -> Vec<Allocation> {
        self.allocations.borrow().clone()
    }

    /// Successful allocations into one pool
    #[must_use]
    pub fn allocations_of(&self, kind: PoolKind) -> Vec<Allocation> {
        self.allocations
            .borrow()
            .iter()
            .filter(|a| a.kind == kind)
            .cloned()
            .collect()
    }
}

impl OneRepository for MemoryRepository {
    fn pool(&self, kind: PoolKind) -> RepositoryResult<Vec<PoolElement>> {
        Ok(self.pools.borrow().get(&kind).cloned().unwrap_or_default())
    }

    fn host(&self, id: i64) -> RepositoryResult<PoolElement> {
        self.pool(PoolKind::Host)?
            .into_iter()
            .find(|h| h.id == id)
            .ok_or_else(|| RepositoryError::NotFound {
                kind: PoolKind::Host.label(),
                key: id.to_string(),
            })
    }

    fn system_config(&self) -> RepositoryResult<BTreeMap<String, String>> {
        Ok(self.system_config.clone())
    }

    fn allocate(
        &self,
        kind: PoolKind,
        record: &TargetRecord,
        placement: Option<i64>,
    ) -> Result<i64, AllocateError> {
        if let Some(message) = self.rejections.get(&kind) {
            return Err(AllocateError::Rejected(message.clone()));
        }
        if kind == PoolKind::Image && placement.is_none() {
            return Err(AllocateError::Rejected(
                "an image needs a target datastore".to_string(),
            ));
        }

        let id = self.next_id.get();
        self.next_id.set(id + 1);

        let template = record
            .entries()
            .iter()
            .filter_map(|(k, v)| match v {
                RecordValue::Scalar(s) => Some((k.clone(), s.clone())),
                RecordValue::Vector(_) => None,
            })
            .collect();
        let element = PoolElement {
            id,
            name: record.get("NAME").unwrap_or_default().to_string(),
            template,
        };
        self.pools.borrow_mut().entry(kind).or_default().push(element);
        self.allocations.borrow_mut().push(Allocation {
            kind,
            record: record.clone(),
            placement,
            id,
        });
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocations_become_visible_in_the_pool() {
        let repo = MemoryRepository::new();
        let record = TargetRecord::new()
            .with("NAME", "ds1 - Cluster1 (IMG)")
            .with("VCENTER_DS_REF", "datastore-1");
        let id = repo.allocate(PoolKind::Datastore, &record, None).unwrap();

        let pool = repo.pool(PoolKind::Datastore).unwrap();
        assert_eq!(pool.len(), 1);
        assert_eq!(pool[0].id, id);
        assert_eq!(pool[0].attr("VCENTER_DS_REF"), Some("datastore-1"));
        assert!(repo.pool(PoolKind::Image).unwrap().is_empty());
    }

    #[test]
    fn rejections_are_reported_verbatim() {
        let repo = MemoryRepository::new().with_rejection(PoolKind::Template, "NAME is already taken");
        let err = repo
            .allocate(PoolKind::Template, &TargetRecord::new().with("NAME", "t"), None)
            .unwrap_err();
        assert_eq!(err.to_string(), "NAME is already taken");
        assert!(repo.allocations().is_empty());
    }

    #[test]
    fn host_lookup_by_id_and_name() {
        let repo = MemoryRepository::new().with_element(
            PoolKind::Host,
            PoolElement {
                id: 7,
                name: "Cluster1".to_string(),
                template: BTreeMap::new(),
            },
        );
        assert_eq!(repo.host(7).unwrap().name, "Cluster1");
        assert_eq!(repo.host_id_by_name("Cluster1").unwrap(), 7);
        assert!(matches!(repo.host(8), Err(RepositoryError::NotFound { .. })));
        assert!(repo.host_id_by_name("nope").is_err());
    }
}
