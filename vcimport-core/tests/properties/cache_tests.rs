//! Property tests for the storage cache

use proptest::prelude::*;
use serde_json::json;
use vcimport_core::inventory::InventoryCache;
use vcimport_core::storage::{StorageEntity, StorageKind};
use vcimport_core::vim::{ManagedObjectRef, MemoryVim, kinds};

// ========== Strategies ==========

fn arb_volume_ref() -> impl Strategy<Value = String> {
    (1u32..10_000).prop_map(|n| format!("datastore-{n}"))
}

fn arb_pod_ref() -> impl Strategy<Value = String> {
    (1u32..10_000).prop_map(|n| format!("group-p{n}"))
}

fn arb_any_ref() -> impl Strategy<Value = String> {
    prop_oneof![arb_volume_ref(), arb_pod_ref()]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Property: the same ref always resolves to the same entity
    #[test]
    fn get_is_coherent(refs in prop::collection::vec(arb_any_ref(), 1..20)) {
        let mut cache = InventoryCache::new();
        let first: Vec<_> = refs.iter().map(|r| cache.get(r)).collect();
        let second: Vec<_> = refs.iter().map(|r| cache.get(r)).collect();
        prop_assert_eq!(&first, &second);

        for (reference, id) in refs.iter().zip(&first) {
            prop_assert_eq!(&cache.entity(*id).moref().value, reference);
        }

        let mut distinct = refs.clone();
        distinct.sort();
        distinct.dedup();
        prop_assert_eq!(cache.len(), distinct.len());
        prop_assert_eq!(cache.fallback_constructions(), distinct.len());
    }

    /// Property: bare refs in the group- namespace are aggregates
    #[test]
    fn bare_ref_kind_follows_prefix(reference in arb_any_ref()) {
        let entity = StorageEntity::from_bare_ref(&reference);
        prop_assert_eq!(entity.is_aggregate(), reference.starts_with("group-"));
        match entity.kind() {
            StorageKind::Aggregate { members } => prop_assert!(members.is_empty()),
            StorageKind::Volume => prop_assert!(entity.moref().is(kinds::DATASTORE)),
        }
    }

    /// Property: after a full fetch every discovered ref is served from the cache
    #[test]
    fn fetched_refs_need_no_fallback(count in 1u32..12, pod_members in 0u32..4) {
        let mut children: Vec<_> = (1..=count)
            .map(|n| ManagedObjectRef::new(kinds::DATASTORE, format!("datastore-{n}")).to_json())
            .collect();
        children.push(ManagedObjectRef::new(kinds::STORAGE_POD, "group-p1").to_json());
        let members: Vec<_> = (1..=pod_members)
            .map(|n| ManagedObjectRef::new(kinds::DATASTORE, format!("datastore-{}", 100 + n)).to_json())
            .collect();

        let mut vim = MemoryVim::new("uuid")
            .with_object(kinds::FOLDER, "group-s1", json!({"childEntity": children}))
            .with_object(kinds::STORAGE_POD, "group-p1", json!({"name": "pod", "childEntity": members}));
        for n in (1..=count).chain(101..=100 + pod_members) {
            vim.insert_object(&format!("datastore-{n}"), json!({"name": format!("ds{n}")}));
        }

        let mut cache = InventoryCache::new();
        let summary = cache.fetch_all(&vim, &ManagedObjectRef::new(kinds::FOLDER, "group-s1"));
        prop_assert!(summary.errors.is_empty());

        for n in (1..=count).chain(101..=100 + pod_members) {
            cache.get(&format!("datastore-{n}"));
        }
        let pod = cache.get("group-p1");
        prop_assert!(cache.entity(pod).is_aggregate());
        prop_assert_eq!(cache.entity(pod).members().len(), pod_members as usize);
        prop_assert_eq!(cache.fallback_constructions(), 0);
        prop_assert_eq!(cache.len(), (count + pod_members + 1) as usize);
    }
}
