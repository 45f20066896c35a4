//! Inventory walks and datastore monitoring

use serde_json::json;
use vcimport_core::inventory::{InventoryCache, discover, monitor_datastores};
use vcimport_core::vim::{ManagedObjectRef, MemoryVim, kinds};

use super::fixtures::{inventory, mo};

#[test]
fn cyclic_folders_terminate() {
    let vim = MemoryVim::new("uuid")
        .with_object(kinds::FOLDER, "group-v1", json!({"childEntity": [
            mo(kinds::FOLDER, "group-v2"),
            mo(kinds::VIRTUAL_MACHINE, "vm-1"),
        ]}))
        .with_object(kinds::FOLDER, "group-v2", json!({"childEntity": [
            mo(kinds::FOLDER, "group-v1"),
            mo(kinds::VIRTUAL_MACHINE, "vm-2"),
        ]}));
    let root = ManagedObjectRef::new(kinds::FOLDER, "group-v1");

    let vms: Vec<String> = discover(&vim, &root, kinds::VIRTUAL_MACHINE)
        .map(|r| r.unwrap().value)
        .collect();
    assert_eq!(vms, ["vm-2", "vm-1"]);
}

#[test]
fn unreadable_folder_does_not_stop_the_walk() {
    let vim = MemoryVim::new("uuid").with_object(kinds::FOLDER, "group-v1", json!({"childEntity": [
        mo(kinds::FOLDER, "group-v9"),
        mo(kinds::VIRTUAL_MACHINE, "vm-1"),
    ]}));
    let root = ManagedObjectRef::new(kinds::FOLDER, "group-v1");

    let results: Vec<_> = discover(&vim, &root, kinds::VIRTUAL_MACHINE).collect();
    assert_eq!(results.len(), 2);
    assert!(results[0].is_err());
    assert_eq!(results[1].as_ref().unwrap().value, "vm-1");
}

#[test]
fn monitor_reports_every_storage_entity() {
    let vim = inventory();
    let mut cache = InventoryCache::new();

    let monitor = monitor_datastores(&vim, &mut cache);
    assert!(monitor.errors.is_empty(), "{:?}", monitor.errors);
    for ds_ref in ["datastore-12", "group-p31", "datastore-13"] {
        assert!(
            monitor.output.contains(&format!("VCENTER_DS_REF=\"{ds_ref}\"\n")),
            "{}",
            monitor.output
        );
    }
    assert!(monitor.output.contains(
        "DATASTORE=[VCENTER_DS_REF=\"datastore-12\",USED_MB=\"524288\",FREE_MB=\"524288\",TOTAL_MB=\"1048576\"]"
    ));
    assert_eq!(cache.fallback_constructions(), 0);
}
