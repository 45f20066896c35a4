//! Datastore and storage pod import scenarios

use std::rc::Rc;

use vcimport_core::connection::ConnectionManager;
use vcimport_core::import::{AlwaysYes, ImportFamily, Pipeline, ScriptedOperator};
use serde_json::json;
use vcimport_core::one::{MemoryRepository, PoolKind};
use vcimport_core::vim::{MemoryVim, kinds};

use super::fixtures::{connection, imported_cluster, inventory, mo};

#[test]
fn second_run_imports_nothing_new() {
    let vim = Rc::new(inventory());
    let repo = MemoryRepository::new().with_element(PoolKind::Host, imported_cluster());
    let manager = ConnectionManager::default();

    let mut first = AlwaysYes::new();
    let report = Pipeline::new(&manager, &repo, &mut first)
        .run_on(connection(&vim), &ImportFamily::Datastores)
        .unwrap();
    let names: Vec<&str> = report.committed.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(
        names,
        [
            "ds1 - Cluster1 (IMG)",
            "ds1 - Cluster1 (SYS)",
            "ds2 - Cluster1 (IMG)",
            "ds2 - Cluster1 (SYS)",
            "pod1 - Cluster1 (SYS)"
        ]
    );
    assert!(!report.has_errors());

    let vim = Rc::new(inventory());
    let mut second = AlwaysYes::new();
    let report = Pipeline::new(&manager, &repo, &mut second)
        .run_on(connection(&vim), &ImportFamily::Datastores)
        .unwrap();
    assert!(report.committed.is_empty());
    assert_eq!(report.skipped.len(), 5);
    assert!(report.skipped.iter().all(|s| s.reason == "already imported"));
    assert!(
        second
            .messages()
            .iter()
            .any(|m| m.contains("No new Datastores or StoragePods found in DC1..."))
    );
    assert_eq!(repo.allocations_of(PoolKind::Datastore).len(), 5);
}

#[test]
fn pod_records_carry_no_transport_driver() {
    let vim = Rc::new(inventory());
    let repo = MemoryRepository::new().with_element(PoolKind::Host, imported_cluster());
    let manager = ConnectionManager::default();
    let mut operator = AlwaysYes::new();

    Pipeline::new(&manager, &repo, &mut operator)
        .run_on(connection(&vim), &ImportFamily::Datastores)
        .unwrap();

    for allocation in repo.allocations_of(PoolKind::Datastore) {
        let record = &allocation.record;
        let is_pod = record.get("VCENTER_DS_REF") == Some("group-p31");
        assert_eq!(record.contains_key("DS_MAD"), !is_pod, "{}", record.render());
        assert_eq!(record.get("VCENTER_ONE_HOST_ID"), Some("3"));
        assert_eq!(record.get("VCENTER_CCR_REF"), Some("domain-c7"));
        assert_eq!(record.get("VCENTER_INSTANCE_ID"), Some("uuid-1"));
    }
}

#[test]
fn refused_datastore_reads_as_already_imported() {
    let vim = Rc::new(inventory());
    let repo = MemoryRepository::new()
        .with_element(PoolKind::Host, imported_cluster())
        .with_rejection(
            PoolKind::Datastore,
            "[one.datastore.allocate] NAME is already taken by DATASTORE 0.",
        );
    let manager = ConnectionManager::default();
    let mut operator = AlwaysYes::new();

    let report = Pipeline::new(&manager, &repo, &mut operator)
        .run_on(connection(&vim), &ImportFamily::Datastores)
        .unwrap();
    assert!(report.committed.is_empty());
    assert_eq!(report.errors.len(), 5);

    let message = operator
        .messages()
        .iter()
        .find(|m| m.contains("Error creating datastore"))
        .unwrap();
    assert!(message.contains("already imported"));
    assert!(message.contains("One datastore can exist only once"));
}

#[test]
fn storage_of_unimported_clusters_is_not_offered() {
    let vim = Rc::new(inventory());
    let repo = MemoryRepository::new();
    let manager = ConnectionManager::default();
    let mut operator = AlwaysYes::new();

    let report = Pipeline::new(&manager, &repo, &mut operator)
        .run_on(connection(&vim), &ImportFamily::Datastores)
        .unwrap();
    assert_eq!(report.total_processed(), 0);
    assert!(repo.allocations().is_empty());
}

#[test]
fn declining_one_candidate_skips_only_that_one() {
    let vim = Rc::new(inventory());
    let repo = MemoryRepository::new().with_element(PoolKind::Host, imported_cluster());
    let manager = ConnectionManager::default();
    let mut operator = ScriptedOperator::new().yes().no().yes().yes().yes().yes();

    let report = Pipeline::new(&manager, &repo, &mut operator)
        .run_on(connection(&vim), &ImportFamily::Datastores)
        .unwrap();
    assert_eq!(report.committed.len(), 4);
    assert_eq!(report.skipped.len(), 1);
    assert_eq!(report.skipped[0].identifier, "ds1 - Cluster1 (IMG)");
    assert_eq!(operator.remaining(), 0);
    assert!(
        operator
            .messages()
            .iter()
            .any(|m| m.contains("Total MB  : 1048576"))
    );
}

#[test]
fn declined_datacenter_imports_nothing() {
    let vim = Rc::new(inventory());
    let repo = MemoryRepository::new().with_element(PoolKind::Host, imported_cluster());
    let manager = ConnectionManager::default();
    let mut operator = ScriptedOperator::new().no();

    let report = Pipeline::new(&manager, &repo, &mut operator)
        .run_on(connection(&vim), &ImportFamily::Datastores)
        .unwrap();
    assert!(report.committed.is_empty());
    assert_eq!(report.skipped[0].identifier, "DC1");
    assert!(vim.is_logged_out());
}

#[test]
fn malformed_datacenter_does_not_stop_the_others() {
    let vim = Rc::new(
        inventory()
            .with_object(kinds::FOLDER, MemoryVim::ROOT_FOLDER, json!({
                "name": "Datacenters",
                "childEntity": [mo(kinds::DATACENTER, "datacenter-1"), mo(kinds::DATACENTER, "datacenter-2")]
            }))
            .with_object(kinds::DATACENTER, "datacenter-1", json!({
                "name": "DC0",
                "parent": mo(kinds::FOLDER, MemoryVim::ROOT_FOLDER)
            })),
    );
    let repo = MemoryRepository::new().with_element(PoolKind::Host, imported_cluster());
    let manager = ConnectionManager::default();
    let mut operator = AlwaysYes::new();

    let report = Pipeline::new(&manager, &repo, &mut operator)
        .run_on(connection(&vim), &ImportFamily::Datastores)
        .unwrap();
    assert_eq!(report.errors.len(), 1);
    assert_eq!(report.errors[0].identifier, "DC0");
    assert!(report.errors[0].message.contains("datastoreFolder"));
    assert_eq!(report.committed.len(), 5);
    assert_eq!(repo.allocations_of(PoolKind::Datastore).len(), 5);
    assert!(vim.is_logged_out());
}
