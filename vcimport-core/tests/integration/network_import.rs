//! Virtual network import scenarios

use std::rc::Rc;

use vcimport_core::connection::ConnectionManager;
use vcimport_core::import::{ImportFamily, ImportReport, Operator, Pipeline, ScriptedOperator};
use vcimport_core::one::{MemoryRepository, PoolKind};

use super::fixtures::{INSTANCE, connection, element, imported_cluster, inventory};

fn run(repo: &MemoryRepository, operator: &mut dyn Operator) -> ImportReport {
    let vim = Rc::new(inventory());
    let manager = ConnectionManager::default();
    Pipeline::new(&manager, repo, operator)
        .run_on(connection(&vim), &ImportFamily::Networks)
        .unwrap()
}

fn pairs(items: &[(String, String)]) -> Vec<(&str, &str)> {
    items.iter().map(|(k, v)| (k.as_str(), v.as_str())).collect()
}

#[test]
fn ipv4_range_with_default_size() {
    let repo = MemoryRepository::new().with_element(PoolKind::Host, imported_cluster());
    let mut operator = ScriptedOperator::new()
        .yes()
        .yes()
        .text("")
        .text("4")
        .text("10.0.0.1")
        .text("")
        .no();

    let report = run(&repo, &mut operator);
    assert_eq!(report.committed.len(), 1);
    assert_eq!(report.skipped.len(), 1);
    assert_eq!(report.skipped[0].identifier, "dvpg-prod");
    assert_eq!(operator.remaining(), 0);

    let vnet = &repo.allocations_of(PoolKind::VirtualNetwork)[0].record;
    assert_eq!(vnet.get("BRIDGE"), Some("VM Network"));
    assert_eq!(vnet.get("VCENTER_PORTGROUP_TYPE"), Some("Port Group"));
    assert_eq!(
        pairs(vnet.vectors("AR")[0]),
        [("TYPE", "IP4"), ("IP", "10.0.0.1"), ("SIZE", "255")]
    );
    assert!(
        operator
            .messages()
            .iter()
            .any(|m| m.contains("created with size 255!"))
    );
}

#[test]
fn unsupported_type_falls_back_to_ethernet() {
    let repo = MemoryRepository::new().with_element(PoolKind::Host, imported_cluster());
    let mut operator = ScriptedOperator::new()
        .yes()
        .yes()
        .text("16")
        .text("x")
        .text("")
        .no();

    run(&repo, &mut operator);
    assert!(
        operator
            .messages()
            .iter()
            .any(|m| m == "    Type [x] not supported, defaulting to Ethernet.")
    );
    let vnet = &repo.allocations_of(PoolKind::VirtualNetwork)[0].record;
    assert_eq!(pairs(vnet.vectors("AR")[0]), [("TYPE", "ETHER"), ("SIZE", "16")]);
}

#[test]
fn invalid_size_uses_default() {
    let repo = MemoryRepository::new().with_element(PoolKind::Host, imported_cluster());
    let mut operator = ScriptedOperator::new()
        .yes()
        .yes()
        .text("lots")
        .text("e")
        .text("")
        .no();

    run(&repo, &mut operator);
    let vnet = &repo.allocations_of(PoolKind::VirtualNetwork)[0].record;
    assert_eq!(pairs(vnet.vectors("AR")[0]), [("TYPE", "ETHER"), ("SIZE", "255")]);
}

#[test]
fn known_network_is_not_offered_again() {
    let known = element(
        5,
        "VM Network - Cluster1",
        &[
            ("VCENTER_NET_REF", "network-11"),
            ("VCENTER_CCR_REF", "domain-c7"),
            ("VCENTER_INSTANCE_ID", INSTANCE),
        ],
    );
    let repo = MemoryRepository::new()
        .with_element(PoolKind::Host, imported_cluster())
        .with_element(PoolKind::VirtualNetwork, known);
    let mut operator = ScriptedOperator::new().yes().no();

    let report = run(&repo, &mut operator);
    assert!(report.committed.is_empty());
    let reasons: Vec<(&str, &str)> = report
        .skipped
        .iter()
        .map(|s| (s.identifier.as_str(), s.reason.as_str()))
        .collect();
    assert_eq!(
        reasons,
        [("VM Network", "already imported"), ("dvpg-prod", "declined by operator")]
    );
}
