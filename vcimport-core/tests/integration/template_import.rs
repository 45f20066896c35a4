//! VM template import scenarios

use std::rc::Rc;

use secrecy::SecretString;
use vcimport_core::connection::{ConnectOptions, Connection, ConnectionManager};
use vcimport_core::import::{AlwaysYes, ImportFamily, ImportReport, Operator, Pipeline, ScriptedOperator};
use vcimport_core::one::{MemoryRepository, PoolKind};

use super::fixtures::{INSTANCE, connection, element, image_datastore, imported_cluster, inventory};

fn prepared_repo() -> MemoryRepository {
    MemoryRepository::new()
        .with_element(PoolKind::Host, imported_cluster())
        .with_element(PoolKind::Datastore, image_datastore())
        .with_element(
            PoolKind::VirtualNetwork,
            element(
                5,
                "VM Network - Cluster1",
                &[("VCENTER_NET_REF", "network-11"), ("VCENTER_INSTANCE_ID", INSTANCE)],
            ),
        )
}

fn run(repo: &MemoryRepository, operator: &mut dyn Operator) -> ImportReport {
    let vim = Rc::new(inventory());
    let manager = ConnectionManager::default();
    Pipeline::new(&manager, repo, operator)
        .run_on(connection(&vim), &ImportFamily::Templates)
        .unwrap()
}

#[test]
fn unmapped_disk_stops_before_resource_pool_prompt() {
    let repo = MemoryRepository::new().with_element(PoolKind::Host, imported_cluster());
    let mut operator = ScriptedOperator::new().yes().yes();

    let report = run(&repo, &mut operator);
    assert!(report.committed.is_empty());
    assert_eq!(report.errors.len(), 1);
    assert!(report.errors[0].message.contains("Import datastore ds1 first"));
    assert_eq!(operator.remaining(), 0);
    assert!(!operator.prompts().iter().any(|p| p.contains("resource pool")));
    assert!(repo.allocations_of(PoolKind::Template).is_empty());
}

#[test]
fn delegated_pool_choice_becomes_user_input() {
    let repo = prepared_repo();
    let mut operator = ScriptedOperator::new().yes().yes().text("d").yes().yes();

    let report = run(&repo, &mut operator);
    assert_eq!(report.committed.len(), 1);
    assert_eq!(operator.remaining(), 0);

    let template = &repo.allocations_of(PoolKind::Template)[0].record;
    let inputs = template.vectors("USER_INPUTS");
    assert_eq!(inputs.len(), 1);
    assert_eq!(
        inputs[0][0],
        (
            "VCENTER_RESOURCE_POOL".to_string(),
            "O|list|Which resource pool you want this VM to run in? |prod,dev|prod".to_string()
        )
    );
    assert!(!template.contains_key("VCENTER_RESOURCE_POOL"));

    let images = repo.allocations_of(PoolKind::Image);
    assert_eq!(images.len(), 1);
    assert_eq!(images[0].placement, Some(7));
    assert_eq!(template.vectors("DISK")[0][0].1, images[0].id.to_string());
    assert_eq!(template.vectors("NIC")[0][0].1, "5");
}

#[test]
fn edited_pool_list_and_default_are_kept() {
    let repo = prepared_repo();
    let mut operator = ScriptedOperator::new()
        .yes()
        .yes()
        .text("d")
        .text("dev,prod/x")
        .text("prod/x");

    run(&repo, &mut operator);
    let template = &repo.allocations_of(PoolKind::Template)[0].record;
    assert_eq!(
        template.vectors("USER_INPUTS")[0][0].1,
        "O|list|Which resource pool you want this VM to run in? |dev,prod/x|prod/x"
    );
}

#[test]
fn pool_picked_by_index() {
    let repo = prepared_repo();
    let mut operator = ScriptedOperator::new().yes().yes().text("n").text("2");

    run(&repo, &mut operator);
    let template = &repo.allocations_of(PoolKind::Template)[0].record;
    assert_eq!(template.get("VCENTER_RESOURCE_POOL"), Some("dev"));
    assert!(
        operator
            .messages()
            .iter()
            .any(|m| m.contains("[1] prod") && m.contains("[2] dev"))
    );
}

#[test]
fn out_of_range_index_keeps_default_pool() {
    let repo = prepared_repo();
    let mut operator = ScriptedOperator::new().yes().yes().text("n").text("9");

    let report = run(&repo, &mut operator);
    assert_eq!(report.committed.len(), 1);
    let template = &repo.allocations_of(PoolKind::Template)[0].record;
    assert!(!template.contains_key("VCENTER_RESOURCE_POOL"));
    assert!(operator.messages().iter().any(|m| m.contains("Index 9 is not in the list")));
}

#[test]
fn unattended_run_never_asks_for_pools() {
    let repo = prepared_repo();
    let mut operator = AlwaysYes::new();

    let report = run(&repo, &mut operator);
    assert_eq!(report.committed.len(), 1);
    let template = &repo.allocations_of(PoolKind::Template)[0].record;
    assert!(!template.contains_key("VCENTER_RESOURCE_POOL"));
    assert!(template.vectors("USER_INPUTS").is_empty());
    assert_eq!(template.get("SCHED_REQUIREMENTS"), Some("ID=\"3\""));
    assert_eq!(template.get("VCENTER_TEMPLATE_REF"), Some("vm-20"));
    assert_eq!(template.get("VCENTER_INSTANCE_ID"), Some(INSTANCE));
}

#[test]
fn template_of_unimported_cluster_is_skipped() {
    let repo = MemoryRepository::new();
    let mut operator = AlwaysYes::new();

    let report = run(&repo, &mut operator);
    assert!(report.committed.is_empty());
    assert_eq!(report.skipped.len(), 1);
    assert_eq!(report.skipped[0].identifier, "centos7");
    assert_eq!(report.skipped[0].reason, "its cluster is not imported yet");
    assert!(
        operator
            .messages()
            .iter()
            .any(|m| m.contains("No new VM Templates found in DC1..."))
    );
}

#[test]
fn delegated_default_is_the_confined_pool() {
    let repo = prepared_repo();
    let vim = Rc::new(inventory());
    let options = ConnectOptions::new("vcenter.local", "admin", SecretString::from("s3cr3t".to_string()))
        .with_resource_pool("resgroup-21");
    let conn = Connection::with_session(Box::new(Rc::clone(&vim)), &options);
    let manager = ConnectionManager::default();
    let mut operator = ScriptedOperator::new().yes().yes().text("d").yes().yes();

    let report = Pipeline::new(&manager, &repo, &mut operator)
        .run_on(conn, &ImportFamily::Templates)
        .unwrap();
    assert_eq!(report.committed.len(), 1);
    assert!(
        operator
            .prompts()
            .iter()
            .any(|p| p.contains("default resource pool presented to the end user is set to \"dev\""))
    );
    let template = &repo.allocations_of(PoolKind::Template)[0].record;
    assert_eq!(
        template.vectors("USER_INPUTS")[0][0].1,
        "O|list|Which resource pool you want this VM to run in? |prod,dev|dev"
    );
}
