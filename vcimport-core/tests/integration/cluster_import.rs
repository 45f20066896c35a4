//! Full chain: clusters first, then the families that hang off them

use std::rc::Rc;

use serde_json::json;
use vcimport_core::connection::{ConnectionManager, ONE_KEY};
use vcimport_core::import::{AlwaysYes, ImportFamily, ImportReport, Pipeline};
use vcimport_core::one::{MemoryRepository, OneRepository, PoolKind};

use super::fixtures::{TOKEN, connection, inventory};

fn run(repo: &MemoryRepository, family: &ImportFamily) -> ImportReport {
    let vim = Rc::new(inventory().with_method_result(
        "SearchDatastoreSubFolders_Task",
        json!([
            {
                "folderPath": "[ds1] centos7",
                "file": [{"_typeName": "VmDiskFileInfo", "path": "centos7.vmdk", "capacityKb": 10_485_760}]
            },
            {
                "folderPath": "[ds1] iso",
                "file": [{"_typeName": "IsoImageFileInfo", "path": "boot.iso", "fileSize": 3_145_728}]
            }
        ]),
    ));
    let manager = ConnectionManager::default();
    let mut operator = AlwaysYes::new();
    let report = Pipeline::new(&manager, repo, &mut operator)
        .run_on(connection(&vim), family)
        .unwrap();
    assert!(vim.is_logged_out());
    report
}

#[test]
fn families_build_on_each_other() {
    let repo = MemoryRepository::new().with_config(ONE_KEY, TOKEN);

    let clusters = run(&repo, &ImportFamily::Clusters);
    assert_eq!(clusters.committed.len(), 1);
    let host_id = clusters.committed[0].id;
    let host = repo.host(host_id).unwrap();
    assert_eq!(host.attr("VCENTER_CCR_REF"), Some("domain-c7"));
    assert_ne!(host.attr("VCENTER_PASSWORD"), Some("s3cr3t"));

    let datastores = run(&repo, &ImportFamily::Datastores);
    assert_eq!(datastores.committed.len(), 5);
    for allocation in repo.allocations_of(PoolKind::Datastore) {
        assert_eq!(
            allocation.record.get("VCENTER_ONE_HOST_ID"),
            Some(host_id.to_string().as_str())
        );
    }

    let networks = run(&repo, &ImportFamily::Networks);
    assert_eq!(networks.committed.len(), 2);
    let vnets = repo.allocations_of(PoolKind::VirtualNetwork);
    assert_eq!(vnets[0].record.get("NAME"), Some("VM Network - Cluster1"));
    assert_eq!(vnets[1].record.get("VCENTER_PORTGROUP_TYPE"), Some("Distributed Port Group"));

    let templates = run(&repo, &ImportFamily::Templates);
    assert_eq!(templates.committed.len(), 1);
    let template = &repo.allocations_of(PoolKind::Template)[0].record;
    assert_eq!(template.get("NAME"), Some("centos7 - Cluster1"));
    assert_eq!(template.get("VCENTER_CCR_REF"), Some("domain-c7"));
    assert_eq!(template.vectors("NIC")[0][0].1, vnets[0].id.to_string());

    let disk_images = repo.allocations_of(PoolKind::Image);
    assert_eq!(disk_images.len(), 1);
    assert_eq!(disk_images[0].record.get("NAME"), Some("centos7 - ds1"));

    let images = run(
        &repo,
        &ImportFamily::Images {
            datastore: "ds1 - Cluster1 (IMG)".to_string(),
        },
    );
    let names: Vec<&str> = images.committed.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, ["boot - ds1"]);
}

#[test]
fn rerun_commits_nothing() {
    let repo = MemoryRepository::new().with_config(ONE_KEY, TOKEN);
    for family in [
        ImportFamily::Clusters,
        ImportFamily::Datastores,
        ImportFamily::Networks,
        ImportFamily::Templates,
    ] {
        let first = run(&repo, &family);
        assert!(!first.committed.is_empty(), "{family}");
        let second = run(&repo, &family);
        assert!(second.committed.is_empty(), "{family}");
        assert!(second.has_skipped(), "{family}");
    }
}
