//! Image import scenarios

use std::rc::Rc;

use serde_json::json;
use vcimport_core::connection::ConnectionManager;
use vcimport_core::error::{ImportError, RepositoryError};
use vcimport_core::import::{AlwaysYes, ImportFamily, Pipeline};
use vcimport_core::one::{MemoryRepository, PoolKind};
use vcimport_core::vim::MemoryVim;

use super::fixtures::{connection, element, image_datastore, inventory};

fn browsable() -> MemoryVim {
    inventory().with_method_result(
        "SearchDatastoreSubFolders_Task",
        json!([
            {
                "folderPath": "[ds1] vm1",
                "file": [{"_typeName": "VmDiskFileInfo", "path": "vm1.vmdk", "capacityKb": 10_485_760, "diskType": "thin"}]
            },
            {
                "folderPath": "[ds1] iso",
                "file": [{"_typeName": "IsoImageFileInfo", "path": "boot.iso", "fileSize": 3_145_728}]
            }
        ]),
    )
}

fn family(datastore: &str) -> ImportFamily {
    ImportFamily::Images {
        datastore: datastore.to_string(),
    }
}

#[test]
fn images_land_in_the_named_datastore() {
    let vim = Rc::new(browsable());
    let repo = MemoryRepository::new()
        .with_element(PoolKind::Datastore, image_datastore())
        .with_element(PoolKind::Image, element(40, "vm1 - ds1", &[]));
    let manager = ConnectionManager::default();
    let mut operator = AlwaysYes::new();

    let report = Pipeline::new(&manager, &repo, &mut operator)
        .run_on(connection(&vim), &family("ds1 - Cluster1 (IMG)"))
        .unwrap();

    assert_eq!(report.committed.len(), 1);
    let images = repo.allocations_of(PoolKind::Image);
    assert_eq!(images.len(), 1);
    assert_eq!(images[0].placement, Some(7));
    assert_eq!(images[0].record.get("NAME"), Some("boot - ds1"));
    assert_eq!(images[0].record.get("TYPE"), Some("CDROM"));
    assert_eq!(vim.calls_to("SearchDatastoreSubFolders_Task").len(), 1);
}

#[test]
fn capacity_rejection_suggests_disabling_the_check() {
    let vim = Rc::new(browsable());
    let repo = MemoryRepository::new()
        .with_element(PoolKind::Datastore, image_datastore())
        .with_rejection(
            PoolKind::Image,
            "[one.image.allocate] Not enough space in datastore",
        );
    let manager = ConnectionManager::default();
    let mut operator = AlwaysYes::new();

    let report = Pipeline::new(&manager, &repo, &mut operator)
        .run_on(connection(&vim), &family("ds1 - Cluster1 (IMG)"))
        .unwrap();

    assert_eq!(report.errors.len(), 2);
    assert!(
        operator
            .messages()
            .iter()
            .any(|m| m.contains("DATASTORE_CAPACITY_CHECK"))
    );
}

#[test]
fn unknown_datastore_fails_the_operation() {
    let vim = Rc::new(browsable());
    let repo = MemoryRepository::new().with_element(PoolKind::Datastore, image_datastore());
    let manager = ConnectionManager::default();
    let mut operator = AlwaysYes::new();

    let err = Pipeline::new(&manager, &repo, &mut operator)
        .run_on(connection(&vim), &family("nope"))
        .unwrap_err();
    assert!(matches!(
        err,
        ImportError::Repository(RepositoryError::NotFound { ref key, .. }) if key == "nope"
    ));
    assert!(vim.is_logged_out());
}

#[test]
fn empty_datastore_says_so() {
    let vim = Rc::new(inventory().with_method_result("SearchDatastoreSubFolders_Task", json!([])));
    let repo = MemoryRepository::new().with_element(PoolKind::Datastore, image_datastore());
    let manager = ConnectionManager::default();
    let mut operator = AlwaysYes::new();

    let report = Pipeline::new(&manager, &repo, &mut operator)
        .run_on(connection(&vim), &family("ds1 - Cluster1 (IMG)"))
        .unwrap();
    assert_eq!(report.total_processed(), 0);
    assert!(
        operator
            .messages()
            .iter()
            .any(|m| m.contains("No new Images found in ds1 - Cluster1 (IMG)..."))
    );
}
