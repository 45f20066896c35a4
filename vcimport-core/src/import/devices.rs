//! Disk and NIC sub-records of imported templates

use serde_json::Value;

use crate::connection::Connection;
use crate::inventory::RemoteTemplate;
use crate::one::{OneRepository, PoolElement, PoolKind, TargetRecord};
use crate::storage::{DatastoreType, ImageType, image_display_name, image_import_record};
use crate::vim::{ManagedObjectRef, moref_list_property, object_name, property_path};

/// Produces the `DISK=[...]` and `NIC=[...]` entries of a template record
///
/// An `Err` carries the operator-visible reason; the template is then not
/// imported.
pub trait TemplateDeviceImporter {
    /// Disk entries, creating images for disks the target system lacks
    ///
    /// # Errors
    ///
    /// Returns the message to show when a disk cannot be mapped.
    fn import_disks(
        &self,
        conn: &Connection,
        repo: &dyn OneRepository,
        template: &RemoteTemplate,
    ) -> Result<TargetRecord, String>;

    /// NIC entries for the networks the template is attached to
    ///
    /// # Errors
    ///
    /// Returns the message to show when a network cannot be mapped.
    fn import_nics(
        &self,
        conn: &Connection,
        repo: &dyn OneRepository,
        template: &RemoteTemplate,
    ) -> Result<TargetRecord, String>;
}

/// Maps template devices onto already imported datastores and networks
#[derive(Debug, Default, Clone, Copy)]
pub struct InventoryDeviceImporter;

/// Splits `[ds1] dir/disk.vmdk` into `("ds1", "dir/disk.vmdk")`
fn split_datastore_path(file_name: &str) -> Option<(&str, &str)> {
    let rest = file_name.strip_prefix('[')?;
    let (datastore, path) = rest.split_once(']')?;
    Some((datastore, path.trim_start()))
}

fn find_image_datastore<'p>(
    pool: &'p [PoolElement],
    ds_ref: &str,
    instance_id: &str,
) -> Option<&'p PoolElement> {
    pool.iter().find(|ds| {
        ds.matches(&[
            ("TYPE", DatastoreType::Image.as_str()),
            ("VCENTER_DS_REF", ds_ref),
            ("VCENTER_INSTANCE_ID", instance_id),
        ])
    })
}

fn unmanaged(key: &str, id: i64) -> [(&str, String); 2] {
    [(key, id.to_string()), ("OPENNEBULA_MANAGED", "NO".to_string())]
}

impl TemplateDeviceImporter for InventoryDeviceImporter {
    fn import_disks(
        &self,
        conn: &Connection,
        repo: &dyn OneRepository,
        template: &RemoteTemplate,
    ) -> Result<TargetRecord, String> {
        let devices = property_path(conn.session(), &template.moref, "config.hardware.device")
            .map_err(|e| format!("Could not read the devices of {}: {e}", template.name))?;
        let datastores = repo
            .pool(PoolKind::Datastore)
            .map_err(|e| format!("Could not read the datastore pool: {e}"))?;
        let images = repo
            .pool(PoolKind::Image)
            .map_err(|e| format!("Could not read the image pool: {e}"))?;

        let mut record = TargetRecord::new();
        for device in devices.as_array().map(Vec::as_slice).unwrap_or_default() {
            if device.get("_typeName").and_then(Value::as_str) != Some("VirtualDisk") {
                continue;
            }
            let backing = device.get("backing").cloned().unwrap_or(Value::Null);
            let file_name = backing.get("fileName").and_then(Value::as_str).unwrap_or_default();
            let Some((ds_name, path)) = split_datastore_path(file_name) else {
                return Err(format!("Disk of {} has no datastore path ({file_name:?})", template.name));
            };
            let ds_ref = backing
                .get("datastore")
                .and_then(ManagedObjectRef::from_json)
                .map(|r| r.value)
                .ok_or_else(|| format!("Disk {file_name} of {} has no datastore", template.name))?;

            let Some(datastore) = find_image_datastore(&datastores, &ds_ref, conn.instance_uuid()) else {
                return Err(format!(
                    "Could not find the image datastore of {file_name} in OpenNebula. \
                     Import datastore {ds_name} first."
                ));
            };

            let name = image_display_name(path, ds_name);
            let image_id = match images.iter().find(|image| image.name == name) {
                Some(image) => image.id,
                None => {
                    let image = image_import_record(
                        path,
                        ds_name,
                        &ds_ref,
                        conn.instance_uuid(),
                        ImageType::Os,
                        None,
                        false,
                    );
                    let id = repo
                        .allocate(PoolKind::Image, &image, Some(datastore.id))
                        .map_err(|e| format!("Error allocating image for disk {file_name}: {e}"))?;
                    tracing::info!(image = %name, id, "created image for template disk");
                    id
                }
            };
            record.push_vector("DISK", unmanaged("IMAGE_ID", image_id));
        }
        Ok(record)
    }

    fn import_nics(
        &self,
        conn: &Connection,
        repo: &dyn OneRepository,
        template: &RemoteTemplate,
    ) -> Result<TargetRecord, String> {
        let session = conn.session();
        let networks = moref_list_property(session, &template.moref, "network")
            .map_err(|e| format!("Could not read the networks of {}: {e}", template.name))?;
        let pool = repo
            .pool(PoolKind::VirtualNetwork)
            .map_err(|e| format!("Could not read the virtual network pool: {e}"))?;

        let mut record = TargetRecord::new();
        for network in networks {
            let found = pool.iter().find(|vn| {
                vn.matches(&[
                    ("VCENTER_NET_REF", network.value.as_str()),
                    ("VCENTER_INSTANCE_ID", conn.instance_uuid()),
                ])
            });
            let Some(vn) = found else {
                let name = object_name(session, &network).unwrap_or_else(|_| network.value.clone());
                return Err(format!(
                    "Network {name} used by {} is not imported in OpenNebula. Import it first.",
                    template.name
                ));
            };
            record.push_vector("NIC", unmanaged("NETWORK_ID", vn.id));
        }
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use secrecy::SecretString;
    use serde_json::json;

    use super::*;
    use crate::connection::ConnectOptions;
    use crate::one::MemoryRepository;
    use crate::vim::{MemoryVim, kinds};

    fn template() -> RemoteTemplate {
        RemoteTemplate {
            moref: ManagedObjectRef::new(kinds::VIRTUAL_MACHINE, "vm-20"),
            name: "centos7".to_string(),
            cluster: None,
            num_cpu: 1,
            memory_mb: 512,
        }
    }

    fn connection() -> Connection {
        let vim = MemoryVim::new("uuid-1").with_object(kinds::VIRTUAL_MACHINE, "vm-20", json!({
            "config": {"hardware": {"device": [
                {"_typeName": "VirtualE1000", "key": 4000},
                {"_typeName": "VirtualDisk", "backing": {
                    "fileName": "[ds1] centos7/centos7.vmdk",
                    "datastore": ManagedObjectRef::new(kinds::DATASTORE, "datastore-12").to_json()
                }}
            ]}},
            "network": [ManagedObjectRef::new(kinds::NETWORK, "network-11").to_json()]
        }));
        let options = ConnectOptions::new("vc", "admin", SecretString::from("pw".to_string()));
        Connection::with_session(Box::new(vim), &options)
    }

    fn image_ds() -> PoolElement {
        PoolElement {
            id: 7,
            name: "ds1 - Cluster1 (IMG)".to_string(),
            template: BTreeMap::from([
                ("TYPE".to_string(), "IMAGE_DS".to_string()),
                ("VCENTER_DS_REF".to_string(), "datastore-12".to_string()),
                ("VCENTER_INSTANCE_ID".to_string(), "uuid-1".to_string()),
            ]),
        }
    }

    #[test]
    fn splits_datastore_paths() {
        assert_eq!(split_datastore_path("[ds 1] a/b.vmdk"), Some(("ds 1", "a/b.vmdk")));
        assert_eq!(split_datastore_path("a/b.vmdk"), None);
    }

    #[test]
    fn disk_creates_non_persistent_image() {
        let repo = MemoryRepository::new().with_element(PoolKind::Datastore, image_ds());
        let record = InventoryDeviceImporter
            .import_disks(&connection(), &repo, &template())
            .unwrap();

        let created = repo.allocations_of(PoolKind::Image);
        assert_eq!(created.len(), 1);
        assert_eq!(created[0].placement, Some(7));
        assert_eq!(created[0].record.get("PERSISTENT"), Some("NO"));
        assert_eq!(created[0].record.get("NAME"), Some("centos7 - ds1"));

        let disks = record.vectors("DISK");
        assert_eq!(disks.len(), 1);
        assert_eq!(disks[0][0], ("IMAGE_ID".to_string(), created[0].id.to_string()));
    }

    #[test]
    fn disk_without_imported_datastore_is_an_error() {
        let repo = MemoryRepository::new();
        let err = InventoryDeviceImporter
            .import_disks(&connection(), &repo, &template())
            .unwrap_err();
        assert!(err.contains("Import datastore ds1 first"));
        assert!(repo.allocations().is_empty());
    }

    #[test]
    fn nic_maps_imported_network() {
        let vnet = PoolElement {
            id: 3,
            name: "VM Network - Cluster1".to_string(),
            template: BTreeMap::from([
                ("VCENTER_NET_REF".to_string(), "network-11".to_string()),
                ("VCENTER_INSTANCE_ID".to_string(), "uuid-1".to_string()),
            ]),
        };
        let repo = MemoryRepository::new().with_element(PoolKind::VirtualNetwork, vnet);
        let record = InventoryDeviceImporter
            .import_nics(&connection(), &repo, &template())
            .unwrap();
        assert_eq!(record.render(), "NIC=[NETWORK_ID=\"3\",OPENNEBULA_MANAGED=\"NO\"]\n");
    }
}
