//! Shared inventory: one datacenter, one cluster, a datastore, a storage pod
//! with one member, two networks and one template

use std::collections::BTreeMap;
use std::rc::Rc;

use secrecy::SecretString;
use serde_json::{Value, json};
use vcimport_core::connection::{ConnectOptions, Connection};
use vcimport_core::one::PoolElement;
use vcimport_core::vim::{ManagedObjectRef, MemoryVim, kinds};

pub const INSTANCE: &str = "uuid-1";
pub const TOKEN: &str = "abcdefghijklmnopqrstuvwxyz012345";

/// 1 TiB
pub const CAPACITY: u64 = 1_099_511_627_776;
/// 512 GiB
pub const FREE: u64 = 549_755_813_888;

pub fn mo(kind: &str, value: &str) -> Value {
    ManagedObjectRef::new(kind, value).to_json()
}

pub fn inventory() -> MemoryVim {
    MemoryVim::new(INSTANCE)
        .with_object(kinds::FOLDER, MemoryVim::ROOT_FOLDER, json!({
            "name": "Datacenters",
            "childEntity": [mo(kinds::DATACENTER, "datacenter-2")]
        }))
        .with_object(kinds::DATACENTER, "datacenter-2", json!({
            "name": "DC1",
            "parent": mo(kinds::FOLDER, MemoryVim::ROOT_FOLDER),
            "hostFolder": mo(kinds::FOLDER, "group-h4"),
            "vmFolder": mo(kinds::FOLDER, "group-v3"),
            "datastoreFolder": mo(kinds::FOLDER, "group-s5")
        }))
        .with_object(kinds::FOLDER, "group-h4", json!({
            "name": "host",
            "parent": mo(kinds::DATACENTER, "datacenter-2"),
            "childEntity": [mo(kinds::CLUSTER, "domain-c7")]
        }))
        .with_object(kinds::CLUSTER, "domain-c7", json!({
            "name": "Cluster1",
            "parent": mo(kinds::FOLDER, "group-h4"),
            "datastore": [mo(kinds::DATASTORE, "datastore-12"), mo(kinds::DATASTORE, "datastore-13")],
            "network": [mo(kinds::NETWORK, "network-11"), mo(kinds::DV_PORTGROUP, "dvportgroup-30")],
            "resourcePool": mo(kinds::RESOURCE_POOL, "resgroup-8")
        }))
        .with_object(kinds::RESOURCE_POOL, "resgroup-8", json!({
            "name": "Resources",
            "resourcePool": [mo(kinds::RESOURCE_POOL, "resgroup-20"), mo(kinds::RESOURCE_POOL, "resgroup-21")]
        }))
        .with_object(kinds::RESOURCE_POOL, "resgroup-20", json!({"name": "prod", "resourcePool": []}))
        .with_object(kinds::RESOURCE_POOL, "resgroup-21", json!({"name": "dev", "resourcePool": []}))
        .with_object(kinds::HOST, "host-9", json!({
            "name": "esx1.local",
            "parent": mo(kinds::CLUSTER, "domain-c7")
        }))
        .with_object(kinds::FOLDER, "group-s5", json!({
            "name": "datastore",
            "childEntity": [mo(kinds::DATASTORE, "datastore-12"), mo(kinds::STORAGE_POD, "group-p31")]
        }))
        .with_object(kinds::DATASTORE, "datastore-12", json!({
            "name": "ds1",
            "summary": {"capacity": CAPACITY, "freeSpace": FREE},
            "browser": mo("HostDatastoreBrowser", "datastoreBrowser-12")
        }))
        .with_object(kinds::STORAGE_POD, "group-p31", json!({
            "name": "pod1",
            "childEntity": [mo(kinds::DATASTORE, "datastore-13")],
            "summary": {"capacity": CAPACITY, "freeSpace": FREE}
        }))
        .with_object(kinds::DATASTORE, "datastore-13", json!({
            "name": "ds2",
            "summary": {"capacity": CAPACITY, "freeSpace": FREE}
        }))
        .with_object(kinds::NETWORK, "network-11", json!({"name": "VM Network"}))
        .with_object(kinds::DV_PORTGROUP, "dvportgroup-30", json!({"name": "dvpg-prod"}))
        .with_object(kinds::FOLDER, "group-v3", json!({
            "name": "vm",
            "childEntity": [mo(kinds::VIRTUAL_MACHINE, "vm-20"), mo(kinds::VIRTUAL_MACHINE, "vm-21")]
        }))
        .with_object(kinds::VIRTUAL_MACHINE, "vm-20", json!({
            "name": "centos7",
            "config": {
                "name": "centos7",
                "template": true,
                "hardware": {
                    "numCPU": 2,
                    "memoryMB": 2048,
                    "device": [
                        {"_typeName": "VirtualE1000", "key": 4000},
                        {"_typeName": "VirtualDisk", "backing": {
                            "fileName": "[ds1] centos7/centos7.vmdk",
                            "datastore": mo(kinds::DATASTORE, "datastore-12")
                        }}
                    ]
                }
            },
            "runtime": {"host": mo(kinds::HOST, "host-9")},
            "network": [mo(kinds::NETWORK, "network-11")]
        }))
        .with_object(kinds::VIRTUAL_MACHINE, "vm-21", json!({
            "name": "web01",
            "config": {"name": "web01", "template": false}
        }))
}

pub fn connection(vim: &Rc<MemoryVim>) -> Connection {
    let options = ConnectOptions::new("vcenter.local", "admin", SecretString::from("s3cr3t".to_string()));
    Connection::with_session(Box::new(Rc::clone(vim)), &options)
}

pub fn element(id: i64, name: &str, attrs: &[(&str, &str)]) -> PoolElement {
    PoolElement {
        id,
        name: name.to_string(),
        template: attrs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect::<BTreeMap<_, _>>(),
    }
}

/// Host record of Cluster1, as a previous cluster import leaves it
pub fn imported_cluster() -> PoolElement {
    element(
        3,
        "Cluster1",
        &[("VCENTER_CCR_REF", "domain-c7"), ("VCENTER_INSTANCE_ID", INSTANCE)],
    )
}

/// Image datastore for ds1
pub fn image_datastore() -> PoolElement {
    element(
        7,
        "ds1 - Cluster1 (IMG)",
        &[
            ("TYPE", "IMAGE_DS"),
            ("VCENTER_DS_REF", "datastore-12"),
            ("VCENTER_CCR_REF", "domain-c7"),
            ("VCENTER_INSTANCE_ID", INSTANCE),
        ],
    )
}
