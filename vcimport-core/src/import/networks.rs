//! Virtual network import

use super::pipeline::{Importer, already_imported, attrs};
use super::traits::{CandidateDetails, ImportCandidate, ImportReport, ItemFailure, SkippedEntry};
use crate::error::ImportResult;
use crate::inventory::{RemoteObject, list_datacenters, list_networks};
use crate::one::{PoolKind, TargetRecord};
use crate::storage::resolve_owning_datacenter;
use crate::vim::{ManagedObjectRef, kinds};

/// Address range size used when the operator does not pick one
pub const DEFAULT_RANGE_SIZE: u32 = 255;

/// Address family of an address range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AddressRangeKind {
    /// IPv4 with a first address
    Ip4,
    /// IPv6 with optional prefixes
    Ip6,
    /// Plain ethernet, MAC addresses only
    #[default]
    Ether,
}

impl AddressRangeKind {
    /// Parses the operator's answer; `None` for anything unsupported
    #[must_use]
    pub fn from_answer(answer: &str) -> Option<Self> {
        match answer.trim().to_lowercase().as_str() {
            "4" => Some(Self::Ip4),
            "6" => Some(Self::Ip6),
            "e" => Some(Self::Ether),
            _ => None,
        }
    }

    /// Record value of the `TYPE` attribute
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ip4 => "IP4",
            Self::Ip6 => "IP6",
            Self::Ether => "ETHER",
        }
    }
}

/// One `AR=[...]` vector
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddressRange {
    /// Address family
    pub kind: AddressRangeKind,
    /// Number of leases
    pub size: u32,
    /// First IPv4 address
    pub first_ip: Option<String>,
    /// First MAC address
    pub first_mac: Option<String>,
    /// IPv6 global prefix
    pub global_prefix: Option<String>,
    /// IPv6 ULA prefix
    pub ula_prefix: Option<String>,
}

impl AddressRange {
    /// Range of `kind` with the default size and no seeds
    #[must_use]
    pub const fn new(kind: AddressRangeKind) -> Self {
        Self {
            kind,
            size: DEFAULT_RANGE_SIZE,
            first_ip: None,
            first_mac: None,
            global_prefix: None,
            ula_prefix: None,
        }
    }

    /// Vector items: `TYPE`, the seeds that are set, then `SIZE`
    #[must_use]
    pub fn items(&self) -> Vec<(&'static str, String)> {
        let mut items = vec![("TYPE", self.kind.as_str().to_string())];
        let seeds = [
            ("IP", &self.first_ip),
            ("MAC", &self.first_mac),
            ("GLOBAL_PREFIX", &self.global_prefix),
            ("ULA_PREFIX", &self.ula_prefix),
        ];
        items.extend(
            seeds
                .into_iter()
                .filter_map(|(key, value)| value.as_ref().map(|v| (key, v.clone()))),
        );
        items.push(("SIZE", self.size.to_string()));
        items
    }
}

/// Human readable network type for a remote network ref
#[must_use]
pub fn network_type_label(network: &ManagedObjectRef) -> &'static str {
    match network.kind.as_str() {
        kinds::DV_PORTGROUP => "Distributed Port Group",
        kinds::OPAQUE_NETWORK => "Opaque Network",
        _ => "Port Group",
    }
}

/// Virtual network record, without its address range
#[must_use]
pub fn network_record(
    network: &RemoteObject,
    cluster: &RemoteObject,
    instance_id: &str,
) -> TargetRecord {
    let mut record = TargetRecord::new();
    record
        .push("NAME", format!("{} - {}", network.name, cluster.name))
        .push("BRIDGE", network.name.as_str())
        .push("VN_MAD", "dummy")
        .push("VCENTER_PORTGROUP_TYPE", network_type_label(&network.moref))
        .push(attrs::NET_REF, network.moref.value.as_str())
        .push(attrs::CCR_REF, cluster.moref.value.as_str())
        .push(attrs::INSTANCE_ID, instance_id);
    record
}

/// Address range size from an operator answer; blank takes the default
fn range_size(answer: &str) -> Option<u32> {
    let answer = answer.trim();
    if answer.is_empty() {
        return Some(DEFAULT_RANGE_SIZE);
    }
    answer.parse::<u32>().ok().filter(|size| *size > 0)
}

fn optional(answer: String) -> Option<String> {
    let answer = answer.trim();
    (!answer.is_empty()).then(|| answer.to_string())
}

impl Importer<'_> {
    pub(super) fn import_networks(&mut self) -> ImportResult<ImportReport> {
        let conn = self.conn;
        let session = conn.session();
        let instance_id = conn.instance_uuid();
        let mut report = ImportReport::new();

        let vnet_pool = self.pool(PoolKind::VirtualNetwork)?;
        let clusters = self.imported_clusters()?;
        let datacenters = list_datacenters(session);
        self.report_discovery_errors("datacenters", datacenters.errors, &mut report);

        for dc in &datacenters.items {
            if !self.confirm_datacenter(dc, &mut report)? {
                continue;
            }

            let mut candidates = Vec::new();
            for imported in &clusters {
                let cluster = RemoteObject {
                    moref: ManagedObjectRef::new(kinds::CLUSTER, imported.ccr_ref.as_str()),
                    name: imported.name.clone(),
                };
                match resolve_owning_datacenter(session, &cluster.moref) {
                    Ok(owner) if owner.moref == dc.moref => {}
                    Ok(_) => continue,
                    Err(e) => {
                        self.report_discovery_errors(&cluster.name, vec![e], &mut report);
                        continue;
                    }
                }

                let networks = list_networks(session, &cluster.moref);
                self.report_discovery_errors(&cluster.name, networks.errors, &mut report);
                for network in networks.items {
                    let key = [
                        (attrs::NET_REF, network.moref.value.as_str()),
                        (attrs::CCR_REF, cluster.moref.value.as_str()),
                        (attrs::INSTANCE_ID, instance_id),
                    ];
                    if already_imported(&vnet_pool, &key) {
                        report.add_skipped(SkippedEntry::new(&network.name, "already imported"));
                    } else {
                        candidates.push((network, cluster.clone()));
                    }
                }
            }
            if candidates.is_empty() {
                self.say(&format!("    No new Virtual Networks found in {}...", dc.name));
                continue;
            }

            for (network, cluster) in candidates {
                self.import_network(&network, &cluster, &mut report)?;
            }
        }
        Ok(report)
    }

    fn import_network(
        &mut self,
        network: &RemoteObject,
        cluster: &RemoteObject,
        report: &mut ImportReport,
    ) -> ImportResult<()> {
        let network_type = network_type_label(&network.moref);
        let mut candidate = ImportCandidate {
            display_name: network.name.clone(),
            remote_ref: network.moref.clone(),
            record: network_record(network, cluster, self.conn.instance_uuid()),
            details: CandidateDetails::Network {
                cluster_name: cluster.name.clone(),
                network_type: network_type.to_string(),
            },
        };

        let summary = format!(
            "\n  * Network found:\n      - Name    : {}\n      - Type    : {network_type}\n      - Cluster : {}",
            network.name, cluster.name
        );
        if !self.confirm_candidate(&candidate, &summary, "    Import this Network?", report)? {
            return Ok(());
        }

        let range = self.address_range()?;
        candidate.record.push_vector("AR", range.items());

        match self.allocate(PoolKind::VirtualNetwork, &candidate, None) {
            Ok(id) => {
                self.say(&format!(
                    "    OpenNebula virtual network {id} created with size {}!",
                    range.size
                ));
                report.add_committed(&candidate, id);
            }
            Err(e) => {
                self.say(&format!("    Error creating virtual network: {e}"));
                report.add_failure(ItemFailure::new(&network.name, e.to_string()));
            }
        }
        Ok(())
    }

    /// Asks for the address range; unattended runs get the default Ethernet range
    fn address_range(&mut self) -> ImportResult<AddressRange> {
        if !self.operator.is_interactive() {
            return Ok(AddressRange::new(AddressRangeKind::Ether));
        }

        let answer = self.operator.input(
            "    How many VMs are you planning to fit into this network [255]?",
            &DEFAULT_RANGE_SIZE.to_string(),
        )?;
        let size = range_size(&answer).unwrap_or_else(|| {
            self.say(&format!(
                "    Size {} is not valid, using {DEFAULT_RANGE_SIZE}.",
                answer.trim()
            ));
            DEFAULT_RANGE_SIZE
        });

        let answer = self.operator.input(
            "    What type of Virtual Network do you want to create (IPv[4],IPv[6],[E]thernet)?",
            "e",
        )?;
        let kind = AddressRangeKind::from_answer(&answer).unwrap_or_else(|| {
            self.operator.notify(&format!(
                "    Type [{}] not supported, defaulting to Ethernet.",
                answer.trim()
            ));
            AddressRangeKind::Ether
        });

        let mut range = AddressRange::new(kind);
        range.size = size;
        match kind {
            AddressRangeKind::Ip4 => {
                range.first_ip = optional(
                    self.operator
                        .input("    Please input the first IP in the range: ", "")?,
                );
                range.first_mac = optional(self.operator.input(
                    "    Please input the first MAC in the range [Enter for default]: ",
                    "",
                )?);
            }
            AddressRangeKind::Ip6 => {
                range.first_mac = optional(self.operator.input(
                    "    Please input the first MAC in the range [Enter for default]: ",
                    "",
                )?);
                range.global_prefix = optional(self.operator.input(
                    "    Please input the GLOBAL PREFIX [Enter for default]: ",
                    "",
                )?);
                range.ula_prefix = optional(self.operator.input(
                    "    Please input the ULA PREFIX [Enter for default]: ",
                    "",
                )?);
            }
            AddressRangeKind::Ether => {
                range.first_mac = optional(self.operator.input(
                    "    Please input the first MAC in the range [Enter for default]: ",
                    "",
                )?);
            }
        }
        Ok(range)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn answers_map_to_kinds() {
        assert_eq!(AddressRangeKind::from_answer("4"), Some(AddressRangeKind::Ip4));
        assert_eq!(AddressRangeKind::from_answer(" E "), Some(AddressRangeKind::Ether));
        assert_eq!(AddressRangeKind::from_answer("x"), None);
    }

    #[test]
    fn blank_size_takes_the_default() {
        assert_eq!(range_size(""), Some(DEFAULT_RANGE_SIZE));
        assert_eq!(range_size("  "), Some(DEFAULT_RANGE_SIZE));
        assert_eq!(range_size(" 16 "), Some(16));
        assert_eq!(range_size("0"), None);
        assert_eq!(range_size("lots"), None);
    }

    #[test]
    fn range_items_end_with_size() {
        let mut range = AddressRange::new(AddressRangeKind::Ip4);
        range.first_ip = Some("10.0.0.1".to_string());
        let mut record = TargetRecord::new();
        record.push_vector("AR", range.items());
        assert_eq!(record.render(), "AR=[TYPE=\"IP4\",IP=\"10.0.0.1\",SIZE=\"255\"]\n");
    }

    #[test]
    fn record_names_network_after_cluster() {
        let network = RemoteObject {
            moref: ManagedObjectRef::new(kinds::DV_PORTGROUP, "dvportgroup-30"),
            name: "VM Network".to_string(),
        };
        let cluster = RemoteObject {
            moref: ManagedObjectRef::new(kinds::CLUSTER, "domain-c7"),
            name: "Cluster1".to_string(),
        };
        let record = network_record(&network, &cluster, "uuid-1");
        assert_eq!(record.get("NAME"), Some("VM Network - Cluster1"));
        assert_eq!(record.get("BRIDGE"), Some("VM Network"));
        assert_eq!(record.get("VCENTER_PORTGROUP_TYPE"), Some("Distributed Port Group"));
        assert_eq!(record.get("VCENTER_NET_REF"), Some("dvportgroup-30"));
    }
}
