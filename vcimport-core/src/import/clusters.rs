//! Cluster import

use super::pipeline::{Importer, already_imported, attrs};
use super::traits::{CandidateDetails, ImportCandidate, ImportReport, ItemFailure, SkippedEntry};
use crate::connection::Connection;
use crate::connection::host_attrs;
use crate::error::ImportResult;
use crate::inventory::{RemoteObject, list_clusters, list_datacenters};
use crate::one::{PoolKind, TargetRecord};

/// Host record of an imported cluster
///
/// `encrypted_password` must already be encrypted with the target system
/// token.
#[must_use]
pub fn cluster_record(cluster: &RemoteObject, conn: &Connection, encrypted_password: &str) -> TargetRecord {
    let mut record = TargetRecord::new();
    record
        .push("NAME", cluster.name.as_str())
        .push("IM_MAD", "vcenter")
        .push("VMM_MAD", "vcenter")
        .push(host_attrs::HOST, conn.host())
        .push(host_attrs::USER, conn.user())
        .push(host_attrs::PASSWORD, encrypted_password)
        .push(attrs::CCR_REF, cluster.moref.value.as_str())
        .push(attrs::INSTANCE_ID, conn.instance_uuid())
        .push("VCENTER_VERSION", conn.api_version());
    if let Some(pool) = conn.resource_pool() {
        record.push(host_attrs::RESOURCE_POOL, pool.value.as_str());
    }
    record
}

impl Importer<'_> {
    pub(super) fn import_clusters(&mut self) -> ImportResult<ImportReport> {
        let conn = self.conn;
        let session = conn.session();
        let instance_id = conn.instance_uuid();
        let mut report = ImportReport::new();

        let host_pool = self.pool(PoolKind::Host)?;
        let datacenters = list_datacenters(session);
        self.report_discovery_errors("datacenters", datacenters.errors, &mut report);

        let mut encrypted_password: Option<String> = None;
        for dc in &datacenters.items {
            if !self.confirm_datacenter(dc, &mut report)? {
                continue;
            }

            let clusters = list_clusters(session, dc);
            self.report_discovery_errors(&dc.name, clusters.errors, &mut report);

            let mut candidates = Vec::new();
            for cluster in clusters.items {
                let key = [
                    (attrs::CCR_REF, cluster.moref.value.as_str()),
                    (attrs::INSTANCE_ID, instance_id),
                ];
                if already_imported(&host_pool, &key) {
                    report.add_skipped(SkippedEntry::new(&cluster.name, "already imported"));
                } else {
                    candidates.push(cluster);
                }
            }
            if candidates.is_empty() {
                self.say(&format!("    No new clusters found in {}...", dc.name));
                continue;
            }

            for cluster in candidates {
                let mut candidate = ImportCandidate {
                    display_name: cluster.name.clone(),
                    remote_ref: cluster.moref.clone(),
                    record: TargetRecord::new(),
                    details: CandidateDetails::Cluster,
                };
                let question = format!("  * Import cluster {}?", cluster.name);
                if !self.confirm_candidate(&candidate, &format!("\n  * Cluster found: {}", cluster.name), &question, &mut report)? {
                    continue;
                }

                let password = match &encrypted_password {
                    Some(password) => password.clone(),
                    None => {
                        let password = self.manager.encrypt_for_target(self.repo, conn.password())?;
                        encrypted_password = Some(password.clone());
                        password
                    }
                };
                candidate.record = cluster_record(&cluster, conn, &password);

                match self.allocate(PoolKind::Host, &candidate, None) {
                    Ok(id) => {
                        self.say(&format!(
                            "    OpenNebula host {} with id {id} successfully created.",
                            cluster.name
                        ));
                        report.add_committed(&candidate, id);
                    }
                    Err(e) => {
                        self.say(&format!("    Error creating host {}: {e}", cluster.name));
                        report.add_failure(ItemFailure::new(&cluster.name, e.to_string()));
                    }
                }
            }
        }
        Ok(report)
    }
}
