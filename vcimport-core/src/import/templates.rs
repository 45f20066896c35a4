//! VM template import

use std::fmt::Write as _;

use super::pipeline::{Importer, already_imported, attrs};
use super::traits::{
    CandidateDetails, ImportCandidate, ImportReport, ImportedCluster, ItemFailure, SkippedEntry,
};
use crate::error::ImportResult;
use crate::inventory::{RemoteTemplate, list_datacenters, list_resource_pools, list_templates};
use crate::one::{PoolKind, TargetRecord};
use crate::vim::{ManagedObjectRef, kinds, object_name};

const RESOURCE_POOL_QUESTION: &str = "Which resource pool you want this VM to run in? ";

/// `USER_INPUTS` value letting the end user pick a resource pool
#[must_use]
pub fn resource_pool_user_input(list: &str, default: &str) -> String {
    format!("O|list|{RESOURCE_POOL_QUESTION}|{list}|{default}")
}

/// Base record of a template, before devices and resource pool choice
#[must_use]
pub fn template_record(template: &RemoteTemplate, cluster: &ImportedCluster, instance_id: &str) -> TargetRecord {
    let mut record = TargetRecord::new();
    record
        .push("NAME", format!("{} - {}", template.name, cluster.name))
        .push("CPU", template.num_cpu.to_string())
        .push("VCPU", template.num_cpu.to_string())
        .push("MEMORY", template.memory_mb.to_string())
        .push("HYPERVISOR", "vcenter")
        .push("SCHED_REQUIREMENTS", format!("ID=\"{}\"", cluster.host_id))
        .push_vector(
            "CONTEXT",
            [("NETWORK", "YES"), ("SSH_PUBLIC_KEY", "$USER[SSH_PUBLIC_KEY]")],
        )
        .push_vector("GRAPHICS", [("LISTEN", "0.0.0.0"), ("TYPE", "vnc")])
        .push(attrs::TEMPLATE_REF, template.moref.value.as_str())
        .push(attrs::CCR_REF, cluster.ccr_ref.as_str())
        .push(attrs::INSTANCE_ID, instance_id);
    record
}

impl Importer<'_> {
    pub(super) fn import_templates(&mut self) -> ImportResult<ImportReport> {
        let conn = self.conn;
        let session = conn.session();
        let instance_id = conn.instance_uuid();
        let mut report = ImportReport::new();

        let template_pool = self.pool(PoolKind::Template)?;
        let clusters = self.imported_clusters()?;
        let datacenters = list_datacenters(session);
        self.report_discovery_errors("datacenters", datacenters.errors, &mut report);

        for dc in &datacenters.items {
            if !self.confirm_datacenter(dc, &mut report)? {
                continue;
            }

            let templates = list_templates(session, dc);
            self.report_discovery_errors(&dc.name, templates.errors, &mut report);

            let mut candidates = Vec::new();
            for template in templates.items {
                let key = [
                    (attrs::TEMPLATE_REF, template.moref.value.as_str()),
                    (attrs::INSTANCE_ID, instance_id),
                ];
                if already_imported(&template_pool, &key) {
                    report.add_skipped(SkippedEntry::new(&template.name, "already imported"));
                    continue;
                }
                let cluster = template
                    .cluster
                    .as_ref()
                    .and_then(|c| clusters.iter().find(|ic| ic.ccr_ref == c.value));
                match cluster {
                    Some(cluster) => candidates.push((template.clone(), cluster.clone())),
                    None => report.add_skipped(SkippedEntry::new(
                        &template.name,
                        "its cluster is not imported yet",
                    )),
                }
            }
            if candidates.is_empty() {
                self.say(&format!("    No new VM Templates found in {}...", dc.name));
                continue;
            }

            for (template, cluster) in candidates {
                self.import_template(&template, &cluster, &mut report)?;
            }
        }
        Ok(report)
    }

    fn import_template(
        &mut self,
        template: &RemoteTemplate,
        cluster: &ImportedCluster,
        report: &mut ImportReport,
    ) -> ImportResult<()> {
        let conn = self.conn;
        let cluster_ref = ManagedObjectRef::new(kinds::CLUSTER, cluster.ccr_ref.as_str());
        let resource_pools = match list_resource_pools(conn.session(), &cluster_ref) {
            Ok(pools) => pools,
            Err(e) => {
                self.say(&format!("    Could not list the resource pools of {}: {e}", cluster.name));
                Vec::new()
            }
        };

        let mut candidate = ImportCandidate {
            record: template_record(template, cluster, conn.instance_uuid()),
            display_name: template.name.clone(),
            remote_ref: template.moref.clone(),
            details: CandidateDetails::Template {
                cluster_name: cluster.name.clone(),
                resource_pools,
            },
        };

        let summary = format!(
            "\n  * VM Template found:\n      - Name   : {}\n      - Moref  : {}\n      - Cluster: {}",
            template.name, template.moref.value, cluster.name
        );
        if !self.confirm_candidate(&candidate, &summary, "    Import this VM template?", report)? {
            return Ok(());
        }

        let devices = self
            .devices
            .import_disks(conn, self.repo, template)
            .and_then(|disks| Ok((disks, self.devices.import_nics(conn, self.repo, template)?)));
        match devices {
            Ok((disks, nics)) => {
                candidate.record.extend(disks);
                candidate.record.extend(nics);
            }
            Err(error) => {
                tracing::warn!(template = %template.name, %error, "template devices could not be imported");
                self.say(&format!("    {error}"));
                report.add_failure(ItemFailure::new(&template.name, error));
                return Ok(());
            }
        }

        if let CandidateDetails::Template { resource_pools, .. } = &candidate.details {
            let pools = resource_pools.clone();
            let confined = conn
                .resource_pool()
                .and_then(|rp| object_name(conn.session(), rp).ok());
            let current = current_pool(&pools, confined.as_deref()).to_string();
            self.choose_resource_pool(&mut candidate.record, &pools, &current)?;
        }

        match self.allocate(PoolKind::Template, &candidate, None) {
            Ok(id) => {
                self.say(&format!("    OpenNebula template {id} created!"));
                report.add_committed(&candidate, id);
            }
            Err(e) => {
                self.say(&format!("    Error creating template: {e}"));
                report.add_failure(ItemFailure::new(&template.name, e.to_string()));
            }
        }
        Ok(())
    }

    /// Keep the default pool, pick one by index, or delegate the choice
    fn choose_resource_pool(
        &mut self,
        record: &mut TargetRecord,
        pools: &[String],
        current: &str,
    ) -> ImportResult<()> {
        if !self.operator.is_interactive() || pools.is_empty() {
            return Ok(());
        }

        let mode = self.operator.input(
            "    This template is currently set to launch VMs in the default resource pool.\n    \
             Press y to keep this behaviour, n to select a new resource pool or d to delegate \
             the choice to the user ([y]/n/d)?",
            "y",
        )?;

        match mode.trim().to_lowercase().as_str() {
            "d" => {
                let list = pools.join(",");
                let answer = self.operator.input(
                    &format!(
                        "    The list of available resource pools to be presented to the user are \"{list}\"\n    \
                         Press y to agree, or input a comma separated list of resource pools to edit \
                         [y/comma separated list]"
                    ),
                    "y",
                )?;
                let list = if answer.trim().eq_ignore_ascii_case("y") {
                    list
                } else {
                    answer.trim().to_string()
                };

                let default = current;
                let answer = self.operator.input(
                    &format!(
                        "    The default resource pool presented to the end user is set to \"{default}\".\n    \
                         Press y to agree, or input a new resource pool [y/resource pool name]"
                    ),
                    "y",
                )?;
                let default = if answer.trim().eq_ignore_ascii_case("y") {
                    default.to_string()
                } else {
                    answer.trim().to_string()
                };

                record.push_vector(
                    "USER_INPUTS",
                    [("VCENTER_RESOURCE_POOL", resource_pool_user_input(&list, &default))],
                );
            }
            "n" => {
                let mut listing = format!(
                    "    The list of available resource pools is:\n\n    [Index] Resource pool :\n    {}\n",
                    "-".repeat(100)
                );
                for (index, pool) in pools.iter().enumerate() {
                    let _ = writeln!(listing, "    [{}] {pool}", index + 1);
                }
                self.operator.notify(&listing);

                let answer = self.operator.input(
                    "    Please input the new default resource pool index in the list (e.g 1)",
                    "1",
                )?;
                let chosen = answer
                    .trim()
                    .parse::<usize>()
                    .ok()
                    .and_then(|i| i.checked_sub(1))
                    .and_then(|i| pools.get(i));
                match chosen {
                    Some(pool) => {
                        record.push("VCENTER_RESOURCE_POOL", pool.as_str());
                    }
                    None => self.operator.notify(&format!(
                        "    Index {} is not in the list, keeping the default resource pool.",
                        answer.trim()
                    )),
                }
            }
            _ => {}
        }
        Ok(())
    }
}

/// Pool VMs launch in today: the confined pool when the session has one
fn current_pool<'a>(pools: &'a [String], confined: Option<&str>) -> &'a str {
    confined
        .and_then(|name| {
            pools
                .iter()
                .find(|pool| *pool == name || pool.rsplit('/').next() == Some(name))
        })
        .or_else(|| pools.first())
        .map_or("", String::as_str)
}
