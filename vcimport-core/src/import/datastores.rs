//! Datastore and storage pod import

use super::pipeline::{Importer, already_imported, attrs};
use super::traits::{CandidateDetails, ImportReport, ItemFailure, SkippedEntry};
use crate::error::{AllocateError, ImportResult};
use crate::inventory::{datastore_folder, list_cluster_storage, list_datacenters};
use crate::one::{PoolElement, PoolKind, RecordValue};
use crate::storage::{DatastoreType, resolve_owning_datacenter};
use crate::vim::{ManagedObjectRef, kinds};

/// Shown when the target system refuses a datastore record
pub const DATASTORE_GUIDANCE: &str = "One datastore can exist only once, and can be used in any vCenter Cluster \
     that has access to it. Also, no spaces allowed in datastore name (rename it in vCenter and try again)";

/// Operator message for a refused datastore record
#[must_use]
pub fn datastore_failure_message(name: &str, error: &AllocateError) -> String {
    match error {
        AllocateError::Transport(_) => format!("    Error creating datastore {name}: {error}"),
        _ if error.is_name_taken() => format!(
            "    Error creating datastore {name}: it is already imported. {DATASTORE_GUIDANCE}"
        ),
        AllocateError::Rejected(_) => {
            format!("    Error creating datastore {name}: {error}. {DATASTORE_GUIDANCE}")
        }
    }
}

impl Importer<'_> {
    pub(super) fn import_datastores(&mut self) -> ImportResult<ImportReport> {
        let conn = self.conn;
        let session = conn.session();
        let instance_id = conn.instance_uuid();
        let mut report = ImportReport::new();

        let ds_pool = self.pool(PoolKind::Datastore)?;
        let clusters = self.imported_clusters()?;
        let datacenters = list_datacenters(session);
        self.report_discovery_errors("datacenters", datacenters.errors, &mut report);

        for dc in &datacenters.items {
            if !self.confirm_datacenter(dc, &mut report)? {
                continue;
            }

            let folder = match datastore_folder(session, dc) {
                Ok(folder) => folder,
                Err(e) => {
                    self.report_discovery_errors(&dc.name, vec![e], &mut report);
                    continue;
                }
            };
            let summary = self.cache.fetch_all(session, &folder);
            self.report_discovery_errors(&dc.name, summary.errors, &mut report);

            let mut candidates = Vec::new();
            for cluster in &clusters {
                let ccr = ManagedObjectRef::new(kinds::CLUSTER, cluster.ccr_ref.as_str());
                match resolve_owning_datacenter(session, &ccr) {
                    Ok(owner) if owner.moref == dc.moref => {}
                    Ok(_) => continue,
                    Err(e) => {
                        self.report_discovery_errors(&cluster.name, vec![e], &mut report);
                        continue;
                    }
                }

                let storage = match list_cluster_storage(session, &mut self.cache, &ccr) {
                    Ok(storage) => storage,
                    Err(e) => {
                        self.report_discovery_errors(&cluster.name, vec![e], &mut report);
                        continue;
                    }
                };

                for id in storage {
                    for ds_type in [DatastoreType::Image, DatastoreType::System] {
                        let entity = self.cache.entity(id);
                        let key = [
                            ("TYPE", ds_type.as_str()),
                            (attrs::DS_REF, entity.moref().value.as_str()),
                            (attrs::CCR_REF, cluster.ccr_ref.as_str()),
                            (attrs::INSTANCE_ID, instance_id),
                        ];
                        if already_imported(&ds_pool, &key) {
                            let label = entity
                                .known_name()
                                .map_or_else(|| entity.moref().value.clone(), str::to_string);
                            report.add_skipped(SkippedEntry::new(
                                format!("{label} {}", ds_type.suffix()),
                                "already imported",
                            ));
                            continue;
                        }
                        match entity.to_import_candidate(
                            session,
                            &clusters,
                            &cluster.ccr_ref,
                            &cluster.name,
                            ds_type,
                        ) {
                            Ok(Some(candidate)) => candidates.push((id, candidate)),
                            Ok(None) => {}
                            Err(e) => {
                                let context = entity.moref().value.clone();
                                self.report_discovery_errors(&context, vec![e], &mut report);
                            }
                        }
                    }
                }
            }
            if candidates.is_empty() {
                self.say(&format!("    No new Datastores or StoragePods found in {}...", dc.name));
                continue;
            }

            for (id, candidate) in candidates {
                let CandidateDetails::Datastore {
                    cluster_name,
                    total_mb,
                    free_mb,
                    ..
                } = &candidate.details
                else {
                    continue;
                };
                let summary = format!(
                    "\n  * Datastore found:\n      - Name      : {}\n      - Total MB  : {total_mb}\n      \
                     - Free  MB  : {free_mb}\n      - Cluster   : {cluster_name}",
                    candidate.display_name
                );
                if !self.confirm_candidate(&candidate, &summary, "    Import this as Datastore?", &mut report)? {
                    continue;
                }

                match self.allocate(PoolKind::Datastore, &candidate, None) {
                    Ok(ds_id) => {
                        self.say(&format!(
                            "    OpenNebula datastore {} with id {ds_id} successfully created.",
                            candidate.display_name
                        ));
                        let mut item = PoolElement {
                            id: ds_id,
                            name: candidate.display_name.clone(),
                            ..Default::default()
                        };
                        for (key, value) in candidate.record.entries() {
                            if let RecordValue::Scalar(value) = value {
                                item.template.insert(key.clone(), value.clone());
                            }
                        }
                        self.cache.entity_mut(id).set_one_item(item);
                        report.add_committed(&candidate, ds_id);
                    }
                    Err(e) => {
                        self.say(&datastore_failure_message(&candidate.display_name, &e));
                        report.add_failure(ItemFailure::new(&candidate.display_name, e.to_string()));
                    }
                }
            }
        }
        Ok(report)
    }
}
