//! Datastore records and import candidates

use super::{DatastoreType, StorageEntity};
use crate::error::InventoryResult;
use crate::import::{CandidateDetails, ImportCandidate, ImportedCluster};
use crate::one::TargetRecord;
use crate::vim::VimSession;

impl StorageEntity {
    /// Renders the datastore record
    ///
    /// Volumes always get `DS_MAD`; aggregates never do, they only group
    /// transport-agnostic members.
    #[must_use]
    pub fn to_target_record(
        &self,
        name: &str,
        instance_id: &str,
        ccr_ref: &str,
        host_id: i64,
        ds_type: DatastoreType,
    ) -> TargetRecord {
        let mut record = TargetRecord::new();
        record
            .push("NAME", name)
            .push("TM_MAD", "vcenter")
            .push("VCENTER_INSTANCE_ID", instance_id)
            .push("VCENTER_CCR_REF", ccr_ref)
            .push("VCENTER_DS_REF", self.moref().value.as_str())
            .push("VCENTER_ONE_HOST_ID", host_id.to_string());
        if !self.is_aggregate() {
            record.push("DS_MAD", "vcenter");
        }
        record.push("TYPE", ds_type.as_str());
        record
    }

    /// Builds the candidate shown to the operator for one cluster and type
    ///
    /// Returns `None` if the cluster is not imported yet, or if an image
    /// datastore is requested for an aggregate.
    ///
    /// # Errors
    ///
    /// Returns `InventoryError::Remote` if the name or usage cannot be read.
    pub fn to_import_candidate(
        &self,
        session: &dyn VimSession,
        clusters: &[ImportedCluster],
        ccr_ref: &str,
        ccr_name: &str,
        ds_type: DatastoreType,
    ) -> InventoryResult<Option<ImportCandidate>> {
        let Some(cluster) = clusters.iter().find(|c| c.ccr_ref == ccr_ref) else {
            return Ok(None);
        };
        if self.is_aggregate() && ds_type == DatastoreType::Image {
            return Ok(None);
        }

        let name = self.name(session)?;
        let usage = self.usage(session)?;
        let display_name = format!("{name} - {ccr_name} {}", ds_type.suffix());
        let instance_id = &session.service_content().about.instance_uuid;

        Ok(Some(ImportCandidate {
            record: self.to_target_record(
                &display_name,
                instance_id,
                ccr_ref,
                cluster.host_id,
                ds_type,
            ),
            display_name,
            remote_ref: self.moref().clone(),
            details: CandidateDetails::Datastore {
                cluster_name: ccr_name.to_string(),
                ds_type,
                total_mb: usage.total_mb,
                free_mb: usage.free_mb,
            },
        }))
    }
}
