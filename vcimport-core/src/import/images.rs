//! Image import from one datastore

use super::pipeline::{Importer, attrs};
use super::traits::{CandidateDetails, ImportReport, ItemFailure};
use crate::error::{AllocateError, ImportResult, InventoryError, RepositoryError};
use crate::one::PoolKind;

/// Hint shown when the target system's capacity check refuses an image
pub const CAPACITY_CHECK_HINT: &str =
    "Please disable DATASTORE_CAPACITY_CHECK in /etc/one/oned.conf and restart OpenNebula.";

/// Operator message for a refused image record
#[must_use]
pub fn image_failure_message(name: &str, error: &AllocateError) -> String {
    if error.is_capacity_check() {
        format!("    Error creating image {name}: {error}\n    {CAPACITY_CHECK_HINT}")
    } else {
        format!("    Error creating image {name}: {error}")
    }
}

impl Importer<'_> {
    pub(super) fn import_images(&mut self, datastore: &str) -> ImportResult<ImportReport> {
        let conn = self.conn;
        let mut report = ImportReport::new();

        self.check_cancelled()?;
        let ds = self
            .repo
            .find_by_name(PoolKind::Datastore, datastore)?
            .ok_or_else(|| RepositoryError::NotFound {
                kind: PoolKind::Datastore.label(),
                key: datastore.to_string(),
            })?;
        let ds_ref = ds.attr(attrs::DS_REF).ok_or_else(|| {
            InventoryError::Structure(format!("datastore {datastore} carries no {}", attrs::DS_REF))
        })?;

        let id = self.cache.get(ds_ref);
        self.cache.entity_mut(id).set_one_item(ds.clone());

        let image_pool = self.pool(PoolKind::Image)?;
        let candidates = self.cache.entity(id).list_images(conn, &image_pool)?;
        if candidates.is_empty() {
            self.say(&format!("    No new Images found in {datastore}..."));
            return Ok(report);
        }

        for candidate in candidates {
            let CandidateDetails::Image { path, image_type, .. } = &candidate.details else {
                continue;
            };
            let summary = format!(
                "\n  * Image found:\n      - Name      : {}\n      - Path      : {path}\n      - Type      : {}",
                candidate.display_name,
                image_type.as_str()
            );
            if !self.confirm_candidate(&candidate, &summary, "    Import this Image?", &mut report)? {
                continue;
            }

            match self.allocate(PoolKind::Image, &candidate, Some(ds.id)) {
                Ok(image_id) => {
                    self.say(&format!(
                        "    OpenNebula image {image_id} created from {}!",
                        candidate.display_name
                    ));
                    report.add_committed(&candidate, image_id);
                }
                Err(e) => {
                    self.say(&image_failure_message(&candidate.display_name, &e));
                    report.add_failure(ItemFailure::new(&candidate.display_name, e.to_string()));
                }
            }
        }
        Ok(report)
    }
}
