//! Image discovery on datastores

use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use serde_json::{Value, json};

use super::{StorageEntity, bytes_to_mb};
use crate::connection::Connection;
use crate::error::{InventoryError, InventoryResult};
use crate::import::{CandidateDetails, ImportCandidate};
use crate::one::{PoolElement, TargetRecord};
use crate::vim::{moref_property, run_task};

/// `[datastore] ` prefix of datastore paths
static FOLDER_PREFIX: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^\[[^\]]*\]\s*").ok());

/// Image flavour in the target system
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageType {
    /// Bootable disk
    Os,
    /// ISO or floppy image
    Cdrom,
}

impl ImageType {
    /// Record value of the `TYPE` attribute
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Os => "OS",
            Self::Cdrom => "CDROM",
        }
    }
}

/// Strips the leading `[datastore]` part of a datastore path
#[must_use]
pub fn strip_folder_prefix(folder_path: &str) -> &str {
    match FOLDER_PREFIX.as_ref().and_then(|re| re.find(folder_path)) {
        Some(m) => &folder_path[m.end()..],
        None => folder_path,
    }
}

/// Display name of an image: file stem without extension plus datastore
#[must_use]
pub fn image_display_name(path: &str, datastore: &str) -> String {
    let stem = Path::new(path)
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| path.to_string());
    format!("{stem} - {datastore}")
}

/// Record for an image found on a datastore
///
/// Images discovered by listing are persistent; images created for the
/// disks of an imported template are not.
#[must_use]
pub fn image_import_record(
    path: &str,
    datastore_name: &str,
    datastore_ref: &str,
    instance_id: &str,
    image_type: ImageType,
    disk_type: Option<&str>,
    persistent: bool,
) -> TargetRecord {
    let mut record = TargetRecord::new();
    record
        .push("NAME", image_display_name(path, datastore_name))
        .push("PATH", format!("vcenter://{path}"))
        .push("PERSISTENT", if persistent { "YES" } else { "NO" })
        .push("TYPE", image_type.as_str());
    if let Some(disk_type) = disk_type {
        record.push("VCENTER_DISK_TYPE", disk_type);
    }
    record
        .push("VCENTER_IMPORTED", "YES")
        .push("VCENTER_DS_REF", datastore_ref)
        .push("VCENTER_INSTANCE_ID", instance_id);
    record
}

fn search_spec(datastore_name: &str) -> Value {
    json!({
        "datastorePath": format!("[{datastore_name}]"),
        "searchSpec": {
            "_typeName": "HostDatastoreBrowserSearchSpec",
            "query": [
                {
                    "_typeName": "VmDiskFileQuery",
                    "details": {
                        "_typeName": "VmDiskFileQueryFlags",
                        "capacityKb": true,
                        "diskType": true,
                        "hardwareVersion": false,
                        "thin": false
                    }
                },
                {"_typeName": "IsoImageFileQuery"},
                {"_typeName": "FloppyImageFileQuery"}
            ],
            "details": {
                "_typeName": "FileQueryFlags",
                "fileOwner": false,
                "fileSize": true,
                "fileType": true,
                "modification": false
            }
        }
    })
}

/// Size of a search result entry in MB: disk capacity first, file size otherwise
pub(super) fn file_size_mb(file: &Value) -> Option<u64> {
    file.get("capacityKb")
        .and_then(Value::as_u64)
        .map(|kb| kb / 1024)
        .or_else(|| file.get("fileSize").and_then(Value::as_u64).map(bytes_to_mb))
}

impl StorageEntity {
    /// Lists the images stored on a volume that the target system lacks
    ///
    /// Aggregates hold no files directly and yield nothing. Entries whose
    /// display name already exists in `image_pool` are skipped; a missing
    /// size only leaves the candidate without one.
    ///
    /// # Errors
    ///
    /// Returns `InventoryError::Search` if the remote search task fails.
    pub fn list_images(
        &self,
        conn: &Connection,
        image_pool: &[PoolElement],
    ) -> InventoryResult<Vec<ImportCandidate>> {
        if self.is_aggregate() {
            tracing::debug!(ds_ref = %self.moref().value, "storage pods hold no images");
            return Ok(Vec::new());
        }
        let session = conn.session();
        let ds_name = self.name(session)?;
        let browser = moref_property(session, self.moref(), "browser")?.ok_or_else(|| {
            InventoryError::Search(format!("datastore {ds_name} has no browser"))
        })?;

        let results = run_task(
            session,
            &browser,
            "SearchDatastoreSubFolders_Task",
            search_spec(&ds_name),
            conn.poll_interval(),
        )
        .map_err(|e| InventoryError::Search(format!("datastore {ds_name}: {e}")))?;

        let mut candidates = Vec::new();
        for result in results.as_array().map(Vec::as_slice).unwrap_or_default() {
            let folder = strip_folder_prefix(
                result
                    .get("folderPath")
                    .and_then(Value::as_str)
                    .unwrap_or_default(),
            )
            .trim_end_matches('/');

            for file in result
                .get("file")
                .and_then(Value::as_array)
                .map(Vec::as_slice)
                .unwrap_or_default()
            {
                let Some(file_path) = file.get("path").and_then(Value::as_str) else {
                    continue;
                };
                let path = if folder.is_empty() {
                    file_path.to_string()
                } else {
                    format!("{folder}/{file_path}")
                };
                let display_name = image_display_name(&path, &ds_name);
                if image_pool.iter().any(|image| image.name == display_name) {
                    tracing::debug!(image = %display_name, "image already imported");
                    continue;
                }

                let is_disk = file.get("_typeName").and_then(Value::as_str) == Some("VmDiskFileInfo");
                let image_type = if is_disk { ImageType::Os } else { ImageType::Cdrom };
                let disk_type = if is_disk {
                    file.get("diskType").and_then(Value::as_str)
                } else {
                    None
                };

                candidates.push(ImportCandidate {
                    record: image_import_record(
                        &path,
                        &ds_name,
                        &self.moref().value,
                        conn.instance_uuid(),
                        image_type,
                        disk_type,
                        true,
                    ),
                    display_name,
                    remote_ref: self.moref().clone(),
                    details: CandidateDetails::Image {
                        datastore: ds_name.clone(),
                        path,
                        size_mb: file_size_mb(file),
                        image_type,
                    },
                });
            }
        }

        tracing::debug!(datastore = %ds_name, count = candidates.len(), "listed images");
        Ok(candidates)
    }
}
