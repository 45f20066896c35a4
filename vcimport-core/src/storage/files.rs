//! Directory and file management on volumes
//!
//! Every operation blocks until the remote task completes.

use std::path::Path;

use serde_json::{Value, json};

use super::images::file_size_mb;
use super::{StorageEntity, datacenter_path};
use crate::connection::Connection;
use crate::error::{InventoryError, InventoryResult};
use crate::inventory::Datacenter;
use crate::vim::{DatastoreFile, VimError, moref_property, run_task};

/// Files below this many bytes are VMDK descriptors, not flat extents
pub const DESCRIPTOR_MAX_BYTES: u64 = 4096;

/// Resolved location data of a volume
struct Location {
    name: String,
    datacenter: Datacenter,
}

impl Location {
    fn path(&self, relative: &str) -> String {
        format!("[{}] {relative}", self.name)
    }
}

fn task_error(what: &str, err: VimError) -> InventoryError {
    match err {
        VimError::TaskFailed { .. } | VimError::Fault { .. } => {
            InventoryError::Task(format!("{what}: {err}"))
        }
        other => InventoryError::Remote(other),
    }
}

impl StorageEntity {
    fn location(&self, conn: &Connection) -> InventoryResult<Location> {
        if self.is_aggregate() {
            return Err(InventoryError::Structure(format!(
                "storage pod {} holds no files",
                self.moref().value
            )));
        }
        let session = conn.session();
        Ok(Location {
            name: self.name(session)?,
            datacenter: self.resolve_owning_datacenter(session)?,
        })
    }

    fn datastore_file(&self, conn: &Connection, location: &Location, path: &str) -> InventoryResult<DatastoreFile> {
        Ok(DatastoreFile {
            datastore: location.name.clone(),
            datacenter_path: datacenter_path(conn.session(), &location.datacenter)?,
            path: path.to_string(),
        })
    }

    /// Creates a directory (and its parents); an existing one is fine
    ///
    /// # Errors
    ///
    /// Returns `InventoryError::Task` if the directory cannot be created.
    pub fn ensure_directory(&self, conn: &Connection, directory: &str) -> InventoryResult<()> {
        let location = self.location(conn)?;
        let session = conn.session();
        let result = session.invoke(
            &session.service_content().file_manager,
            "MakeDirectory",
            json!({
                "name": location.path(directory),
                "datacenter": location.datacenter.moref.to_json(),
                "createParentDirectories": true,
            }),
        );
        match result {
            Ok(_) => Ok(()),
            Err(e) if e.is_fault("FileAlreadyExists") => {
                tracing::debug!(directory = %location.path(directory), "directory already exists");
                Ok(())
            }
            Err(e) => Err(task_error(&format!("create {}", location.path(directory)), e)),
        }
    }

    /// Deletes a directory and its contents
    ///
    /// # Errors
    ///
    /// Returns `InventoryError::Task` if the delete task fails.
    pub fn remove_directory(&self, conn: &Connection, directory: &str) -> InventoryResult<()> {
        let location = self.location(conn)?;
        let session = conn.session();
        run_task(
            session,
            &session.service_content().file_manager,
            "DeleteDatastoreFile_Task",
            json!({
                "name": location.path(directory),
                "datacenter": location.datacenter.moref.to_json(),
            }),
            conn.poll_interval(),
        )
        .map_err(|e| task_error(&format!("delete {}", location.path(directory)), e))?;
        Ok(())
    }

    fn search_directory(
        &self,
        conn: &Connection,
        location: &Location,
        directory: &str,
        pattern: Option<&str>,
    ) -> InventoryResult<Vec<Value>> {
        let session = conn.session();
        let browser = moref_property(session, self.moref(), "browser")?.ok_or_else(|| {
            InventoryError::Search(format!("datastore {} has no browser", location.name))
        })?;
        let mut spec = json!({
            "_typeName": "HostDatastoreBrowserSearchSpec",
            "details": {
                "_typeName": "FileQueryFlags",
                "fileOwner": false,
                "fileSize": true,
                "fileType": true,
                "modification": false
            },
            "query": [{
                "_typeName": "VmDiskFileQuery",
                "details": {"_typeName": "VmDiskFileQueryFlags", "capacityKb": true, "diskType": false, "hardwareVersion": false, "thin": false}
            }, {"_typeName": "FileQuery"}]
        });
        if let Some(pattern) = pattern {
            spec["matchPattern"] = json!([pattern]);
        }
        let result = run_task(
            session,
            &browser,
            "SearchDatastore_Task",
            json!({"datastorePath": location.path(directory), "searchSpec": spec}),
            conn.poll_interval(),
        );
        match result {
            Ok(found) => Ok(found
                .get("file")
                .and_then(Value::as_array)
                .cloned()
                .unwrap_or_default()),
            Err(e) if e.is_fault("FileNotFound") => Ok(Vec::new()),
            Err(e) => Err(InventoryError::Search(format!(
                "{}: {e}",
                location.path(directory)
            ))),
        }
    }

    /// Returns true if a directory holds no files (or does not exist)
    ///
    /// # Errors
    ///
    /// Returns `InventoryError::Search` if the directory cannot be listed.
    pub fn is_empty(&self, conn: &Connection, directory: &str) -> InventoryResult<bool> {
        let location = self.location(conn)?;
        Ok(self.search_directory(conn, &location, directory, None)?.is_empty())
    }

    /// Uploads a local file
    ///
    /// # Errors
    ///
    /// Returns `InventoryError::Task` if the transfer fails.
    pub fn upload_file(&self, conn: &Connection, source: &Path, target: &str) -> InventoryResult<()> {
        let location = self.location(conn)?;
        let file = self.datastore_file(conn, &location, target)?;
        conn.session()
            .upload(&file, source)
            .map_err(|e| InventoryError::Task(format!("upload to {}: {e}", file.datastore_path())))?;
        tracing::info!(source = %source.display(), target = %file.datastore_path(), "uploaded");
        Ok(())
    }

    /// Downloads a file to a local path
    ///
    /// # Errors
    ///
    /// Returns `InventoryError::Task` if the transfer fails.
    pub fn download_file(&self, conn: &Connection, source: &str, target: &Path) -> InventoryResult<()> {
        let location = self.location(conn)?;
        let file = self.datastore_file(conn, &location, source)?;
        conn.session()
            .download(&file, target)
            .map_err(|e| InventoryError::Task(format!("download of {}: {e}", file.datastore_path())))?;
        tracing::info!(source = %file.datastore_path(), target = %target.display(), "downloaded");
        Ok(())
    }

    /// Copies a virtual disk to another (or the same) volume
    ///
    /// The parent directory of the target is created first.
    ///
    /// # Errors
    ///
    /// Returns `InventoryError::Task` if the copy task fails.
    pub fn copy_file(
        &self,
        conn: &Connection,
        source: &str,
        target_volume: &Self,
        target: &str,
    ) -> InventoryResult<String> {
        let location = self.location(conn)?;
        let target_location = target_volume.location(conn)?;
        if let Some(parent) = Path::new(target).parent().and_then(Path::to_str)
            && !parent.is_empty()
        {
            target_volume.ensure_directory(conn, parent)?;
        }

        let session = conn.session();
        let dest_name = target_location.path(target);
        run_task(
            session,
            &session.service_content().virtual_disk_manager,
            "CopyVirtualDisk_Task",
            json!({
                "sourceName": location.path(source),
                "sourceDatacenter": location.datacenter.moref.to_json(),
                "destName": dest_name,
                "destDatacenter": target_location.datacenter.moref.to_json(),
                "force": true,
            }),
            conn.poll_interval(),
        )
        .map_err(|e| task_error(&format!("copy {} to {dest_name}", location.path(source)), e))?;
        Ok(dest_name)
    }

    /// Size of a file in MB
    ///
    /// # Errors
    ///
    /// Returns `InventoryError::Task` if the file is missing or its size is
    /// unknown.
    pub fn size_of(&self, conn: &Connection, path: &str) -> InventoryResult<u64> {
        let location = self.location(conn)?;
        let path_ref = Path::new(path);
        let directory = path_ref.parent().and_then(Path::to_str).unwrap_or_default();
        let file_name = path_ref.file_name().and_then(|n| n.to_str()).unwrap_or(path);

        self.search_directory(conn, &location, directory, Some(file_name))?
            .iter()
            .find(|f| f.get("path").and_then(Value::as_str) == Some(file_name))
            .and_then(file_size_mb)
            .ok_or_else(|| InventoryError::Task(format!("size of {} is unknown", location.path(path))))
    }

    /// Returns true if the file is a small VMDK descriptor
    ///
    /// # Errors
    ///
    /// Returns `InventoryError::Task` if the file cannot be read.
    pub fn is_descriptor_file(&self, conn: &Connection, path: &str) -> InventoryResult<bool> {
        let location = self.location(conn)?;
        let file = self.datastore_file(conn, &location, path)?;
        let length = conn
            .session()
            .content_length(&file)
            .map_err(|e| InventoryError::Task(format!("stat of {}: {e}", file.datastore_path())))?;
        Ok(length < DESCRIPTOR_MAX_BYTES)
    }

    /// Creates an empty virtual disk and returns its datastore path
    ///
    /// # Errors
    ///
    /// Returns `InventoryError::Task` if the create task fails.
    pub fn create_virtual_disk(
        &self,
        conn: &Connection,
        name: &str,
        size_mb: u64,
        adapter_type: &str,
        disk_type: &str,
    ) -> InventoryResult<String> {
        let location = self.location(conn)?;
        let session = conn.session();
        let path = location.path(name);
        run_task(
            session,
            &session.service_content().virtual_disk_manager,
            "CreateVirtualDisk_Task",
            json!({
                "name": path,
                "datacenter": location.datacenter.moref.to_json(),
                "spec": {
                    "_typeName": "FileBackedVirtualDiskSpec",
                    "adapterType": adapter_type,
                    "diskType": disk_type,
                    "capacityKb": size_mb * 1024,
                },
            }),
            conn.poll_interval(),
        )
        .map_err(|e| task_error(&format!("create disk {path}"), e))?;
        Ok(path)
    }

    /// Deletes a virtual disk
    ///
    /// # Errors
    ///
    /// Returns `InventoryError::Task` if the delete task fails.
    pub fn delete_virtual_disk(&self, conn: &Connection, name: &str) -> InventoryResult<()> {
        let location = self.location(conn)?;
        let session = conn.session();
        let path = location.path(name);
        run_task(
            session,
            &session.service_content().virtual_disk_manager,
            "DeleteVirtualDisk_Task",
            json!({
                "name": path,
                "datacenter": location.datacenter.moref.to_json(),
            }),
            conn.poll_interval(),
        )
        .map_err(|e| task_error(&format!("delete disk {path}"), e))?;
        Ok(())
    }
}
