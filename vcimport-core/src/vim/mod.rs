//! Remote inventory session port
//!
//! This module models the slice of the vSphere API that the importer needs:
//! managed object references, the service content, property reads, method
//! invocation, task completion and datastore file transfer.
//!
//! Two implementations of [`VimSession`] are provided:
//! - [`JsonApiSession`] talks to a live vCenter over the vSphere JSON API
//!   (`/sdk/vim25/{release}/...`) with a blocking HTTP client
//! - [`MemoryVim`] serves an in-memory inventory, used for offline runs and
//!   for tests

mod json_api;
mod memory;

use std::fmt;
use std::path::Path;
use std::time::Duration;

use serde_json::{Value, json};
use thiserror::Error;

pub use json_api::{JsonApiSession, LoginParams};
pub use memory::{MemoryVim, MethodCall};

/// Type names of the remote objects the importer cares about
pub mod kinds {
    /// Plain inventory folder
    pub const FOLDER: &str = "Folder";
    /// Datacenter
    pub const DATACENTER: &str = "Datacenter";
    /// Compute cluster
    pub const CLUSTER: &str = "ClusterComputeResource";
    /// ESXi host
    pub const HOST: &str = "HostSystem";
    /// Single datastore
    pub const DATASTORE: &str = "Datastore";
    /// Storage DRS pod (datastore cluster)
    pub const STORAGE_POD: &str = "StoragePod";
    /// Virtual machine or template
    pub const VIRTUAL_MACHINE: &str = "VirtualMachine";
    /// Resource pool
    pub const RESOURCE_POOL: &str = "ResourcePool";
    /// Standard port group
    pub const NETWORK: &str = "Network";
    /// Distributed port group
    pub const DV_PORTGROUP: &str = "DistributedVirtualPortgroup";
    /// NSX opaque network
    pub const OPAQUE_NETWORK: &str = "OpaqueNetwork";
    /// Remote task
    pub const TASK: &str = "Task";
}

/// Default interval between two task-state polls
pub const DEFAULT_TASK_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Errors returned by a [`VimSession`]
#[derive(Debug, Clone, Error)]
pub enum VimError {
    /// HTTP transport failure
    #[error("HTTP error: {0}")]
    Http(String),

    /// The server answered with a vSphere fault
    #[error("{fault}: {message}")]
    Fault {
        /// Fault type name, e.g. `FileAlreadyExists`
        fault: String,
        /// Localized fault message
        message: String,
    },

    /// A task finished in the `error` state
    #[error("Task failed ({fault}): {message}")]
    TaskFailed {
        /// Fault type name carried by the task
        fault: String,
        /// Localized task error
        message: String,
    },

    /// A response could not be decoded
    #[error("Unexpected response: {0}")]
    Decode(String),

    /// The session is not (or no longer) authenticated
    #[error("Session is not authenticated")]
    NotAuthenticated,
}

impl VimError {
    /// Returns true if this is a fault (direct or through a task) of the given type
    #[must_use]
    pub fn is_fault(&self, name: &str) -> bool {
        match self {
            Self::Fault { fault, .. } | Self::TaskFailed { fault, .. } => fault == name,
            _ => false,
        }
    }
}

/// Result type alias for session operations
pub type VimResult<T> = std::result::Result<T, VimError>;

/// Reference to a remote managed object
///
/// `value` is the stable opaque identifier (`datastore-12`, `group-p31`);
/// `kind` is the remote type name reported alongside it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ManagedObjectRef {
    /// Remote type name (`Datastore`, `Folder`, ...)
    pub kind: String,
    /// Opaque reference value
    pub value: String,
}

impl ManagedObjectRef {
    /// Creates a new reference
    #[must_use]
    pub fn new(kind: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            value: value.into(),
        }
    }

    /// Returns true if the remote type equals `kind`
    #[must_use]
    pub fn is(&self, kind: &str) -> bool {
        self.kind == kind
    }

    /// Encodes the reference the way the JSON API expects it
    #[must_use]
    pub fn to_json(&self) -> Value {
        json!({
            "_typeName": "ManagedObjectReference",
            "type": self.kind,
            "value": self.value,
        })
    }

    /// Decodes a JSON API reference, returning `None` for anything else
    #[must_use]
    pub fn from_json(value: &Value) -> Option<Self> {
        let kind = value.get("type")?.as_str()?;
        let val = value.get("value")?.as_str()?;
        Some(Self::new(kind, val))
    }
}

impl fmt::Display for ManagedObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.kind, self.value)
    }
}

/// `about` block of the service content
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AboutInfo {
    /// Unique id of this vCenter instance; refs are only unique within it
    pub instance_uuid: String,
    /// API version, e.g. `8.0.1.0`
    pub api_version: String,
    /// Product name and build
    pub full_name: String,
}

/// Entry points of the remote inventory
#[derive(Debug, Clone)]
pub struct ServiceContent {
    /// Version and identity of the endpoint
    pub about: AboutInfo,
    /// Root inventory folder
    pub root_folder: ManagedObjectRef,
    /// Session manager
    pub session_manager: ManagedObjectRef,
    /// File manager (directory operations)
    pub file_manager: ManagedObjectRef,
    /// Virtual disk manager (disk copy/create/delete)
    pub virtual_disk_manager: ManagedObjectRef,
}

impl ServiceContent {
    /// Decodes the `ServiceInstance/content` document
    ///
    /// # Errors
    ///
    /// Returns `VimError::Decode` if a mandatory entry is missing.
    pub fn from_json(value: &Value) -> VimResult<Self> {
        let about = value
            .get("about")
            .ok_or_else(|| VimError::Decode("service content has no about block".to_string()))?;
        let text = |key: &str| {
            about
                .get(key)
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string()
        };
        let moref = |key: &str| {
            value
                .get(key)
                .and_then(ManagedObjectRef::from_json)
                .ok_or_else(|| VimError::Decode(format!("service content has no {key}")))
        };

        Ok(Self {
            about: AboutInfo {
                instance_uuid: text("instanceUuid"),
                api_version: text("apiVersion"),
                full_name: text("fullName"),
            },
            root_folder: moref("rootFolder")?,
            session_manager: moref("sessionManager")?,
            file_manager: moref("fileManager")?,
            virtual_disk_manager: moref("virtualDiskManager")?,
        })
    }
}

/// A file addressed through the datastore HTTP file service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatastoreFile {
    /// Datastore name
    pub datastore: String,
    /// Folder path of the owning datacenter below the root folder
    pub datacenter_path: String,
    /// Path of the file relative to the datastore root
    pub path: String,
}

impl DatastoreFile {
    /// Returns the `[datastore] path` form used by datastore APIs
    #[must_use]
    pub fn datastore_path(&self) -> String {
        format!("[{}] {}", self.datastore, self.path)
    }
}

/// A session against a remote inventory endpoint
///
/// Every call blocks until the remote side responds.
pub trait VimSession {
    /// Host name or address of the endpoint
    fn endpoint(&self) -> &str;

    /// Service content read when the session was opened
    fn service_content(&self) -> &ServiceContent;

    /// Reads one top-level property of a managed object
    ///
    /// Unset properties are returned as `Value::Null`.
    ///
    /// # Errors
    ///
    /// Returns `VimError` if the request fails.
    fn property(&self, obj: &ManagedObjectRef, name: &str) -> VimResult<Value>;

    /// Invokes a method on a managed object
    ///
    /// Task-returning methods (`*_Task`) return the task reference; use
    /// [`wait_for_task`] to block until it completes.
    ///
    /// # Errors
    ///
    /// Returns `VimError` if the request fails or the server raises a fault.
    fn invoke(&self, obj: &ManagedObjectRef, method: &str, args: Value) -> VimResult<Value>;

    /// Uploads a local file to a datastore, blocking until done
    ///
    /// # Errors
    ///
    /// Returns `VimError` if the transfer fails.
    fn upload(&self, target: &DatastoreFile, source: &Path) -> VimResult<()>;

    /// Downloads a datastore file to a local path, blocking until done
    ///
    /// # Errors
    ///
    /// Returns `VimError` if the transfer fails.
    fn download(&self, source: &DatastoreFile, target: &Path) -> VimResult<()>;

    /// Returns the size in bytes the file service reports for a file
    ///
    /// # Errors
    ///
    /// Returns `VimError` if the file cannot be read.
    fn content_length(&self, file: &DatastoreFile) -> VimResult<u64>;

    /// Terminates the session
    ///
    /// # Errors
    ///
    /// Returns `VimError` if the logout request fails.
    fn logout(&self) -> VimResult<()>;
}

impl<T: VimSession + ?Sized> VimSession for std::rc::Rc<T> {
    fn endpoint(&self) -> &str {
        (**self).endpoint()
    }

    fn service_content(&self) -> &ServiceContent {
        (**self).service_content()
    }

    fn property(&self, obj: &ManagedObjectRef, name: &str) -> VimResult<Value> {
        (**self).property(obj, name)
    }

    fn invoke(&self, obj: &ManagedObjectRef, method: &str, args: Value) -> VimResult<Value> {
        (**self).invoke(obj, method, args)
    }

    fn upload(&self, target: &DatastoreFile, source: &Path) -> VimResult<()> {
        (**self).upload(target, source)
    }

    fn download(&self, source: &DatastoreFile, target: &Path) -> VimResult<()> {
        (**self).download(source, target)
    }

    fn content_length(&self, file: &DatastoreFile) -> VimResult<u64> {
        (**self).content_length(file)
    }

    fn logout(&self) -> VimResult<()> {
        (**self).logout()
    }
}

/// Reads a dotted property path such as `summary.capacity`
///
/// The first segment is fetched from the server, the rest is resolved
/// locally. Missing segments resolve to `Value::Null`.
///
/// # Errors
///
/// Returns `VimError` if the top-level property read fails.
pub fn property_path(
    session: &dyn VimSession,
    obj: &ManagedObjectRef,
    path: &str,
) -> VimResult<Value> {
    let mut segments = path.split('.');
    let head = segments.next().unwrap_or(path);
    let mut value = session.property(obj, head)?;
    for segment in segments {
        value = value.get(segment).cloned().unwrap_or(Value::Null);
    }
    Ok(value)
}

/// Reads a string property; unset or non-string values yield `None`
///
/// # Errors
///
/// Returns `VimError` if the read fails.
pub fn string_property(
    session: &dyn VimSession,
    obj: &ManagedObjectRef,
    path: &str,
) -> VimResult<Option<String>> {
    Ok(property_path(session, obj, path)?
        .as_str()
        .map(ToString::to_string))
}

/// Reads a property holding a single managed object reference
///
/// # Errors
///
/// Returns `VimError` if the read fails.
pub fn moref_property(
    session: &dyn VimSession,
    obj: &ManagedObjectRef,
    path: &str,
) -> VimResult<Option<ManagedObjectRef>> {
    Ok(ManagedObjectRef::from_json(&property_path(
        session, obj, path,
    )?))
}

/// Reads a property holding a list of managed object references
///
/// Entries that are not references are ignored.
///
/// # Errors
///
/// Returns `VimError` if the read fails.
pub fn moref_list_property(
    session: &dyn VimSession,
    obj: &ManagedObjectRef,
    path: &str,
) -> VimResult<Vec<ManagedObjectRef>> {
    let value = property_path(session, obj, path)?;
    Ok(value
        .as_array()
        .map(|items| items.iter().filter_map(ManagedObjectRef::from_json).collect())
        .unwrap_or_default())
}

/// Reads the `name` of a managed object, falling back to its ref value
///
/// # Errors
///
/// Returns `VimError` if the read fails.
pub fn object_name(session: &dyn VimSession, obj: &ManagedObjectRef) -> VimResult<String> {
    Ok(string_property(session, obj, "name")?.unwrap_or_else(|| obj.value.clone()))
}

/// Blocks until a task leaves the `queued`/`running` states
///
/// Returns the task result (`Value::Null` for void tasks).
///
/// # Errors
///
/// Returns `VimError::TaskFailed` if the task ends in the `error` state, or
/// any error raised while polling.
pub fn wait_for_task(
    session: &dyn VimSession,
    task: &ManagedObjectRef,
    poll_interval: Duration,
) -> VimResult<Value> {
    loop {
        let info = session.property(task, "info")?;
        match info.get("state").and_then(Value::as_str) {
            Some("success") => return Ok(info.get("result").cloned().unwrap_or(Value::Null)),
            Some("error") => {
                let error = info.get("error").cloned().unwrap_or(Value::Null);
                let fault = error
                    .get("fault")
                    .and_then(|f| f.get("_typeName"))
                    .and_then(Value::as_str)
                    .unwrap_or("TaskError")
                    .to_string();
                let message = error
                    .get("localizedMessage")
                    .and_then(Value::as_str)
                    .unwrap_or("task failed without a message")
                    .to_string();
                return Err(VimError::TaskFailed { fault, message });
            }
            Some("queued" | "running") => std::thread::sleep(poll_interval),
            other => {
                return Err(VimError::Decode(format!(
                    "task {task} reported unknown state {other:?}"
                )));
            }
        }
    }
}

/// Invokes a task-returning method and waits for its completion
///
/// # Errors
///
/// Returns `VimError` if the invocation or the task fails.
pub fn run_task(
    session: &dyn VimSession,
    obj: &ManagedObjectRef,
    method: &str,
    args: Value,
    poll_interval: Duration,
) -> VimResult<Value> {
    let task = session.invoke(obj, method, args)?;
    let task = ManagedObjectRef::from_json(&task).ok_or_else(|| {
        VimError::Decode(format!("{method} on {obj} did not return a task reference"))
    })?;
    wait_for_task(session, &task, poll_interval)
}
