//! In-memory inventory session
//!
//! Serves a static object graph described as JSON property documents.
//! Methods answer with canned results; `*_Task` methods complete
//! immediately and are observable through `Task/<id>/info` like on a live
//! endpoint.

use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use serde_json::{Value, json};

use super::{
    AboutInfo, DatastoreFile, ManagedObjectRef, ServiceContent, VimError, VimResult, VimSession,
    kinds,
};

/// A recorded method invocation
#[derive(Debug, Clone, PartialEq)]
pub struct MethodCall {
    /// Object the method was invoked on
    pub target: ManagedObjectRef,
    /// Method name
    pub method: String,
    /// JSON arguments
    pub args: Value,
}

#[derive(Debug, Clone)]
enum Canned {
    Result(Value),
    Fault { fault: String, message: String },
}

/// In-memory [`VimSession`]
#[derive(Debug)]
pub struct MemoryVim {
    host: String,
    content: ServiceContent,
    objects: HashMap<String, Value>,
    methods: HashMap<String, Canned>,
    files: RefCell<BTreeMap<String, Vec<u8>>>,
    tasks: RefCell<Vec<Value>>,
    calls: RefCell<Vec<MethodCall>>,
    property_reads: Cell<usize>,
    logged_out: Cell<bool>,
}

impl MemoryVim {
    /// Root folder ref of every in-memory inventory
    pub const ROOT_FOLDER: &'static str = "group-d1";

    /// Creates an empty inventory with the given instance uuid
    #[must_use]
    pub fn new(instance_uuid: &str) -> Self {
        let content = ServiceContent {
            about: AboutInfo {
                instance_uuid: instance_uuid.to_string(),
                api_version: "8.0.1.0".to_string(),
                full_name: "In-memory vCenter".to_string(),
            },
            root_folder: ManagedObjectRef::new(kinds::FOLDER, Self::ROOT_FOLDER),
            session_manager: ManagedObjectRef::new("SessionManager", "SessionManager"),
            file_manager: ManagedObjectRef::new("FileManager", "FileManager"),
            virtual_disk_manager: ManagedObjectRef::new(
                "VirtualDiskManager",
                "virtualDiskManager",
            ),
        };
        let mut objects = HashMap::new();
        objects.insert(
            Self::ROOT_FOLDER.to_string(),
            json!({"name": "Datacenters", "childEntity": []}),
        );

        Self {
            host: "memory.vcenter.local".to_string(),
            content,
            objects,
            methods: HashMap::new(),
            files: RefCell::new(BTreeMap::new()),
            tasks: RefCell::new(Vec::new()),
            calls: RefCell::new(Vec::new()),
            property_reads: Cell::new(0),
            logged_out: Cell::new(false),
        }
    }

    /// Overrides the endpoint host name
    #[must_use]
    pub fn with_host(mut self, host: &str) -> Self {
        self.host = host.to_string();
        self
    }

    /// Adds (or replaces) an object with its property document
    ///
    /// The kind is only informative: refs are unique within one inventory.
    #[must_use]
    pub fn with_object(mut self, _kind: &str, value: &str, properties: Value) -> Self {
        self.insert_object(value, properties);
        self
    }

    /// Adds (or replaces) an object in place
    pub fn insert_object(&mut self, value: &str, properties: Value) {
        self.objects.insert(value.to_string(), properties);
    }

    /// Sets the result of a method, for every target
    #[must_use]
    pub fn with_method_result(mut self, method: &str, result: Value) -> Self {
        self.methods
            .insert(method.to_string(), Canned::Result(result));
        self
    }

    /// Sets the result of a method invoked on one specific object
    #[must_use]
    pub fn with_object_method_result(mut self, value: &str, method: &str, result: Value) -> Self {
        self.methods
            .insert(format!("{value}/{method}"), Canned::Result(result));
        self
    }

    /// Makes a method raise a fault
    ///
    /// For `*_Task` methods the fault is reported by the task, not by the
    /// invocation.
    #[must_use]
    pub fn with_method_fault(mut self, method: &str, fault: &str, message: &str) -> Self {
        self.methods.insert(
            method.to_string(),
            Canned::Fault {
                fault: fault.to_string(),
                message: message.to_string(),
            },
        );
        self
    }

    /// Stores a datastore file, addressed as `[datastore] path`
    #[must_use]
    pub fn with_file(self, datastore_path: &str, contents: &[u8]) -> Self {
        self.files
            .borrow_mut()
            .insert(datastore_path.to_string(), contents.to_vec());
        self
    }

    /// Returns the stored contents of a datastore file
    #[must_use]
    pub fn file(&self, datastore_path: &str) -> Option<Vec<u8>> {
        self.files.borrow().get(datastore_path).cloned()
    }

    /// Returns every recorded method invocation
    #[must_use]
    pub fn calls(&self) -> Vec<MethodCall> {
        self.calls.borrow().clone()
    }

    /// Returns the recorded invocations of one method
    #[must_use]
    pub fn calls_to(&self, method: &str) -> Vec<MethodCall> {
        self.calls
            .borrow()
            .iter()
            .filter(|c| c.method == method)
            .cloned()
            .collect()
    }

    /// Number of property reads served so far
    #[must_use]
    pub fn property_reads(&self) -> usize {
        self.property_reads.get()
    }

    /// Returns true once `logout` has been called
    #[must_use]
    pub fn is_logged_out(&self) -> bool {
        self.logged_out.get()
    }

    fn canned(&self, obj: &ManagedObjectRef, method: &str) -> Option<&Canned> {
        self.methods
            .get(&format!("{}/{method}", obj.value))
            .or_else(|| self.methods.get(method))
    }

    fn start_task(&self, outcome: Result<Value, (String, String)>) -> Value {
        let mut tasks = self.tasks.borrow_mut();
        let info = match outcome {
            Ok(result) => json!({"state": "success", "result": result}),
            Err((fault, message)) => json!({
                "state": "error",
                "error": {"fault": {"_typeName": fault}, "localizedMessage": message},
            }),
        };
        tasks.push(info);
        ManagedObjectRef::new(kinds::TASK, format!("task-{}", tasks.len())).to_json()
    }

    fn ensure_logged_in(&self) -> VimResult<()> {
        if self.logged_out.get() {
            Err(VimError::NotAuthenticated)
        } else {
            Ok(())
        }
    }
}

impl VimSession for MemoryVim {
    fn endpoint(&self) -> &str {
        &self.host
    }

    fn service_content(&self) -> &ServiceContent {
        &self.content
    }

    fn property(&self, obj: &ManagedObjectRef, name: &str) -> VimResult<Value> {
        self.ensure_logged_in()?;
        self.property_reads.set(self.property_reads.get() + 1);

        if obj.is(kinds::TASK) {
            let index = obj
                .value
                .strip_prefix("task-")
                .and_then(|n| n.parse::<usize>().ok())
                .and_then(|n| n.checked_sub(1));
            let tasks = self.tasks.borrow();
            let task = index.and_then(|i| tasks.get(i)).ok_or_else(|| VimError::Fault {
                fault: "ManagedObjectNotFound".to_string(),
                message: format!("no task {}", obj.value),
            })?;
            return Ok(if name == "info" { task.clone() } else { Value::Null });
        }

        let object = self.objects.get(&obj.value).ok_or_else(|| VimError::Fault {
            fault: "ManagedObjectNotFound".to_string(),
            message: format!("The object '{obj}' has already been deleted or has not been completely created"),
        })?;
        Ok(object.get(name).cloned().unwrap_or(Value::Null))
    }

    fn invoke(&self, obj: &ManagedObjectRef, method: &str, args: Value) -> VimResult<Value> {
        self.ensure_logged_in()?;
        self.calls.borrow_mut().push(MethodCall {
            target: obj.clone(),
            method: method.to_string(),
            args,
        });

        let canned = self.canned(obj, method).cloned();
        if method.ends_with("_Task") {
            let outcome = match canned {
                Some(Canned::Result(result)) => Ok(result),
                Some(Canned::Fault { fault, message }) => Err((fault, message)),
                None => Ok(Value::Null),
            };
            return Ok(self.start_task(outcome));
        }

        match canned {
            Some(Canned::Result(result)) => Ok(result),
            Some(Canned::Fault { fault, message }) => Err(VimError::Fault { fault, message }),
            None => Ok(Value::Null),
        }
    }

    fn upload(&self, target: &DatastoreFile, source: &Path) -> VimResult<()> {
        self.ensure_logged_in()?;
        let contents = std::fs::read(source)
            .map_err(|e| VimError::Http(format!("cannot read {}: {e}", source.display())))?;
        self.files
            .borrow_mut()
            .insert(target.datastore_path(), contents);
        Ok(())
    }

    fn download(&self, source: &DatastoreFile, target: &Path) -> VimResult<()> {
        self.ensure_logged_in()?;
        let contents = self
            .file(&source.datastore_path())
            .ok_or_else(|| file_not_found(source))?;
        std::fs::write(target, contents)
            .map_err(|e| VimError::Http(format!("cannot write {}: {e}", target.display())))
    }

    fn content_length(&self, file: &DatastoreFile) -> VimResult<u64> {
        self.ensure_logged_in()?;
        self.files
            .borrow()
            .get(&file.datastore_path())
            .map(|c| c.len() as u64)
            .ok_or_else(|| file_not_found(file))
    }

    fn logout(&self) -> VimResult<()> {
        self.ensure_logged_in()?;
        self.logged_out.set(true);
        Ok(())
    }
}

fn file_not_found(file: &DatastoreFile) -> VimError {
    VimError::Fault {
        fault: "FileNotFound".to_string(),
        message: format!("File {} was not found", file.datastore_path()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vim::{DEFAULT_TASK_POLL_INTERVAL, run_task};

    #[test]
    fn task_methods_complete_with_canned_result() {
        let vim = MemoryVim::new("uuid").with_method_result("SearchDatastoreSubFolders_Task", json!([1]));
        let browser = ManagedObjectRef::new("HostDatastoreBrowser", "browser-1");
        let result = run_task(
            &vim,
            &browser,
            "SearchDatastoreSubFolders_Task",
            json!({}),
            DEFAULT_TASK_POLL_INTERVAL,
        )
        .unwrap();
        assert_eq!(result, json!([1]));
        assert_eq!(vim.calls_to("SearchDatastoreSubFolders_Task").len(), 1);
    }

    #[test]
    fn object_specific_results_win() {
        let vim = MemoryVim::new("uuid")
            .with_method_result("Describe", json!("generic"))
            .with_object_method_result("vm-1", "Describe", json!("specific"));
        let vm1 = ManagedObjectRef::new(kinds::VIRTUAL_MACHINE, "vm-1");
        let vm2 = ManagedObjectRef::new(kinds::VIRTUAL_MACHINE, "vm-2");
        assert_eq!(vim.invoke(&vm1, "Describe", Value::Null).unwrap(), "specific");
        assert_eq!(vim.invoke(&vm2, "Describe", Value::Null).unwrap(), "generic");
    }

    #[test]
    fn logout_ends_the_session() {
        let vim = MemoryVim::new("uuid");
        vim.logout().unwrap();
        assert!(vim.is_logged_out());
        let root = vim.service_content().root_folder.clone();
        assert!(matches!(
            vim.property(&root, "childEntity"),
            Err(VimError::NotAuthenticated)
        ));
    }

    #[test]
    fn files_round_trip_through_local_disk() {
        let dir = tempfile::tempdir().unwrap();
        let vim = MemoryVim::new("uuid").with_file("[ds1] iso/boot.iso", b"bootdata");
        let file = DatastoreFile {
            datastore: "ds1".to_string(),
            datacenter_path: "DC1".to_string(),
            path: "iso/boot.iso".to_string(),
        };
        assert_eq!(vim.content_length(&file).unwrap(), 8);

        let local = dir.path().join("boot.iso");
        vim.download(&file, &local).unwrap();
        let copy = DatastoreFile {
            path: "iso/copy.iso".to_string(),
            ..file
        };
        vim.upload(&copy, &local).unwrap();
        assert_eq!(vim.file("[ds1] iso/copy.iso").unwrap(), b"bootdata");
    }
}
