//! Import pipeline
//!
//! One operation per family (clusters, templates, networks, datastores,
//! images). Each one walks the remote inventory grouped by datacenter,
//! drops what the target system already holds, asks the [`Operator`] and
//! commits the accepted candidates one by one:
//!
//! ```ignore
//! let manager = ConnectionManager::from_settings(&settings);
//! let mut operator = AlwaysYes::new();
//! let report = Pipeline::new(&manager, &client, &mut operator)
//!     .run(&ConnectTarget::ManagedHost(3), &ImportFamily::Datastores)?;
//! println!("{}", report.summary());
//! ```
//!
//! Per-item failures end up in the [`ImportReport`]; only failures that make
//! the whole operation meaningless are returned as `ImportError`.

mod clusters;
mod datastores;
mod devices;
mod images;
mod networks;
mod operator;
mod pipeline;
mod templates;
mod traits;

pub use clusters::cluster_record;
pub use datastores::{DATASTORE_GUIDANCE, datastore_failure_message};
pub use devices::{InventoryDeviceImporter, TemplateDeviceImporter};
pub use images::{CAPACITY_CHECK_HINT, image_failure_message};
pub use networks::{
    AddressRange, AddressRangeKind, DEFAULT_RANGE_SIZE, network_record, network_type_label,
};
pub use operator::{AlwaysYes, Answer, Operator, PromptError, ScriptedOperator};
pub use pipeline::{ConnectTarget, Pipeline, PipelineState, StateTracker, attrs};
pub use templates::{resource_pool_user_input, template_record};
pub use traits::{
    CancelHandle, CandidateDetails, CommittedEntry, ImportCandidate, ImportFamily, ImportReport,
    ImportedCluster, ItemFailure, SkippedEntry,
};
