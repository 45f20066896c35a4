//! Pipeline driver
//!
//! [`Pipeline`] owns the run: it connects, hands the open connection to an
//! [`Importer`] for one family and closes the connection on every exit
//! path. The state tracker records each transition so that callers (and
//! tests) can see that `Closed` was reached.

use std::fmt;

use super::devices::{InventoryDeviceImporter, TemplateDeviceImporter};
use super::operator::Operator;
use super::traits::{
    CancelHandle, ImportCandidate, ImportFamily, ImportReport, ImportedCluster, ItemFailure,
    SkippedEntry,
};
use crate::connection::{ConnectOptions, Connection, ConnectionManager};
use crate::error::{AllocateError, ImportError, ImportResult, InventoryError};
use crate::inventory::{Datacenter, InventoryCache};
use crate::one::{OneRepository, PoolElement, PoolKind};
use crate::tracing::span_names;

/// Attribution keys shared by every record
pub mod attrs {
    /// Remote domain instance uuid
    pub const INSTANCE_ID: &str = "VCENTER_INSTANCE_ID";
    /// Remote cluster ref
    pub const CCR_REF: &str = "VCENTER_CCR_REF";
    /// Remote datastore or pod ref
    pub const DS_REF: &str = "VCENTER_DS_REF";
    /// Remote template ref
    pub const TEMPLATE_REF: &str = "VCENTER_TEMPLATE_REF";
    /// Remote network ref
    pub const NET_REF: &str = "VCENTER_NET_REF";
}

static DEFAULT_DEVICES: InventoryDeviceImporter = InventoryDeviceImporter;

/// Stage of a pipeline run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PipelineState {
    /// Opening the session
    Connecting,
    /// Walking the inventory and reading target pools
    Discovering,
    /// Asking about a datacenter
    Confirming,
    /// Asking about one candidate
    ConfirmingCandidate,
    /// Submitting one record
    Committing,
    /// Logging out
    Closing,
    /// Session closed; always the last state
    Closed,
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Connecting => "connecting",
            Self::Discovering => "discovering",
            Self::Confirming => "confirming",
            Self::ConfirmingCandidate => "confirming-candidate",
            Self::Committing => "committing",
            Self::Closing => "closing",
            Self::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// Transition log of one run
#[derive(Debug, Default)]
pub struct StateTracker {
    history: Vec<PipelineState>,
}

impl StateTracker {
    /// Records a transition
    pub fn enter(&mut self, state: PipelineState) {
        match self.current() {
            Some(from) => tracing::debug!(%from, to = %state, "pipeline state"),
            None => tracing::debug!(to = %state, "pipeline state"),
        }
        self.history.push(state);
    }

    /// Current state
    #[must_use]
    pub fn current(&self) -> Option<PipelineState> {
        self.history.last().copied()
    }

    /// Every state entered, in order
    #[must_use]
    pub fn history(&self) -> &[PipelineState] {
        &self.history
    }
}

/// How the remote session is opened
#[derive(Debug, Clone)]
pub enum ConnectTarget {
    /// Explicit endpoint and credentials
    Direct(ConnectOptions),
    /// Stored credentials of a managed host, by id
    ManagedHost(i64),
    /// Stored credentials of a managed host, by name
    HostName(String),
}

/// One import run against one remote endpoint
pub struct Pipeline<'a> {
    manager: &'a ConnectionManager,
    repo: &'a dyn OneRepository,
    operator: &'a mut dyn Operator,
    devices: &'a dyn TemplateDeviceImporter,
    cancel: CancelHandle,
    tracker: StateTracker,
}

impl<'a> Pipeline<'a> {
    /// Creates a pipeline with the default device importer
    pub fn new(
        manager: &'a ConnectionManager,
        repo: &'a dyn OneRepository,
        operator: &'a mut dyn Operator,
    ) -> Self {
        Self {
            manager,
            repo,
            operator,
            devices: &DEFAULT_DEVICES,
            cancel: CancelHandle::new(),
            tracker: StateTracker::default(),
        }
    }

    /// Replaces the template device importer
    #[must_use]
    pub fn with_devices(mut self, devices: &'a dyn TemplateDeviceImporter) -> Self {
        self.devices = devices;
        self
    }

    /// Uses a cancellation flag shared with a signal handler
    #[must_use]
    pub fn with_cancel(mut self, cancel: CancelHandle) -> Self {
        self.cancel = cancel;
        self
    }

    /// States entered by the last run
    #[must_use]
    pub fn states(&self) -> &[PipelineState] {
        self.tracker.history()
    }

    /// Connects to `target` and imports one family
    ///
    /// # Errors
    ///
    /// Returns `ImportError` if the connection cannot be opened, a target
    /// pool cannot be read, a whole-operation failure occurs or the run is
    /// cancelled. Per-item failures are part of the report instead.
    pub fn run(&mut self, target: &ConnectTarget, family: &ImportFamily) -> ImportResult<ImportReport> {
        self.tracker = StateTracker::default();
        self.tracker.enter(PipelineState::Connecting);

        let connected = match target {
            ConnectTarget::Direct(options) => self.manager.connect(options).map_err(ImportError::from),
            ConnectTarget::ManagedHost(id) => self.manager.connect_from_managed_host(self.repo, *id),
            ConnectTarget::HostName(name) => self.manager.connect_from_host_name(self.repo, name),
        };
        match connected {
            Ok(connection) => self.run_on(connection, family),
            Err(e) => {
                tracing::error!(error = %e, "connection failed");
                self.tracker.enter(PipelineState::Closed);
                Err(e)
            }
        }
    }

    /// Imports one family over an already open connection and closes it
    ///
    /// # Errors
    ///
    /// As [`run`](Self::run), minus connection failures.
    pub fn run_on(&mut self, connection: Connection, family: &ImportFamily) -> ImportResult<ImportReport> {
        if self.tracker.current() != Some(PipelineState::Connecting) {
            self.tracker = StateTracker::default();
            self.tracker.enter(PipelineState::Connecting);
        }

        let manager = self.manager;
        let repo = self.repo;
        let devices = self.devices;
        let cancel = self.cancel.clone();
        let operator = &mut *self.operator;
        let tracker = &mut self.tracker;

        let result = manager.scoped(connection, |conn| {
            let mut importer = Importer {
                conn,
                manager,
                repo,
                operator,
                devices,
                cancel,
                tracker,
                cache: InventoryCache::new(),
            };
            let result = importer.import(family);
            importer.tracker.enter(PipelineState::Closing);
            result
        });
        self.tracker.enter(PipelineState::Closed);

        match &result {
            Ok(report) => tracing::info!(family = %family, summary = %report.summary(), "import finished"),
            Err(ImportError::Interrupted) => tracing::warn!(family = %family, "import cancelled"),
            Err(e) => tracing::error!(family = %family, error = %e, "import failed"),
        }
        result
    }
}

/// Per-run import context handed to the family operations
pub(super) struct Importer<'a> {
    pub(super) conn: &'a Connection,
    pub(super) manager: &'a ConnectionManager,
    pub(super) repo: &'a dyn OneRepository,
    pub(super) operator: &'a mut dyn Operator,
    pub(super) devices: &'a dyn TemplateDeviceImporter,
    pub(super) cancel: CancelHandle,
    pub(super) tracker: &'a mut StateTracker,
    pub(super) cache: InventoryCache,
}

impl Importer<'_> {
    fn import(&mut self, family: &ImportFamily) -> ImportResult<ImportReport> {
        let _span = crate::trace_operation!(span_names::IMPORT_RUN, family = %family, host = %self.conn.host()).entered();
        self.tracker.enter(PipelineState::Discovering);
        match family {
            ImportFamily::Clusters => self.import_clusters(),
            ImportFamily::Templates => self.import_templates(),
            ImportFamily::Networks => self.import_networks(),
            ImportFamily::Datastores => self.import_datastores(),
            ImportFamily::Images { datastore } => self.import_images(datastore),
        }
    }

    pub(super) fn check_cancelled(&self) -> ImportResult<()> {
        if self.cancel.is_cancelled() {
            Err(ImportError::Interrupted)
        } else {
            Ok(())
        }
    }

    pub(super) fn say(&mut self, message: &str) {
        self.operator.notify(message);
    }

    pub(super) fn pool(&self, kind: PoolKind) -> ImportResult<Vec<PoolElement>> {
        Ok(self.repo.pool(kind)?)
    }

    /// Hosts of this remote domain that carry a cluster ref
    pub(super) fn imported_clusters(&self) -> ImportResult<Vec<ImportedCluster>> {
        let instance_id = self.conn.instance_uuid();
        Ok(self
            .pool(PoolKind::Host)?
            .into_iter()
            .filter(|host| host.attr(attrs::INSTANCE_ID) == Some(instance_id))
            .filter_map(|host| {
                Some(ImportedCluster {
                    ccr_ref: host.attr(attrs::CCR_REF)?.to_string(),
                    host_id: host.id,
                    name: host.name.clone(),
                })
            })
            .collect())
    }

    /// Reports discovery failures; the listing goes on without the failed entries
    pub(super) fn report_discovery_errors(
        &mut self,
        context: &str,
        errors: Vec<InventoryError>,
        report: &mut ImportReport,
    ) {
        for error in errors {
            tracing::warn!(context, error = %error, "discovery error");
            self.say(&format!("    Error while exploring {context}: {error}"));
            report.add_failure(ItemFailure::new(context, error.to_string()));
        }
    }

    /// Datacenter-level confirmation; unattended runs accept without asking
    pub(super) fn confirm_datacenter(
        &mut self,
        datacenter: &Datacenter,
        report: &mut ImportReport,
    ) -> ImportResult<bool> {
        self.check_cancelled()?;
        self.tracker.enter(PipelineState::Confirming);
        if !self.operator.is_interactive() {
            return Ok(true);
        }
        let accepted = self
            .operator
            .confirm(&format!("Do you want to process datacenter {}?", datacenter.name), false)?;
        if !accepted {
            report.add_skipped(SkippedEntry::new(&datacenter.name, "datacenter declined by operator"));
        }
        Ok(accepted)
    }

    /// Candidate-level confirmation showing `summary` first
    pub(super) fn confirm_candidate(
        &mut self,
        candidate: &ImportCandidate,
        summary: &str,
        question: &str,
        report: &mut ImportReport,
    ) -> ImportResult<bool> {
        self.check_cancelled()?;
        self.tracker.enter(PipelineState::ConfirmingCandidate);
        if !self.operator.is_interactive() {
            return Ok(true);
        }
        self.operator.notify(summary);
        let accepted = self.operator.confirm(question, false)?;
        if !accepted {
            report.add_skipped(SkippedEntry::new(&candidate.display_name, "declined by operator"));
        }
        Ok(accepted)
    }

    /// Submits one candidate
    pub(super) fn allocate(
        &mut self,
        kind: PoolKind,
        candidate: &ImportCandidate,
        placement: Option<i64>,
    ) -> Result<i64, AllocateError> {
        self.tracker.enter(PipelineState::Committing);
        let result = self.repo.allocate(kind, &candidate.record, placement);
        match &result {
            Ok(id) => tracing::info!(%kind, name = %candidate.display_name, id, "record committed"),
            Err(e) => tracing::warn!(%kind, name = %candidate.display_name, error = %e, "record rejected"),
        }
        result
    }
}

/// Returns true if `pool` holds an element carrying every `(key, value)` pair
pub(super) fn already_imported(pool: &[PoolElement], key: &[(&str, &str)]) -> bool {
    pool.iter().any(|element| element.matches(key))
}
