//! Datastore monitoring output

use std::fmt::Write as _;

use super::{InventoryCache, datastore_folder, list_datacenters};
use crate::error::InventoryError;
use crate::tracing::span_names;
use crate::vim::VimSession;

/// Text emitted by a datastore monitoring pass
#[derive(Debug, Default)]
pub struct DatastoreMonitor {
    /// Cache report followed by one usage block per entity
    pub output: String,
    /// Entities or folders that could not be read
    pub errors: Vec<InventoryError>,
}

/// Populates `cache` from every datacenter and renders the monitoring text
///
/// The first section is [`InventoryCache::monitor_report`]; each entity then
/// gets a `DATASTORE=[...]` line with its usage figures.
pub fn monitor_datastores(session: &dyn VimSession, cache: &mut InventoryCache) -> DatastoreMonitor {
    let _span = crate::trace_operation!(span_names::DATASTORE_MONITOR).entered();
    let mut monitor = DatastoreMonitor::default();
    let datacenters = list_datacenters(session);
    monitor.errors.extend(datacenters.errors);

    for dc in &datacenters.items {
        match datastore_folder(session, dc) {
            Ok(folder) => monitor.errors.extend(cache.fetch_all(session, &folder).errors),
            Err(e) => monitor.errors.push(e),
        }
    }

    monitor.output = cache.monitor_report();
    for id in cache.ids() {
        let entity = cache.entity(id);
        match entity.usage(session) {
            Ok(usage) => {
                let _ = writeln!(
                    monitor.output,
                    "DATASTORE=[VCENTER_DS_REF=\"{}\",USED_MB=\"{}\",FREE_MB=\"{}\",TOTAL_MB=\"{}\"]",
                    entity.moref().value,
                    usage.used_mb,
                    usage.free_mb,
                    usage.total_mb
                );
            }
            Err(e) => monitor.errors.push(e),
        }
    }
    monitor
}
