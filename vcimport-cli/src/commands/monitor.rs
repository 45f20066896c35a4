//! Monitoring commands.

use vcimport_core::config::AppSettings;
use vcimport_core::connection::ConnectionManager;
use vcimport_core::inventory::{InventoryCache, monitor_datastores};

use crate::cli::MonitorCommands;
use crate::error::CliError;
use crate::util::target_client;

/// Monitor command handler
pub fn cmd_monitor(settings: &AppSettings, subcmd: MonitorCommands) -> Result<(), CliError> {
    match subcmd {
        MonitorCommands::Datastores { host_id } => cmd_monitor_datastores(settings, host_id),
    }
}

fn cmd_monitor_datastores(settings: &AppSettings, host_id: i64) -> Result<(), CliError> {
    let client = target_client(settings)?;
    let manager = ConnectionManager::from_settings(settings);
    let connection = manager.connect_from_managed_host(&client, host_id)?;

    let monitor = manager.scoped(connection, |conn| {
        let mut cache = InventoryCache::new();
        Ok::<_, CliError>(monitor_datastores(conn.session(), &mut cache))
    })?;

    print!("{}", monitor.output);
    for error in &monitor.errors {
        tracing::warn!(host_id, error = %error, "datastore monitoring error");
        eprintln!("Warning: {error}");
    }
    Ok(())
}
