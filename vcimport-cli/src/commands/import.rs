//! Import commands.

use vcimport_core::config::AppSettings;
use vcimport_core::connection::ConnectionManager;
use vcimport_core::import::{CancelHandle, ImportFamily, ImportReport, Operator, Pipeline};

use crate::cli::{ImportCommands, ModeArgs, TargetArgs};
use crate::error::CliError;
use crate::operator::{DialoguerOperator, PrintingDefaults};
use crate::util::{connect_target, install_interrupt_handler, target_client};

/// Import command handler
pub fn cmd_import(settings: &AppSettings, quiet: bool, subcmd: ImportCommands) -> Result<(), CliError> {
    let (family, target, mode) = match subcmd {
        ImportCommands::Clusters { target, mode } => (ImportFamily::Clusters, target, mode),
        ImportCommands::Templates { target, mode } => (ImportFamily::Templates, target, mode),
        ImportCommands::Networks { target, mode } => (ImportFamily::Networks, target, mode),
        ImportCommands::Datastores { target, mode } => (ImportFamily::Datastores, target, mode),
        ImportCommands::Images {
            datastore,
            target,
            mode,
        } => (ImportFamily::Images { datastore }, target, mode),
    };
    run_import(settings, quiet, &family, &target, mode)
}

fn run_import(
    settings: &AppSettings,
    quiet: bool,
    family: &ImportFamily,
    target: &TargetArgs,
    mode: ModeArgs,
) -> Result<(), CliError> {
    let client = target_client(settings)?;
    let manager = ConnectionManager::from_settings(settings);
    let target = connect_target(target, &manager)?;

    let cancel = CancelHandle::new();
    install_interrupt_handler(cancel.clone())?;

    let mut interactive;
    let mut unattended;
    let operator: &mut dyn Operator = if mode.defaults {
        unattended = PrintingDefaults::new(quiet);
        &mut unattended
    } else {
        interactive = DialoguerOperator::new(quiet);
        &mut interactive
    };

    if !quiet {
        println!("Importing {} into {}", family.label(), client.endpoint());
    }
    let report = Pipeline::new(&manager, &client, operator)
        .with_cancel(cancel)
        .run(&target, family)?;

    if !quiet {
        print_report(&report);
    }
    Ok(())
}

fn print_report(report: &ImportReport) {
    const GREEN: &str = "\x1b[32m";
    const RED: &str = "\x1b[31m";
    const RESET: &str = "\x1b[0m";

    for entry in &report.committed {
        println!("{GREEN}✓{RESET} {} (id {})", entry.name, entry.id);
    }
    for failure in &report.errors {
        println!("{RED}✗{RESET} {}: {}", failure.identifier, failure.message);
    }
    println!("\n{}", report.summary());
}
