//! Command handler modules for the CLI.

mod completions;
mod import;
mod monitor;

use std::path::Path;

use vcimport_core::tracing::init_tracing;

use crate::cli::Commands;
use crate::error::CliError;
use crate::util::load_settings;

/// Global flags every command sees
#[derive(Debug, Clone, Copy)]
pub struct GlobalFlags<'a> {
    /// Custom configuration directory
    pub config_path: Option<&'a Path>,
    /// Number of `-v` flags
    pub verbose: u8,
    /// `-q` given
    pub quiet: bool,
}

/// Dispatch a CLI command to the appropriate handler.
pub fn dispatch(flags: GlobalFlags<'_>, command: Commands) -> Result<(), CliError> {
    if let Commands::Completions { shell } = command {
        return completions::cmd_completions(shell);
    }

    let settings = load_settings(flags.config_path)?;
    let tracing_config = settings.logging.tracing_config(flags.verbose, flags.quiet);
    if let Err(e) = init_tracing(&tracing_config) {
        eprintln!("Warning: logging disabled: {e}");
    }

    match command {
        Commands::Import(subcmd) => import::cmd_import(&settings, flags.quiet, subcmd),
        Commands::Monitor(subcmd) => monitor::cmd_monitor(&settings, subcmd),
        Commands::Completions { .. } => Ok(()),
    }
}
