//! `vcimport` - imports vCenter inventory into OpenNebula
//!
//! Provides import commands for clusters, VM templates, networks, datastores
//! and images, datastore monitoring and shell completions.

mod cli;
mod commands;
mod error;
mod operator;
mod util;

use clap::Parser;
use cli::Cli;
use commands::GlobalFlags;

fn main() {
    let cli = Cli::parse();
    let flags = GlobalFlags {
        config_path: cli.config.as_deref(),
        verbose: cli.verbose,
        quiet: cli.quiet,
    };

    let result = commands::dispatch(flags, cli.command);

    if let Err(e) = result {
        tracing::error!(error = %e, exit_code = e.exit_code(), "command failed");
        eprintln!("Error: {e}");
        std::process::exit(e.exit_code());
    }
}
