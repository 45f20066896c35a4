//! CLI argument parsing types using `clap`.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;

/// `vcimport` imports vCenter inventory into OpenNebula
#[derive(Parser)]
#[command(name = "vcimport")]
#[command(author, version, about = "Import vCenter clusters, templates, networks, datastores and images into OpenNebula")]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to the configuration directory
    #[arg(short, long, global = true, env = "VCIMPORT_CONFIG_DIR")]
    pub config: Option<PathBuf>,

    /// Increase output verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Import one family of vCenter objects
    #[command(subcommand, about = "Import vCenter objects into OpenNebula")]
    Import(ImportCommands),

    /// Monitoring helpers
    #[command(subcommand, about = "Print monitoring data for an imported cluster")]
    Monitor(MonitorCommands),

    /// Generate shell completions
    #[command(about = "Generate shell completion scripts")]
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Import subcommands, one per object family
#[derive(Subcommand)]
pub enum ImportCommands {
    /// Import clusters as OpenNebula hosts
    #[command(about = "Import vCenter clusters as OpenNebula hosts")]
    Clusters {
        #[command(flatten)]
        target: TargetArgs,

        #[command(flatten)]
        mode: ModeArgs,
    },

    /// Import VM templates of imported clusters
    #[command(about = "Import VM templates of imported clusters")]
    Templates {
        #[command(flatten)]
        target: TargetArgs,

        #[command(flatten)]
        mode: ModeArgs,
    },

    /// Import networks of imported clusters
    #[command(about = "Import port groups and networks of imported clusters")]
    Networks {
        #[command(flatten)]
        target: TargetArgs,

        #[command(flatten)]
        mode: ModeArgs,
    },

    /// Import datastores and storage pods of imported clusters
    #[command(about = "Import datastores and storage pods of imported clusters")]
    Datastores {
        #[command(flatten)]
        target: TargetArgs,

        #[command(flatten)]
        mode: ModeArgs,
    },

    /// Import disk and ISO images of an imported datastore
    #[command(about = "Import images stored on an imported datastore")]
    Images {
        /// Name of the datastore in OpenNebula
        #[arg(short, long)]
        datastore: String,

        #[command(flatten)]
        target: TargetArgs,

        #[command(flatten)]
        mode: ModeArgs,
    },
}

/// Monitoring subcommands
#[derive(Subcommand)]
pub enum MonitorCommands {
    /// Datastore refs and usage figures
    #[command(about = "Print datastore refs and usage for a managed host")]
    Datastores {
        /// OpenNebula host id of the imported cluster
        #[arg(long)]
        host_id: i64,
    },
}

/// How the vCenter session is opened
#[derive(Args, Debug, Clone, Default)]
pub struct TargetArgs {
    /// vCenter hostname or IP address
    #[arg(long, value_name = "HOST", conflicts_with_all = ["host_id", "host_name"])]
    pub vcenter: Option<String>,

    /// vCenter user
    #[arg(long, value_name = "USER", requires = "vcenter")]
    pub vuser: Option<String>,

    /// vCenter password (prompted when omitted)
    #[arg(long, value_name = "PASSWORD", requires = "vcenter")]
    pub vpass: Option<String>,

    /// Confine the session to a resource pool
    #[arg(long, value_name = "REF", requires = "vcenter")]
    pub resource_pool: Option<String>,

    /// Verify the vCenter TLS certificate
    #[arg(long)]
    pub strict_tls: bool,

    /// Use the stored credentials of this OpenNebula host id
    #[arg(long, conflicts_with = "host_name")]
    pub host_id: Option<i64>,

    /// Use the stored credentials of this OpenNebula host name
    #[arg(long)]
    pub host_name: Option<String>,
}

/// Interactive or unattended run
#[derive(Args, Debug, Clone, Copy, Default)]
pub struct ModeArgs {
    /// Accept every candidate without asking
    #[arg(long)]
    pub defaults: bool,
}
