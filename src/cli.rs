//! Command-line interface definitions.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "gatewarden",
    version,
    about = "DNS blocklist manager for cloud filtering gateways",
    long_about = "Aggregates domain blocklist feeds, reduces them to a minimal block-set \
                  and reconciles the result against the gateway's list and rule resources \
                  with minimal API churn."
)]
pub struct Cli {
    /// Path to the configuration file
    #[arg(short, long, global = true, default_value = "gatewarden.yaml")]
    pub config: PathBuf,

    /// Suppress all output except warnings and errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Enable debug output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Fetch feeds, reduce them and push the result to the gateway
    Sync {
        /// Push even if the block-set is unchanged since the last run
        #[arg(long)]
        force: bool,

        /// Log every intended gateway mutation without performing any
        #[arg(long)]
        dry_run: bool,
    },

    /// Delete all managed rules and lists from the gateway
    Nuke {
        /// Log what would be deleted without deleting anything
        #[arg(long)]
        dry_run: bool,

        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },

    /// Show local run state and remote resource usage
    Status,

    /// Write a default configuration file
    Init {
        /// Overwrite an existing configuration file
        #[arg(long)]
        force: bool,
    },
}
