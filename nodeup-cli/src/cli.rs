use std::sync::Arc;

use clap::{Parser, Subcommand};
use nodeup::{HostCommandRunner, NodeUpdater};

use crate::commands;

#[derive(Parser, Debug)]
#[command(
    name = "nodeup",
    about = "Node OS update orchestrator for atomic (rpm-ostree) hosts",
    version
)]
pub struct Cli {
    /// Enable debug logging (RUST_LOG overrides this)
    #[arg(long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Show the raw human-readable deployment status
    Status,
    /// Show the booted deployment
    Booted(commands::booted::BootedArgs),
    /// Show or reconcile kernel arguments
    Kargs(commands::kargs::KargsArgs),
    /// Rebase the host onto the OS commit resolved from an image
    Rebase(commands::rebase::RebaseArgs),
    /// Remove any pending deployment
    Cleanup,
}

impl Cli {
    /// Identify the host and construct the matching updater. Done once;
    /// a failure here is fatal for the process.
    pub fn create_updater(&self) -> anyhow::Result<Box<dyn NodeUpdater>> {
        nodeup::new_node_updater(Arc::new(HostCommandRunner))
            .map_err(|e| anyhow::anyhow!("failed to identify host operating system: {}", e))
    }
}
