mod cli;
mod commands;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use cli::{Cli, Command};

fn init_tracing(verbose: bool) {
    let default_directive = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let updater = cli.create_updater()?;
    match cli.command {
        Command::Status => commands::status::execute(updater.as_ref()).await,
        Command::Booted(args) => commands::booted::execute(args, updater.as_ref()).await,
        Command::Kargs(args) => commands::kargs::execute(args, updater.as_ref()).await,
        Command::Rebase(args) => commands::rebase::execute(args, updater.as_ref()).await,
        Command::Cleanup => commands::cleanup::execute(updater.as_ref()).await,
    }
}
