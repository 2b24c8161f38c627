use std::path::PathBuf;

use anyhow::Context;
use clap::Args;
use nodeup::inhibit::PowerInhibitor;
use nodeup::NodeUpdater;

#[derive(Args, Debug)]
pub struct RebaseArgs {
    /// Desired OS container-image reference
    pub image: String,

    /// Extracted OS content directory (contains srv/repo)
    pub content_dir: PathBuf,

    /// Skip power-state inhibition while the rebase runs
    #[arg(long)]
    pub no_inhibit: bool,
}

pub async fn execute(args: RebaseArgs, updater: &dyn NodeUpdater) -> anyhow::Result<()> {
    // The inhibitor is an RAII guard, so error returns below still
    // release the inhibit.
    let inhibitor = if args.no_inhibit {
        None
    } else {
        Some(
            PowerInhibitor::acquire()
                .await
                .context("failed to inhibit power state changes")?,
        )
    };

    let result = updater
        .rebase(&args.image, &args.content_dir)
        .await
        .with_context(|| format!("failed to rebase onto {}", args.image));

    if let Some(inhibitor) = inhibitor {
        inhibitor.release().await;
    }

    let changed = result?;
    if changed {
        println!("Rebase staged; reboot to apply");
    }
    Ok(())
}
