use anyhow::Context;
use nodeup::NodeUpdater;

pub async fn execute(updater: &dyn NodeUpdater) -> anyhow::Result<()> {
    updater
        .remove_pending_deployment()
        .await
        .context("failed to remove pending deployment")?;
    println!("Pending deployment removed");
    Ok(())
}
