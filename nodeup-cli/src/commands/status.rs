use anyhow::Context;
use nodeup::NodeUpdater;

pub async fn execute(updater: &dyn NodeUpdater) -> anyhow::Result<()> {
    let status = updater
        .get_status()
        .await
        .context("failed to query deployment status")?;
    print!("{}", status);
    Ok(())
}
