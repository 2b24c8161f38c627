use anyhow::Context;
use clap::Args;
use nodeup::NodeUpdater;

#[derive(Args, Debug)]
pub struct BootedArgs {
    /// Print the booted deployment as JSON
    #[arg(long)]
    pub json: bool,
}

pub async fn execute(args: BootedArgs, updater: &dyn NodeUpdater) -> anyhow::Result<()> {
    let deployment = updater
        .get_booted_deployment()
        .await
        .context("failed to read booted deployment")?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&deployment)?);
        return Ok(());
    }

    println!("Deployment: {}", deployment.id);
    println!("OS:         {}", deployment.osname);
    println!("Version:    {}", deployment.version);
    println!("Checksum:   {}", deployment.checksum);
    let image_url = deployment.image_url();
    if !image_url.is_empty() {
        println!("Image:      {}", image_url);
    }
    Ok(())
}
