use anyhow::Context;
use clap::Args;
use nodeup::{KernelArgument, NodeUpdater};

#[derive(Args, Debug)]
pub struct KargsArgs {
    /// Kernel argument(s) to append (may be a quoted composite)
    #[arg(long = "append", value_name = "KARG")]
    pub append: Vec<String>,

    /// Kernel argument(s) to delete; absent arguments are a no-op
    #[arg(long = "delete", value_name = "KARG")]
    pub delete: Vec<String>,
}

pub async fn execute(args: KargsArgs, updater: &dyn NodeUpdater) -> anyhow::Result<()> {
    if args.append.is_empty() && args.delete.is_empty() {
        let current = updater
            .get_kernel_args()
            .await
            .context("failed to query kernel arguments")?;
        for arg in current {
            println!("{}", arg);
        }
        return Ok(());
    }

    let mut requests: Vec<KernelArgument> = Vec::new();
    requests.extend(args.append.iter().map(|a| KernelArgument::append(a.as_str())));
    requests.extend(args.delete.iter().map(|a| KernelArgument::delete(a.as_str())));

    let output = updater
        .set_kernel_args(&requests)
        .await
        .context("failed to reconcile kernel arguments")?;
    if output.is_empty() {
        println!("Kernel arguments already reconciled");
    } else {
        print!("{}", output);
    }
    Ok(())
}
