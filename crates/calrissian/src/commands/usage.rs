//! Usage command - prints the usage report of a finished job.

use anyhow::Result;
use clap::Args;

use super::{Context, print_json};

/// Arguments for the usage command.
#[derive(Args, Debug)]
pub struct UsageArgs {
    /// Job name
    pub job: String,
}

/// Run the usage command.
pub async fn run(args: UsageArgs, ctx: &Context) -> Result<()> {
    let report = ctx.attach(&args.job)?.usage_report().await?;
    print_json(&report)
}
