//! Output command - prints the output of a succeeded job.

use anyhow::Result;
use clap::Args;

use super::{Context, print_json};

/// Arguments for the output command.
#[derive(Args, Debug)]
pub struct OutputArgs {
    /// Job name
    pub job: String,
}

/// Run the output command.
pub async fn run(args: OutputArgs, ctx: &Context) -> Result<()> {
    let output = ctx.attach(&args.job)?.output().await?;
    print_json(&output)
}
