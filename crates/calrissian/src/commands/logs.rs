//! Logs command - prints the runner log.

use anyhow::Result;
use clap::Args;
use serde_json::json;

use super::{Context, print_json};

/// Arguments for the logs command.
#[derive(Args, Debug)]
pub struct LogsArgs {
    /// Job name
    pub job: String,
}

/// Run the logs command.
pub async fn run(args: LogsArgs, ctx: &Context) -> Result<()> {
    let log = ctx.attach(&args.job)?.log().await?;
    if ctx.json_output {
        print_json(&json!({"job_name": args.job, "log": log}))?;
    } else {
        print!("{}", log);
    }
    Ok(())
}
