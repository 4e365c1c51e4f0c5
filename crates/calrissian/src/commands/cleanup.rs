//! Cleanup command - deletes a job and its config maps.

use anyhow::Result;
use calrissian_job::CalrissianExecution;
use clap::Args;
use console::style;
use serde_json::json;

use super::{Context, print_json};

/// Arguments for the cleanup command.
#[derive(Args, Debug)]
pub struct CleanupArgs {
    /// Job name
    pub job: String,

    /// Job id the config maps were named with (without it only the job is deleted)
    #[arg(long)]
    pub job_id: Option<String>,
}

/// Run the cleanup command.
pub async fn run(args: CleanupArgs, ctx: &Context) -> Result<()> {
    let mut execution = CalrissianExecution::attach(&args.job, ctx.runtime_context()?);
    if let Some(job_id) = &args.job_id {
        execution = execution.with_job_id(job_id);
    }
    execution.dispose().await?;

    if ctx.json_output {
        print_json(&json!({"job_name": args.job, "deleted": true}))?;
    } else {
        println!("{} deleted {}", style("✓").green(), style(&args.job).bold());
    }
    Ok(())
}
