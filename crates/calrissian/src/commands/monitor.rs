//! Monitor command - waits for a job to finish.

use anyhow::{Result, bail};
use calrissian_job::JobStatus;
use clap::Args;
use serde_json::json;

use super::{Context, print_json};

/// Arguments for the monitor command.
#[derive(Args, Debug)]
pub struct MonitorArgs {
    /// Job name
    pub job: String,

    /// Seconds between status checks
    #[arg(long)]
    pub interval: Option<u64>,

    /// Give up after this many seconds
    #[arg(long)]
    pub timeout: Option<u64>,
}

/// Run the monitor command.
pub async fn run(args: MonitorArgs, ctx: &Context) -> Result<()> {
    let execution = ctx.attach(&args.job)?;
    let interval = ctx.monitor_interval(args.interval);

    let status = match ctx.monitor_timeout(args.timeout) {
        Some(timeout) => execution.monitor_with_timeout(interval, timeout).await?,
        None => execution.monitor(interval).await?,
    };

    if ctx.json_output {
        print_json(&json!({"job_name": args.job, "status": status}))?;
    } else {
        super::status::print_status_line(&args.job, status);
    }

    if status == JobStatus::Failed {
        bail!("job {} failed", args.job);
    }
    Ok(())
}
