//! Submit command - runs a workflow on the cluster.

use anyhow::{Result, bail};
use calrissian_job::{CalrissianExecution, JobStatus};
use clap::Args;
use console::style;
use serde::Serialize;

use super::job_args::JobArgs;
use super::{Context, print_json};

/// Arguments for the submit command.
#[derive(Args, Debug)]
pub struct SubmitArgs {
    #[command(flatten)]
    pub job: JobArgs,

    /// Wait for the job to finish
    #[arg(short, long)]
    pub wait: bool,

    /// Seconds between status checks while waiting
    #[arg(long)]
    pub interval: Option<u64>,

    /// Give up waiting after this many seconds
    #[arg(long)]
    pub timeout: Option<u64>,
}

#[derive(Debug, Serialize)]
struct SubmitOutput {
    job_name: String,
    job_id: String,
    namespace: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    status: Option<JobStatus>,
}

/// Run the submit command.
pub async fn run(args: SubmitArgs, ctx: &Context) -> Result<()> {
    let context = ctx.runtime_context()?;
    let job = args.job.build(context.clone(), ctx.config.job())?;
    let job_id = job.job_id().to_string();

    let mut execution =
        CalrissianExecution::new(job, context.clone()).with_workspace_settings(ctx.config.workspace());
    execution.submit().await?;

    let mut output = SubmitOutput {
        job_name: execution.job_name().to_string(),
        job_id,
        namespace: context.namespace().to_string(),
        status: None,
    };

    if !ctx.json_output {
        println!(
            "{} submitted {} (job id {}) in {}",
            style("✓").green(),
            style(&output.job_name).bold(),
            output.job_id,
            output.namespace
        );
        if ctx.verbose
            && let Some(job) = execution.job()
        {
            println!("  config maps: {}", job.config_map_names().join(", "));
        }
    }

    if args.wait {
        let interval = ctx.monitor_interval(args.interval);
        let status = match ctx.monitor_timeout(args.timeout) {
            Some(timeout) => execution.monitor_with_timeout(interval, timeout).await?,
            None => execution.monitor(interval).await?,
        };
        output.status = Some(status);
        if !ctx.json_output {
            super::status::print_status_line(&output.job_name, status);
        }
    }

    if ctx.json_output {
        print_json(&output)?;
    }

    if output.status == Some(JobStatus::Failed) {
        bail!("job {} failed", output.job_name);
    }
    Ok(())
}
