//! Status command - shows the state of a job.

use anyhow::Result;
use calrissian_job::JobStatus;
use chrono::{DateTime, Utc};
use clap::Args;
use console::{Style, style};
use serde::Serialize;

use super::{Context, print_json};

/// Arguments for the status command.
#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Job name
    pub job: String,
}

/// Status response for JSON output.
#[derive(Debug, Serialize)]
struct StatusOutput {
    job_name: String,
    status: JobStatus,
    start_time: Option<DateTime<Utc>>,
    completion_time: Option<DateTime<Utc>>,
}

/// Print a one-line, coloured status.
pub fn print_status_line(job: &str, status: JobStatus) {
    let styled = match status {
        JobStatus::Active => style(format!("● {}", status)).yellow(),
        JobStatus::Succeeded => style(format!("● {}", status)).green(),
        JobStatus::Failed => style(format!("● {}", status)).red(),
        JobStatus::Unknown => style(format!("● {}", status)).dim(),
    };
    println!("{} {}", style(job).bold(), styled);
}

/// Run the status command.
pub async fn run(args: StatusArgs, ctx: &Context) -> Result<()> {
    let execution = ctx.attach(&args.job)?;
    let output = StatusOutput {
        job_name: args.job.clone(),
        status: execution.status().await?,
        start_time: execution.start_time().await?,
        completion_time: execution.completion_time().await?,
    };

    if ctx.json_output {
        return print_json(&output);
    }

    let dim = Style::new().dim();
    println!();
    print_status_line(&output.job_name, output.status);
    println!("{}", dim.apply_to("─".repeat(40)));
    println!(
        "  {} {}",
        dim.apply_to("Started:  "),
        format_time(output.start_time)
    );
    println!(
        "  {} {}",
        dim.apply_to("Completed:"),
        format_time(output.completion_time)
    );
    println!();
    Ok(())
}

fn format_time(time: Option<DateTime<Utc>>) -> String {
    time.map(|t| t.to_rfc3339())
        .unwrap_or_else(|| "-".to_string())
}
