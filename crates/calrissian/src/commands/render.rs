//! Render command - builds the manifests offline.
//!
//! Prints the job's config maps followed by the job, so the bundle can be
//! applied as is with `kubectl apply -f`.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context as _, Result};
use calrissian_job::{CalrissianContext, WorkspaceMounts};
use calrissian_kube::OfflineCluster;
use clap::Args;

use super::Context;
use super::job_args::JobArgs;

/// Arguments for the render command.
#[derive(Args, Debug)]
pub struct RenderArgs {
    #[command(flatten)]
    pub job: JobArgs,

    /// Write to this file instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Render the job only, without its config maps
    #[arg(long)]
    pub job_only: bool,
}

/// Run the render command.
pub fn run(args: RenderArgs, ctx: &Context) -> Result<()> {
    let namespace = ctx.offline_namespace();
    let context = CalrissianContext::from_settings(
        Arc::new(OfflineCluster),
        &namespace,
        &ctx.config.context(),
    );
    let job = args.job.build(context, ctx.config.job())?;

    let mut documents = Vec::new();
    if !args.job_only {
        for config_map in job.config_maps()? {
            documents.push(serde_yaml::to_string(&config_map)?);
        }
    }
    documents.push(job.to_yaml_string(&WorkspaceMounts::none())?);

    let bundle = documents.join("---\n");
    match &args.output {
        Some(path) => {
            std::fs::write(path, &bundle)
                .with_context(|| format!("writing {}", path.display()))?;
            if !ctx.json_output {
                eprintln!("Wrote {} to {}", job.job_name(), path.display());
            }
        }
        None => print!("{}", bundle),
    }
    Ok(())
}
