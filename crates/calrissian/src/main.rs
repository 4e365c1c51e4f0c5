//! Calrissian - run CWL workflows as Kubernetes jobs
//!
//! Main entry point for the Calrissian CLI.

use std::path::PathBuf;

use anyhow::{Context as _, Result};
use clap::{Parser, Subcommand};

mod commands;

use commands::{cleanup, init, logs, monitor, output, render, status, submit, usage};

// ─────────────────────────────────────────────────────────────────────────────
// CLI Structure
// ─────────────────────────────────────────────────────────────────────────────

/// Calrissian - run CWL workflows as Kubernetes jobs
#[derive(Parser)]
#[command(name = "calrissian")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output as JSON (for scripting)
    #[arg(long, global = true)]
    pub json: bool,

    /// Config file (skips config discovery)
    #[arg(long, global = true, env = "CALRISSIAN_CONFIG")]
    pub config: Option<PathBuf>,

    /// Namespace jobs run in
    #[arg(short, long, global = true, env = "CALRISSIAN_NAMESPACE")]
    pub namespace: Option<String>,

    /// Kubeconfig context to use
    #[arg(long = "context", global = true)]
    pub kube_context: Option<String>,

    /// Kubeconfig file
    #[arg(long, global = true)]
    pub kubeconfig: Option<PathBuf>,

    /// Use the pod's service account
    #[arg(long, global = true)]
    pub in_cluster: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Prepare the namespace (working-directory claim)
    Init(init::InitArgs),

    /// Render the job manifest without touching the cluster
    Render(render::RenderArgs),

    /// Submit a workflow run
    Submit(submit::SubmitArgs),

    /// Show the status of a job
    Status(status::StatusArgs),

    /// Wait for a job to finish
    Monitor(monitor::MonitorArgs),

    /// Print the runner log of a job
    Logs(logs::LogsArgs),

    /// Print the output of a succeeded job
    Output(output::OutputArgs),

    /// Print the usage report of a finished job
    Usage(usage::UsageArgs),

    /// Delete a job and its config maps
    Cleanup(cleanup::CleanupArgs),
}

// ─────────────────────────────────────────────────────────────────────────────
// Main
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing: console (human-readable, stderr) + rotating JSON file
    let filter = if cli.verbose {
        "calrissian=debug,calrissian_job=debug,calrissian_kube=debug,calrissian_config=debug,info"
    } else {
        "calrissian=info,calrissian_job=info,calrissian_kube=warn,calrissian_config=warn,warn"
    };

    let log_dir = calrissian_config::config_dir()
        .map(|d| d.join("logs"))
        .unwrap_or_else(|| PathBuf::from("logs"));
    let file_appender = tracing_appender::rolling::daily(&log_dir, "calrissian.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    use tracing_subscriber::prelude::*;
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_writer(std::io::stderr)
                .with_filter(tracing_subscriber::EnvFilter::new(filter)),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(non_blocking)
                .with_filter(tracing_subscriber::EnvFilter::new(
                    "calrissian=trace,calrissian_job=trace,calrissian_kube=trace,calrissian_config=trace,info",
                )),
        )
        .init();

    // Load configuration
    let loaded = match &cli.config {
        Some(path) => calrissian_config::load_config_from(path, |name| std::env::var(name).ok())
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => calrissian_config::load_config(None)?,
    };
    for warning in &loaded.warnings {
        tracing::warn!("{}", warning);
    }
    tracing::debug!(sources = ?loaded.loaded_from(), "Loaded configuration");
    if let Some(origin) = loaded.origin(calrissian_config::Section::Cluster) {
        tracing::debug!(layer = %origin, "Cluster settings");
    }
    let config = loaded.config;

    // Command-line flags win over the [cluster] section
    let mut cluster = config.cluster();
    if let Some(namespace) = cli.namespace {
        cluster.namespace = Some(namespace);
    }
    if let Some(context) = cli.kube_context {
        cluster.context = Some(context);
    }
    if let Some(kubeconfig) = cli.kubeconfig {
        cluster.kubeconfig = Some(kubeconfig);
    }
    if cli.in_cluster {
        cluster.in_cluster = true;
    }

    // Create context for commands
    let ctx = commands::Context {
        json_output: cli.json,
        verbose: cli.verbose,
        config,
        cluster,
    };

    // Dispatch to command handlers
    match cli.command {
        Commands::Init(args) => init::run(args, &ctx).await,
        Commands::Render(args) => render::run(args, &ctx),
        Commands::Submit(args) => submit::run(args, &ctx).await,
        Commands::Status(args) => status::run(args, &ctx).await,
        Commands::Monitor(args) => monitor::run(args, &ctx).await,
        Commands::Logs(args) => logs::run(args, &ctx).await,
        Commands::Output(args) => output::run(args, &ctx).await,
        Commands::Usage(args) => usage::run(args, &ctx).await,
        Commands::Cleanup(args) => cleanup::run(args, &ctx).await,
    }
}
