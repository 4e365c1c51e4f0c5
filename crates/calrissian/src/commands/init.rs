//! Init command - prepares the execution namespace.
//!
//! With `--write-config` the settings the namespace was prepared with are
//! saved as the project config, so later commands pick them up.

use std::path::PathBuf;

use anyhow::{Context as _, Result};
use calrissian_config::{CalrissianConfig, ClusterSection};
use clap::Args;
use console::style;
use serde::Serialize;

use super::{Context, print_json};

/// Arguments for the init command.
#[derive(Args, Debug)]
pub struct InitArgs {
    /// Save the cluster and context settings to ./calrissian.toml
    #[arg(long)]
    pub write_config: bool,

    /// Replace an existing project config
    #[arg(long, requires = "write_config")]
    pub force: bool,
}

#[derive(Debug, Serialize)]
struct InitOutput {
    namespace: String,
    wdir_claim: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    config_written: Option<PathBuf>,
}

/// Run the init command.
pub async fn run(args: InitArgs, ctx: &Context) -> Result<()> {
    let context = ctx.runtime_context()?;
    context.initialise().await?;

    let config_written = if args.write_config {
        let path = calrissian_config::project_config_path(None);
        let config = project_config(ctx, context.namespace());
        calrissian_config::save_config(&config, &path, args.force)
            .with_context(|| format!("writing {}", path.display()))?;
        Some(path)
    } else {
        None
    };

    let output = InitOutput {
        namespace: context.namespace().to_string(),
        wdir_claim: context.calrissian_wdir().to_string(),
        config_written,
    };
    if ctx.json_output {
        print_json(&output)?;
    } else {
        println!(
            "{} namespace {} ready (working directory claim {})",
            style("✓").green(),
            style(&output.namespace).bold(),
            output.wdir_claim
        );
        if let Some(path) = &output.config_written {
            println!("  settings saved to {}", path.display());
        }
    }
    Ok(())
}

/// The `[cluster]` and `[context]` sections in effect, pinned to `namespace`.
fn project_config(ctx: &Context, namespace: &str) -> CalrissianConfig {
    CalrissianConfig {
        cluster: Some(ClusterSection {
            namespace: Some(namespace.to_string()),
            ..ctx.cluster.clone()
        }),
        context: Some(ctx.config.context()),
        ..Default::default()
    }
}
