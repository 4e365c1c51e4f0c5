//! Arguments shared by `render` and `submit`.

use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::{Context as _, Result};
use calrissian_job::{CalrissianContext, CalrissianJob, CwlDocument, JobParams};
use clap::Args;

/// Describes a workflow run.
#[derive(Args, Debug, Clone)]
pub struct JobArgs {
    /// CWL document (YAML or JSON)
    #[arg(long)]
    pub cwl: PathBuf,

    /// Job parameters (YAML or JSON)
    #[arg(long)]
    pub params: PathBuf,

    /// Workspace the run is made on behalf of
    #[arg(long, default_value = "default")]
    pub calling_workspace: String,

    /// Workspace the run executes in (defaults to the calling workspace)
    #[arg(long)]
    pub executing_workspace: Option<String>,

    /// Id used to name the job's config maps (generated when omitted)
    #[arg(long)]
    pub job_id: Option<String>,

    /// Process of a packed document to run
    #[arg(long)]
    pub entry_point: Option<String>,

    /// Environment variable for step pods (KEY=VALUE, repeatable)
    #[arg(long = "env", value_parser = parse_key_val)]
    pub env: Vec<(String, String)>,

    /// Node selector for the runner and step pods (KEY=VALUE, repeatable)
    #[arg(long = "node-selector", value_parser = parse_key_val)]
    pub node_selector: Vec<(String, String)>,

    /// RAM available to the runner (e.g. 8G)
    #[arg(long)]
    pub max_ram: Option<String>,

    /// Cores available to the runner
    #[arg(long)]
    pub max_cores: Option<String>,

    /// Retries before the job is marked failed
    #[arg(long)]
    pub backoff_limit: Option<i32>,

    /// Run the runner with --debug
    #[arg(long)]
    pub debug: bool,

    /// Mount inputs read-write in step pods
    #[arg(long)]
    pub no_read_only: bool,

    /// Keep step pods after they finish
    #[arg(long)]
    pub keep_pods: bool,

    /// Write per-tool logs to the working directory
    #[arg(long)]
    pub tool_logs: bool,

    /// Add sidecars that expose the output and usage report
    #[arg(long)]
    pub sidecars: bool,

    /// Seconds the job may run before it is failed
    #[arg(long)]
    pub active_deadline: Option<i64>,
}

impl JobArgs {
    /// The job id, generated when not given.
    pub fn job_id(&self) -> String {
        self.job_id
            .clone()
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string())
    }

    /// Read the documents and build the job.
    pub fn build(
        &self,
        context: CalrissianContext,
        settings: calrissian_config::JobSection,
    ) -> Result<CalrissianJob> {
        let cwl = CwlDocument::from_path(&self.cwl)
            .with_context(|| format!("reading workflow {}", self.cwl.display()))?;
        let params = JobParams::from_path(&self.params)
            .with_context(|| format!("reading parameters {}", self.params.display()))?;

        let executing = self
            .executing_workspace
            .clone()
            .unwrap_or_else(|| self.calling_workspace.clone());

        let mut builder = CalrissianJob::builder(
            cwl,
            params,
            context,
            &self.calling_workspace,
            executing,
            self.job_id(),
        )
        .settings(settings)
        .pod_env_vars(self.env.iter().cloned().collect::<BTreeMap<_, _>>())
        .pod_node_selector(self.node_selector.iter().cloned().collect::<BTreeMap<_, _>>())
        .debug(self.debug)
        .no_read_only(self.no_read_only)
        .keep_pods(self.keep_pods)
        .tool_logs(self.tool_logs)
        .output_sidecars(self.sidecars);

        if let Some(entry_point) = &self.entry_point {
            builder = builder.cwl_entry_point(entry_point);
        }
        if let Some(max_ram) = &self.max_ram {
            builder = builder.max_ram(max_ram);
        }
        if let Some(max_cores) = &self.max_cores {
            builder = builder.max_cores(max_cores);
        }
        if let Some(backoff_limit) = self.backoff_limit {
            builder = builder.backoff_limit(backoff_limit);
        }
        if let Some(deadline) = self.active_deadline {
            builder = builder.active_deadline_secs(deadline);
        }

        Ok(builder.build()?)
    }
}

/// Parse a `KEY=VALUE` pair.
pub fn parse_key_val(s: &str) -> std::result::Result<(String, String), String> {
    match s.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("expected KEY=VALUE, got '{}'", s)),
    }
}
