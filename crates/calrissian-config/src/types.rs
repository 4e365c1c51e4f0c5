//! Configuration types mapping to the TOML schema.
//!
//! Top-level config:
//! ```toml
//! [cluster]      # how to reach the API server
//! [context]      # execution namespace resources
//! [job]          # calrissian container and pod defaults
//! [workspace]    # workspace volume discovery
//! [monitor]      # status polling
//! ```

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Default Calrissian runner image.
pub const DEFAULT_IMAGE: &str = "terradue/calrissian:0.12.0";

/// Default name of the working-directory claim.
pub const DEFAULT_WDIR_CLAIM: &str = "calrissian-wdir";

// ─────────────────────────────────────────────────────────────────────────────
// Top-level Config
// ─────────────────────────────────────────────────────────────────────────────

/// Root configuration structure.
///
/// All sections are optional so that partial configs (e.g., project-local
/// overrides) can be loaded and merged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CalrissianConfig {
    /// API server connection.
    pub cluster: Option<ClusterSection>,

    /// Execution namespace resources.
    pub context: Option<ContextSection>,

    /// Job construction defaults.
    pub job: Option<JobSection>,

    /// Workspace volume discovery.
    pub workspace: Option<WorkspaceSection>,

    /// Status polling.
    pub monitor: Option<MonitorSection>,
}

impl CalrissianConfig {
    /// Create an empty config.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse from a TOML string.
    pub fn from_toml(toml_str: &str) -> crate::Result<Self> {
        Ok(toml::from_str(toml_str)?)
    }

    /// Serialize to a TOML string.
    pub fn to_toml(&self) -> crate::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Merge another config on top of this one (other takes priority).
    pub fn merge(&mut self, other: CalrissianConfig) {
        if other.cluster.is_some() {
            self.cluster = other.cluster;
        }

        if other.context.is_some() {
            self.context = other.context;
        }

        if other.job.is_some() {
            self.job = other.job;
        }

        if other.workspace.is_some() {
            self.workspace = other.workspace;
        }

        if other.monitor.is_some() {
            self.monitor = other.monitor;
        }
    }

    /// Effective cluster section.
    pub fn cluster(&self) -> ClusterSection {
        self.cluster.clone().unwrap_or_default()
    }

    /// Effective context section.
    pub fn context(&self) -> ContextSection {
        self.context.clone().unwrap_or_default()
    }

    /// Effective job section.
    pub fn job(&self) -> JobSection {
        self.job.clone().unwrap_or_default()
    }

    /// Effective workspace section.
    pub fn workspace(&self) -> WorkspaceSection {
        self.workspace.clone().unwrap_or_default()
    }

    /// Effective monitor section.
    pub fn monitor(&self) -> MonitorSection {
        self.monitor.clone().unwrap_or_default()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Cluster
// ─────────────────────────────────────────────────────────────────────────────

/// How to reach the API server.
///
/// ```toml
/// [cluster]
/// kubeconfig = "~/.kube/config"
/// context = "eoepca"
/// namespace = "calrissian"
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterSection {
    /// Explicit kubeconfig path (otherwise `KUBECONFIG` or `~/.kube/config`).
    pub kubeconfig: Option<PathBuf>,

    /// Kubeconfig context to use instead of `current-context`.
    pub context: Option<String>,

    /// Namespace override; otherwise the context's namespace, then `default`.
    pub namespace: Option<String>,

    /// Use the pod's service account instead of a kubeconfig.
    pub in_cluster: bool,

    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for ClusterSection {
    fn default() -> Self {
        Self {
            kubeconfig: None,
            context: None,
            namespace: None,
            in_cluster: false,
            timeout_secs: 30,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Context
// ─────────────────────────────────────────────────────────────────────────────

/// Resources shared by every job in the execution namespace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContextSection {
    /// RWX claim mounted at `/calrissian`.
    pub wdir_claim: String,

    /// Storage class for the claim when it has to be created.
    pub storage_class: Option<String>,

    /// Size of the claim when it has to be created.
    pub volume_size: String,

    /// Service account the runner and its step pods use.
    pub service_account: String,

    /// Service account of the caller, passed through to the runner.
    pub calling_service_account: String,
}

impl Default for ContextSection {
    fn default() -> Self {
        Self {
            wdir_claim: DEFAULT_WDIR_CLAIM.to_string(),
            storage_class: None,
            volume_size: "10Gi".to_string(),
            service_account: "default".to_string(),
            calling_service_account: "default".to_string(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Job
// ─────────────────────────────────────────────────────────────────────────────

/// Defaults for the calrissian container and its pod.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JobSection {
    /// Runner image (the `CALRISSIAN_IMAGE` environment variable wins).
    pub image: String,

    /// Image pull policy.
    pub image_pull_policy: String,

    /// `--max-ram` passed to the runner.
    pub max_ram: String,

    /// `--max-cores` passed to the runner.
    pub max_cores: String,

    /// Job retries before it is marked failed.
    pub backoff_limit: i32,

    /// Grace period before the pod is killed.
    pub termination_grace_period_secs: i64,

    /// Sleep in the container's preStop hook.
    pub pre_stop_sleep_secs: u64,

    /// Image used by the output sidecars.
    pub sidecar_image: String,

    /// Longest a sidecar waits for the runner to exit.
    pub sidecar_max_wait_secs: u64,

    /// `activeDeadlineSeconds` of the job (unbounded when unset).
    pub active_deadline_secs: Option<i64>,

    /// Container resources.
    pub resources: ResourcesSection,

    /// Pod tolerations.
    pub tolerations: Vec<TolerationConfig>,
}

impl Default for JobSection {
    fn default() -> Self {
        Self {
            image: DEFAULT_IMAGE.to_string(),
            image_pull_policy: "Always".to_string(),
            max_ram: "8G".to_string(),
            max_cores: "16".to_string(),
            backoff_limit: 2,
            termination_grace_period_secs: 120,
            pre_stop_sleep_secs: 30,
            sidecar_image: "busybox:1.36".to_string(),
            sidecar_max_wait_secs: 86_400,
            active_deadline_secs: None,
            resources: ResourcesSection::default(),
            tolerations: vec![TolerationConfig::default()],
        }
    }
}

/// Requests and limits of the calrissian container.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResourcesSection {
    pub requests_cpu: String,
    pub requests_memory: String,
    pub limits_cpu: String,
    pub limits_memory: String,
}

impl Default for ResourcesSection {
    fn default() -> Self {
        Self {
            requests_cpu: "1000m".to_string(),
            requests_memory: "1G".to_string(),
            limits_cpu: "2000m".to_string(),
            limits_memory: "2G".to_string(),
        }
    }
}

/// A pod toleration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TolerationConfig {
    pub key: String,
    #[serde(default = "default_operator")]
    pub operator: String,
    #[serde(default)]
    pub value: Option<String>,
    #[serde(default)]
    pub effect: Option<String>,
}

fn default_operator() -> String {
    "Equal".to_string()
}

impl Default for TolerationConfig {
    /// Dedicated job nodes.
    fn default() -> Self {
        Self {
            key: "ades.zoo.org/dedicated".to_string(),
            operator: default_operator(),
            value: Some("job".to_string()),
            effect: Some("NoSchedule".to_string()),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Workspace
// ─────────────────────────────────────────────────────────────────────────────

/// Where workspace volumes are discovered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkspaceSection {
    /// Config map in the execution namespace listing workspace claims.
    pub config_map: String,

    /// Key of the claim list inside that config map.
    pub pvcs_key: String,

    /// Workspace custom resource group.
    pub crd_group: String,

    /// Workspace custom resource version.
    pub crd_version: String,

    /// Workspace custom resource plural.
    pub crd_plural: String,

    /// Namespace holding workspace custom resources.
    pub crd_namespace: String,
}

impl Default for WorkspaceSection {
    fn default() -> Self {
        Self {
            config_map: "workspace-config".to_string(),
            pvcs_key: "pvcs".to_string(),
            crd_group: "core.telespazio-uk.io".to_string(),
            crd_version: "v1alpha1".to_string(),
            crd_plural: "workspaces".to_string(),
            crd_namespace: "workspaces".to_string(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Monitor
// ─────────────────────────────────────────────────────────────────────────────

/// Status polling settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorSection {
    /// Seconds between status reads.
    pub interval_secs: u64,

    /// Give up after this many seconds (unbounded when unset).
    pub timeout_secs: Option<u64>,
}

impl Default for MonitorSection {
    fn default() -> Self {
        Self {
            interval_secs: 5,
            timeout_secs: None,
        }
    }
}
