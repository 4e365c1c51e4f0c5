//! Job manifest construction.
//!
//! A [`CalrissianJob`] turns a CWL document and its parameters into a
//! `batch/v1` Job running the Calrissian runner. The runner reads the
//! workflow and parameters from config maps mounted as files and writes its
//! outputs to the shared working-directory claim.
//!
//! Building the manifest is pure: [`CalrissianJob::to_k8s_job`] touches
//! nothing on the cluster. The config maps the manifest refers to are
//! created separately by [`CalrissianJob::create_config_maps`].

use std::collections::BTreeMap;
use std::path::Path;

use calrissian_config::JobSection;
use calrissian_kube::types::{
    ConfigMap, Container, EnvVar, ExecAction, Job, JobSpec, Lifecycle, LifecycleHandler, ObjectMeta,
    PodSecurityContext, PodSpec, PodTemplateSpec, ResourceRequirements, Toleration, Volume,
    VolumeMount,
};
use tracing::{debug, info};

use crate::context::CalrissianContext;
use crate::cwl::{CwlDocument, JobParams};
use crate::error::{JobError, Result};
use crate::naming::generate_job_name;
use crate::workspace::WorkspaceMounts;

/// Environment variable overriding the runner image.
pub const IMAGE_ENV: &str = "CALRISSIAN_IMAGE";

/// Base path of the working-directory claim inside the pod.
pub const CALRISSIAN_BASE_PATH: &str = "/calrissian";

/// Name of the pod template.
pub const POD_NAME: &str = "calrissian_pod";

/// File mode of the projected config map files (0o644).
const CONFIG_FILE_MODE: i32 = 0o644;

const WORKFLOW_MOUNT: &str = "/workflow-input";
const PARAMS_MOUNT: &str = "/workflow-params";
const ENV_VARS_MOUNT: &str = "/pod-env-vars";
const NODE_SELECTOR_MOUNT: &str = "/pod-node-selector";

const WORKFLOW_FILE: &str = "workflow.cwl";
const PARAMS_FILE: &str = "params.yml";
const ENV_VARS_FILE: &str = "pod_env_vars.json";
const NODE_SELECTOR_FILE: &str = "pod_nodeselectors.yml";

const VOLUME_WORKFLOW: &str = "volume-cwl-workflow";
const VOLUME_PARAMS: &str = "volume-params";
const VOLUME_WDIR: &str = "volume-calrissian-wdir";
const VOLUME_ENV_VARS: &str = "volume-pod-env-vars";
const VOLUME_NODE_SELECTOR: &str = "volume-pod-node-selector";

const KEY_WORKFLOW: &str = "cwl-workflow";
const KEY_PARAMS: &str = "params";
const KEY_ENV_VARS: &str = "pod-env-vars";
const KEY_NODE_SELECTOR: &str = "pod-node-selector";

/// Marker the runner wrapper leaves in the working directory when it exits.
/// Expanded by the shell, one per pod.
const RUNNER_EXIT_MARKER: &str = ".runner-exit-${CALRISSIAN_POD_NAME}";

/// Containers of the runner pod.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerName {
    Calrissian,
    SidecarOutput,
    SidecarUsage,
}

impl ContainerName {
    pub fn as_str(self) -> &'static str {
        match self {
            ContainerName::Calrissian => "calrissian",
            ContainerName::SidecarOutput => "sidecar-container-output",
            ContainerName::SidecarUsage => "sidecar-container-usage",
        }
    }
}

impl std::fmt::Display for ContainerName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Names of every config map a job may own.
pub fn config_map_names_for(job_id: &str) -> Vec<String> {
    [KEY_WORKFLOW, KEY_PARAMS, KEY_ENV_VARS, KEY_NODE_SELECTOR]
        .iter()
        .map(|key| config_map_name(key, job_id))
        .collect()
}

fn config_map_name(key: &str, job_id: &str) -> String {
    format!("{}-{}", key, job_id)
}

/// The security context used when none is given: root user, group and fs group.
pub fn default_security_context() -> PodSecurityContext {
    PodSecurityContext {
        run_as_user: Some(0),
        run_as_group: Some(0),
        fs_group: Some(0),
    }
}

/// Shell wrapper running `program` with the script's arguments, then
/// touching the exit marker under `base`. Keeps the program's exit code.
fn runner_script(program: &str, base: &str) -> String {
    format!(
        "{program} \"$@\"; rc=$?; touch \"{base}/{marker}\"; exit $rc",
        marker = RUNNER_EXIT_MARKER
    )
}

/// Sidecar script: wait until the runner's exit marker shows up under `base`
/// or `max_wait_secs` pass, then print `file` if this run wrote a usage
/// report. A report older than the sidecar belongs to an earlier run.
fn sidecar_script(base: &str, file: &str, max_wait_secs: u64) -> String {
    format!(
        "started=$(mktemp); waited=0; \
         until [ -e \"{base}/{marker}\" ] || [ \"$waited\" -ge {max_wait_secs} ]; \
         do sleep 2; waited=$((waited + 2)); done; \
         if [ \"{base}/report.json\" -nt \"$started\" ]; then cat \"{base}/{file}\"; \
         else echo \"no usage report from this run\" >&2; fi",
        marker = RUNNER_EXIT_MARKER
    )
}

/// A CWL workflow run, ready to be rendered as a Kubernetes job.
#[derive(Debug, Clone)]
pub struct CalrissianJob {
    cwl: CwlDocument,
    params: JobParams,
    context: CalrissianContext,
    calling_workspace: String,
    executing_workspace: String,
    job_id: String,
    job_name: String,
    cwl_entry_point: Option<String>,
    pod_env_vars: BTreeMap<String, String>,
    pod_node_selector: BTreeMap<String, String>,
    max_ram: String,
    max_cores: String,
    security_context: PodSecurityContext,
    debug: bool,
    no_read_only: bool,
    keep_pods: bool,
    backoff_limit: i32,
    tool_logs: bool,
    output_sidecars: bool,
    active_deadline_secs: Option<i64>,
    settings: JobSection,
}

/// Builder for [`CalrissianJob`].
#[derive(Debug)]
pub struct CalrissianJobBuilder {
    cwl: CwlDocument,
    params: JobParams,
    context: CalrissianContext,
    calling_workspace: String,
    executing_workspace: String,
    job_id: String,
    job_name: Option<String>,
    cwl_entry_point: Option<String>,
    pod_env_vars: BTreeMap<String, String>,
    pod_node_selector: BTreeMap<String, String>,
    max_ram: Option<String>,
    max_cores: Option<String>,
    security_context: Option<PodSecurityContext>,
    debug: bool,
    no_read_only: bool,
    keep_pods: bool,
    backoff_limit: Option<i32>,
    tool_logs: bool,
    output_sidecars: bool,
    active_deadline_secs: Option<i64>,
    settings: JobSection,
}

impl CalrissianJobBuilder {
    /// Defaults taken from the `[job]` config section.
    pub fn settings(mut self, settings: JobSection) -> Self {
        self.settings = settings;
        self
    }

    /// Use a fixed job name instead of a generated one.
    pub fn job_name(mut self, name: impl Into<String>) -> Self {
        self.job_name = Some(name.into());
        self
    }

    /// Process of a packed document to run (`workflow.cwl#<id>`).
    pub fn cwl_entry_point(mut self, entry_point: impl Into<String>) -> Self {
        self.cwl_entry_point = Some(entry_point.into());
        self
    }

    /// Environment variables for the step pods the runner launches.
    pub fn pod_env_vars(mut self, vars: BTreeMap<String, String>) -> Self {
        self.pod_env_vars = vars;
        self
    }

    /// Node selector for the runner pod and its step pods.
    pub fn pod_node_selector(mut self, selector: BTreeMap<String, String>) -> Self {
        self.pod_node_selector = selector;
        self
    }

    pub fn max_ram(mut self, max_ram: impl Into<String>) -> Self {
        self.max_ram = Some(max_ram.into());
        self
    }

    pub fn max_cores(mut self, max_cores: impl Into<String>) -> Self {
        self.max_cores = Some(max_cores.into());
        self
    }

    pub fn security_context(mut self, context: PodSecurityContext) -> Self {
        self.security_context = Some(context);
        self
    }

    pub fn debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn no_read_only(mut self, no_read_only: bool) -> Self {
        self.no_read_only = no_read_only;
        self
    }

    /// Keep the step pods after they finish.
    pub fn keep_pods(mut self, keep_pods: bool) -> Self {
        self.keep_pods = keep_pods;
        self
    }

    pub fn backoff_limit(mut self, backoff_limit: i32) -> Self {
        self.backoff_limit = Some(backoff_limit);
        self
    }

    /// Write per-tool logs under the working directory.
    pub fn tool_logs(mut self, tool_logs: bool) -> Self {
        self.tool_logs = tool_logs;
        self
    }

    /// Add sidecars that print the output and usage report to their logs.
    pub fn output_sidecars(mut self, enabled: bool) -> Self {
        self.output_sidecars = enabled;
        self
    }

    /// Seconds the job may run before the control plane fails it.
    pub fn active_deadline_secs(mut self, secs: i64) -> Self {
        self.active_deadline_secs = Some(secs);
        self
    }

    /// Validate and build the job.
    pub fn build(self) -> Result<CalrissianJob> {
        self.cwl
            .validate_entry_point(self.cwl_entry_point.as_deref())?;

        let security_context = match self.security_context {
            Some(context) => context,
            None => {
                info!("using default security context {{'runAsUser': 0, 'runAsGroup': 0, 'fsGroup': 0}}");
                default_security_context()
            }
        };

        let job_name = self.job_name.unwrap_or_else(generate_job_name);
        info!(job = %job_name, job_id = %self.job_id, "Built job");

        Ok(CalrissianJob {
            max_ram: self.max_ram.unwrap_or_else(|| self.settings.max_ram.clone()),
            max_cores: self
                .max_cores
                .unwrap_or_else(|| self.settings.max_cores.clone()),
            backoff_limit: self.backoff_limit.unwrap_or(self.settings.backoff_limit),
            active_deadline_secs: self
                .active_deadline_secs
                .or(self.settings.active_deadline_secs),
            cwl: self.cwl,
            params: self.params,
            context: self.context,
            calling_workspace: self.calling_workspace,
            executing_workspace: self.executing_workspace,
            job_id: self.job_id,
            job_name,
            cwl_entry_point: self.cwl_entry_point,
            pod_env_vars: self.pod_env_vars,
            pod_node_selector: self.pod_node_selector,
            security_context,
            debug: self.debug,
            no_read_only: self.no_read_only,
            keep_pods: self.keep_pods,
            tool_logs: self.tool_logs,
            output_sidecars: self.output_sidecars,
            settings: self.settings,
        })
    }
}

impl CalrissianJob {
    /// Start building a job.
    pub fn builder(
        cwl: CwlDocument,
        params: JobParams,
        context: CalrissianContext,
        calling_workspace: impl Into<String>,
        executing_workspace: impl Into<String>,
        job_id: impl Into<String>,
    ) -> CalrissianJobBuilder {
        CalrissianJobBuilder {
            cwl,
            params,
            context,
            calling_workspace: calling_workspace.into(),
            executing_workspace: executing_workspace.into(),
            job_id: job_id.into(),
            job_name: None,
            cwl_entry_point: None,
            pod_env_vars: BTreeMap::new(),
            pod_node_selector: BTreeMap::new(),
            max_ram: None,
            max_cores: None,
            security_context: None,
            debug: false,
            no_read_only: false,
            keep_pods: false,
            backoff_limit: None,
            tool_logs: false,
            output_sidecars: false,
            active_deadline_secs: None,
            settings: JobSection::default(),
        }
    }

    pub fn job_name(&self) -> &str {
        &self.job_name
    }

    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    pub fn context(&self) -> &CalrissianContext {
        &self.context
    }

    pub fn calling_workspace(&self) -> &str {
        &self.calling_workspace
    }

    pub fn executing_workspace(&self) -> &str {
        &self.executing_workspace
    }

    pub fn has_output_sidecars(&self) -> bool {
        self.output_sidecars
    }

    /// Names of the config maps this job uses.
    pub fn config_map_names(&self) -> Vec<String> {
        let mut names = vec![
            config_map_name(KEY_WORKFLOW, &self.job_id),
            config_map_name(KEY_PARAMS, &self.job_id),
        ];
        if !self.pod_env_vars.is_empty() {
            names.push(config_map_name(KEY_ENV_VARS, &self.job_id));
        }
        if !self.pod_node_selector.is_empty() {
            names.push(config_map_name(KEY_NODE_SELECTOR, &self.job_id));
        }
        names
    }

    /// The config maps the manifest mounts, in [`config_map_names`](Self::config_map_names) order.
    pub fn config_maps(&self) -> Result<Vec<ConfigMap>> {
        let namespace = self.context.namespace();
        let config_map = |key: &str, content: String| {
            ConfigMap::single(config_map_name(key, &self.job_id), namespace, key, content)
        };

        let mut config_maps = vec![
            config_map(KEY_WORKFLOW, self.cwl.to_yaml()?),
            config_map(KEY_PARAMS, self.params.to_yaml()?),
        ];
        if !self.pod_env_vars.is_empty() {
            config_maps.push(config_map(
                KEY_ENV_VARS,
                serde_json::to_string(&self.pod_env_vars)?,
            ));
        }
        if !self.pod_node_selector.is_empty() {
            config_maps.push(config_map(
                KEY_NODE_SELECTOR,
                serde_json::to_string(&self.pod_node_selector)?,
            ));
        }
        Ok(config_maps)
    }

    /// Create the config maps the manifest mounts. Existing ones are replaced.
    pub async fn create_config_maps(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        for config_map in self.config_maps()? {
            let name = config_map.metadata.name_or_default().to_string();
            info!(config_map = %name, "create config map");
            self.context.apply_configmap(&config_map).await?;
            names.push(name);
        }
        Ok(names)
    }

    /// The runner image: `CALRISSIAN_IMAGE` if set, else the configured one.
    pub fn image(&self) -> String {
        std::env::var(IMAGE_ENV)
            .ok()
            .filter(|image| !image.is_empty())
            .unwrap_or_else(|| self.settings.image.clone())
    }

    /// Command-line arguments of the runner.
    pub fn calrissian_args(&self) -> Vec<String> {
        let base = CALRISSIAN_BASE_PATH;
        let mut args: Vec<String> = vec![
            "--stdout".into(),
            format!("{}/output.json", base),
            "--stderr".into(),
            format!("{}/stderr.log", base),
            "--usage-report".into(),
            format!("{}/report.json", base),
            "--max-ram".into(),
            self.max_ram.clone(),
            "--max-cores".into(),
            self.max_cores.clone(),
            "--pod-serviceaccount".into(),
            self.context.service_account().to_string(),
            "--tmp-outdir-prefix".into(),
            format!("{}/", base),
            "--outdir".into(),
            format!("{}/", base),
        ];

        if !self.pod_node_selector.is_empty() {
            args.push("--pod-nodeselectors".into());
            args.push(format!("{}/{}", NODE_SELECTOR_MOUNT, NODE_SELECTOR_FILE));
        }

        if !self.pod_env_vars.is_empty() {
            args.push("--pod-env-vars".into());
            args.push(format!("{}/{}", ENV_VARS_MOUNT, ENV_VARS_FILE));
        }

        if self.debug {
            args.push("--debug".into());
        }

        if self.no_read_only {
            args.push("--no-read-only".into());
        }

        if self.tool_logs {
            args.push("--tool-logs-basepath".into());
            args.push(base.into());
        }

        args.extend([
            "--executing-workspace".into(),
            self.executing_workspace.clone(),
            "--calling-workspace".into(),
            self.calling_workspace.clone(),
            "--calling-service-account".into(),
            self.context.calling_service_account().to_string(),
            "--enable-ext".into(),
        ]);

        let workflow = format!("{}/{}", WORKFLOW_MOUNT, WORKFLOW_FILE);
        match &self.cwl_entry_point {
            Some(entry_point) => args.push(format!("{}#{}", workflow, entry_point)),
            None => args.push(workflow),
        }
        args.push(format!("{}/{}", PARAMS_MOUNT, PARAMS_FILE));

        args
    }

    fn base_volumes(&self) -> (Vec<Volume>, Vec<VolumeMount>) {
        let mut volumes = vec![
            Volume::from_config_map(
                VOLUME_WORKFLOW,
                config_map_name(KEY_WORKFLOW, &self.job_id),
                KEY_WORKFLOW,
                WORKFLOW_FILE,
                CONFIG_FILE_MODE,
            ),
            Volume::from_config_map(
                VOLUME_PARAMS,
                config_map_name(KEY_PARAMS, &self.job_id),
                KEY_PARAMS,
                PARAMS_FILE,
                CONFIG_FILE_MODE,
            ),
            Volume::from_claim(VOLUME_WDIR, self.context.calrissian_wdir(), Some(false)),
        ];
        let mut mounts = vec![
            VolumeMount::new(VOLUME_WORKFLOW, WORKFLOW_MOUNT),
            VolumeMount::new(VOLUME_PARAMS, PARAMS_MOUNT),
            VolumeMount::new(VOLUME_WDIR, CALRISSIAN_BASE_PATH).read_write(),
        ];

        if !self.pod_env_vars.is_empty() {
            volumes.push(Volume::from_config_map(
                VOLUME_ENV_VARS,
                config_map_name(KEY_ENV_VARS, &self.job_id),
                KEY_ENV_VARS,
                ENV_VARS_FILE,
                CONFIG_FILE_MODE,
            ));
            mounts.push(VolumeMount::new(VOLUME_ENV_VARS, ENV_VARS_MOUNT));
        }

        if !self.pod_node_selector.is_empty() {
            volumes.push(Volume::from_config_map(
                VOLUME_NODE_SELECTOR,
                config_map_name(KEY_NODE_SELECTOR, &self.job_id),
                KEY_NODE_SELECTOR,
                NODE_SELECTOR_FILE,
                CONFIG_FILE_MODE,
            ));
            mounts.push(VolumeMount::new(VOLUME_NODE_SELECTOR, NODE_SELECTOR_MOUNT));
        }

        (volumes, mounts)
    }

    fn calrissian_container(&self, volume_mounts: Vec<VolumeMount>) -> Container {
        let mut env = vec![EnvVar::from_field("CALRISSIAN_POD_NAME", "metadata.name")];
        if self.keep_pods {
            env.push(EnvVar::literal("CALRISSIAN_DELETE_PODS", "false"));
            info!("pods created by calrissian will not be deleted");
        }

        let image = self.image();
        info!(image = %image, "using Calrissian image");

        let resources = &self.settings.resources;
        Container {
            name: ContainerName::Calrissian.to_string(),
            image: Some(image),
            image_pull_policy: Some(self.settings.image_pull_policy.clone()),
            command: self.calrissian_command(),
            args: self.calrissian_args(),
            env,
            volume_mounts,
            lifecycle: Some(Lifecycle {
                pre_stop: Some(LifecycleHandler {
                    exec: Some(ExecAction {
                        command: vec![
                            "/bin/sh".to_string(),
                            "-c".to_string(),
                            format!("sleep {}", self.settings.pre_stop_sleep_secs),
                        ],
                    }),
                }),
            }),
            resources: Some(ResourceRequirements {
                requests: Some(BTreeMap::from([
                    ("cpu".to_string(), resources.requests_cpu.clone()),
                    ("memory".to_string(), resources.requests_memory.clone()),
                ])),
                limits: Some(BTreeMap::from([
                    ("cpu".to_string(), resources.limits_cpu.clone()),
                    ("memory".to_string(), resources.limits_memory.clone()),
                ])),
            }),
        }
    }

    /// The runner command. With sidecars the runner is wrapped so that it
    /// leaves an exit marker behind however it ends.
    fn calrissian_command(&self) -> Vec<String> {
        if !self.output_sidecars {
            return vec!["calrissian".to_string()];
        }
        vec![
            "/bin/sh".to_string(),
            "-c".to_string(),
            runner_script("calrissian", CALRISSIAN_BASE_PATH),
            "calrissian".to_string(),
        ]
    }

    /// A sidecar printing `file` once the runner has exited.
    fn sidecar_container(&self, name: ContainerName, file: &str) -> Container {
        let script = sidecar_script(
            CALRISSIAN_BASE_PATH,
            file,
            self.settings.sidecar_max_wait_secs,
        );
        Container {
            name: name.to_string(),
            image: Some(self.settings.sidecar_image.clone()),
            image_pull_policy: Some("IfNotPresent".to_string()),
            command: vec!["/bin/sh".to_string(), "-c".to_string(), script],
            env: vec![EnvVar::from_field("CALRISSIAN_POD_NAME", "metadata.name")],
            volume_mounts: vec![VolumeMount::new(VOLUME_WDIR, CALRISSIAN_BASE_PATH)],
            ..Default::default()
        }
    }

    fn tolerations(&self) -> Vec<Toleration> {
        self.settings
            .tolerations
            .iter()
            .map(|t| Toleration {
                key: Some(t.key.clone()),
                operator: Some(t.operator.clone()),
                value: t.value.clone(),
                effect: t.effect.clone(),
            })
            .collect()
    }

    /// Build the `batch/v1` Job manifest.
    pub fn to_k8s_job(&self, workspace: &WorkspaceMounts) -> Job {
        let (mut volumes, mut mounts) = self.base_volumes();
        volumes.extend(workspace.volumes.iter().cloned());
        mounts.extend(workspace.mounts.iter().cloned());

        let mut containers = vec![self.calrissian_container(mounts)];
        if self.output_sidecars {
            containers.push(self.sidecar_container(ContainerName::SidecarOutput, "output.json"));
            containers.push(self.sidecar_container(ContainerName::SidecarUsage, "report.json"));
        }

        let node_selector =
            (!self.pod_node_selector.is_empty()).then(|| self.pod_node_selector.clone());

        let template = PodTemplateSpec {
            metadata: ObjectMeta::named(POD_NAME).with_label("pod_name", POD_NAME),
            spec: PodSpec {
                restart_policy: Some("Never".to_string()),
                containers,
                volumes,
                node_selector,
                security_context: Some(self.security_context.clone()),
                termination_grace_period_seconds: Some(
                    self.settings.termination_grace_period_secs,
                ),
                service_account_name: Some(self.context.service_account().to_string()),
                tolerations: self.tolerations(),
            },
        };
        debug!(
            service_account = self.context.service_account(),
            "Created pod template"
        );

        Job {
            api_version: Some("batch/v1".to_string()),
            kind: Some("Job".to_string()),
            metadata: ObjectMeta::named(&self.job_name)
                .with_label("job_name", &self.job_name)
                .in_namespace(self.context.namespace()),
            spec: Some(JobSpec {
                backoff_limit: Some(self.backoff_limit),
                active_deadline_seconds: self.active_deadline_secs,
                template,
            }),
            status: None,
        }
    }

    /// The manifest as a JSON value.
    pub fn to_json(&self, workspace: &WorkspaceMounts) -> Result<serde_json::Value> {
        Ok(serde_json::to_value(self.to_k8s_job(workspace))?)
    }

    /// The manifest as block-style YAML.
    pub fn to_yaml_string(&self, workspace: &WorkspaceMounts) -> Result<String> {
        Ok(serde_yaml::to_string(&self.to_k8s_job(workspace))?)
    }

    /// Write the manifest as YAML to `path`.
    pub fn to_yaml(&self, path: impl AsRef<Path>, workspace: &WorkspaceMounts) -> Result<()> {
        let path = path.as_ref();
        let yaml = self.to_yaml_string(workspace)?;
        std::fs::write(path, yaml).map_err(|e| JobError::io(path, e))?;
        info!(job = %self.job_name, path = %path.display(), "Job serialized");
        Ok(())
    }
}
