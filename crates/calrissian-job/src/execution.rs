//! Execution lifecycle: submit a job and observe it until it finishes.

use std::fmt;
use std::time::Duration;

use calrissian_config::WorkspaceSection;
use calrissian_kube::types::{Job, JobStatus as K8sJobStatus};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::context::CalrissianContext;
use crate::error::{JobError, Result};
use crate::job::{CalrissianJob, ContainerName};
use crate::workspace::WorkspaceMounts;

/// Default seconds between status reads while monitoring.
pub const DEFAULT_MONITOR_INTERVAL: Duration = Duration::from_secs(5);

/// Coarse state of a submitted job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    /// Pending or running.
    Active,
    Succeeded,
    Failed,
    /// Counts the control plane reported do not match any state above.
    Unknown,
}

impl JobStatus {
    /// Classify the status block of a job.
    pub fn from_k8s(status: Option<&K8sJobStatus>) -> Self {
        let Some(status) = status else {
            return JobStatus::Active;
        };
        if status.active.is_none() && status.start_time.is_none() {
            return JobStatus::Active;
        }
        if status.active.unwrap_or(0) > 0 {
            JobStatus::Active
        } else if status.succeeded.unwrap_or(0) > 0 {
            JobStatus::Succeeded
        } else if status.failed.unwrap_or(0) > 0 {
            JobStatus::Failed
        } else {
            JobStatus::Unknown
        }
    }

    pub fn is_complete(self) -> bool {
        matches!(self, JobStatus::Succeeded | JobStatus::Failed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Active => "active",
            JobStatus::Succeeded => "succeeded",
            JobStatus::Failed => "failed",
            JobStatus::Unknown => "unknown",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A job run on the cluster.
///
/// Created from a [`CalrissianJob`] and submitted, or attached to a job that
/// was submitted earlier.
#[derive(Debug)]
pub struct CalrissianExecution {
    context: CalrissianContext,
    job: Option<CalrissianJob>,
    job_name: String,
    job_id: Option<String>,
    workspace: WorkspaceSection,
    submitted: bool,
}

impl CalrissianExecution {
    /// Prepare an execution for a job that has not been submitted yet.
    pub fn new(job: CalrissianJob, context: CalrissianContext) -> Self {
        Self {
            context,
            job_name: job.job_name().to_string(),
            job_id: Some(job.job_id().to_string()),
            job: Some(job),
            workspace: WorkspaceSection::default(),
            submitted: false,
        }
    }

    /// Observe a job that is already on the cluster.
    pub fn attach(job_name: impl Into<String>, context: CalrissianContext) -> Self {
        Self {
            context,
            job: None,
            job_name: job_name.into(),
            job_id: None,
            workspace: WorkspaceSection::default(),
            submitted: true,
        }
    }

    /// Job id used to name the config maps, needed to dispose of them.
    pub fn with_job_id(mut self, job_id: impl Into<String>) -> Self {
        self.job_id = Some(job_id.into());
        self
    }

    /// Workspace discovery settings used on submit.
    pub fn with_workspace_settings(mut self, settings: WorkspaceSection) -> Self {
        self.workspace = settings;
        self
    }

    pub fn job_name(&self) -> &str {
        &self.job_name
    }

    pub fn job(&self) -> Option<&CalrissianJob> {
        self.job.as_ref()
    }

    pub fn is_submitted(&self) -> bool {
        self.submitted
    }

    /// Create the config maps and the job on the cluster.
    ///
    /// When the job cannot be created the config maps are removed again.
    pub async fn submit(&mut self) -> Result<Job> {
        let job = match (&self.job, self.submitted) {
            (Some(job), false) => job,
            _ => return Err(JobError::AlreadySubmitted(self.job_name.clone())),
        };

        info!(job = %self.job_name, "submit job");
        let created = match self.create_resources(job).await {
            Ok(created) => created,
            Err(e) => {
                warn!(job = %self.job_name, error = %e, "Submit failed, removing config maps");
                for name in job.config_map_names() {
                    if let Err(cleanup) = self.context.delete_configmap(&name).await {
                        warn!(config_map = %name, error = %cleanup, "Failed to remove config map");
                    }
                }
                return Err(e);
            }
        };
        self.submitted = true;
        info!(job = %self.job_name, namespace = self.context.namespace(), "job submitted");
        Ok(created)
    }

    async fn create_resources(&self, job: &CalrissianJob) -> Result<Job> {
        job.create_config_maps().await?;

        let mounts = WorkspaceMounts::discover(
            &self.context,
            job.calling_workspace(),
            job.executing_workspace(),
            &self.workspace,
        )
        .await?;
        let manifest = job.to_k8s_job(&mounts);

        Ok(self
            .context
            .cluster()
            .create_job(self.context.namespace(), &manifest)
            .await?)
    }

    async fn read_job(&self) -> Result<Job> {
        if !self.submitted {
            return Err(JobError::NotSubmitted);
        }
        Ok(self
            .context
            .cluster()
            .read_job_status(self.context.namespace(), &self.job_name)
            .await?)
    }

    /// Current status of the job.
    pub async fn status(&self) -> Result<JobStatus> {
        let job = self.read_job().await?;
        let status = JobStatus::from_k8s(job.status.as_ref());
        debug!(job = %self.job_name, status = %status, "Read job status");
        Ok(status)
    }

    /// Whether the job finished, successfully or not.
    pub async fn is_complete(&self) -> Result<bool> {
        Ok(self.status().await?.is_complete())
    }

    pub async fn is_succeeded(&self) -> Result<bool> {
        Ok(self.status().await? == JobStatus::Succeeded)
    }

    pub async fn is_active(&self) -> Result<bool> {
        Ok(self.status().await? == JobStatus::Active)
    }

    pub async fn start_time(&self) -> Result<Option<DateTime<Utc>>> {
        let job = self.read_job().await?;
        Ok(job.status.and_then(|s| s.start_time))
    }

    /// When the job completed, else when its first condition last changed.
    pub async fn completion_time(&self) -> Result<Option<DateTime<Utc>>> {
        let job = self.read_job().await?;
        let Some(status) = job.status else {
            return Ok(None);
        };
        if status.completion_time.is_some() {
            return Ok(status.completion_time);
        }
        Ok(status
            .conditions
            .and_then(|conditions| conditions.into_iter().next())
            .and_then(|condition| condition.last_transition_time))
    }

    /// Log of the runner container.
    pub async fn log(&self) -> Result<String> {
        self.container_log(ContainerName::Calrissian).await
    }

    /// The workflow output, printed by the output sidecar. Needs a succeeded job.
    pub async fn output(&self) -> Result<serde_json::Value> {
        self.ensure_sidecars()?;
        let status = self.status().await?;
        if status != JobStatus::Succeeded {
            return Err(JobError::NotComplete {
                job: self.job_name.clone(),
                status: status.to_string(),
            });
        }
        self.sidecar_json(ContainerName::SidecarOutput).await
    }

    /// The usage report, printed by the usage sidecar. Needs a complete job.
    pub async fn usage_report(&self) -> Result<serde_json::Value> {
        self.ensure_sidecars()?;
        let status = self.status().await?;
        if !status.is_complete() {
            return Err(JobError::NotComplete {
                job: self.job_name.clone(),
                status: status.to_string(),
            });
        }
        self.sidecar_json(ContainerName::SidecarUsage).await
    }

    fn ensure_sidecars(&self) -> Result<()> {
        match &self.job {
            Some(job) if !job.has_output_sidecars() => Err(JobError::OutputUnavailable(format!(
                "job {} was built without output sidecars",
                self.job_name
            ))),
            _ => Ok(()),
        }
    }

    async fn sidecar_json(&self, container: ContainerName) -> Result<serde_json::Value> {
        let text = match self.container_log(container).await {
            Ok(text) => text,
            Err(JobError::Cluster(e)) if e.is_not_found() || e.is_bad_request() => {
                return Err(JobError::OutputUnavailable(format!(
                    "no {} container log for job {}",
                    container, self.job_name
                )));
            }
            Err(e) => return Err(e),
        };
        serde_json::from_str(&text).map_err(|e| {
            JobError::OutputUnavailable(format!("{} log is not JSON: {}", container, e))
        })
    }

    async fn pod_name(&self) -> Result<String> {
        if !self.submitted {
            return Err(JobError::NotSubmitted);
        }
        let selector = format!("job-name={}", self.job_name);
        let pods = self
            .context
            .cluster()
            .list_pods(self.context.namespace(), &selector)
            .await?;
        pods.items
            .into_iter()
            .find_map(|pod| pod.metadata.name)
            .ok_or_else(|| JobError::PodNotFound(self.job_name.clone()))
    }

    async fn container_log(&self, container: ContainerName) -> Result<String> {
        let pod = self.pod_name().await?;
        debug!(pod = %pod, container = %container, "Reading container log");
        Ok(self
            .context
            .cluster()
            .read_pod_log(self.context.namespace(), &pod, container.as_str())
            .await?)
    }

    /// Poll until the job leaves the active state and return its final status.
    ///
    /// A job that is not active when monitoring starts is reported and its
    /// status returned straight away.
    pub async fn monitor(&self, interval: Duration) -> Result<JobStatus> {
        let mut status = self.status().await?;
        if status != JobStatus::Active {
            warn!(job = %self.job_name, status = %status, "job is not submitted");
            return Ok(status);
        }

        while status == JobStatus::Active {
            info!(job = %self.job_name, "job is active");
            tokio::time::sleep(interval).await;
            status = self.status().await?;
        }

        info!(job = %self.job_name, status = %status, "execution is complete");
        if status == JobStatus::Succeeded {
            info!(job = %self.job_name, "outcome: success!");
        }
        Ok(status)
    }

    /// [`monitor`](Self::monitor) with an upper bound on the wait.
    pub async fn monitor_with_timeout(
        &self,
        interval: Duration,
        timeout: Duration,
    ) -> Result<JobStatus> {
        match tokio::time::timeout(timeout, self.monitor(interval)).await {
            Ok(result) => result,
            Err(_) => Err(JobError::Timeout {
                job: self.job_name.clone(),
                secs: timeout.as_secs(),
            }),
        }
    }

    /// Delete the job and its config maps.
    pub async fn dispose(&self) -> Result<()> {
        match &self.job_id {
            Some(job_id) => self.context.dispose_job(job_id, &self.job_name).await,
            None => {
                warn!(job = %self.job_name, "No job id, config maps are kept");
                self.context.delete_job(&self.job_name).await
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn status(active: Option<i32>, succeeded: Option<i32>, failed: Option<i32>) -> K8sJobStatus {
        K8sJobStatus {
            active,
            succeeded,
            failed,
            start_time: Some(Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap()),
            ..Default::default()
        }
    }

    #[test]
    fn test_pending_job_is_active() {
        assert_eq!(JobStatus::from_k8s(None), JobStatus::Active);
        assert_eq!(
            JobStatus::from_k8s(Some(&K8sJobStatus::default())),
            JobStatus::Active
        );
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            JobStatus::from_k8s(Some(&status(Some(1), None, None))),
            JobStatus::Active
        );
        assert_eq!(
            JobStatus::from_k8s(Some(&status(None, Some(1), None))),
            JobStatus::Succeeded
        );
        assert_eq!(
            JobStatus::from_k8s(Some(&status(Some(0), None, Some(3)))),
            JobStatus::Failed
        );
        assert_eq!(
            JobStatus::from_k8s(Some(&status(None, None, None))),
            JobStatus::Unknown
        );
    }

    #[test]
    fn test_status_display() {
        assert_eq!(JobStatus::Succeeded.to_string(), "succeeded");
        assert!(JobStatus::Failed.is_complete());
        assert!(!JobStatus::Unknown.is_complete());
        assert_eq!(
            serde_json::to_string(&JobStatus::Active).unwrap(),
            "\"active\""
        );
    }
}
