//! Error types for job construction and execution.

use thiserror::Error;

/// Result type for job operations.
pub type Result<T> = std::result::Result<T, JobError>;

/// Errors that can occur while building, submitting or observing a job.
#[derive(Debug, Error)]
pub enum JobError {
    /// The control plane rejected or failed a request.
    #[error("Cluster error: {0}")]
    Cluster(#[from] calrissian_kube::Error),

    /// The CWL document is not usable.
    #[error("Invalid workflow: {0}")]
    InvalidWorkflow(String),

    /// The job parameters are not a mapping.
    #[error("Invalid parameters: {0}")]
    InvalidParams(String),

    /// Failed to serialize a document or manifest.
    #[error("Serialization failed: {0}")]
    Serialize(String),

    /// Filesystem error.
    #[error("I/O error on '{path}': {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    /// The execution has no job on the cluster yet.
    #[error("Job has not been submitted")]
    NotSubmitted,

    /// The job is already on the cluster.
    #[error("Job {0} has already been submitted")]
    AlreadySubmitted(String),

    /// The job has not reached the state the operation needs.
    #[error("Job {job} is not complete (status: {status})")]
    NotComplete { job: String, status: String },

    /// No pod carries the job's label.
    #[error("No pod found for job {0}")]
    PodNotFound(String),

    /// Results cannot be read back for this job.
    #[error("Output unavailable: {0}")]
    OutputUnavailable(String),

    /// Workspace volumes could not be resolved.
    #[error("Workspace error: {0}")]
    Workspace(String),

    /// Monitoring gave up.
    #[error("Timed out after {secs}s waiting for job {job}")]
    Timeout { job: String, secs: u64 },
}

impl JobError {
    pub(crate) fn io(path: impl AsRef<std::path::Path>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.as_ref().display().to_string(),
            source,
        }
    }
}

impl From<serde_yaml::Error> for JobError {
    fn from(err: serde_yaml::Error) -> Self {
        JobError::Serialize(err.to_string())
    }
}

impl From<serde_json::Error> for JobError {
    fn from(err: serde_json::Error) -> Self {
        JobError::Serialize(err.to_string())
    }
}
