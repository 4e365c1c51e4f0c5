//! CWL workflow executions as Kubernetes jobs.
//!
//! A run goes through three pieces:
//!
//! - [`CalrissianContext`] binds a cluster handle to the execution namespace
//!   and owns the shared working-directory claim.
//! - [`CalrissianJob`] turns a [`CwlDocument`] and its [`JobParams`] into a
//!   `batch/v1` Job running the Calrissian runner.
//! - [`CalrissianExecution`] submits the job and observes it: status,
//!   timestamps, logs, outputs, monitoring and cleanup.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use calrissian_job::{CalrissianContext, CalrissianExecution, CalrissianJob, CwlDocument, JobParams};
//! use calrissian_kube::KubeClient;
//!
//! # async fn example() -> calrissian_job::Result<()> {
//! let client = KubeClient::builder().base_url("https://10.0.0.1:6443").build()?;
//! let context = CalrissianContext::new(Arc::new(client), "calrissian");
//! context.initialise().await?;
//!
//! let job = CalrissianJob::builder(
//!     CwlDocument::from_path("app.cwl")?,
//!     JobParams::from_path("params.yml")?,
//!     context.clone(),
//!     "ws-alice",
//!     "ws-alice",
//!     "run-1",
//! )
//! .max_cores("4")
//! .build()?;
//!
//! let mut execution = CalrissianExecution::new(job, context);
//! execution.submit().await?;
//! let status = execution.monitor(Duration::from_secs(5)).await?;
//! println!("{status}");
//! # Ok(())
//! # }
//! ```

pub mod context;
pub mod cwl;
pub mod error;
pub mod execution;
pub mod job;
pub mod naming;
pub mod workspace;

pub use context::CalrissianContext;
pub use cwl::{CwlDocument, JobParams};
pub use error::{JobError, Result};
pub use execution::{CalrissianExecution, DEFAULT_MONITOR_INTERVAL, JobStatus};
pub use job::{CalrissianJob, CalrissianJobBuilder, ContainerName, config_map_names_for};
pub use naming::{generate_job_name, shorten_name};
pub use workspace::WorkspaceMounts;
