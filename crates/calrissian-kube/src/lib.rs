//! Typed Kubernetes REST client for Calrissian job orchestration.
//!
//! This crate provides the small slice of the Kubernetes API that running CWL
//! workflows as jobs needs, behind the [`ClusterApi`] trait.
//!
//! # Example
//!
//! ```no_run
//! use calrissian_kube::{ClusterApi, KubeClient, Result};
//!
//! # async fn example() -> Result<()> {
//! let client = KubeClient::builder()
//!     .base_url("https://10.0.0.1:6443")
//!     .bearer_token("secret")
//!     .build()?;
//!
//! let job = client.read_job_status("calrissian", "job-123").await?;
//! println!("active pods: {:?}", job.status.and_then(|s| s.active));
//! # Ok(())
//! # }
//! ```
//!
//! # API Coverage
//!
//! - **core/v1**: namespaces, config maps, persistent volume claims, pods, pod logs
//! - **batch/v1**: jobs and job status
//! - **custom objects**: namespaced reads as untyped JSON

pub mod api;
pub mod client;
pub mod cluster;
pub mod error;
pub mod mock;
pub mod offline;
pub mod types;

pub use client::{ClientBuilder, KubeClient};
pub use cluster::{ClusterApi, CustomResource, POD_LIST_TIMEOUT_SECS, SharedCluster};
pub use error::{Error, Result};
pub use mock::MockCluster;
pub use offline::OfflineCluster;
