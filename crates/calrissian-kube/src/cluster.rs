//! The cluster seam used by the job orchestration layer.
//!
//! [`ClusterApi`] lists every control-plane call Calrissian makes. The REST
//! client implements it for real clusters; [`crate::MockCluster`] implements
//! it in memory for tests and [`crate::OfflineCluster`] refuses every call.

use std::sync::Arc;

use async_trait::async_trait;

use crate::api::{ListPodsQuery, PodLogQuery};
use crate::client::KubeClient;
use crate::error::{Error, Result};
use crate::types::{ConfigMap, Job, Namespace, PersistentVolumeClaim, PodList};

/// Server-side timeout applied when listing a job's pods.
pub const POD_LIST_TIMEOUT_SECS: u32 = 10;

/// Coordinates of a custom resource type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CustomResource {
    pub group: String,
    pub version: String,
    pub plural: String,
}

impl CustomResource {
    pub fn new(
        group: impl Into<String>,
        version: impl Into<String>,
        plural: impl Into<String>,
    ) -> Self {
        Self {
            group: group.into(),
            version: version.into(),
            plural: plural.into(),
        }
    }
}

/// Control-plane operations needed to run and observe Calrissian jobs.
#[async_trait]
pub trait ClusterApi: Send + Sync {
    /// Read a namespace.
    async fn read_namespace(&self, namespace: &str) -> Result<Namespace>;

    /// Create a config map.
    async fn create_config_map(&self, namespace: &str, config_map: &ConfigMap)
    -> Result<ConfigMap>;

    /// Replace a config map, addressed by its metadata name.
    async fn replace_config_map(
        &self,
        namespace: &str,
        config_map: &ConfigMap,
    ) -> Result<ConfigMap>;

    /// Read a config map.
    async fn read_config_map(&self, namespace: &str, name: &str) -> Result<ConfigMap>;

    /// Delete a config map.
    async fn delete_config_map(&self, namespace: &str, name: &str) -> Result<()>;

    /// Create a persistent volume claim.
    async fn create_persistent_volume_claim(
        &self,
        namespace: &str,
        claim: &PersistentVolumeClaim,
    ) -> Result<PersistentVolumeClaim>;

    /// Read a persistent volume claim.
    async fn read_persistent_volume_claim(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<PersistentVolumeClaim>;

    /// Create a job.
    async fn create_job(&self, namespace: &str, job: &Job) -> Result<Job>;

    /// Read a job with its status.
    async fn read_job_status(&self, namespace: &str, name: &str) -> Result<Job>;

    /// Delete a job and its pods.
    async fn delete_job(&self, namespace: &str, name: &str) -> Result<()>;

    /// List pods matching a label selector.
    async fn list_pods(&self, namespace: &str, label_selector: &str) -> Result<PodList>;

    /// Read one container's log.
    async fn read_pod_log(&self, namespace: &str, pod: &str, container: &str) -> Result<String>;

    /// Get a namespaced custom object as JSON.
    async fn get_custom_object(
        &self,
        resource: &CustomResource,
        namespace: &str,
        name: &str,
    ) -> Result<serde_json::Value>;
}

/// A cluster handle that can be shared across threads.
pub type SharedCluster = Arc<dyn ClusterApi>;

#[async_trait]
impl ClusterApi for KubeClient {
    async fn read_namespace(&self, namespace: &str) -> Result<Namespace> {
        self.core_v1(namespace).read_namespace().await
    }

    async fn create_config_map(
        &self,
        namespace: &str,
        config_map: &ConfigMap,
    ) -> Result<ConfigMap> {
        self.core_v1(namespace).create_config_map(config_map).await
    }

    async fn replace_config_map(
        &self,
        namespace: &str,
        config_map: &ConfigMap,
    ) -> Result<ConfigMap> {
        let name = config_map
            .metadata
            .name
            .as_deref()
            .ok_or_else(|| Error::Config("config map has no name".to_string()))?;
        self.core_v1(namespace)
            .replace_config_map(name, config_map)
            .await
    }

    async fn read_config_map(&self, namespace: &str, name: &str) -> Result<ConfigMap> {
        self.core_v1(namespace).read_config_map(name).await
    }

    async fn delete_config_map(&self, namespace: &str, name: &str) -> Result<()> {
        self.core_v1(namespace).delete_config_map(name).await
    }

    async fn create_persistent_volume_claim(
        &self,
        namespace: &str,
        claim: &PersistentVolumeClaim,
    ) -> Result<PersistentVolumeClaim> {
        self.core_v1(namespace)
            .create_persistent_volume_claim(claim)
            .await
    }

    async fn read_persistent_volume_claim(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<PersistentVolumeClaim> {
        self.core_v1(namespace)
            .read_persistent_volume_claim(name)
            .await
    }

    async fn create_job(&self, namespace: &str, job: &Job) -> Result<Job> {
        self.batch_v1(namespace).create_job(job).await
    }

    async fn read_job_status(&self, namespace: &str, name: &str) -> Result<Job> {
        self.batch_v1(namespace).read_job_status(name).await
    }

    async fn delete_job(&self, namespace: &str, name: &str) -> Result<()> {
        self.batch_v1(namespace).delete_job(name).await
    }

    async fn list_pods(&self, namespace: &str, label_selector: &str) -> Result<PodList> {
        let query = ListPodsQuery {
            label_selector: Some(label_selector.to_string()),
            timeout_seconds: Some(POD_LIST_TIMEOUT_SECS),
        };
        self.core_v1(namespace).list_pods(&query).await
    }

    async fn read_pod_log(&self, namespace: &str, pod: &str, container: &str) -> Result<String> {
        let query = PodLogQuery {
            container: Some(container.to_string()),
        };
        self.core_v1(namespace).read_pod_log(pod, &query).await
    }

    async fn get_custom_object(
        &self,
        resource: &CustomResource,
        namespace: &str,
        name: &str,
    ) -> Result<serde_json::Value> {
        self.custom_objects()
            .get_namespaced(
                &resource.group,
                &resource.version,
                namespace,
                &resource.plural,
                name,
            )
            .await
    }
}
