//! A cluster handle for commands that never contact the control plane.

use async_trait::async_trait;

use crate::cluster::{ClusterApi, CustomResource};
use crate::error::{Error, Result};
use crate::types::{ConfigMap, Job, Namespace, PersistentVolumeClaim, PodList};

/// Fails every call with [`Error::Config`].
///
/// Lets manifests be built where no cluster is configured; any code path that
/// does reach the cluster surfaces as an error instead of a hang.
#[derive(Debug, Clone, Copy, Default)]
pub struct OfflineCluster;

fn offline<T>(call: &str) -> Result<T> {
    Err(Error::Config(format!("{} needs a cluster connection", call)))
}

#[async_trait]
impl ClusterApi for OfflineCluster {
    async fn read_namespace(&self, _namespace: &str) -> Result<Namespace> {
        offline("read_namespace")
    }

    async fn create_config_map(
        &self,
        _namespace: &str,
        _config_map: &ConfigMap,
    ) -> Result<ConfigMap> {
        offline("create_config_map")
    }

    async fn replace_config_map(
        &self,
        _namespace: &str,
        _config_map: &ConfigMap,
    ) -> Result<ConfigMap> {
        offline("replace_config_map")
    }

    async fn read_config_map(&self, _namespace: &str, _name: &str) -> Result<ConfigMap> {
        offline("read_config_map")
    }

    async fn delete_config_map(&self, _namespace: &str, _name: &str) -> Result<()> {
        offline("delete_config_map")
    }

    async fn create_persistent_volume_claim(
        &self,
        _namespace: &str,
        _claim: &PersistentVolumeClaim,
    ) -> Result<PersistentVolumeClaim> {
        offline("create_persistent_volume_claim")
    }

    async fn read_persistent_volume_claim(
        &self,
        _namespace: &str,
        _name: &str,
    ) -> Result<PersistentVolumeClaim> {
        offline("read_persistent_volume_claim")
    }

    async fn create_job(&self, _namespace: &str, _job: &Job) -> Result<Job> {
        offline("create_job")
    }

    async fn read_job_status(&self, _namespace: &str, _name: &str) -> Result<Job> {
        offline("read_job_status")
    }

    async fn delete_job(&self, _namespace: &str, _name: &str) -> Result<()> {
        offline("delete_job")
    }

    async fn list_pods(&self, _namespace: &str, _label_selector: &str) -> Result<PodList> {
        offline("list_pods")
    }

    async fn read_pod_log(&self, _namespace: &str, _pod: &str, _container: &str) -> Result<String> {
        offline("read_pod_log")
    }

    async fn get_custom_object(
        &self,
        _resource: &CustomResource,
        _namespace: &str,
        _name: &str,
    ) -> Result<serde_json::Value> {
        offline("get_custom_object")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_every_call_fails() {
        let cluster = OfflineCluster;
        let err = cluster.create_job("ns", &Job::default()).await.unwrap_err();
        assert!(matches!(err, Error::Config(ref msg) if msg.starts_with("create_job")));
        assert!(!err.is_not_found());
        assert!(cluster.read_namespace("ns").await.is_err());
        assert!(cluster.list_pods("ns", "job-name=x").await.is_err());
    }
}
