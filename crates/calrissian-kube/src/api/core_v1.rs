//! core/v1 API.

use crate::client::KubeClient;
use crate::error::Result;
use crate::types::{ConfigMap, DeleteOptions, Namespace, PersistentVolumeClaim, PodList};

/// Query parameters for listing pods.
#[derive(Debug, Default, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListPodsQuery {
    /// Label selector, e.g. `job-name=job-123`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label_selector: Option<String>,
    /// Server-side timeout for the list call.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_seconds: Option<u32>,
}

/// Query parameters for reading a pod log.
#[derive(Debug, Default, serde::Serialize)]
pub struct PodLogQuery {
    /// Container whose log is read.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub container: Option<String>,
}

/// core/v1 client scoped to one namespace.
pub struct CoreV1Api {
    client: KubeClient,
    namespace: String,
}

impl CoreV1Api {
    pub(crate) fn new(client: KubeClient, namespace: &str) -> Self {
        Self {
            client,
            namespace: namespace.to_string(),
        }
    }

    fn path(&self, resource: &str) -> String {
        format!("api/v1/namespaces/{}/{}", self.namespace, resource)
    }

    /// Read the namespace this client is scoped to.
    pub async fn read_namespace(&self) -> Result<Namespace> {
        self.client
            .get(&format!("api/v1/namespaces/{}", self.namespace))
            .await
    }

    /// Create a config map.
    pub async fn create_config_map(&self, config_map: &ConfigMap) -> Result<ConfigMap> {
        self.client.post(&self.path("configmaps"), config_map).await
    }

    /// Replace an existing config map.
    pub async fn replace_config_map(&self, name: &str, config_map: &ConfigMap) -> Result<ConfigMap> {
        self.client
            .put(&self.path(&format!("configmaps/{}", name)), config_map)
            .await
    }

    /// Read a config map.
    pub async fn read_config_map(&self, name: &str) -> Result<ConfigMap> {
        self.client
            .get(&self.path(&format!("configmaps/{}", name)))
            .await
    }

    /// Delete a config map.
    pub async fn delete_config_map(&self, name: &str) -> Result<()> {
        self.client
            .delete(
                &self.path(&format!("configmaps/{}", name)),
                &DeleteOptions::default(),
            )
            .await
    }

    /// Create a persistent volume claim.
    pub async fn create_persistent_volume_claim(
        &self,
        claim: &PersistentVolumeClaim,
    ) -> Result<PersistentVolumeClaim> {
        self.client
            .post(&self.path("persistentvolumeclaims"), claim)
            .await
    }

    /// Read a persistent volume claim.
    pub async fn read_persistent_volume_claim(&self, name: &str) -> Result<PersistentVolumeClaim> {
        self.client
            .get(&self.path(&format!("persistentvolumeclaims/{}", name)))
            .await
    }

    /// List pods matching a query.
    pub async fn list_pods(&self, query: &ListPodsQuery) -> Result<PodList> {
        self.client.get_with_query(&self.path("pods"), query).await
    }

    /// Read the log of one container of a pod.
    pub async fn read_pod_log(&self, pod: &str, query: &PodLogQuery) -> Result<String> {
        self.client
            .get_text(&self.path(&format!("pods/{}/log", pod)), query)
            .await
    }
}
