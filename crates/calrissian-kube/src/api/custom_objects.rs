//! Custom resources, read as untyped JSON.

use crate::client::KubeClient;
use crate::error::Result;

/// Client for namespaced custom objects.
pub struct CustomObjectsApi {
    client: KubeClient,
}

impl CustomObjectsApi {
    pub(crate) fn new(client: KubeClient) -> Self {
        Self { client }
    }

    /// Get a namespaced custom object.
    pub async fn get_namespaced(
        &self,
        group: &str,
        version: &str,
        namespace: &str,
        plural: &str,
        name: &str,
    ) -> Result<serde_json::Value> {
        self.client
            .get(&format!(
                "apis/{}/{}/namespaces/{}/{}/{}",
                group, version, namespace, plural, name
            ))
            .await
    }
}
