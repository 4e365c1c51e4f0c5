//! batch/v1 API.

use crate::client::KubeClient;
use crate::error::Result;
use crate::types::{DeleteOptions, Job};

/// batch/v1 client scoped to one namespace.
pub struct BatchV1Api {
    client: KubeClient,
    namespace: String,
}

impl BatchV1Api {
    pub(crate) fn new(client: KubeClient, namespace: &str) -> Self {
        Self {
            client,
            namespace: namespace.to_string(),
        }
    }

    fn jobs_path(&self) -> String {
        format!("apis/batch/v1/namespaces/{}/jobs", self.namespace)
    }

    /// Create a job.
    pub async fn create_job(&self, job: &Job) -> Result<Job> {
        self.client.post(&self.jobs_path(), job).await
    }

    /// Read a job including its status.
    pub async fn read_job_status(&self, name: &str) -> Result<Job> {
        self.client
            .get(&format!("{}/{}/status", self.jobs_path(), name))
            .await
    }

    /// Delete a job and, in the background, its pods.
    pub async fn delete_job(&self, name: &str) -> Result<()> {
        self.client
            .delete(
                &format!("{}/{}", self.jobs_path(), name),
                &DeleteOptions::background(),
            )
            .await
    }
}
