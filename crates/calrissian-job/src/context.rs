//! Runtime context: the execution namespace and its shared resources.

use std::fmt;

use calrissian_config::ContextSection;
use calrissian_kube::SharedCluster;
use calrissian_kube::types::{ConfigMap, PersistentVolumeClaim};
use tracing::{debug, info, warn};

use crate::error::Result;

/// Access mode of the working-directory claim. Step pods share it.
pub const WDIR_ACCESS_MODE: &str = "ReadWriteMany";

/// A cluster handle bound to the namespace jobs run in.
///
/// Cloning is cheap; clones share the cluster handle.
#[derive(Clone)]
pub struct CalrissianContext {
    cluster: SharedCluster,
    namespace: String,
    calrissian_wdir: String,
    service_account: String,
    calling_service_account: String,
    storage_class: Option<String>,
    volume_size: String,
}

impl fmt::Debug for CalrissianContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CalrissianContext")
            .field("namespace", &self.namespace)
            .field("calrissian_wdir", &self.calrissian_wdir)
            .field("service_account", &self.service_account)
            .field("calling_service_account", &self.calling_service_account)
            .field("storage_class", &self.storage_class)
            .field("volume_size", &self.volume_size)
            .finish_non_exhaustive()
    }
}

impl CalrissianContext {
    /// Create a context with default settings.
    pub fn new(cluster: SharedCluster, namespace: impl Into<String>) -> Self {
        Self::from_settings(cluster, namespace, &ContextSection::default())
    }

    /// Create a context from the `[context]` config section.
    pub fn from_settings(
        cluster: SharedCluster,
        namespace: impl Into<String>,
        settings: &ContextSection,
    ) -> Self {
        Self {
            cluster,
            namespace: namespace.into(),
            calrissian_wdir: settings.wdir_claim.clone(),
            service_account: settings.service_account.clone(),
            calling_service_account: settings.calling_service_account.clone(),
            storage_class: settings.storage_class.clone(),
            volume_size: settings.volume_size.clone(),
        }
    }

    pub fn with_wdir_claim(mut self, claim: impl Into<String>) -> Self {
        self.calrissian_wdir = claim.into();
        self
    }

    pub fn with_service_account(mut self, account: impl Into<String>) -> Self {
        self.service_account = account.into();
        self
    }

    pub fn with_calling_service_account(mut self, account: impl Into<String>) -> Self {
        self.calling_service_account = account.into();
        self
    }

    pub fn cluster(&self) -> &SharedCluster {
        &self.cluster
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Name of the working-directory claim mounted at `/calrissian`.
    pub fn calrissian_wdir(&self) -> &str {
        &self.calrissian_wdir
    }

    pub fn service_account(&self) -> &str {
        &self.service_account
    }

    pub fn calling_service_account(&self) -> &str {
        &self.calling_service_account
    }

    /// Make sure the namespace exists and the working-directory claim is there.
    pub async fn initialise(&self) -> Result<()> {
        // Fails with NotFound when the namespace is missing.
        self.cluster.read_namespace(&self.namespace).await?;

        if self.is_pvc_created(&self.calrissian_wdir).await? {
            debug!(claim = %self.calrissian_wdir, "Working directory claim exists");
        } else {
            self.create_pvc(
                &self.calrissian_wdir,
                &self.volume_size,
                self.storage_class.clone(),
                WDIR_ACCESS_MODE,
            )
            .await?;
        }

        info!(namespace = %self.namespace, "Runtime context initialised");
        Ok(())
    }

    pub async fn is_namespace_created(&self) -> Result<bool> {
        match self.cluster.read_namespace(&self.namespace).await {
            Ok(_) => Ok(true),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn is_pvc_created(&self, name: &str) -> Result<bool> {
        match self
            .cluster
            .read_persistent_volume_claim(&self.namespace, name)
            .await
        {
            Ok(_) => Ok(true),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn create_pvc(
        &self,
        name: &str,
        size: &str,
        storage_class: Option<String>,
        access_mode: &str,
    ) -> Result<PersistentVolumeClaim> {
        let claim =
            PersistentVolumeClaim::request(name, &self.namespace, size, storage_class, access_mode);
        let created = self
            .cluster
            .create_persistent_volume_claim(&self.namespace, &claim)
            .await?;
        info!(claim = name, size, access_mode, "Created persistent volume claim");
        Ok(created)
    }

    /// Create a single-key config map, replacing it if it already exists.
    pub async fn create_configmap(&self, name: &str, key: &str, content: &str) -> Result<ConfigMap> {
        self.apply_configmap(&ConfigMap::single(name, &self.namespace, key, content))
            .await
    }

    /// Create a config map in the namespace, replacing an existing one.
    pub async fn apply_configmap(&self, config_map: &ConfigMap) -> Result<ConfigMap> {
        let name = config_map.metadata.name_or_default();
        match self
            .cluster
            .create_config_map(&self.namespace, config_map)
            .await
        {
            Ok(created) => {
                debug!(config_map = name, "Created config map");
                Ok(created)
            }
            Err(e) if e.is_conflict() => {
                debug!(config_map = name, "Config map exists, replacing");
                Ok(self
                    .cluster
                    .replace_config_map(&self.namespace, config_map)
                    .await?)
            }
            Err(e) => Err(e.into()),
        }
    }

    pub async fn read_configmap(&self, name: &str) -> Result<ConfigMap> {
        Ok(self.cluster.read_config_map(&self.namespace, name).await?)
    }

    /// Delete a config map. A missing one is not an error.
    pub async fn delete_configmap(&self, name: &str) -> Result<()> {
        match self.cluster.delete_config_map(&self.namespace, name).await {
            Ok(()) => Ok(()),
            Err(e) if e.is_not_found() => {
                debug!(config_map = name, "Config map already gone");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Delete a job and its pods. A missing job is not an error.
    pub async fn delete_job(&self, job_name: &str) -> Result<()> {
        match self.cluster.delete_job(&self.namespace, job_name).await {
            Ok(()) => {
                info!(job = job_name, "Deleted job");
                Ok(())
            }
            Err(e) if e.is_not_found() => {
                warn!(job = job_name, "Job not found, nothing to delete");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Delete a job and the config maps created for it.
    pub async fn dispose_job(&self, job_id: &str, job_name: &str) -> Result<()> {
        self.delete_job(job_name).await?;
        for name in crate::job::config_map_names_for(job_id) {
            self.delete_configmap(&name).await?;
        }
        Ok(())
    }
}
