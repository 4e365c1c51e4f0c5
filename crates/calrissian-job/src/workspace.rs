//! Workspace volume discovery.
//!
//! Two sources contribute mounts under `/workspace`:
//!
//! - the `workspace-config` config map of the execution namespace, listing
//!   claims as `[{"pvcName": ..., "pvName": ...}]`;
//! - when the run is made on behalf of another workspace, that workspace's
//!   custom resource, whose EFS access points map to temporary claims.

use std::collections::HashMap;

use calrissian_config::WorkspaceSection;
use calrissian_kube::CustomResource;
use calrissian_kube::types::{Volume, VolumeMount};
use serde::Deserialize;
use tracing::{error, info};

use crate::context::CalrissianContext;
use crate::error::{JobError, Result};

/// Where workspace volumes are mounted in the runner container.
pub const WORKSPACE_ROOT: &str = "/workspace";

/// Volumes and matching mounts added to the runner pod.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WorkspaceMounts {
    pub volumes: Vec<Volume>,
    pub mounts: Vec<VolumeMount>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PvcEntry {
    #[serde(default)]
    pvc_name: Option<String>,
    #[serde(default)]
    pv_name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct WorkspaceObject {
    spec: WorkspaceSpec,
    status: WorkspaceStatus,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct WorkspaceSpec {
    storage: WorkspaceStorage,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct WorkspaceStorage {
    persistent_volumes: Vec<WorkspaceVolume>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WorkspaceVolume {
    name: String,
    volume_source: AccessPointRef,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AccessPointRef {
    access_point_name: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct WorkspaceStatus {
    aws: AwsStatus,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct AwsStatus {
    efs: EfsStatus,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct EfsStatus {
    access_points: Vec<AccessPoint>,
}

#[derive(Debug, Deserialize)]
struct AccessPoint {
    name: String,
}

impl WorkspaceMounts {
    /// No workspace volumes, for rendering a manifest offline.
    pub fn none() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.volumes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.volumes.len()
    }

    fn push(&mut self, volume: Volume, mount: VolumeMount) {
        self.volumes.push(volume);
        self.mounts.push(mount);
    }

    /// Discover the workspace volumes a job should mount.
    pub async fn discover(
        context: &CalrissianContext,
        calling_workspace: &str,
        executing_workspace: &str,
        settings: &WorkspaceSection,
    ) -> Result<Self> {
        let mut mounts = Self::none();
        mounts.add_configured_claims(context, settings).await?;
        if calling_workspace != executing_workspace {
            mounts
                .add_calling_workspace(context, calling_workspace, settings)
                .await?;
        }
        Ok(mounts)
    }

    async fn add_configured_claims(
        &mut self,
        context: &CalrissianContext,
        settings: &WorkspaceSection,
    ) -> Result<()> {
        let pvcs_json = match context.read_configmap(&settings.config_map).await {
            Ok(cm) => cm.get(&settings.pvcs_key).unwrap_or("[]").to_string(),
            Err(e) => {
                error!(config_map = %settings.config_map, error = %e, "Failed to read workspace config");
                return Ok(());
            }
        };

        let entries: Vec<PvcEntry> = match serde_json::from_str(&pvcs_json) {
            Ok(entries) => entries,
            Err(e) => {
                error!(error = %e, "Error parsing workspace PVC list");
                return Ok(());
            }
        };

        for entry in entries {
            let Some(pvc_name) = entry.pvc_name.filter(|n| !n.is_empty()) else {
                continue;
            };
            let Some(pv_name) = entry.pv_name else {
                error!(pvc = %pvc_name, "Workspace PVC entry has no pvName, skipping");
                continue;
            };
            if !context.is_pvc_created(&pvc_name).await? {
                continue;
            }

            let volume_name = format!("workspace-efs-{}", pvc_name);
            let mount_path = format!("{}/{}", WORKSPACE_ROOT, pv_name);
            info!(claim = %pvc_name, path = %mount_path, "Mounting workspace volume");
            self.push(
                Volume::from_claim(&volume_name, &pvc_name, None),
                VolumeMount::new(&volume_name, mount_path).read_write(),
            );
        }
        Ok(())
    }

    async fn add_calling_workspace(
        &mut self,
        context: &CalrissianContext,
        calling_workspace: &str,
        settings: &WorkspaceSection,
    ) -> Result<()> {
        let resource = CustomResource::new(
            &settings.crd_group,
            &settings.crd_version,
            &settings.crd_plural,
        );
        let object = context
            .cluster()
            .get_custom_object(&resource, &settings.crd_namespace, calling_workspace)
            .await
            .inspect_err(|e| error!(workspace = calling_workspace, error = %e, "Error getting workspace resource"))?;

        let workspace: WorkspaceObject = serde_json::from_value(object).map_err(|e| {
            JobError::Workspace(format!(
                "workspace '{}' has an unexpected shape: {}",
                calling_workspace, e
            ))
        })?;

        let by_access_point: HashMap<&str, &str> = workspace
            .spec
            .storage
            .persistent_volumes
            .iter()
            .map(|pv| (pv.volume_source.access_point_name.as_str(), pv.name.as_str()))
            .collect();

        for access_point in &workspace.status.aws.efs.access_points {
            let mount_name = by_access_point
                .get(access_point.name.as_str())
                .ok_or_else(|| {
                    JobError::Workspace(format!(
                        "access point '{}' of workspace '{}' has no persistent volume",
                        access_point.name, calling_workspace
                    ))
                })?;

            let basic = mount_name.replacen("pv-", "", 1);
            let volume_name = format!("temp-pv-{}", basic);
            let claim_name = format!("temp-pvc-workspace-{}", basic);
            let mount_path = format!("{}/{}", WORKSPACE_ROOT, mount_name);
            info!(
                volume = %volume_name,
                claim = %claim_name,
                path = %mount_path,
                "Mounting calling workspace volume"
            );
            self.push(
                Volume::from_claim(&volume_name, &claim_name, None),
                VolumeMount::new(&volume_name, mount_path),
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use calrissian_kube::MockCluster;
    use calrissian_kube::types::ConfigMap;
    use serde_json::json;

    use super::*;

    fn setup() -> (Arc<MockCluster>, CalrissianContext) {
        let cluster = Arc::new(MockCluster::new());
        let ctx = CalrissianContext::new(cluster.clone(), "ades");
        (cluster, ctx)
    }

    fn workspace_resource() -> CustomResource {
        let settings = WorkspaceSection::default();
        CustomResource::new(settings.crd_group, settings.crd_version, settings.crd_plural)
    }

    #[tokio::test]
    async fn test_configured_claims_only_when_present() {
        let (cluster, ctx) = setup();
        cluster.add_config_map(
            "ades",
            ConfigMap::single(
                "workspace-config",
                "ades",
                "pvcs",
                r#"[{"pvcName": "ws-alice-data", "pvName": "pv-alice-data"},
                    {"pvcName": "ws-missing", "pvName": "pv-missing"},
                    {"pvName": "no-claim"}]"#,
            ),
        );
        cluster.add_claim("ades", "ws-alice-data");

        let mounts =
            WorkspaceMounts::discover(&ctx, "ws-alice", "ws-alice", &WorkspaceSection::default())
                .await
                .unwrap();

        assert_eq!(mounts.len(), 1);
        assert_eq!(mounts.volumes[0].name, "workspace-efs-ws-alice-data");
        let claim = mounts.volumes[0].persistent_volume_claim.as_ref().unwrap();
        assert_eq!(claim.claim_name, "ws-alice-data");
        assert_eq!(mounts.mounts[0].mount_path, "/workspace/pv-alice-data");
        assert_eq!(mounts.mounts[0].read_only, Some(false));
        assert_eq!(cluster.call_count("get_custom_object"), 0);
    }

    #[tokio::test]
    async fn test_missing_or_invalid_config_is_empty() {
        let (cluster, ctx) = setup();
        let settings = WorkspaceSection::default();
        let mounts = WorkspaceMounts::discover(&ctx, "ws", "ws", &settings)
            .await
            .unwrap();
        assert!(mounts.is_empty());

        cluster.add_config_map(
            "ades",
            ConfigMap::single("workspace-config", "ades", "pvcs", "not json"),
        );
        let mounts = WorkspaceMounts::discover(&ctx, "ws", "ws", &settings)
            .await
            .unwrap();
        assert!(mounts.is_empty());
    }

    #[tokio::test]
    async fn test_calling_workspace_access_points() {
        let (cluster, ctx) = setup();
        cluster.add_custom_object(
            workspace_resource(),
            "workspaces",
            "ws-bob",
            json!({
                "spec": {"storage": {"persistentVolumes": [
                    {"name": "pv-bob-results", "volumeSource": {"accessPointName": "ap-1"}},
                    {"name": "pv-bob-pv-cache", "volumeSource": {"accessPointName": "ap-2"}}
                ]}},
                "status": {"aws": {"efs": {"accessPoints": [
                    {"name": "ap-1"}, {"name": "ap-2"}
                ]}}}
            }),
        );

        let mounts =
            WorkspaceMounts::discover(&ctx, "ws-bob", "ws-alice", &WorkspaceSection::default())
                .await
                .unwrap();

        let names: Vec<_> = mounts.volumes.iter().map(|v| v.name.as_str()).collect();
        assert_eq!(names, vec!["temp-pv-bob-results", "temp-pv-bob-pv-cache"]);
        assert_eq!(
            mounts.volumes[1]
                .persistent_volume_claim
                .as_ref()
                .unwrap()
                .claim_name,
            "temp-pvc-workspace-bob-pv-cache"
        );
        assert_eq!(mounts.mounts[0].mount_path, "/workspace/pv-bob-results");
        assert_eq!(mounts.mounts[0].read_only, None);
    }

    #[tokio::test]
    async fn test_unmapped_access_point_is_error() {
        let (cluster, ctx) = setup();
        cluster.add_custom_object(
            workspace_resource(),
            "workspaces",
            "ws-bob",
            json!({
                "spec": {"storage": {"persistentVolumes": []}},
                "status": {"aws": {"efs": {"accessPoints": [{"name": "ap-9"}]}}}
            }),
        );

        let err = WorkspaceMounts::discover(&ctx, "ws-bob", "ws-alice", &WorkspaceSection::default())
            .await
            .unwrap_err();
        assert!(matches!(err, JobError::Workspace(msg) if msg.contains("ap-9")));
    }

    #[tokio::test]
    async fn test_missing_calling_workspace_propagates() {
        let (_cluster, ctx) = setup();
        let err = WorkspaceMounts::discover(&ctx, "ws-ghost", "ws-alice", &WorkspaceSection::default())
            .await
            .unwrap_err();
        assert!(matches!(err, JobError::Cluster(e) if e.is_not_found()));
    }
}
