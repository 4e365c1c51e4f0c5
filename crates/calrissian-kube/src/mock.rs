//! In-memory cluster for tests.

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::cluster::{ClusterApi, CustomResource};
use crate::error::{Error, Result};
use crate::types::{
    ConfigMap, Job, JobStatus, Namespace, ObjectMeta, PersistentVolumeClaim, Pod, PodList,
};

type Key = (String, String);

#[derive(Debug, Default)]
struct State {
    namespaces: HashSet<String>,
    config_maps: BTreeMap<Key, ConfigMap>,
    claims: BTreeMap<Key, PersistentVolumeClaim>,
    jobs: BTreeMap<Key, Job>,
    job_statuses: HashMap<Key, VecDeque<JobStatus>>,
    pods: Vec<(String, Pod)>,
    logs: HashMap<(String, String), String>,
    custom_objects: HashMap<(CustomResource, String, String), serde_json::Value>,
    calls: Vec<String>,
}

/// A mock cluster for testing purposes.
///
/// Stores resources in memory and records every call so tests can assert on
/// what was sent to the control plane. Job statuses can be scripted: each
/// status read consumes the next scripted entry, and the last one sticks.
#[derive(Debug, Default)]
pub struct MockCluster {
    state: Mutex<State>,
}

fn key(namespace: &str, name: &str) -> Key {
    (namespace.to_string(), name.to_string())
}

fn not_found(kind: &str, name: &str) -> Error {
    Error::NotFound(format!("{} \"{}\" not found", kind, name))
}

fn selector_matches(selector: &str, meta: &ObjectMeta) -> bool {
    let labels = meta.labels.clone().unwrap_or_default();
    selector
        .split(',')
        .filter(|term| !term.is_empty())
        .all(|term| match term.split_once('=') {
            Some((k, v)) => labels.get(k.trim()).map(String::as_str) == Some(v.trim()),
            None => labels.contains_key(term.trim()),
        })
}

impl MockCluster {
    /// Create an empty cluster.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn record(&self, call: String) {
        self.lock().calls.push(call);
    }

    /// Register a namespace.
    pub fn add_namespace(&self, namespace: &str) {
        self.lock().namespaces.insert(namespace.to_string());
    }

    /// Store a config map directly.
    pub fn add_config_map(&self, namespace: &str, config_map: ConfigMap) {
        let name = config_map.metadata.name_or_default().to_string();
        self.lock()
            .config_maps
            .insert(key(namespace, &name), config_map);
    }

    /// Register an existing persistent volume claim.
    pub fn add_claim(&self, namespace: &str, name: &str) {
        let claim = PersistentVolumeClaim {
            metadata: ObjectMeta::named(name).in_namespace(namespace),
            ..Default::default()
        };
        self.lock().claims.insert(key(namespace, name), claim);
    }

    /// Register a pod with labels.
    pub fn add_pod(&self, namespace: &str, name: &str, labels: &[(&str, &str)]) {
        let mut metadata = ObjectMeta::named(name).in_namespace(namespace);
        for (k, v) in labels {
            metadata = metadata.with_label(*k, *v);
        }
        let pod = Pod {
            metadata,
            status: None,
        };
        self.lock().pods.push((namespace.to_string(), pod));
    }

    /// Set the log returned for a pod container.
    pub fn set_pod_log(&self, pod: &str, container: &str, log: impl Into<String>) {
        self.lock()
            .logs
            .insert((pod.to_string(), container.to_string()), log.into());
    }

    /// Register a custom object.
    pub fn add_custom_object(
        &self,
        resource: CustomResource,
        namespace: &str,
        name: &str,
        object: serde_json::Value,
    ) {
        self.lock()
            .custom_objects
            .insert((resource, namespace.to_string(), name.to_string()), object);
    }

    /// Script the statuses returned by successive reads of a job.
    pub fn script_job_status(&self, namespace: &str, name: &str, statuses: Vec<JobStatus>) {
        self.lock()
            .job_statuses
            .insert(key(namespace, name), statuses.into());
    }

    /// Get a stored config map.
    pub fn config_map(&self, namespace: &str, name: &str) -> Option<ConfigMap> {
        self.lock().config_maps.get(&key(namespace, name)).cloned()
    }

    /// Names of all config maps in a namespace.
    pub fn config_map_names(&self, namespace: &str) -> Vec<String> {
        self.lock()
            .config_maps
            .keys()
            .filter(|(ns, _)| ns == namespace)
            .map(|(_, name)| name.clone())
            .collect()
    }

    /// Get a stored persistent volume claim.
    pub fn claim(&self, namespace: &str, name: &str) -> Option<PersistentVolumeClaim> {
        self.lock().claims.get(&key(namespace, name)).cloned()
    }

    /// Get a stored job.
    pub fn job(&self, namespace: &str, name: &str) -> Option<Job> {
        self.lock().jobs.get(&key(namespace, name)).cloned()
    }

    /// Number of stored jobs.
    pub fn job_count(&self) -> usize {
        self.lock().jobs.len()
    }

    /// All calls made so far, e.g. `create_job ns/job-1`.
    pub fn calls(&self) -> Vec<String> {
        self.lock().calls.clone()
    }

    /// Number of calls whose description starts with `prefix`.
    pub fn call_count(&self, prefix: &str) -> usize {
        self.lock()
            .calls
            .iter()
            .filter(|c| c.starts_with(prefix))
            .count()
    }
}

#[async_trait]
impl ClusterApi for MockCluster {
    async fn read_namespace(&self, namespace: &str) -> Result<Namespace> {
        self.record(format!("read_namespace {}", namespace));
        if self.lock().namespaces.contains(namespace) {
            Ok(Namespace {
                metadata: ObjectMeta::named(namespace),
                ..Default::default()
            })
        } else {
            Err(not_found("namespaces", namespace))
        }
    }

    async fn create_config_map(
        &self,
        namespace: &str,
        config_map: &ConfigMap,
    ) -> Result<ConfigMap> {
        let name = config_map.metadata.name_or_default().to_string();
        self.record(format!("create_config_map {}/{}", namespace, name));
        let mut state = self.lock();
        let k = key(namespace, &name);
        if state.config_maps.contains_key(&k) {
            return Err(Error::Conflict(format!(
                "configmaps \"{}\" already exists",
                name
            )));
        }
        state.config_maps.insert(k, config_map.clone());
        Ok(config_map.clone())
    }

    async fn replace_config_map(
        &self,
        namespace: &str,
        config_map: &ConfigMap,
    ) -> Result<ConfigMap> {
        let name = config_map.metadata.name_or_default().to_string();
        self.record(format!("replace_config_map {}/{}", namespace, name));
        let mut state = self.lock();
        let k = key(namespace, &name);
        if !state.config_maps.contains_key(&k) {
            return Err(not_found("configmaps", &name));
        }
        state.config_maps.insert(k, config_map.clone());
        Ok(config_map.clone())
    }

    async fn read_config_map(&self, namespace: &str, name: &str) -> Result<ConfigMap> {
        self.record(format!("read_config_map {}/{}", namespace, name));
        self.config_map(namespace, name)
            .ok_or_else(|| not_found("configmaps", name))
    }

    async fn delete_config_map(&self, namespace: &str, name: &str) -> Result<()> {
        self.record(format!("delete_config_map {}/{}", namespace, name));
        self.lock()
            .config_maps
            .remove(&key(namespace, name))
            .map(|_| ())
            .ok_or_else(|| not_found("configmaps", name))
    }

    async fn create_persistent_volume_claim(
        &self,
        namespace: &str,
        claim: &PersistentVolumeClaim,
    ) -> Result<PersistentVolumeClaim> {
        let name = claim.metadata.name_or_default().to_string();
        self.record(format!("create_persistent_volume_claim {}/{}", namespace, name));
        let mut state = self.lock();
        let k = key(namespace, &name);
        if state.claims.contains_key(&k) {
            return Err(Error::Conflict(format!(
                "persistentvolumeclaims \"{}\" already exists",
                name
            )));
        }
        state.claims.insert(k, claim.clone());
        Ok(claim.clone())
    }

    async fn read_persistent_volume_claim(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<PersistentVolumeClaim> {
        self.record(format!("read_persistent_volume_claim {}/{}", namespace, name));
        self.claim(namespace, name)
            .ok_or_else(|| not_found("persistentvolumeclaims", name))
    }

    async fn create_job(&self, namespace: &str, job: &Job) -> Result<Job> {
        let name = job.metadata.name_or_default().to_string();
        self.record(format!("create_job {}/{}", namespace, name));
        let mut state = self.lock();
        let k = key(namespace, &name);
        if state.jobs.contains_key(&k) {
            return Err(Error::Conflict(format!("jobs.batch \"{}\" already exists", name)));
        }
        state.jobs.insert(k, job.clone());
        Ok(job.clone())
    }

    async fn read_job_status(&self, namespace: &str, name: &str) -> Result<Job> {
        self.record(format!("read_job_status {}/{}", namespace, name));
        let mut state = self.lock();
        let k = key(namespace, name);
        let mut job = state
            .jobs
            .get(&k)
            .cloned()
            .ok_or_else(|| not_found("jobs.batch", name))?;

        if let Some(script) = state.job_statuses.get_mut(&k) {
            let next = if script.len() > 1 {
                script.pop_front()
            } else {
                script.front().cloned()
            };
            if next.is_some() {
                job.status = next;
            }
        }

        Ok(job)
    }

    async fn delete_job(&self, namespace: &str, name: &str) -> Result<()> {
        self.record(format!("delete_job {}/{}", namespace, name));
        self.lock()
            .jobs
            .remove(&key(namespace, name))
            .map(|_| ())
            .ok_or_else(|| not_found("jobs.batch", name))
    }

    async fn list_pods(&self, namespace: &str, label_selector: &str) -> Result<PodList> {
        self.record(format!("list_pods {} {}", namespace, label_selector));
        let items = self
            .lock()
            .pods
            .iter()
            .filter(|(ns, pod)| ns == namespace && selector_matches(label_selector, &pod.metadata))
            .map(|(_, pod)| pod.clone())
            .collect();
        Ok(PodList { items })
    }

    async fn read_pod_log(&self, namespace: &str, pod: &str, container: &str) -> Result<String> {
        self.record(format!("read_pod_log {}/{} {}", namespace, pod, container));
        let state = self.lock();
        if let Some(log) = state.logs.get(&(pod.to_string(), container.to_string())) {
            return Ok(log.clone());
        }
        let pod_exists = state
            .pods
            .iter()
            .any(|(ns, p)| ns == namespace && p.metadata.name.as_deref() == Some(pod));
        if pod_exists {
            // The API server answers 400 for a container the pod does not have.
            return Err(Error::Api {
                status: 400,
                reason: "BadRequest".to_string(),
                message: format!("container \"{}\" is not valid for pod \"{}\"", container, pod),
            });
        }
        Err(not_found("pods", pod))
    }

    async fn get_custom_object(
        &self,
        resource: &CustomResource,
        namespace: &str,
        name: &str,
    ) -> Result<serde_json::Value> {
        self.record(format!(
            "get_custom_object {}/{} {}/{}",
            resource.group, resource.plural, namespace, name
        ));
        self.lock()
            .custom_objects
            .get(&(resource.clone(), namespace.to_string(), name.to_string()))
            .cloned()
            .ok_or_else(|| not_found(&resource.plural, name))
    }
}
