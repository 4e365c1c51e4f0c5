//! CLI command handlers.

pub mod cleanup;
pub mod init;
pub mod job_args;
pub mod logs;
pub mod monitor;
pub mod output;
pub mod render;
pub mod status;
pub mod submit;
pub mod usage;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context as _, Result};
use calrissian_config::{CalrissianConfig, ClusterSection, DEFAULT_NAMESPACE};
use calrissian_job::{CalrissianContext, CalrissianExecution};
use calrissian_kube::{KubeClient, SharedCluster};
use serde::Serialize;

/// Shared context for all commands.
#[derive(Debug, Clone)]
pub struct Context {
    /// Output as JSON for scripting.
    pub json_output: bool,
    /// Verbose output enabled.
    pub verbose: bool,
    /// Merged configuration.
    pub config: CalrissianConfig,
    /// Cluster settings with command-line overrides applied.
    pub cluster: ClusterSection,
}

impl Context {
    /// Connect to the API server.
    ///
    /// Returns the cluster handle and the namespace jobs run in.
    pub fn connect(&self) -> Result<(SharedCluster, String)> {
        let connection = calrissian_config::resolve_connection(&self.cluster)
            .context("resolving cluster connection")?;
        tracing::debug!(?connection, "Resolved cluster connection");

        let mut builder = KubeClient::builder()
            .base_url(&connection.server)
            .accept_invalid_certs(connection.insecure)
            .timeout(Duration::from_secs(self.cluster.timeout_secs));
        if let Some(token) = &connection.token {
            builder = builder.bearer_token(token);
        }
        if let Some(ca) = &connection.ca_pem {
            builder = builder.ca_certificate(ca.clone());
        }
        if let Some(identity) = &connection.identity_pem {
            builder = builder.client_identity(identity.clone());
        }

        let client = builder.build().context("building API client")?;
        Ok((Arc::new(client), connection.namespace))
    }

    /// Connect and bind to the execution namespace.
    pub fn runtime_context(&self) -> Result<CalrissianContext> {
        let (cluster, namespace) = self.connect()?;
        Ok(CalrissianContext::from_settings(
            cluster,
            namespace,
            &self.config.context(),
        ))
    }

    /// Attach to an existing job.
    pub fn attach(&self, job_name: &str) -> Result<CalrissianExecution> {
        Ok(CalrissianExecution::attach(job_name, self.runtime_context()?))
    }

    /// Namespace to use without contacting the cluster.
    pub fn offline_namespace(&self) -> String {
        self.cluster
            .namespace
            .clone()
            .unwrap_or_else(|| DEFAULT_NAMESPACE.to_string())
    }

    /// Monitor interval: the flag if given, else the config.
    pub fn monitor_interval(&self, flag: Option<u64>) -> Duration {
        Duration::from_secs(flag.unwrap_or(self.config.monitor().interval_secs))
    }

    /// Monitor timeout: the flag if given, else the config.
    pub fn monitor_timeout(&self, flag: Option<u64>) -> Option<Duration> {
        flag.or(self.config.monitor().timeout_secs)
            .map(Duration::from_secs)
    }
}

/// Print a value as pretty JSON.
pub fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
