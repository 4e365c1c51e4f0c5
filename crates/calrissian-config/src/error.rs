//! Configuration error types.

/// Result type alias for config operations.
pub type Result<T> = std::result::Result<T, ConfigError>;

/// Errors that can occur during configuration loading and resolution.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read a config file.
    #[error("failed to read config file '{path}': {source}")]
    ReadFile {
        path: String,
        source: std::io::Error,
    },

    /// Failed to write a config file.
    #[error("failed to write config file '{path}': {source}")]
    WriteFile {
        path: String,
        source: std::io::Error,
    },

    /// Refused to replace an existing config file.
    #[error("config file '{0}' already exists")]
    FileExists(String),

    /// Failed to parse TOML.
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// Failed to serialize config.
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// Failed to parse YAML.
    #[error("failed to parse kubeconfig: {0}")]
    ParseYaml(String),

    /// No kubeconfig could be located.
    #[error("no kubeconfig found; set KUBECONFIG, create ~/.kube/config or use --in-cluster")]
    NoKubeconfig,

    /// Context not found.
    #[error("context '{0}' not found in kubeconfig")]
    ContextNotFound(String),

    /// No current context selected.
    #[error("kubeconfig has no current-context and none was requested")]
    NoCurrentContext,

    /// Cluster referenced by a context not found.
    #[error("cluster '{name}' not found (referenced by context '{context}')")]
    ClusterNotFound { name: String, context: String },

    /// User referenced by a context not found.
    #[error("user '{name}' not found (referenced by context '{context}')")]
    UserNotFound { name: String, context: String },

    /// A kubeconfig user authenticates in a way the client cannot.
    #[error("kubeconfig user '{user}' is not supported: {method}")]
    UnsupportedAuth { user: String, method: String },

    /// Not running inside a pod.
    #[error("not running in a cluster: {0} is not set")]
    NotInCluster(String),

    /// Invalid base64-encoded data.
    #[error("invalid base64 in '{field}': {message}")]
    InvalidBase64 { field: String, message: String },

    /// Other error.
    #[error("{0}")]
    Other(String),
}
