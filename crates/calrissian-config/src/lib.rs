//! Configuration system for Calrissian.
//!
//! Provides TOML-based configuration with:
//! - Job defaults (`[job]`): runner image, resources, tolerations
//! - Execution namespace resources (`[context]`)
//! - Workspace discovery settings (`[workspace]`)
//! - Config layering (user file, project file, `CALRISSIAN_*` environment)
//!   with the layer that set each section recorded
//!
//! Cluster connection (kubeconfig or in-cluster service account):
//! - Named contexts resolved to server, CA and a token or client certificate
//! - `current-context` for default selection

pub mod discovery;
pub mod error;
pub mod kubeconfig;
pub mod types;

pub use discovery::{
    apply_env_overrides, config_dir, load_config, load_config_file, load_config_from,
    load_config_with_options, project_config_path, save_config, user_config_path, ConfigLayer,
    LayerKind, LoadedConfig, Section,
};
pub use error::{ConfigError, Result};
pub use kubeconfig::{
    default_kubeconfig_path, expand_path, resolve_connection, ClusterConnection, Kubeconfig,
    DEFAULT_NAMESPACE,
};
pub use types::*;
