//! Config layers: files, then `CALRISSIAN_*` environment overrides.
//!
//! Resolution order (later overrides earlier):
//! 1. `~/.config/calrissian/config.toml` (user config)
//! 2. `./calrissian.toml` (project-local), or a single `--config` file
//! 3. `CALRISSIAN_*` environment variables
//! 4. CLI arguments (handled externally)
//!
//! File layers replace whole sections. The environment layer edits single
//! fields of the section it touches.

use std::fmt;
use std::path::{Path, PathBuf};

use crate::{CalrissianConfig, ConfigError, Result};

/// Default config filename for project-local config.
const PROJECT_CONFIG_FILE: &str = "calrissian.toml";

/// Default config filename within the user config directory.
const USER_CONFIG_FILE: &str = "config.toml";

/// Application name for config directory resolution.
const APP_NAME: &str = "calrissian";

/// Environment variable to override the config directory.
const CONFIG_DIR_ENV: &str = "CALRISSIAN_CONFIG_DIR";

/// Environment variables read by the environment layer.
pub const ENV_KUBECONFIG: &str = "CALRISSIAN_KUBECONFIG";
pub const ENV_KUBE_CONTEXT: &str = "CALRISSIAN_KUBE_CONTEXT";
pub const ENV_IN_CLUSTER: &str = "CALRISSIAN_IN_CLUSTER";
pub const ENV_WDIR_CLAIM: &str = "CALRISSIAN_WDIR_CLAIM";
pub const ENV_SERVICE_ACCOUNT: &str = "CALRISSIAN_SERVICE_ACCOUNT";
pub const ENV_STORAGE_CLASS: &str = "CALRISSIAN_STORAGE_CLASS";
pub const ENV_MONITOR_INTERVAL: &str = "CALRISSIAN_MONITOR_INTERVAL";

/// Config sections, as named in the TOML schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Section {
    Cluster,
    Context,
    Job,
    Workspace,
    Monitor,
}

impl Section {
    pub fn as_str(self) -> &'static str {
        match self {
            Section::Cluster => "cluster",
            Section::Context => "context",
            Section::Job => "job",
            Section::Workspace => "workspace",
            Section::Monitor => "monitor",
        }
    }
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a layer comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayerKind {
    User,
    Project,
    /// A file named with `--config`.
    File,
    Environment,
}

/// One config layer and the sections it set.
#[derive(Debug, Clone)]
pub struct ConfigLayer {
    pub kind: LayerKind,
    /// File path; `None` for the environment layer.
    pub path: Option<PathBuf>,
    /// Whether the layer contributed anything.
    pub loaded: bool,
    pub sections: Vec<Section>,
}

impl ConfigLayer {
    fn file(kind: LayerKind, path: &Path) -> Self {
        Self {
            kind,
            path: Some(path.to_path_buf()),
            loaded: false,
            sections: Vec::new(),
        }
    }
}

impl fmt::Display for ConfigLayer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.path {
            Some(path) => write!(f, "{}", path.display()),
            None => f.write_str("environment"),
        }
    }
}

/// Result of config discovery and loading.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    /// The merged configuration.
    pub config: CalrissianConfig,
    /// Layers in order of precedence (lowest first).
    pub layers: Vec<ConfigLayer>,
    /// Warnings generated during loading (unreadable files, bad env values).
    pub warnings: Vec<String>,
}

impl LoadedConfig {
    /// Paths of file layers that were actually loaded.
    pub fn loaded_from(&self) -> Vec<&Path> {
        self.layers
            .iter()
            .filter(|l| l.loaded)
            .filter_map(|l| l.path.as_deref())
            .collect()
    }

    /// The layer that last set a section, `None` when it is all defaults.
    pub fn origin(&self, section: Section) -> Option<&ConfigLayer> {
        self.layers
            .iter()
            .rev()
            .find(|l| l.sections.contains(&section))
    }
}

/// Discover and merge all layers, reading the process environment.
pub fn load_config(project_dir: Option<&Path>) -> Result<LoadedConfig> {
    load_config_with_options(project_dir, None, |name| std::env::var(name).ok())
}

/// Load configuration with explicit control over the user config directory
/// and the environment.
///
/// `config_dir` overrides both `CALRISSIAN_CONFIG_DIR` and the platform default.
pub fn load_config_with_options(
    project_dir: Option<&Path>,
    config_dir: Option<&Path>,
    env: impl Fn(&str) -> Option<String>,
) -> Result<LoadedConfig> {
    let mut loaded = LoadedConfig {
        config: CalrissianConfig::new(),
        layers: Vec::new(),
        warnings: Vec::new(),
    };

    let user_config_path = match config_dir {
        Some(dir) => Some(dir.join(USER_CONFIG_FILE)),
        None => user_config_path(),
    };
    if let Some(path) = user_config_path {
        load_layer(&mut loaded, LayerKind::User, &path);
    }
    load_layer(&mut loaded, LayerKind::Project, &project_config_path(project_dir));
    apply_env_layer(&mut loaded, env);

    Ok(loaded)
}

/// Load one explicit file, then the environment layer. No discovery.
pub fn load_config_from(
    path: &Path,
    env: impl Fn(&str) -> Option<String>,
) -> Result<LoadedConfig> {
    let config = load_config_file(path)?;
    let mut layer = ConfigLayer::file(LayerKind::File, path);
    layer.loaded = true;
    layer.sections = sections_of(&config);

    let mut loaded = LoadedConfig {
        config,
        layers: vec![layer],
        warnings: Vec::new(),
    };
    apply_env_layer(&mut loaded, env);
    Ok(loaded)
}

/// Load config from a specific file path.
pub fn load_config_file(path: &Path) -> Result<CalrissianConfig> {
    let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.display().to_string(),
        source: e,
    })?;
    CalrissianConfig::from_toml(&contents)
}

/// Write configuration to a new file, creating parent directories.
///
/// An existing file is left untouched unless `overwrite` is set.
pub fn save_config(config: &CalrissianConfig, path: &Path, overwrite: bool) -> Result<()> {
    if !overwrite && path.exists() {
        return Err(ConfigError::FileExists(path.display().to_string()));
    }
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent).map_err(|e| ConfigError::WriteFile {
            path: parent.display().to_string(),
            source: e,
        })?;
    }

    let contents = config.to_toml()?;
    std::fs::write(path, contents).map_err(|e| ConfigError::WriteFile {
        path: path.display().to_string(),
        source: e,
    })?;

    Ok(())
}

/// Path of the project config file in `project_dir`, or the working directory.
pub fn project_config_path(project_dir: Option<&Path>) -> PathBuf {
    project_dir
        .map(|d| d.join(PROJECT_CONFIG_FILE))
        .unwrap_or_else(|| PathBuf::from(PROJECT_CONFIG_FILE))
}

/// Path of the user config file.
pub fn user_config_path() -> Option<PathBuf> {
    config_dir().map(|d| d.join(USER_CONFIG_FILE))
}

/// The calrissian config directory.
///
/// Checks `CALRISSIAN_CONFIG_DIR` first, then falls back to the platform
/// default (`~/.config/calrissian` on Linux).
pub fn config_dir() -> Option<PathBuf> {
    if let Ok(dir) = std::env::var(CONFIG_DIR_ENV)
        && !dir.is_empty()
    {
        return Some(PathBuf::from(dir));
    }
    dirs::config_dir().map(|d| d.join(APP_NAME))
}

fn sections_of(config: &CalrissianConfig) -> Vec<Section> {
    [
        (config.cluster.is_some(), Section::Cluster),
        (config.context.is_some(), Section::Context),
        (config.job.is_some(), Section::Job),
        (config.workspace.is_some(), Section::Workspace),
        (config.monitor.is_some(), Section::Monitor),
    ]
    .into_iter()
    .filter_map(|(set, section)| set.then_some(section))
    .collect()
}

/// Try to load a config file and merge it into the existing config.
fn load_layer(loaded: &mut LoadedConfig, kind: LayerKind, path: &Path) {
    let mut layer = ConfigLayer::file(kind, path);
    if path.is_file() {
        match load_config_file(path) {
            Ok(config) => {
                layer.loaded = true;
                layer.sections = sections_of(&config);
                loaded.config.merge(config);
            }
            Err(e) => loaded
                .warnings
                .push(format!("Failed to load {}: {}", path.display(), e)),
        }
    }
    loaded.layers.push(layer);
}

fn apply_env_layer(loaded: &mut LoadedConfig, env: impl Fn(&str) -> Option<String>) {
    let (sections, warnings) = apply_env_overrides(&mut loaded.config, env);
    loaded.warnings.extend(warnings);
    loaded.layers.push(ConfigLayer {
        kind: LayerKind::Environment,
        path: None,
        loaded: !sections.is_empty(),
        sections,
    });
}

/// Apply `CALRISSIAN_*` overrides on top of `config`.
///
/// Returns the sections that changed and a warning per value that could not
/// be used. Empty variables are ignored.
pub fn apply_env_overrides(
    config: &mut CalrissianConfig,
    env: impl Fn(&str) -> Option<String>,
) -> (Vec<Section>, Vec<String>) {
    let var = |name: &str| env(name).filter(|v| !v.trim().is_empty());
    let mut sections = Vec::new();
    let mut warnings = Vec::new();

    let mut cluster = config.cluster();
    let mut cluster_set = false;
    if let Some(path) = var(ENV_KUBECONFIG) {
        cluster.kubeconfig = Some(PathBuf::from(path));
        cluster_set = true;
    }
    if let Some(context) = var(ENV_KUBE_CONTEXT) {
        cluster.context = Some(context);
        cluster_set = true;
    }
    if let Some(value) = var(ENV_IN_CLUSTER) {
        match parse_bool(&value) {
            Some(in_cluster) => {
                cluster.in_cluster = in_cluster;
                cluster_set = true;
            }
            None => warnings.push(format!(
                "Ignoring {}={:?}: expected true or false",
                ENV_IN_CLUSTER, value
            )),
        }
    }
    if cluster_set {
        config.cluster = Some(cluster);
        sections.push(Section::Cluster);
    }

    let mut context = config.context();
    let mut context_set = false;
    if let Some(claim) = var(ENV_WDIR_CLAIM) {
        context.wdir_claim = claim;
        context_set = true;
    }
    if let Some(account) = var(ENV_SERVICE_ACCOUNT) {
        context.service_account = account;
        context_set = true;
    }
    if let Some(class) = var(ENV_STORAGE_CLASS) {
        context.storage_class = Some(class);
        context_set = true;
    }
    if context_set {
        config.context = Some(context);
        sections.push(Section::Context);
    }

    if let Some(value) = var(ENV_MONITOR_INTERVAL) {
        match value.trim().parse::<u64>() {
            Ok(secs) if secs > 0 => {
                let mut monitor = config.monitor();
                monitor.interval_secs = secs;
                config.monitor = Some(monitor);
                sections.push(Section::Monitor);
            }
            _ => warnings.push(format!(
                "Ignoring {}={:?}: expected a positive number of seconds",
                ENV_MONITOR_INTERVAL, value
            )),
        }
    }

    (sections, warnings)
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
