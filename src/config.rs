//! Configuration management with layered loading
//!
//! Precedence (lowest to highest):
//! 1. Compiled defaults
//! 2. Global config: `$XDG_CONFIG_HOME/acctree/acctree.toml`
//! 3. Local config: `<project_dir>/.acctree.toml`
//! 4. Environment variables: `ACCTREE_*` prefix

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use config::{Config, ConfigError, Environment};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::application::ApplicationError;
use crate::domain::{ComboFailurePolicy, DuplicatePolicy};

/// Raw settings for intermediate parsing.
///
/// `None` means "not specified in this layer, inherit from the one below".
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct RawSettings {
    pub optics_path: Option<PathBuf>,
    pub duplicate_policy: Option<DuplicatePolicy>,
    pub combo_failure_policy: Option<ComboFailurePolicy>,
    pub node_types: Option<BTreeMap<String, Vec<String>>>,
}

/// Unified configuration for acctree.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(default)]
pub struct Settings {
    /// Default optics document to load
    pub optics_path: Option<PathBuf>,
    /// Handling of nodes added under an id their sequence already holds
    pub duplicate_policy: DuplicatePolicy,
    /// Handling of combo sequences that fail to instantiate
    pub combo_failure_policy: ComboFailurePolicy,
    /// Extra element types: tag -> kind lineage
    pub node_types: BTreeMap<String, Vec<String>>,
}

/// Get the XDG config directory for acctree.
pub fn global_config_dir() -> Option<PathBuf> {
    ProjectDirs::from("", "", "acctree").map(|dirs| dirs.config_dir().to_path_buf())
}

/// Get the path to the global config file.
pub fn global_config_path() -> Option<PathBuf> {
    global_config_dir().map(|dir| dir.join("acctree.toml"))
}

/// Get the path to the local config file in a project directory.
pub fn local_config_path(project_dir: &Path) -> PathBuf {
    project_dir.join(".acctree.toml")
}

/// Load a TOML file into RawSettings for manual merging.
fn load_raw_settings(path: &Path) -> Result<RawSettings, ApplicationError> {
    let content = std::fs::read_to_string(path).map_err(|e| ApplicationError::Config {
        message: format!("read {}: {}", path.display(), e),
    })?;
    toml::from_str(&content).map_err(|e| ApplicationError::Config {
        message: format!("parse {}: {}", path.display(), e),
    })
}

impl Settings {
    /// Expand `~`, `$VAR` and `${VAR}` in path-like fields.
    fn expand_paths(&mut self) {
        if let Some(path) = &self.optics_path {
            let raw = path.to_string_lossy();
            let expanded = shellexpand::full(raw.as_ref())
                .map(|s| s.into_owned())
                .unwrap_or_else(|_| raw.to_string());
            self.optics_path = Some(PathBuf::from(expanded));
        }
    }

    /// Apply global config onto defaults.
    ///
    /// Node types given globally replace the compiled (empty) set.
    fn apply_global(&self, global: &RawSettings) -> Self {
        Self {
            optics_path: global.optics_path.clone().or_else(|| self.optics_path.clone()),
            duplicate_policy: global.duplicate_policy.unwrap_or(self.duplicate_policy),
            combo_failure_policy: global
                .combo_failure_policy
                .unwrap_or(self.combo_failure_policy),
            node_types: global
                .node_types
                .clone()
                .unwrap_or_else(|| self.node_types.clone()),
        }
    }

    /// Merge local config onto self.
    ///
    /// Node types are merged per tag, the local lineage winning.
    fn merge_with(&self, overlay: &RawSettings) -> Self {
        let mut node_types = self.node_types.clone();
        if let Some(local) = &overlay.node_types {
            node_types.extend(local.clone());
        }
        Self {
            optics_path: overlay.optics_path.clone().or_else(|| self.optics_path.clone()),
            duplicate_policy: overlay.duplicate_policy.unwrap_or(self.duplicate_policy),
            combo_failure_policy: overlay
                .combo_failure_policy
                .unwrap_or(self.combo_failure_policy),
            node_types,
        }
    }

    /// Load settings with layered precedence.
    ///
    /// # Arguments
    /// * `project_dir` - Optional directory holding a `.acctree.toml`
    pub fn load(project_dir: Option<&Path>) -> Result<Self, ApplicationError> {
        let mut current = Self::default();

        if let Some(global_path) = global_config_path() {
            if global_path.exists() {
                let raw = load_raw_settings(&global_path)?;
                current = current.apply_global(&raw);
            }
        }

        if let Some(dir) = project_dir {
            let local_path = local_config_path(dir);
            if local_path.exists() {
                let raw = load_raw_settings(&local_path)?;
                current = current.merge_with(&raw);
            }
        }

        current = Self::apply_env_overrides(current, Self::environment())?;
        current.expand_paths();

        Ok(current)
    }

    fn environment() -> Environment {
        Environment::with_prefix("ACCTREE").separator("__")
    }

    /// Apply ACCTREE_* environment variables as explicit overrides.
    fn apply_env_overrides(mut settings: Self, env: Environment) -> Result<Self, ApplicationError> {
        let config = Config::builder()
            .add_source(env)
            .build()
            .map_err(config_err)?;

        if let Ok(val) = config.get_string("optics_path") {
            settings.optics_path = Some(PathBuf::from(val));
        }
        if let Ok(val) = config.get_string("duplicate_policy") {
            settings.duplicate_policy = val
                .parse()
                .map_err(|message| ApplicationError::Config { message })?;
        }
        if let Ok(val) = config.get_string("combo_failure_policy") {
            settings.combo_failure_policy = val
                .parse()
                .map_err(|message| ApplicationError::Config { message })?;
        }

        Ok(settings)
    }

    /// Show the effective configuration as TOML.
    pub fn to_toml(&self) -> Result<String, ApplicationError> {
        toml::to_string_pretty(self).map_err(|e| ApplicationError::Config {
            message: format!("serialize config: {e}"),
        })
    }

    /// Generate a template config file.
    pub fn template() -> String {
        r#"# acctree configuration
#
# Locations (by precedence, lowest to highest):
#   Global: ~/.config/acctree/acctree.toml
#   Local:  <project_dir>/.acctree.toml
#   Env:    ACCTREE_* environment variables

# Optics document loaded by default
# optics_path = "~/optics/main.toml"

# Nodes sharing an id within one sequence: "shadow" or "reject"
# duplicate_policy = "shadow"

# Combo sequences that fail to build: "omit" (log and skip) or "fail"
# combo_failure_policy = "omit"

# Extra element types and their kind lineage
[node_types]
# Wiggler = ["magnet", "node"]
"#
        .to_string()
    }
}

fn config_err(e: ConfigError) -> ApplicationError {
    ApplicationError::Config {
        message: e.to_string(),
    }
}
