//! Configuration file discovery and loading.
//!
//! This module handles finding and loading configuration files from
//! various locations in the correct priority order.

use crate::config::merger::merge_configs;
use crate::config::schema::PrimerConfig;
use crate::config::validator::validate;
use crate::error::{PrimerError, Result};
use std::fs;
use std::path::{Path, PathBuf};

/// Directory holding project configuration.
pub const CONFIG_DIR: &str = ".primer";

const BUILTIN_CONFIG: &str = include_str!("default.yml");

/// Paths to configuration files in priority order (later overrides earlier).
///
/// Merge order:
/// 1. Project config (`.primer/config.yml`)
/// 2. Local overrides (`.primer/config.local.yml`)
#[derive(Debug, Clone)]
pub struct ConfigPaths {
    /// Project config: .primer/config.yml
    pub project: Option<PathBuf>,

    /// Local overrides: .primer/config.local.yml
    pub project_local: Option<PathBuf>,
}

impl ConfigPaths {
    /// Discover config files for the given project root.
    pub fn discover(project_root: &Path) -> Self {
        Self {
            project: existing(project_root.join(CONFIG_DIR).join("config.yml")),
            project_local: existing(project_root.join(CONFIG_DIR).join("config.local.yml")),
        }
    }

    /// Returns all existing config paths in merge order.
    pub fn all_existing(&self) -> Vec<&PathBuf> {
        self.project.iter().chain(&self.project_local).collect()
    }

    /// Check if any project config exists.
    pub fn has_project_config(&self) -> bool {
        self.project.is_some()
    }
}

fn existing(path: PathBuf) -> Option<PathBuf> {
    path.exists().then_some(path)
}

/// Where the effective configuration came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    /// A file given with `--config`.
    Explicit(PathBuf),
    /// `.primer/config.yml` followed by any local overrides, in merge order.
    Project(Vec<PathBuf>),
    /// The built-in default.
    Builtin,
}

impl ConfigSource {
    /// Files whose modification invalidates the whole-environment marker.
    pub fn fingerprint_paths(&self) -> &[PathBuf] {
        match self {
            Self::Explicit(path) => std::slice::from_ref(path),
            Self::Project(paths) => paths,
            Self::Builtin => &[],
        }
    }

    /// Short description for status output.
    pub fn describe(&self) -> String {
        match self {
            Self::Explicit(path) => path.display().to_string(),
            Self::Project(paths) => paths
                .iter()
                .map(|p| p.display().to_string())
                .collect::<Vec<_>>()
                .join(" + "),
            Self::Builtin => "built-in default".to_string(),
        }
    }
}

/// A validated configuration and its origin.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config: PrimerConfig,
    pub source: ConfigSource,
}

/// Load a single config file and parse it into PrimerConfig.
///
/// # Errors
///
/// Returns `ConfigNotFound` if the file doesn't exist.
/// Returns `ConfigParseError` if the YAML is invalid.
pub fn load_config_file(path: &Path) -> Result<PrimerConfig> {
    let content = read_config(path)?;
    parse_config(&content, path)
}

/// Parse YAML content into PrimerConfig.
///
/// # Arguments
///
/// * `content` - The YAML content to parse
/// * `source_path` - Path for error reporting
pub fn parse_config(content: &str, source_path: &Path) -> Result<PrimerConfig> {
    serde_yaml::from_str(content).map_err(|e| PrimerError::ConfigParseError {
        path: source_path.to_path_buf(),
        message: e.to_string(),
    })
}

/// Load a config file as raw YAML Value (for merging).
pub fn load_config_value(path: &Path) -> Result<serde_yaml::Value> {
    let content = read_config(path)?;

    let value: serde_yaml::Value =
        serde_yaml::from_str(&content).map_err(|e| PrimerError::ConfigParseError {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

    // An empty file parses to null; treat it as "no changes".
    if value.is_null() {
        return Ok(serde_yaml::Value::Mapping(Default::default()));
    }
    Ok(value)
}

fn read_config(path: &Path) -> Result<String> {
    fs::read_to_string(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            PrimerError::ConfigNotFound {
                path: path.to_path_buf(),
            }
        } else {
            PrimerError::Io(e)
        }
    })
}

/// Load and merge the project config with its local overrides.
///
/// # Errors
///
/// Returns `ConfigNotFound` if no project config exists.
/// Returns `ConfigParseError` if any config file is invalid.
pub fn load_merged_config(project_root: &Path) -> Result<PrimerConfig> {
    merge_discovered(project_root, &ConfigPaths::discover(project_root))
}

fn merge_discovered(project_root: &Path, paths: &ConfigPaths) -> Result<PrimerConfig> {
    if !paths.has_project_config() {
        return Err(PrimerError::ConfigNotFound {
            path: project_root.join(CONFIG_DIR).join("config.yml"),
        });
    }

    let mut configs = Vec::new();
    for path in paths.all_existing() {
        configs.push(load_config_value(path)?);
    }

    let merged = merge_configs(&configs);

    serde_yaml::from_value(merged).map_err(|e| PrimerError::ConfigParseError {
        path: project_root.join(CONFIG_DIR),
        message: e.to_string(),
    })
}

/// The built-in bootstrap configuration.
pub fn builtin_config() -> Result<PrimerConfig> {
    parse_config(BUILTIN_CONFIG, Path::new("<builtin>"))
}

/// Load the effective configuration for a project.
///
/// An explicit path wins; otherwise the project config (with local
/// overrides) is used; otherwise the built-in default. The result is
/// validated.
pub fn load_config(project_root: &Path, explicit: Option<&Path>) -> Result<LoadedConfig> {
    let paths = ConfigPaths::discover(project_root);

    let loaded = if let Some(path) = explicit {
        let path = if path.is_relative() {
            project_root.join(path)
        } else {
            path.to_path_buf()
        };
        LoadedConfig {
            config: load_config_file(&path)?,
            source: ConfigSource::Explicit(path),
        }
    } else if paths.has_project_config() {
        LoadedConfig {
            config: merge_discovered(project_root, &paths)?,
            source: ConfigSource::Project(paths.all_existing().into_iter().cloned().collect()),
        }
    } else {
        tracing::debug!("No project config found; using built-in default");
        LoadedConfig {
            config: builtin_config()?,
            source: ConfigSource::Builtin,
        }
    };

    validate(&loaded.config)?;
    Ok(loaded)
}
