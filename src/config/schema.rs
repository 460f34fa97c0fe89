//! Configuration schema definitions for primer.
//!
//! This module contains all the struct definitions that map to
//! the YAML configuration file format.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;

/// Root configuration structure for `.primer/config.yml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PrimerConfig {
    /// Global settings
    pub settings: Settings,

    /// GPU detection and exports
    pub gpu: GpuConfig,

    /// Declared task order (defaults to alphabetical)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sequence: Vec<String>,

    /// Task definitions
    #[serde(default)]
    pub tasks: HashMap<String, TaskConfig>,
}

impl PrimerConfig {
    /// Task names in execution order.
    pub fn ordered_task_names(&self) -> Vec<String> {
        if !self.sequence.is_empty() {
            return self.sequence.clone();
        }
        let mut names: Vec<String> = self.tasks.keys().cloned().collect();
        names.sort();
        names
    }
}

/// Global settings that apply to every task
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Directory for markers (relative to project root)
    #[serde(default = "default_state_dir")]
    pub state_dir: PathBuf,

    /// Readiness file (defaults to `<state_dir>/ready`)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub readiness_file: Option<PathBuf>,

    /// Per-task timeout in seconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task_timeout: Option<u64>,

    /// Environment variables passed to every invocation
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub env: HashMap<String, String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            state_dir: default_state_dir(),
            readiness_file: None,
            task_timeout: None,
            env: HashMap::new(),
        }
    }
}

impl Settings {
    /// Readiness file path (relative paths are resolved by the caller).
    pub fn readiness_path(&self) -> PathBuf {
        self.readiness_file
            .clone()
            .unwrap_or_else(|| self.state_dir.join("ready"))
    }
}

fn default_state_dir() -> PathBuf {
    PathBuf::from(".primer")
}

fn default_true() -> bool {
    true
}

fn is_true(v: &bool) -> bool {
    *v
}

/// Where to probe for a GPU and what a present GPU exports
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GpuConfig {
    /// Device nodes that prove a GPU is passed through
    pub device_paths: Vec<PathBuf>,

    /// Driver-info directories that prove a loaded driver
    pub driver_paths: Vec<PathBuf>,

    /// Introspection tool
    pub query_tool: String,

    /// Environment exported to every task when a GPU is present
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub env: BTreeMap<String, String>,
}

impl Default for GpuConfig {
    fn default() -> Self {
        let probe = crate::detection::GpuProbe::default();
        Self {
            device_paths: probe.device_paths,
            driver_paths: probe.driver_paths,
            query_tool: probe.query_tool,
            env: BTreeMap::from([
                ("NVIDIA_VISIBLE_DEVICES".to_string(), "all".to_string()),
                (
                    "NVIDIA_DRIVER_CAPABILITIES".to_string(),
                    "compute,utility".to_string(),
                ),
            ]),
        }
    }
}

/// Configuration for a single setup task
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TaskConfig {
    /// Display title
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    /// Independence group; tasks in one group run in order, groups run in parallel
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,

    /// Capability the whole task needs
    #[serde(skip_serializing_if = "Option::is_none")]
    pub requires: Option<String>,

    /// Input file whose modification invalidates the task marker
    #[serde(skip_serializing_if = "Option::is_none")]
    pub watch: Option<PathBuf>,

    /// Record and honor a marker for this task
    #[serde(default = "default_true", skip_serializing_if = "is_true")]
    pub cache: bool,

    /// Check that proves the work is already done
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skip_if: Option<SkipCheck>,

    /// Timeout in seconds (overrides settings.task_timeout)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,

    /// Environment variables for every step of this task
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub env: HashMap<String, String>,

    /// Ordered steps
    #[serde(default)]
    pub steps: Vec<StepConfig>,
}

impl Default for TaskConfig {
    fn default() -> Self {
        Self {
            title: None,
            group: None,
            requires: None,
            watch: None,
            cache: true,
            skip_if: None,
            timeout: None,
            env: HashMap::new(),
            steps: Vec::new(),
        }
    }
}

/// One step of a task. Exactly one of `run`, `shell` or `append_profile`
/// must be set.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StepConfig {
    /// Program and arguments
    #[serde(skip_serializing_if = "Option::is_none")]
    pub run: Option<Vec<String>>,

    /// Script for the user's shell
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shell: Option<String>,

    /// Line to add to a shell init file if missing
    #[serde(skip_serializing_if = "Option::is_none")]
    pub append_profile: Option<String>,

    /// Init file for `append_profile` (defaults to the current shell's)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile: Option<PathBuf>,

    /// Working directory (relative to project root)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cwd: Option<PathBuf>,

    /// Capability this step needs; the step is skipped without it
    #[serde(skip_serializing_if = "Option::is_none")]
    pub requires: Option<String>,

    /// Extra environment variables for this step
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub env: HashMap<String, String>,
}

/// Check that proves a task's work is already done.
///
/// Evaluated before any external tool runs, so warm restarts avoid
/// redundant network and package operations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SkipCheck {
    /// A file or directory exists
    FileExists {
        /// Path to check (relative to project root)
        path: PathBuf,
    },

    /// A directory exists and has at least one entry
    DirPopulated {
        /// Directory to check (relative to project root)
        path: PathBuf,
    },

    /// A program exits with status 0
    CommandSucceeds {
        /// Program and arguments
        run: Vec<String>,
    },

    /// All checks must pass
    All {
        /// Checks that must all pass
        checks: Vec<SkipCheck>,
    },

    /// Any check passing is sufficient
    Any {
        /// Checks where at least one must pass
        checks: Vec<SkipCheck>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_full_task() {
        let yaml = r#"
settings:
  task_timeout: 600
sequence: [python]
tasks:
  python:
    group: runtimes
    watch: requirements.txt
    skip_if:
      type: dir_populated
      path: .venv/lib
    steps:
      - run: [python3, -m, venv, .venv]
      - shell: ".venv/bin/pip install -r requirements.txt"
      - run: [.venv/bin/pip, install, nvidia-ml-py]
        requires: gpu
      - append_profile: 'source "$PWD/.venv/bin/activate"'
        profile: ~/.bashrc
"#;
        let config: PrimerConfig = serde_yaml::from_str(yaml).unwrap();
        let task = &config.tasks["python"];

        assert_eq!(config.settings.task_timeout, Some(600));
        assert_eq!(task.group.as_deref(), Some("runtimes"));
        assert!(task.cache);
        assert_eq!(
            task.skip_if,
            Some(SkipCheck::DirPopulated {
                path: PathBuf::from(".venv/lib")
            })
        );
        assert_eq!(task.steps.len(), 4);
        assert_eq!(task.steps[2].requires.as_deref(), Some("gpu"));
        assert_eq!(task.steps[3].profile, Some(PathBuf::from("~/.bashrc")));
    }

    #[test]
    fn defaults_apply_to_empty_config() {
        let config: PrimerConfig = serde_yaml::from_str("{}").unwrap();

        assert_eq!(config.settings.state_dir, PathBuf::from(".primer"));
        assert_eq!(
            config.settings.readiness_path(),
            PathBuf::from(".primer/ready")
        );
        assert_eq!(config.gpu.query_tool, "nvidia-smi");
        assert_eq!(config.gpu.env["NVIDIA_VISIBLE_DEVICES"], "all");
        assert!(config.tasks.is_empty());
    }

    #[test]
    fn nested_skip_checks_parse() {
        let yaml = r#"
type: any
checks:
  - type: file_exists
    path: obj/project.assets.json
  - type: command_succeeds
    run: [dotnet, --version]
"#;
        let check: SkipCheck = serde_yaml::from_str(yaml).unwrap();
        match check {
            SkipCheck::Any { checks } => assert_eq!(checks.len(), 2),
            other => panic!("unexpected check: {:?}", other),
        }
    }

    #[test]
    fn ordered_names_fall_back_to_sorted_keys() {
        let mut config = PrimerConfig::default();
        config.tasks.insert("zeta".into(), TaskConfig::default());
        config.tasks.insert("alpha".into(), TaskConfig::default());

        assert_eq!(config.ordered_task_names(), vec!["alpha", "zeta"]);

        config.sequence = vec!["zeta".into(), "alpha".into()];
        assert_eq!(config.ordered_task_names(), vec!["zeta", "alpha"]);
    }

    #[test]
    fn cache_flag_round_trips_only_when_disabled() {
        let task = TaskConfig {
            cache: false,
            ..Default::default()
        };
        let yaml = serde_yaml::to_string(&task).unwrap();
        assert!(yaml.contains("cache: false"));

        let yaml = serde_yaml::to_string(&TaskConfig::default()).unwrap();
        assert!(!yaml.contains("cache"));
    }
}
