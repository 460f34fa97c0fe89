//! Task model built from configuration.
//!
//! Tasks are resolved once at startup: paths are made absolute against the
//! project root and timeouts are settled, so the sequencer never looks at
//! configuration again.

use crate::config::{PrimerConfig, Settings, SkipCheck, StepConfig, TaskConfig};
use crate::error::{PrimerError, Result};
use crate::shell::{expand_path, shell_command, CommandSpec};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// What a step does.
#[derive(Debug, Clone, PartialEq)]
pub enum StepAction {
    /// Run a program with arguments.
    Run { program: String, args: Vec<String> },

    /// Run a script through the user's shell.
    Shell { script: String },

    /// Add a line to a shell init file if it is not there yet.
    ///
    /// `file` is `None` when the current shell's init file should be used.
    AppendProfile { file: Option<PathBuf>, line: String },
}

/// One step of a task.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskStep {
    pub action: StepAction,

    /// Capability the step needs; skipped without it.
    pub requires: Option<String>,

    /// Environment overrides for this step.
    pub env: HashMap<String, String>,

    /// Working directory (absolute).
    pub cwd: Option<PathBuf>,
}

impl TaskStep {
    /// Create a step with no requirements.
    pub fn new(action: StepAction) -> Self {
        Self {
            action,
            requires: None,
            env: HashMap::new(),
            cwd: None,
        }
    }

    /// Step that runs `program` with `args`.
    pub fn run<I, S>(program: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(StepAction::Run {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
        })
    }

    /// Require a capability.
    pub fn requires(mut self, tag: impl Into<String>) -> Self {
        self.requires = Some(tag.into());
        self
    }

    fn from_config(step: &StepConfig, project_root: &Path) -> Result<Self> {
        let action = if let Some(argv) = &step.run {
            let (program, args) = argv
                .split_first()
                .ok_or_else(|| PrimerError::ConfigValidationError {
                    message: "'run' must name a program".to_string(),
                })?;
            StepAction::Run {
                program: program.clone(),
                args: args.to_vec(),
            }
        } else if let Some(script) = &step.shell {
            StepAction::Shell {
                script: script.clone(),
            }
        } else if let Some(line) = &step.append_profile {
            StepAction::AppendProfile {
                file: step.profile.as_ref().map(|p| expand_path(p, project_root)),
                line: line.clone(),
            }
        } else {
            return Err(PrimerError::ConfigValidationError {
                message: "step must set one of 'run', 'shell' or 'append_profile'".to_string(),
            });
        };

        Ok(Self {
            action,
            requires: step.requires.clone(),
            env: step.env.clone(),
            cwd: step.cwd.as_ref().map(|p| expand_path(p, project_root)),
        })
    }

    /// Build the command for this step, or `None` for profile appends.
    ///
    /// `env` is the task's environment; step overrides are merged over it.
    pub fn command(&self, env: &HashMap<String, String>, default_cwd: &Path) -> Option<CommandSpec> {
        let spec = match &self.action {
            StepAction::Run { program, args } => CommandSpec::new(program).args(args.clone()),
            StepAction::Shell { script } => shell_command(script),
            StepAction::AppendProfile { .. } => return None,
        };

        Some(
            spec.envs(env)
                .envs(&self.env)
                .cwd(self.cwd.clone().unwrap_or_else(|| default_cwd.to_path_buf())),
        )
    }

    /// One-line description for dry runs and logs.
    pub fn describe(&self) -> String {
        match &self.action {
            StepAction::Run { program, args } => CommandSpec::new(program).args(args.clone()).display(),
            StepAction::Shell { script } => script.clone(),
            StepAction::AppendProfile { file, line } => match file {
                Some(file) => format!("append '{}' to {}", line, file.display()),
                None => format!("append '{}' to shell profile", line),
            },
        }
    }
}

/// A unit of setup work.
#[derive(Debug, Clone, PartialEq)]
pub struct Task {
    /// Unique name; also the task's marker key.
    pub name: String,

    /// Display title.
    pub title: Option<String>,

    /// Independence group (defaults to the task name).
    pub group: String,

    /// Capability the whole task needs.
    pub requires: Option<String>,

    /// Input whose modification invalidates the task marker (absolute).
    pub watch: Option<PathBuf>,

    /// Honor and record a per-task marker.
    pub cache: bool,

    /// Declarative "already done" check.
    pub skip_if: Option<SkipCheck>,

    /// Time budget for all steps together.
    pub timeout: Option<Duration>,

    /// Environment for every step.
    pub env: HashMap<String, String>,

    /// Ordered steps.
    pub steps: Vec<TaskStep>,
}

impl Task {
    /// Create a cached task in its own group with no steps.
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            group: name.clone(),
            name,
            title: None,
            requires: None,
            watch: None,
            cache: true,
            skip_if: None,
            timeout: None,
            env: HashMap::new(),
            steps: Vec::new(),
        }
    }

    /// Set the independence group.
    pub fn group(mut self, group: impl Into<String>) -> Self {
        self.group = group.into();
        self
    }

    /// Set the fingerprint source.
    pub fn watch(mut self, path: impl Into<PathBuf>) -> Self {
        self.watch = Some(path.into());
        self
    }

    /// Set the time budget.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Append a step.
    pub fn step(mut self, step: TaskStep) -> Self {
        self.steps.push(step);
        self
    }

    /// Resolve a configured task.
    pub fn from_config(
        name: &str,
        config: &TaskConfig,
        settings: &Settings,
        project_root: &Path,
    ) -> Result<Self> {
        let steps = config
            .steps
            .iter()
            .map(|step| TaskStep::from_config(step, project_root))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            name: name.to_string(),
            title: config.title.clone(),
            group: config.group.clone().unwrap_or_else(|| name.to_string()),
            requires: config.requires.clone(),
            watch: config.watch.as_ref().map(|p| expand_path(p, project_root)),
            cache: config.cache,
            skip_if: config.skip_if.clone(),
            timeout: config
                .timeout
                .or(settings.task_timeout)
                .map(Duration::from_secs),
            env: config.env.clone(),
            steps,
        })
    }

    /// Display name.
    pub fn display_name(&self) -> &str {
        self.title.as_deref().unwrap_or(&self.name)
    }

    /// Every capability tag this task or its steps reference.
    pub fn capability_tags(&self) -> impl Iterator<Item = &str> {
        self.requires
            .as_deref()
            .into_iter()
            .chain(self.steps.iter().filter_map(|s| s.requires.as_deref()))
    }
}

/// Resolve every configured task in execution order.
pub fn tasks_from_config(config: &PrimerConfig, project_root: &Path) -> Result<Vec<Task>> {
    config
        .ordered_task_names()
        .iter()
        .map(|name| {
            let task = config
                .tasks
                .get(name)
                .ok_or_else(|| PrimerError::ConfigValidationError {
                    message: format!("Task '{}' is not defined", name),
                })?;
            Task::from_config(name, task, &config.settings, project_root)
        })
        .collect()
}
