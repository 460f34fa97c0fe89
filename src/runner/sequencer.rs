//! Grouped, cached execution of setup tasks.

use crate::cache::{capture_all, Fingerprint, MarkerStore, Staleness, INITIALIZED_KEY};
use crate::detection::{CapabilitySet, FeatureDetector};
use crate::error::{PrimerError, Result};
use crate::runner::result::{RunResult, SequenceOutcome, TaskStatus};
use crate::runner::skip::{run_check, CheckContext};
use crate::runner::task::{StepAction, Task};
use crate::shell::{
    append_if_absent, detect_shell, AppendOutcome, CommandResult, CommandSpec, ToolInvoker,
    EXCERPT_LINES,
};
use std::collections::{HashMap, HashSet};
use std::env::VarError;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Environment variable lookup used for capability enrichment.
pub type EnvLookup = dyn Fn(&str) -> std::result::Result<String, VarError> + Send + Sync;

/// Options for one sequence run.
#[derive(Debug, Clone, Default)]
pub struct SequenceOptions {
    /// Ignore the global marker, per-task markers and skip checks.
    pub force: bool,
    /// Only run these tasks. A subset run never writes the global marker.
    pub only: Vec<String>,
    /// Timeout for every task, overriding configured ones.
    pub timeout: Option<Duration>,
}

/// What a run would do, without doing it.
#[derive(Debug, Clone)]
pub struct Plan {
    /// The global marker is current; nothing would run.
    pub cached: bool,
    pub tasks: Vec<PlannedTask>,
}

/// A task in a [`Plan`].
#[derive(Debug, Clone)]
pub struct PlannedTask {
    pub name: String,
    pub group: String,
    /// Why the task would be skipped.
    pub skip: Option<String>,
    pub steps: Vec<PlannedStep>,
}

/// A step in a [`PlannedTask`].
#[derive(Debug, Clone)]
pub struct PlannedStep {
    pub description: String,
    /// Why the step would be skipped.
    pub skip: Option<String>,
}

/// Why a task is not run.
#[derive(Debug, Clone, PartialEq)]
enum Skip {
    /// The task's required capability is absent.
    Unavailable(String),
    /// The task's marker is current.
    AlreadyDone,
    /// The task's `skip_if` check passed.
    Satisfied(String),
}

impl Skip {
    fn reason(self) -> String {
        match self {
            Skip::Unavailable(tag) => format!("{} not available", tag),
            Skip::AlreadyDone => "already done".to_string(),
            Skip::Satisfied(description) => description,
        }
    }
}

/// A task's result plus the fingerprints its marker should be recorded with.
struct TaskRun {
    result: RunResult,
    /// `None` when no marker should be written.
    marker: Option<Vec<Fingerprint>>,
}

/// A set of tasks that must run in order.
struct Group<'t> {
    name: &'t str,
    tasks: Vec<&'t Task>,
}

/// Runs tasks grouped by independence, consulting and recording markers.
///
/// Groups run concurrently, one thread each; tasks within a group run in
/// declared order. The "initialized" marker is written only when every task
/// succeeded or was skipped.
pub struct Sequencer {
    store: MarkerStore,
    detector: FeatureDetector,
    invoker: Arc<dyn ToolInvoker>,
    project_root: PathBuf,
    base_env: HashMap<String, String>,
    global_sources: Vec<PathBuf>,
    env_lookup: Box<EnvLookup>,
    options: SequenceOptions,
}

impl Sequencer {
    /// Create a sequencer rooted at the current directory.
    pub fn new(store: MarkerStore, detector: FeatureDetector, invoker: Arc<dyn ToolInvoker>) -> Self {
        Self {
            store,
            detector,
            invoker,
            project_root: PathBuf::from("."),
            base_env: HashMap::new(),
            global_sources: Vec::new(),
            env_lookup: Box::new(|key: &str| std::env::var(key)),
            options: SequenceOptions::default(),
        }
    }

    /// Directory commands run in unless a step sets its own.
    pub fn project_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.project_root = root.into();
        self
    }

    /// Environment passed to every invocation.
    pub fn base_env(mut self, env: HashMap<String, String>) -> Self {
        self.base_env = env;
        self
    }

    /// Files that fingerprint the global marker.
    ///
    /// Editing any of them invalidates the marker.
    pub fn global_sources(mut self, sources: impl IntoIterator<Item = PathBuf>) -> Self {
        self.global_sources = sources.into_iter().collect();
        self
    }

    /// Replace the environment lookup used by capability detection.
    pub fn env_lookup<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> std::result::Result<String, VarError> + Send + Sync + 'static,
    {
        self.env_lookup = Box::new(lookup);
        self
    }

    /// Set run options.
    pub fn options(mut self, options: SequenceOptions) -> Self {
        self.options = options;
        self
    }

    /// The marker store.
    pub fn store(&self) -> &MarkerStore {
        &self.store
    }

    /// Run `tasks` and update markers.
    pub fn run_all(&self, tasks: &[Task]) -> Result<SequenceOutcome> {
        let start = Instant::now();
        let selected = self.select(tasks)?;
        let subset = !self.options.only.is_empty();

        if !self.options.force && !subset {
            let staleness = self
                .store
                .staleness_all(INITIALIZED_KEY, &self.global_sources);
            if staleness.is_current() {
                info!("Environment already initialized");
                return Ok(SequenceOutcome::cached(start.elapsed()));
            }
            debug!("Global marker not current: {:?}", staleness);
        }

        // Read before any task runs so edits made during the run still count.
        let global_fingerprints = capture_all(INITIALIZED_KEY, &self.global_sources);

        let capabilities = self.detect(&selected, self.invoker.as_ref());
        let mut env = self.base_env.clone();
        env.extend(self.detector.exports_for(&capabilities));

        let groups = partition(&selected);
        info!(
            "Running {} task(s) in {} group(s)",
            selected.len(),
            groups.len()
        );

        let capabilities = &capabilities;
        let env = &env;
        let runs: Vec<TaskRun> = thread::scope(|scope| {
            let handles: Vec<_> = groups
                .iter()
                .map(|group| {
                    let handle = scope.spawn(move || {
                        group
                            .tasks
                            .iter()
                            .map(|task| self.run_task(task, capabilities, env))
                            .collect::<Vec<_>>()
                    });
                    (group, handle)
                })
                .collect();

            handles
                .into_iter()
                .flat_map(|(group, handle)| {
                    handle.join().unwrap_or_else(|_| {
                        warn!("Group '{}' panicked", group.name);
                        group
                            .tasks
                            .iter()
                            .map(|task| TaskRun {
                                result: RunResult::new(&task.name, TaskStatus::Failed, Duration::ZERO)
                                    .with_excerpt("task panicked"),
                                marker: None,
                            })
                            .collect()
                    })
                })
                .collect()
        });

        self.record_task_markers(&runs);

        let order: HashMap<&str, usize> = selected
            .iter()
            .enumerate()
            .map(|(i, task)| (task.name.as_str(), i))
            .collect();
        let mut results: Vec<RunResult> = runs.into_iter().map(|run| run.result).collect();
        results.sort_by_key(|r| order.get(r.task_name.as_str()).copied());

        let mut outcome = SequenceOutcome {
            results,
            elapsed: Duration::ZERO,
            cached: false,
        };

        if !subset {
            if outcome.success() {
                self.store
                    .record_fingerprints(INITIALIZED_KEY, global_fingerprints)?;
                info!("Recorded '{}' marker", INITIALIZED_KEY);
            } else if self.store.remove(INITIALIZED_KEY)? {
                debug!("Removed stale '{}' marker", INITIALIZED_KEY);
            }
        }

        outcome.elapsed = start.elapsed();
        Ok(outcome)
    }

    /// Describe what [`run_all`](Self::run_all) would do without invoking
    /// any tool or writing any marker.
    ///
    /// Capabilities are probed for presence only and `command_succeeds`
    /// checks count as not passed.
    pub fn plan(&self, tasks: &[Task]) -> Result<Plan> {
        let selected = self.select(tasks)?;
        let subset = !self.options.only.is_empty();
        let cached = !self.options.force
            && !subset
            && self
                .store
                .is_valid_all(INITIALIZED_KEY, &self.global_sources);

        let invoker = PlanInvoker;
        let capabilities = self.detect(&selected, &invoker);
        let env = self.base_env.clone();

        let tasks = selected
            .iter()
            .map(|task| PlannedTask {
                name: task.name.clone(),
                group: task.group.clone(),
                skip: self
                    .skip_reason(task, &capabilities, &env, &invoker)
                    .map(Skip::reason),
                steps: task
                    .steps
                    .iter()
                    .map(|step| PlannedStep {
                        description: step.describe(),
                        skip: step
                            .requires
                            .as_ref()
                            .filter(|tag| !capabilities.has(tag))
                            .map(|tag| format!("{} not available", tag)),
                    })
                    .collect(),
            })
            .collect();

        Ok(Plan { cached, tasks })
    }

    fn select<'t>(&self, tasks: &'t [Task]) -> Result<Vec<&'t Task>> {
        if self.options.only.is_empty() {
            return Ok(tasks.iter().collect());
        }

        let known: HashSet<&str> = tasks.iter().map(|t| t.name.as_str()).collect();
        if let Some(unknown) = self.options.only.iter().find(|n| !known.contains(n.as_str())) {
            return Err(PrimerError::ConfigValidationError {
                message: format!("Unknown task '{}'", unknown),
            });
        }

        Ok(tasks
            .iter()
            .filter(|t| self.options.only.iter().any(|n| n == &t.name))
            .collect())
    }

    fn detect(&self, tasks: &[&Task], invoker: &dyn ToolInvoker) -> CapabilitySet {
        let tags = tasks.iter().flat_map(|t| t.capability_tags());
        self.detector.detect_all(tags, invoker, &*self.env_lookup)
    }

    /// Decide whether `task` can be skipped.
    ///
    /// A cached task whose watch file changed since its marker was recorded
    /// always runs; `skip_if` is only consulted when no marker exists.
    fn skip_reason(
        &self,
        task: &Task,
        capabilities: &CapabilitySet,
        env: &HashMap<String, String>,
        invoker: &dyn ToolInvoker,
    ) -> Option<Skip> {
        if let Some(tag) = &task.requires {
            if !capabilities.has(tag) {
                return Some(Skip::Unavailable(tag.clone()));
            }
        }

        if self.options.force {
            return None;
        }

        if task.cache {
            let staleness = self.store.staleness(&task.name, task.watch.as_deref());
            if staleness.is_current() {
                return Some(Skip::AlreadyDone);
            }
            if task.watch.is_some() && staleness != Staleness::Missing {
                debug!("Marker for '{}' is stale: {:?}", task.name, staleness);
                return None;
            }
        }

        if let Some(check) = &task.skip_if {
            let ctx = CheckContext {
                project_root: &self.project_root,
                invoker,
                env,
            };
            let result = run_check(check, &ctx);
            if result.complete {
                return Some(Skip::Satisfied(result.description));
            }
        }

        None
    }

    fn run_task(
        &self,
        task: &Task,
        capabilities: &CapabilitySet,
        env: &HashMap<String, String>,
    ) -> TaskRun {
        let start = Instant::now();

        let mut task_env = env.clone();
        task_env.extend(task.env.iter().map(|(k, v)| (k.clone(), v.clone())));

        let fingerprints = || capture_all(&task.name, task.watch.as_slice());

        if let Some(skip) = self.skip_reason(task, capabilities, &task_env, self.invoker.as_ref()) {
            // A satisfied check stands in for a run, so later watch edits rerun the task.
            let marker = (task.cache && matches!(skip, Skip::Satisfied(_))).then(fingerprints);
            let reason = skip.reason();
            info!("Skipping '{}': {}", task.name, reason);
            let mut result = RunResult::skipped(&task.name, reason);
            result.duration = start.elapsed();
            return TaskRun { result, marker };
        }

        let marker = task.cache.then(fingerprints);
        let result = self.run_steps(task, capabilities, &task_env, start);
        let marker = marker.filter(|_| result.status == TaskStatus::Succeeded);
        TaskRun { result, marker }
    }

    fn run_steps(
        &self,
        task: &Task,
        capabilities: &CapabilitySet,
        task_env: &HashMap<String, String>,
        start: Instant,
    ) -> RunResult {
        info!("Running task '{}'", task.name);

        let timeout = self.options.timeout.or(task.timeout);
        let deadline = timeout.map(|t| start + t);
        let mut last: Option<CommandResult> = None;

        for step in &task.steps {
            if let Some(tag) = &step.requires {
                if !capabilities.has(tag) {
                    debug!(
                        "Skipping step '{}' of '{}': {} not available",
                        step.describe(),
                        task.name,
                        tag
                    );
                    continue;
                }
            }

            if let StepAction::AppendProfile { file, line } = &step.action {
                if let Err(e) = append_profile(file.as_deref(), line) {
                    warn!("Task '{}' failed to update profile: {}", task.name, e);
                    return RunResult::new(&task.name, TaskStatus::Failed, start.elapsed())
                        .with_excerpt(e.to_string());
                }
                continue;
            }

            let Some(spec) = step.command(task_env, &self.project_root) else {
                continue;
            };

            let remaining = match deadline {
                Some(deadline) => {
                    let left = deadline.saturating_duration_since(Instant::now());
                    if left.is_zero() {
                        return timed_out(task, timeout, start);
                    }
                    Some(left)
                }
                None => None,
            };

            let result = match self.invoker.invoke(&spec.timeout(remaining)) {
                Ok(result) => result,
                Err(PrimerError::ToolNotFound { tool }) => {
                    warn!("Task '{}': tool not found: {}", task.name, tool);
                    let message = PrimerError::ToolNotFound { tool: tool.clone() }.to_string();
                    return RunResult::new(&task.name, TaskStatus::ToolNotFound { tool }, start.elapsed())
                        .with_excerpt(message);
                }
                Err(e) => {
                    warn!("Task '{}' errored: {}", task.name, e);
                    return RunResult::new(&task.name, TaskStatus::Failed, start.elapsed())
                        .with_excerpt(e.to_string());
                }
            };

            if result.timed_out {
                return timed_out(task, timeout, start);
            }

            if !result.success {
                return failed(task, &step_program(&step.action), result, start);
            }

            last = Some(result);
        }

        info!("Task '{}' succeeded in {:?}", task.name, start.elapsed());
        let mut result = RunResult::new(&task.name, TaskStatus::Succeeded, start.elapsed());
        if let Some(last) = last {
            result = result
                .with_exit_code(last.exit_code)
                .with_excerpt(last.excerpt(EXCERPT_LINES));
        }
        result
    }

    fn record_task_markers(&self, runs: &[TaskRun]) {
        for run in runs {
            let Some(fingerprints) = &run.marker else {
                continue;
            };
            let name = &run.result.task_name;
            if let Err(e) = self.store.record_fingerprints(name, fingerprints.clone()) {
                warn!("Failed to record marker for '{}': {:#}", name, e);
            }
        }
    }
}

fn partition<'t>(tasks: &[&'t Task]) -> Vec<Group<'t>> {
    let mut groups: Vec<Group<'t>> = Vec::new();
    for task in tasks {
        match groups.iter_mut().find(|g| g.name == task.group) {
            Some(group) => group.tasks.push(task),
            None => groups.push(Group {
                name: &task.group,
                tasks: vec![task],
            }),
        }
    }
    groups
}

fn append_profile(file: Option<&Path>, line: &str) -> Result<AppendOutcome> {
    let path = match file {
        Some(path) => path.to_path_buf(),
        None => detect_shell().profile_file.ok_or_else(|| {
            PrimerError::Other(anyhow::anyhow!("No profile file for the current shell"))
        })?,
    };
    append_if_absent(&path, line)
}

fn step_program(action: &StepAction) -> String {
    match action {
        StepAction::Run { program, .. } => program.clone(),
        StepAction::Shell { .. } => detect_shell().executable.display().to_string(),
        StepAction::AppendProfile { .. } => String::new(),
    }
}

fn timed_out(task: &Task, timeout: Option<Duration>, start: Instant) -> RunResult {
    let seconds = timeout.map(|t| t.as_secs()).unwrap_or_default();
    warn!("Task '{}' timed out after {}s", task.name, seconds);
    RunResult::new(&task.name, TaskStatus::TimedOut, start.elapsed()).with_excerpt(
        PrimerError::TimedOut {
            task: task.name.clone(),
            seconds,
        }
        .to_string(),
    )
}

fn failed(task: &Task, tool: &str, result: CommandResult, start: Instant) -> RunResult {
    warn!(
        "Task '{}' failed with exit code {:?}",
        task.name, result.exit_code
    );
    let mut excerpt = result.excerpt(EXCERPT_LINES);
    if excerpt.is_empty() {
        excerpt = PrimerError::ToolFailed {
            tool: tool.to_string(),
            code: result.exit_code,
        }
        .to_string();
    }
    RunResult::new(&task.name, TaskStatus::Failed, start.elapsed())
        .with_exit_code(result.exit_code)
        .with_excerpt(excerpt)
}

/// Stand-in invoker for dry runs; never runs anything.
struct PlanInvoker;

impl ToolInvoker for PlanInvoker {
    fn invoke(&self, spec: &CommandSpec) -> Result<CommandResult> {
        Err(PrimerError::Other(anyhow::anyhow!(
            "dry run: `{}` not executed",
            spec.display()
        )))
    }

    fn locate(&self, _program: &str, _env: &HashMap<String, String>) -> Option<PathBuf> {
        None
    }
}
