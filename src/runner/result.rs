//! Task results and the outcome of a whole sequence.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Final state of one task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TaskStatus {
    /// Every applicable step exited successfully.
    Succeeded,

    /// The task did no work.
    Skipped { reason: String },

    /// A step exited non-zero or could not be carried out.
    Failed,

    /// A step's program could not be located or launched.
    ToolNotFound { tool: String },

    /// The task ran past its time budget.
    TimedOut,
}

impl TaskStatus {
    /// Whether this status lets the environment count as ready.
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Skipped { .. })
    }

    /// Short lowercase label.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Succeeded => "succeeded",
            Self::Skipped { .. } => "skipped",
            Self::Failed => "failed",
            Self::ToolNotFound { .. } => "tool not found",
            Self::TimedOut => "timed out",
        }
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Skipped { reason } => write!(f, "skipped ({})", reason),
            Self::ToolNotFound { tool } => write!(f, "tool not found: {}", tool),
            other => write!(f, "{}", other.label()),
        }
    }
}

/// Result of running one task.
#[derive(Debug, Clone)]
pub struct RunResult {
    /// Task name.
    pub task_name: String,

    /// Final state.
    pub status: TaskStatus,

    /// Exit code of the last command run (if any).
    pub exit_code: Option<i32>,

    /// Time spent on the task, skip checks included.
    pub duration: Duration,

    /// Trailing output of the last command, or the reason it failed.
    pub output_excerpt: String,
}

impl RunResult {
    /// Create a result with no output.
    pub fn new(task_name: impl Into<String>, status: TaskStatus, duration: Duration) -> Self {
        Self {
            task_name: task_name.into(),
            status,
            exit_code: None,
            duration,
            output_excerpt: String::new(),
        }
    }

    /// Create a skipped result.
    pub fn skipped(task_name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::new(
            task_name,
            TaskStatus::Skipped {
                reason: reason.into(),
            },
            Duration::ZERO,
        )
    }

    /// Attach an exit code.
    pub fn with_exit_code(mut self, exit_code: Option<i32>) -> Self {
        self.exit_code = exit_code;
        self
    }

    /// Attach an output excerpt.
    pub fn with_excerpt(mut self, excerpt: impl Into<String>) -> Self {
        self.output_excerpt = excerpt.into();
        self
    }

    /// Whether the task left the environment in a ready state.
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }
}

/// Everything a sequence run produced.
#[derive(Debug, Clone, Default)]
pub struct SequenceOutcome {
    /// One result per selected task, in declared order.
    pub results: Vec<RunResult>,

    /// Wall-clock time of the whole run.
    pub elapsed: Duration,

    /// The run short-circuited on a valid "initialized" marker.
    pub cached: bool,
}

impl SequenceOutcome {
    /// Outcome of a run that short-circuited on the global marker.
    pub fn cached(elapsed: Duration) -> Self {
        Self {
            results: Vec::new(),
            elapsed,
            cached: true,
        }
    }

    /// Whether every task succeeded or was skipped.
    pub fn success(&self) -> bool {
        self.results.iter().all(RunResult::is_success)
    }

    /// Results of tasks that did not succeed.
    pub fn failures(&self) -> impl Iterator<Item = &RunResult> {
        self.results.iter().filter(|r| !r.is_success())
    }

    /// Look up the result for a task.
    pub fn result(&self, task_name: &str) -> Option<&RunResult> {
        self.results.iter().find(|r| r.task_name == task_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn skipped_counts_as_success() {
        assert!(TaskStatus::Succeeded.is_success());
        assert!(TaskStatus::Skipped {
            reason: "marker".into()
        }
        .is_success());
        assert!(!TaskStatus::Failed.is_success());
        assert!(!TaskStatus::TimedOut.is_success());
        assert!(!TaskStatus::ToolNotFound { tool: "uv".into() }.is_success());
    }

    #[test]
    fn status_display() {
        assert_eq!(TaskStatus::Succeeded.to_string(), "succeeded");
        assert_eq!(
            TaskStatus::Skipped {
                reason: "already done".into()
            }
            .to_string(),
            "skipped (already done)"
        );
        assert_eq!(
            TaskStatus::ToolNotFound {
                tool: "dotnet".into()
            }
            .to_string(),
            "tool not found: dotnet"
        );
    }

    #[test]
    fn status_serializes_with_tag() {
        let json = serde_json::to_value(TaskStatus::Skipped {
            reason: "gpu not available".into(),
        })
        .unwrap();
        assert_eq!(json["status"], "skipped");
        assert_eq!(json["reason"], "gpu not available");
    }

    #[test]
    fn outcome_success_and_failures() {
        let outcome = SequenceOutcome {
            results: vec![
                RunResult::new("python", TaskStatus::Succeeded, Duration::from_secs(3)),
                RunResult::new("dotnet", TaskStatus::Failed, Duration::from_secs(1))
                    .with_exit_code(Some(1)),
            ],
            elapsed: Duration::from_secs(3),
            cached: false,
        };

        assert!(!outcome.success());
        let failed: Vec<_> = outcome.failures().map(|r| r.task_name.as_str()).collect();
        assert_eq!(failed, vec!["dotnet"]);
        assert_eq!(outcome.result("dotnet").unwrap().exit_code, Some(1));
    }

    #[test]
    fn cached_outcome_is_successful_and_empty() {
        let outcome = SequenceOutcome::cached(Duration::from_millis(2));
        assert!(outcome.cached);
        assert!(outcome.success());
        assert!(outcome.results.is_empty());
    }
}
