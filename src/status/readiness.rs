//! The readiness file.

use anyhow::Context;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::error::Result;
use crate::runner::{SequenceOutcome, TaskStatus};

/// Contents of the readiness file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReadinessState {
    /// Every task succeeded or was skipped.
    pub ready: bool,

    /// The run short-circuited on the "initialized" marker.
    pub cached: bool,

    /// Wall-clock time of the run.
    pub elapsed_ms: u64,

    /// When the run finished.
    pub completed_at: DateTime<Utc>,

    /// Per-task summaries (empty for cached runs).
    #[serde(default)]
    pub tasks: Vec<TaskSummary>,
}

/// One task's line in the readiness file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskSummary {
    pub name: String,

    #[serde(flatten)]
    pub status: TaskStatus,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,

    pub duration_ms: u64,
}

impl ReadinessState {
    /// Summarize a sequence outcome.
    pub fn from_outcome(outcome: &SequenceOutcome) -> Self {
        Self {
            ready: outcome.success(),
            cached: outcome.cached,
            elapsed_ms: millis(outcome.elapsed),
            completed_at: Utc::now(),
            tasks: outcome
                .results
                .iter()
                .map(|r| TaskSummary {
                    name: r.task_name.clone(),
                    status: r.status.clone(),
                    exit_code: r.exit_code,
                    duration_ms: millis(r.duration),
                })
                .collect(),
        }
    }

    /// Write the state to `path`, replacing any previous file atomically.
    pub fn write(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory {}", parent.display()))?;
        }

        let json = serde_json::to_string_pretty(self).context("Failed to encode readiness")?;
        let tmp = path.with_extension(format!("tmp-{}", std::process::id()));
        fs::write(&tmp, json).with_context(|| format!("Failed to write {}", tmp.display()))?;
        fs::rename(&tmp, path)
            .with_context(|| format!("Failed to move readiness file into {}", path.display()))?;
        Ok(())
    }

    /// Read the readiness file. Missing or unreadable files yield `None`.
    pub fn load(path: &Path) -> Option<Self> {
        let json = fs::read_to_string(path).ok()?;
        match serde_json::from_str(&json) {
            Ok(state) => Some(state),
            Err(e) => {
                tracing::warn!("Ignoring unreadable readiness file {}: {}", path.display(), e);
                None
            }
        }
    }

    /// Remove the readiness file if present.
    pub fn clear(path: &Path) -> Result<bool> {
        match fs::remove_file(path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}

fn millis(d: std::time::Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::RunResult;
    use std::time::Duration;
    use tempfile::TempDir;

    fn outcome() -> SequenceOutcome {
        SequenceOutcome {
            results: vec![
                RunResult::new("python", TaskStatus::Succeeded, Duration::from_millis(1500))
                    .with_exit_code(Some(0)),
                RunResult::skipped("dotnet", "already done"),
            ],
            elapsed: Duration::from_millis(1600),
            cached: false,
        }
    }

    #[test]
    fn summarizes_outcome() {
        let state = ReadinessState::from_outcome(&outcome());

        assert!(state.ready);
        assert!(!state.cached);
        assert_eq!(state.elapsed_ms, 1600);
        assert_eq!(state.tasks.len(), 2);
        assert_eq!(state.tasks[0].duration_ms, 1500);
    }

    #[test]
    fn write_then_load() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join(".primer/ready");
        let state = ReadinessState::from_outcome(&outcome());

        state.write(&path).unwrap();

        assert_eq!(ReadinessState::load(&path), Some(state));
    }

    #[test]
    fn file_uses_flat_task_entries() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("ready");
        ReadinessState::from_outcome(&outcome()).write(&path).unwrap();

        let json: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();

        assert_eq!(json["ready"], true);
        assert_eq!(json["tasks"][0]["name"], "python");
        assert_eq!(json["tasks"][0]["status"], "succeeded");
        assert_eq!(json["tasks"][1]["reason"], "already done");
    }

    #[test]
    fn load_missing_or_corrupt_is_none() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("ready");
        assert!(ReadinessState::load(&path).is_none());

        fs::write(&path, "not json").unwrap();
        assert!(ReadinessState::load(&path).is_none());
    }

    #[test]
    fn clear_reports_removal() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("ready");
        fs::write(&path, "{}").unwrap();

        assert!(ReadinessState::clear(&path).unwrap());
        assert!(!ReadinessState::clear(&path).unwrap());
    }
}
