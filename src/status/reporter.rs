//! End-of-run reporting.

use std::path::PathBuf;

use crate::error::Result;
use crate::runner::{RunResult, SequenceOutcome, TaskStatus};
use crate::status::readiness::ReadinessState;
use crate::ui::{format_duration, Output, PrimerTheme};

/// Publishes the result of a run: readiness file plus terminal summary.
///
/// [`report`](StatusReporter::report) consumes the reporter, so a run is
/// reported exactly once.
pub struct StatusReporter<'a> {
    readiness_path: Option<PathBuf>,
    output: &'a Output,
}

impl<'a> StatusReporter<'a> {
    /// Create a reporter that only prints.
    pub fn new(output: &'a Output) -> Self {
        Self {
            readiness_path: None,
            output,
        }
    }

    /// Also maintain the readiness file at `path`.
    pub fn readiness_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.readiness_path = Some(path.into());
        self
    }

    /// Record readiness and print the summary.
    ///
    /// A successful outcome writes the readiness file; a failed one removes
    /// any stale file so waiters never see an old "ready".
    pub fn report(self, outcome: &SequenceOutcome) -> Result<ReadinessState> {
        let state = ReadinessState::from_outcome(outcome);
        let theme = self.output.theme();

        for result in &outcome.results {
            self.output.task_line(&task_line(theme, result));
            let show_excerpt = !result.is_success() || self.output.mode().shows_command_output();
            if show_excerpt && !result.output_excerpt.is_empty() {
                for line in result.output_excerpt.lines() {
                    self.output.println(&format!("    {}", theme.dim.apply_to(line)));
                }
            }
        }

        if state.ready {
            if let Some(path) = &self.readiness_path {
                state.write(path)?;
                tracing::debug!("Wrote readiness file {}", path.display());
            }
            self.output.println(&theme.format_success(&headline(outcome)));
        } else {
            if let Some(path) = &self.readiness_path {
                if ReadinessState::clear(path)? {
                    tracing::debug!("Removed stale readiness file");
                }
            }
            self.output.error(&headline(outcome));
        }

        Ok(state)
    }
}

/// The one-line summary of a run.
pub fn headline(outcome: &SequenceOutcome) -> String {
    if outcome.cached {
        return "Environment ready (cached)".to_string();
    }

    if outcome.success() {
        return format!("Environment ready in {}", format_duration(outcome.elapsed));
    }

    let failed: Vec<&str> = outcome.failures().map(|r| r.task_name.as_str()).collect();
    format!(
        "Environment setup failed after {}: {}",
        format_duration(outcome.elapsed),
        failed.join(", ")
    )
}

/// Themed status line for one task.
pub fn task_line(theme: &PrimerTheme, result: &RunResult) -> String {
    let took = format_duration(result.duration);
    match &result.status {
        TaskStatus::Succeeded => theme.format_success(&format!("{} ({})", result.task_name, took)),
        TaskStatus::Skipped { reason } => {
            theme.format_skipped(&format!("{}: {}", result.task_name, reason))
        }
        TaskStatus::Failed => {
            let code = result
                .exit_code
                .map(|c| format!("exit {}, ", c))
                .unwrap_or_default();
            theme.format_error(&format!("{} failed ({}{})", result.task_name, code, took))
        }
        TaskStatus::ToolNotFound { tool } => {
            theme.format_error(&format!("{}: tool not found: {}", result.task_name, tool))
        }
        TaskStatus::TimedOut => {
            theme.format_error(&format!("{} timed out after {}", result.task_name, took))
        }
    }
}
