//! Status command implementation.
//!
//! Shows whether the environment is initialized, the readiness file, and
//! the state of every task marker.

use serde::Serialize;
use std::path::{Path, PathBuf};

use crate::cache::{MarkerStore, Staleness, INITIALIZED_KEY};
use crate::cli::args::StatusArgs;
use crate::error::Result;
use crate::status::ReadinessState;
use crate::ui::{format_duration, format_relative_time, Output};

use super::dispatcher::{Command, CommandResult};
use super::workspace::Workspace;

/// The status command implementation.
pub struct StatusCommand {
    project_root: PathBuf,
    config: Option<PathBuf>,
    args: StatusArgs,
}

#[derive(Debug, Serialize)]
struct MarkerReport {
    key: String,
    valid: bool,
    detail: String,
}

#[derive(Debug, Serialize)]
struct StatusReport {
    config: String,
    initialized: MarkerReport,
    readiness: Option<ReadinessState>,
    tasks: Vec<MarkerReport>,
}

impl StatusCommand {
    /// Create a new status command.
    pub fn new(project_root: &Path, config: Option<&Path>, args: StatusArgs) -> Self {
        Self {
            project_root: project_root.to_path_buf(),
            config: config.map(Path::to_path_buf),
            args,
        }
    }

    fn collect(&self, workspace: &Workspace) -> Result<StatusReport> {
        let store = workspace.marker_store();
        let global_sources = workspace.global_sources();

        let tasks = workspace
            .tasks()?
            .iter()
            .map(|task| marker_report(&store, &task.name, task.watch.as_slice()))
            .collect();

        Ok(StatusReport {
            config: workspace.loaded.source.describe(),
            initialized: marker_report(&store, INITIALIZED_KEY, &global_sources),
            readiness: ReadinessState::load(&workspace.readiness_path()),
            tasks,
        })
    }
}

fn marker_report(store: &MarkerStore, key: &str, sources: &[PathBuf]) -> MarkerReport {
    let staleness = store.staleness_all(key, sources);
    let detail = match &staleness {
        Staleness::Current => match store.load(key) {
            Some(marker) => format!("done {}", format_relative_time(marker.recorded_at)),
            None => "done".to_string(),
        },
        Staleness::Missing => "not done".to_string(),
        Staleness::Unfingerprinted => "stale (recorded without fingerprint)".to_string(),
        Staleness::SourceMissing { source } => {
            format!("stale ({} missing)", source.display())
        }
        Staleness::Changed { source, .. } => format!("stale ({} changed)", source.display()),
    };

    MarkerReport {
        key: key.to_string(),
        valid: staleness.is_current(),
        detail,
    }
}

impl Command for StatusCommand {
    fn execute(&self, output: &Output) -> Result<CommandResult> {
        let workspace = Workspace::load(&self.project_root, self.config.as_deref())?;
        let report = self.collect(&workspace)?;

        if self.args.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&report).map_err(anyhow::Error::from)?
            );
            return Ok(CommandResult::success());
        }

        let theme = output.theme();
        output.println(&theme.format_key_value("Config", &report.config));

        let line = format!("{}: {}", report.initialized.key, report.initialized.detail);
        if report.initialized.valid {
            output.println(&theme.format_success(&line));
        } else {
            output.println(&theme.format_warning(&line));
        }

        match &report.readiness {
            Some(state) if state.ready => output.println(&theme.format_success(&format!(
                "ready ({} in {})",
                format_relative_time(state.completed_at),
                format_duration(std::time::Duration::from_millis(state.elapsed_ms))
            ))),
            Some(_) => output.println(&theme.format_warning("not ready")),
            None => output.println(&theme.format_skipped("no readiness file")),
        }

        if !report.tasks.is_empty() {
            output.println("");
            output.println(&theme.format_header("Tasks"));
        }
        for task in &report.tasks {
            let line = format!("{}: {}", task.key, task.detail);
            if task.valid {
                output.println(&theme.format_success(&line));
            } else {
                output.println(&theme.format_skipped(&line));
            }
        }

        Ok(CommandResult::success())
    }
}
