//! Run command implementation.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::cli::args::RunArgs;
use crate::error::Result;
use crate::runner::{Plan, SequenceOptions, Sequencer};
use crate::shell::SystemInvoker;
use crate::status::StatusReporter;
use crate::ui::Output;

use super::dispatcher::{Command, CommandResult};
use super::workspace::Workspace;

/// The run command implementation.
pub struct RunCommand {
    project_root: PathBuf,
    config: Option<PathBuf>,
    args: RunArgs,
}

impl RunCommand {
    /// Create a new run command.
    pub fn new(project_root: &Path, config: Option<&Path>, args: RunArgs) -> Self {
        Self {
            project_root: project_root.to_path_buf(),
            config: config.map(Path::to_path_buf),
            args,
        }
    }

    /// Get the command arguments.
    pub fn args(&self) -> &RunArgs {
        &self.args
    }

    fn options(&self) -> SequenceOptions {
        SequenceOptions {
            force: self.args.force,
            only: self.args.only.clone(),
            timeout: self.args.timeout.map(Duration::from_secs),
        }
    }
}

impl Command for RunCommand {
    fn execute(&self, output: &Output) -> Result<CommandResult> {
        let workspace = Workspace::load(&self.project_root, self.config.as_deref())?;
        let tasks = workspace.tasks()?;

        let sequencer = Sequencer::new(
            workspace.marker_store(),
            workspace.detector(),
            Arc::new(SystemInvoker),
        )
        .project_root(&self.project_root)
        .base_env(workspace.loaded.config.settings.env.clone())
        .global_sources(workspace.global_sources())
        .options(self.options());

        if self.args.dry_run {
            print_plan(output, &sequencer.plan(&tasks)?);
            return Ok(CommandResult::success());
        }

        let outcome = sequencer.run_all(&tasks)?;

        let mut reporter = StatusReporter::new(output);
        if self.args.only.is_empty() {
            reporter = reporter.readiness_file(workspace.readiness_path());
        }
        let state = reporter.report(&outcome)?;

        if state.ready {
            Ok(CommandResult::success())
        } else {
            Ok(CommandResult::failure(1))
        }
    }
}

fn print_plan(output: &Output, plan: &Plan) {
    let theme = output.theme();

    if plan.cached {
        output.println(&theme.format_skipped(
            "Environment already initialized; nothing would run (use --force to override)",
        ));
        return;
    }

    output.println(&theme.format_header("Dry run: no commands will be executed"));
    for task in &plan.tasks {
        if let Some(reason) = &task.skip {
            output.println(&theme.format_skipped(&format!("{}: {}", task.name, reason)));
            continue;
        }
        output.println(&format!(
            "{} {}",
            theme.highlight.apply_to(&task.name),
            theme.dim.apply_to(format!("[{}]", task.group))
        ));
        for step in &task.steps {
            match &step.skip {
                Some(reason) => output.println(&format!(
                    "    {}",
                    theme.format_skipped(&format!("{} ({})", step.description, reason))
                )),
                None => output.println(&format!(
                    "    {}",
                    theme.command.apply_to(&step.description)
                )),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ui::{OutputMode, PrimerTheme};
    use std::fs;
    use tempfile::TempDir;

    fn project(yaml: &str) -> TempDir {
        let temp = TempDir::new().unwrap();
        fs::create_dir_all(temp.path().join(".primer")).unwrap();
        fs::write(temp.path().join(".primer/config.yml"), yaml).unwrap();
        temp
    }

    fn silent() -> Output {
        Output::new(OutputMode::Silent, PrimerTheme::plain())
    }

    #[test]
    fn run_command_creation() {
        let args = RunArgs {
            force: true,
            ..Default::default()
        };
        let cmd = RunCommand::new(Path::new("/tmp"), None, args);
        assert!(cmd.args().force);
        assert!(cmd.options().force);
    }

    #[cfg(unix)]
    #[test]
    fn successful_run_writes_readiness() {
        let temp = project("tasks:\n  ok:\n    steps:\n      - run: [\"true\"]\n");

        let cmd = RunCommand::new(temp.path(), None, RunArgs::default());
        let result = cmd.execute(&silent()).unwrap();

        assert!(result.success);
        assert!(temp.path().join(".primer/ready").exists());
    }

    #[cfg(unix)]
    #[test]
    fn failed_run_exits_nonzero() {
        let temp = project("tasks:\n  bad:\n    steps:\n      - run: [\"false\"]\n");

        let cmd = RunCommand::new(temp.path(), None, RunArgs::default());
        let result = cmd.execute(&silent()).unwrap();

        assert_eq!(result.exit_code, 1);
        assert!(!temp.path().join(".primer/ready").exists());
    }

    #[test]
    fn dry_run_touches_nothing() {
        let temp = project("tasks:\n  bad:\n    steps:\n      - run: [\"false\"]\n");

        let args = RunArgs {
            dry_run: true,
            ..Default::default()
        };
        let result = RunCommand::new(temp.path(), None, args)
            .execute(&silent())
            .unwrap();

        assert!(result.success);
        assert!(!temp.path().join(".primer/markers").exists());
    }
}
