//! Reset command implementation.

use std::path::{Path, PathBuf};

use crate::cache::INITIALIZED_KEY;
use crate::cli::args::ResetArgs;
use crate::error::Result;
use crate::status::ReadinessState;
use crate::ui::Output;

use super::dispatcher::{Command, CommandResult};
use super::workspace::Workspace;

/// The reset command implementation.
///
/// Without arguments only the "initialized" marker goes, so the next run
/// re-checks every task but still honors task markers.
pub struct ResetCommand {
    project_root: PathBuf,
    config: Option<PathBuf>,
    args: ResetArgs,
}

impl ResetCommand {
    /// Create a new reset command.
    pub fn new(project_root: &Path, config: Option<&Path>, args: ResetArgs) -> Self {
        Self {
            project_root: project_root.to_path_buf(),
            config: config.map(Path::to_path_buf),
            args,
        }
    }
}

impl Command for ResetCommand {
    fn execute(&self, output: &Output) -> Result<CommandResult> {
        let workspace = Workspace::load(&self.project_root, self.config.as_deref())?;
        let store = workspace.marker_store();
        let theme = output.theme();

        if self.args.all {
            let removed = store.clear()?;
            output.println(&theme.format_success(&format!("Removed {} marker(s)", removed)));
        } else {
            let known: Vec<String> = workspace.tasks()?.into_iter().map(|t| t.name).collect();
            for name in &self.args.tasks {
                if !known.contains(name) {
                    output.println(&theme.format_warning(&format!("Unknown task '{}'", name)));
                    continue;
                }
                if store.remove(name)? {
                    output.println(&theme.format_success(&format!("Reset {}", name)));
                } else {
                    output.println(&theme.format_skipped(&format!("{}: no marker", name)));
                }
            }

            if store.remove(INITIALIZED_KEY)? {
                output.println(&theme.format_success("Reset initialized marker"));
            }
        }

        if ReadinessState::clear(&workspace.readiness_path())? {
            tracing::debug!("Removed readiness file");
        }

        Ok(CommandResult::success())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ui::{OutputMode, PrimerTheme};
    use std::fs;
    use tempfile::TempDir;

    fn setup() -> (TempDir, Workspace) {
        let temp = TempDir::new().unwrap();
        fs::create_dir_all(temp.path().join(".primer")).unwrap();
        fs::write(
            temp.path().join(".primer/config.yml"),
            "tasks:\n  a:\n    steps:\n      - run: [\"true\"]\n  b:\n    steps:\n      - run: [\"true\"]\n",
        )
        .unwrap();
        let ws = Workspace::load(temp.path(), None).unwrap();
        let store = ws.marker_store();
        store.record("a", None).unwrap();
        store.record("b", None).unwrap();
        store.record(INITIALIZED_KEY, None).unwrap();
        fs::write(ws.readiness_path(), "{}").unwrap();
        (temp, ws)
    }

    fn run(temp: &TempDir, args: ResetArgs) {
        let output = Output::new(OutputMode::Silent, PrimerTheme::plain());
        ResetCommand::new(temp.path(), None, args)
            .execute(&output)
            .unwrap();
    }

    #[test]
    fn default_reset_keeps_task_markers() {
        let (temp, ws) = setup();

        run(&temp, ResetArgs::default());

        let store = ws.marker_store();
        assert!(!store.is_valid(INITIALIZED_KEY, None));
        assert!(store.is_valid("a", None));
        assert!(!ws.readiness_path().exists());
    }

    #[test]
    fn reset_named_task() {
        let (temp, ws) = setup();

        run(
            &temp,
            ResetArgs {
                all: false,
                tasks: vec!["a".into()],
            },
        );

        let store = ws.marker_store();
        assert!(!store.is_valid("a", None));
        assert!(store.is_valid("b", None));
        assert!(!store.is_valid(INITIALIZED_KEY, None));
    }

    #[test]
    fn reset_all() {
        let (temp, ws) = setup();

        run(
            &temp,
            ResetArgs {
                all: true,
                tasks: vec![],
            },
        );

        assert!(ws.marker_store().list().unwrap().is_empty());
    }
}
