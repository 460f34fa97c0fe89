//! Detect command implementation.

use std::path::{Path, PathBuf};

use crate::cli::args::DetectArgs;
use crate::detection::{CapabilitySet, GPU_TAG};
use crate::error::Result;
use crate::shell::SystemInvoker;
use crate::ui::Output;

use super::dispatcher::{Command, CommandResult};
use super::workspace::Workspace;

/// The detect command implementation.
///
/// Probes `gpu` plus every capability a task requires.
pub struct DetectCommand {
    project_root: PathBuf,
    config: Option<PathBuf>,
    args: DetectArgs,
}

impl DetectCommand {
    /// Create a new detect command.
    pub fn new(project_root: &Path, config: Option<&Path>, args: DetectArgs) -> Self {
        Self {
            project_root: project_root.to_path_buf(),
            config: config.map(Path::to_path_buf),
            args,
        }
    }

    fn detect(&self, workspace: &Workspace) -> Result<CapabilitySet> {
        let tasks = workspace.tasks()?;
        let mut tags: Vec<&str> = vec![GPU_TAG];
        tags.extend(tasks.iter().flat_map(|t| t.capability_tags()));

        let detector = workspace.detector();
        Ok(detector.detect_all(tags, &SystemInvoker, &|key: &str| std::env::var(key)))
    }
}

impl Command for DetectCommand {
    fn execute(&self, output: &Output) -> Result<CommandResult> {
        let workspace = Workspace::load(&self.project_root, self.config.as_deref())?;
        let set = self.detect(&workspace)?;

        if self.args.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&set).map_err(anyhow::Error::from)?
            );
            return Ok(CommandResult::success());
        }

        let theme = output.theme();
        for capability in set.iter() {
            if capability.present {
                output.println(&theme.format_success(&format!("{}: present", capability.tag)));
            } else {
                output.println(&theme.format_skipped(&format!("{}: absent", capability.tag)));
            }
            for (key, value) in &capability.metadata {
                output.println(&format!("    {}", theme.format_key_value(key, value)));
            }
        }

        Ok(CommandResult::success())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn detects_required_tags() {
        let temp = TempDir::new().unwrap();
        fs::create_dir_all(temp.path().join(".primer")).unwrap();
        fs::write(
            temp.path().join(".primer/config.yml"),
            "gpu:\n  device_paths: [missing/nvidia0]\n  driver_paths: [missing/driver]\ntasks:\n  tpu:\n    requires: tpu\n    steps:\n      - run: [\"true\"]\n",
        )
        .unwrap();
        let workspace = Workspace::load(temp.path(), None).unwrap();
        let cmd = DetectCommand::new(temp.path(), None, DetectArgs::default());

        let set = cmd.detect(&workspace).unwrap();

        assert_eq!(set.len(), 2);
        assert!(!set.has("tpu"));
        assert!(set.get(GPU_TAG).is_some());
    }
}
