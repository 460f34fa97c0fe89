//! Command dispatching.
//!
//! This module provides the core command infrastructure:
//! - [`Command`] trait for implementing commands
//! - [`CommandResult`] for uniform result reporting
//! - [`CommandDispatcher`] for routing CLI subcommands

use std::path::{Path, PathBuf};

use crate::cli::args::{Cli, Commands, RunArgs};
use crate::error::Result;
use crate::ui::Output;

/// Trait for command implementations.
///
/// Each CLI subcommand implements this trait to provide its execution logic.
pub trait Command {
    /// Execute the command, printing through `output`.
    fn execute(&self, output: &Output) -> Result<CommandResult>;
}

/// Result of command execution.
#[derive(Debug)]
pub struct CommandResult {
    /// Whether the command succeeded.
    pub success: bool,

    /// Exit code to use (0 for success, non-zero for failure).
    pub exit_code: i32,
}

impl CommandResult {
    /// Create a successful result.
    pub fn success() -> Self {
        Self {
            success: true,
            exit_code: 0,
        }
    }

    /// Create a failure result.
    pub fn failure(exit_code: i32) -> Self {
        Self {
            success: false,
            exit_code,
        }
    }
}

/// Dispatches CLI commands to their implementations.
pub struct CommandDispatcher {
    project_root: PathBuf,
    config: Option<PathBuf>,
}

impl CommandDispatcher {
    /// Create a new dispatcher for the given project root.
    pub fn new(project_root: PathBuf) -> Self {
        Self {
            project_root,
            config: None,
        }
    }

    /// Use an explicit config file instead of discovery.
    pub fn with_config(mut self, config: Option<PathBuf>) -> Self {
        self.config = config;
        self
    }

    /// Get the project root path.
    pub fn project_root(&self) -> &Path {
        &self.project_root
    }

    /// Dispatch and execute a command.
    ///
    /// With no subcommand, `run` is executed with default arguments.
    pub fn dispatch(&self, cli: &Cli, output: &Output) -> Result<CommandResult> {
        let root = &self.project_root;
        let config = self.config.as_deref();

        match &cli.command {
            Some(Commands::Run(args)) => {
                super::run::RunCommand::new(root, config, args.clone()).execute(output)
            }
            None => super::run::RunCommand::new(root, config, RunArgs::default()).execute(output),
            Some(Commands::Status(args)) => {
                super::status::StatusCommand::new(root, config, args.clone()).execute(output)
            }
            Some(Commands::Reset(args)) => {
                super::reset::ResetCommand::new(root, config, args.clone()).execute(output)
            }
            Some(Commands::Detect(args)) => {
                super::detect::DetectCommand::new(root, config, args.clone()).execute(output)
            }
            Some(Commands::Completions(args)) => {
                super::completions::CompletionsCommand::new(args.clone()).execute(output)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_result_success() {
        let result = CommandResult::success();
        assert!(result.success);
        assert_eq!(result.exit_code, 0);
    }

    #[test]
    fn command_result_failure() {
        let result = CommandResult::failure(1);
        assert!(!result.success);
        assert_eq!(result.exit_code, 1);
    }

    #[test]
    fn dispatcher_keeps_project_root() {
        let dispatcher = CommandDispatcher::new(PathBuf::from("/work"));
        assert_eq!(dispatcher.project_root(), Path::new("/work"));
    }
}
