//! CLI argument definitions.
//!
//! This module defines all CLI arguments using clap's derive macros.
//! The main entry point is the [`Cli`] struct.

use clap::{Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

/// Primer - idempotent development environment bootstrap.
#[derive(Debug, Parser)]
#[command(name = "primer")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to config file (overrides .primer/config.yml)
    #[arg(short, long, global = true, env = "PRIMER_CONFIG")]
    pub config: Option<PathBuf>,

    /// Path to project root (overrides current directory)
    #[arg(short, long, global = true)]
    pub project: Option<PathBuf>,

    /// Show command output for every task
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Only show the summary and failures
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Bootstrap the environment (default if no command specified)
    Run(RunArgs),

    /// Show markers and readiness
    Status(StatusArgs),

    /// Remove markers so the next run redoes work
    Reset(ResetArgs),

    /// Print detected capabilities
    Detect(DetectArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

/// Arguments for the `run` command.
#[derive(Debug, Clone, Default, clap::Args)]
pub struct RunArgs {
    /// Ignore markers and skip checks
    #[arg(short, long, env = "PRIMER_FORCE")]
    pub force: bool,

    /// Run only specified tasks (comma-separated)
    #[arg(long, value_delimiter = ',')]
    pub only: Vec<String>,

    /// Show planned steps without running anything
    #[arg(long)]
    pub dry_run: bool,

    /// Per-task timeout in seconds (overrides configuration)
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,
}

/// Arguments for the `status` command.
#[derive(Debug, Clone, Default, clap::Args)]
pub struct StatusArgs {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `reset` command.
#[derive(Debug, Clone, Default, clap::Args)]
pub struct ResetArgs {
    /// Remove every marker
    #[arg(long, conflicts_with = "tasks")]
    pub all: bool,

    /// Tasks whose markers to remove
    pub tasks: Vec<String>,
}

/// Arguments for the `detect` command.
#[derive(Debug, Clone, Default, clap::Args)]
pub struct DetectArgs {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `completions` command.
#[derive(Debug, Clone, clap::Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: Shell,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_subcommand_is_allowed() {
        let cli = Cli::try_parse_from(["primer"]).unwrap();
        assert!(cli.command.is_none());
    }

    #[test]
    fn parses_run_flags() {
        let cli = Cli::try_parse_from([
            "primer",
            "run",
            "--force",
            "--only",
            "python,dotnet",
            "--timeout",
            "30",
        ])
        .unwrap();

        match cli.command {
            Some(Commands::Run(args)) => {
                assert!(args.force);
                assert_eq!(args.only, vec!["python", "dotnet"]);
                assert_eq!(args.timeout, Some(30));
                assert!(!args.dry_run);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn global_flags_after_subcommand() {
        let cli =
            Cli::try_parse_from(["primer", "status", "--project", "/work", "--quiet"]).unwrap();
        assert_eq!(cli.project, Some(PathBuf::from("/work")));
        assert!(cli.quiet);
    }

    #[test]
    fn reset_all_conflicts_with_tasks() {
        assert!(Cli::try_parse_from(["primer", "reset", "--all", "python"]).is_err());

        let cli = Cli::try_parse_from(["primer", "reset", "python", "dotnet"]).unwrap();
        match cli.command {
            Some(Commands::Reset(args)) => assert_eq!(args.tasks, vec!["python", "dotnet"]),
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn completions_requires_shell() {
        assert!(Cli::try_parse_from(["primer", "completions"]).is_err());
        assert!(Cli::try_parse_from(["primer", "completions", "bash"]).is_ok());
    }

    #[test]
    fn cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
