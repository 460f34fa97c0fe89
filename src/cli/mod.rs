//! Command-line interface for Primer.
//!
//! - [`args`] - Argument definitions using clap derive macros
//! - [`commands`] - Command implementations

pub mod args;
pub mod commands;

pub use args::{
    Cli, Commands, CompletionsArgs, DetectArgs, ResetArgs, RunArgs, StatusArgs,
};
pub use commands::{Command, CommandDispatcher, CommandResult};
