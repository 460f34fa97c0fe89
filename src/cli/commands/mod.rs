//! CLI command implementations.
//!
//! Each command implements the [`Command`] trait, which provides a uniform
//! interface for executing commands and reporting results.
//!
//! # Architecture
//!
//! Commands are dispatched via [`CommandDispatcher`], which routes CLI
//! subcommands to their implementations. Commands that touch project state
//! load it through [`workspace::Workspace`].

pub mod completions;
pub mod detect;
pub mod dispatcher;
pub mod reset;
pub mod run;
pub mod status;
pub mod workspace;

pub use dispatcher::{Command, CommandDispatcher, CommandResult};
