//! Shell command execution and profile management.

pub mod command;
pub mod platform;
pub mod profile;

pub use command::{
    execute, execute_check, resolve_program, shell_command, CommandResult, CommandSpec,
    SystemInvoker, ToolInvoker, EXCERPT_LINES,
};
pub use platform::{detect_shell, expand_path, is_ci, ShellInfo, ShellType};
pub use profile::{append_if_absent, AppendOutcome};
