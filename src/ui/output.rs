//! Output mode and writer.

use std::str::FromStr;

use super::theme::PrimerTheme;

/// Output verbosity mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputMode {
    /// Show per-task lines and failure output.
    Verbose,
    /// Show per-task lines and the summary.
    #[default]
    Normal,
    /// Show the summary and failures only.
    Quiet,
    /// Show nothing except errors.
    Silent,
}

impl FromStr for OutputMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "verbose" => Ok(Self::Verbose),
            "normal" => Ok(Self::Normal),
            "quiet" => Ok(Self::Quiet),
            "silent" => Ok(Self::Silent),
            _ => Err(format!("unknown output mode: {}", s)),
        }
    }
}

impl OutputMode {
    /// Check if this mode shows command output excerpts for every task.
    pub fn shows_command_output(&self) -> bool {
        matches!(self, Self::Verbose)
    }

    /// Check if this mode shows one line per task.
    pub fn shows_tasks(&self) -> bool {
        matches!(self, Self::Verbose | Self::Normal)
    }

    /// Check if this mode shows status messages.
    pub fn shows_status(&self) -> bool {
        !matches!(self, Self::Silent)
    }
}

/// Output writer that respects output mode.
#[derive(Debug)]
pub struct Output {
    mode: OutputMode,
    theme: PrimerTheme,
}

impl Output {
    /// Create a new output writer.
    pub fn new(mode: OutputMode, theme: PrimerTheme) -> Self {
        Self { mode, theme }
    }

    /// Get the output mode.
    pub fn mode(&self) -> OutputMode {
        self.mode
    }

    /// Get the theme.
    pub fn theme(&self) -> &PrimerTheme {
        &self.theme
    }

    /// Write a line if the mode allows status messages.
    pub fn println(&self, msg: &str) {
        if self.mode.shows_status() {
            println!("{}", msg);
        }
    }

    /// Write a per-task line if the mode allows it.
    pub fn task_line(&self, msg: &str) {
        if self.mode.shows_tasks() {
            println!("{}", msg);
        }
    }

    /// Write an error line; shown in every mode.
    pub fn error(&self, msg: &str) {
        eprintln!("{}", self.theme.format_error(msg));
    }
}
