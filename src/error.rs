//! Error types for primer operations.
//!
//! This module defines [`PrimerError`], the primary error type used throughout
//! the crate, and a [`Result`] type alias for convenience.
//!
//! # Error Handling Strategy
//!
//! - Tool and detection failures are recorded per task and never abort a
//!   sibling task; they surface as a non-zero exit code
//! - Use `anyhow::Error` (via `PrimerError::Other`) for unexpected errors
//! - All errors should provide actionable messages for users

use std::path::PathBuf;
use thiserror::Error;

/// Core error type for primer operations.
#[derive(Debug, Error)]
pub enum PrimerError {
    /// External command could not be located or launched.
    #[error("Tool not found: {tool}")]
    ToolNotFound { tool: String },

    /// External command exited with a non-zero status.
    #[error("Tool '{tool}' failed with exit code {code:?}")]
    ToolFailed { tool: String, code: Option<i32> },

    /// A feature probe could not decide whether the capability is present.
    #[error("Detection of '{tag}' was inconclusive: {message}")]
    DetectionInconclusive { tag: String, message: String },

    /// A task exceeded its time budget.
    #[error("Task '{task}' timed out after {seconds}s")]
    TimedOut { task: String, seconds: u64 },

    /// Configuration file not found at expected location.
    #[error("Configuration not found: {path}")]
    ConfigNotFound { path: PathBuf },

    /// Failed to parse configuration file.
    #[error("Failed to parse config at {path}: {message}")]
    ConfigParseError { path: PathBuf, message: String },

    /// Invalid configuration structure or values.
    #[error("Invalid configuration: {message}")]
    ConfigValidationError { message: String },

    /// IO error wrapper.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic wrapped error for anyhow interop.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type alias for primer operations.
pub type Result<T> = std::result::Result<T, PrimerError>;
