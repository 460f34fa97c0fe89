//! Terminal output.
//!
//! This module provides:
//! - [`Output`] and [`OutputMode`] for verbosity-aware printing
//! - [`PrimerTheme`] for styled status lines
//! - Duration and timestamp formatting

pub mod format;
pub mod output;
pub mod theme;

pub use format::{format_duration, format_relative_time};
pub use output::{Output, OutputMode};
pub use theme::{should_use_colors, PrimerTheme};
