//! Readiness signalling and end-of-run summaries.

pub mod readiness;
pub mod reporter;

pub use readiness::{ReadinessState, TaskSummary};
pub use reporter::{headline, task_line, StatusReporter};
