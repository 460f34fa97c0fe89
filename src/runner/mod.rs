//! Task model and grouped, cached execution.

pub mod result;
pub mod sequencer;
pub mod skip;
pub mod task;

pub use result::{RunResult, SequenceOutcome, TaskStatus};
pub use sequencer::{
    EnvLookup, Plan, PlannedStep, PlannedTask, SequenceOptions, Sequencer,
};
pub use skip::{run_check, CheckContext, CheckResult};
pub use task::{tasks_from_config, StepAction, Task, TaskStep};
