//! Configuration validation rules.
//!
//! This module validates configuration for correctness:
//! - `sequence` must reference existing tasks, each at most once
//! - Task names must not collide with the reserved marker key
//! - Tasks must have steps, and each step exactly one action

use crate::cache::INITIALIZED_KEY;
use crate::config::schema::{PrimerConfig, SkipCheck, StepConfig};
use crate::error::{PrimerError, Result};
use std::collections::HashSet;

/// Validation error with context.
#[derive(Debug, Clone)]
pub struct ValidationError {
    /// Rule identifier
    pub rule: String,
    /// Human-readable error message
    pub message: String,
    /// Task name if error is task-specific
    pub task: Option<String>,
}

impl ValidationError {
    fn new(rule: &str, message: String, task: Option<&str>) -> Self {
        Self {
            rule: rule.to_string(),
            message,
            task: task.map(String::from),
        }
    }
}

/// Validate a configuration and return all errors.
///
/// This function collects all validation errors rather than stopping
/// at the first one, allowing users to fix multiple issues at once.
pub fn validate_config(config: &PrimerConfig) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    errors.extend(validate_sequence(config));
    errors.extend(validate_tasks(config));

    errors
}

fn validate_sequence(config: &PrimerConfig) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    let mut seen = HashSet::new();

    for name in &config.sequence {
        if !config.tasks.contains_key(name) {
            errors.push(ValidationError::new(
                "unknown-task",
                format!("Sequence references task '{}' which does not exist", name),
                Some(name),
            ));
        }
        if !seen.insert(name) {
            errors.push(ValidationError::new(
                "duplicate-task",
                format!("Task '{}' appears more than once in sequence", name),
                Some(name),
            ));
        }
    }

    errors
}

fn validate_tasks(config: &PrimerConfig) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    let mut names: Vec<&String> = config.tasks.keys().collect();
    names.sort();

    for name in names {
        let task = &config.tasks[name];

        if name == INITIALIZED_KEY {
            errors.push(ValidationError::new(
                "reserved-name",
                format!("Task name '{}' is reserved", name),
                Some(name),
            ));
        }

        if task.steps.is_empty() {
            errors.push(ValidationError::new(
                "missing-steps",
                format!("Task '{}' has no steps", name),
                Some(name),
            ));
        }

        for (index, step) in task.steps.iter().enumerate() {
            if let Some(message) = step_problem(step) {
                errors.push(ValidationError::new(
                    "invalid-step",
                    format!("Task '{}' step {}: {}", name, index + 1, message),
                    Some(name),
                ));
            }
        }

        if let Some(check) = &task.skip_if {
            if let Some(message) = skip_check_problem(check) {
                errors.push(ValidationError::new(
                    "invalid-skip-check",
                    format!("Task '{}' skip_if: {}", name, message),
                    Some(name),
                ));
            }
        }
    }

    errors
}

fn step_problem(step: &StepConfig) -> Option<String> {
    let actions = [
        step.run.is_some(),
        step.shell.is_some(),
        step.append_profile.is_some(),
    ]
    .iter()
    .filter(|set| **set)
    .count();

    match actions {
        0 => Some("must set one of 'run', 'shell' or 'append_profile'".to_string()),
        1 => {
            if step.run.as_ref().is_some_and(|argv| argv.is_empty()) {
                Some("'run' must name a program".to_string())
            } else if step.profile.is_some() && step.append_profile.is_none() {
                Some("'profile' is only valid with 'append_profile'".to_string())
            } else {
                None
            }
        }
        _ => Some("must set only one of 'run', 'shell' or 'append_profile'".to_string()),
    }
}

fn skip_check_problem(check: &SkipCheck) -> Option<String> {
    match check {
        SkipCheck::CommandSucceeds { run } if run.is_empty() => {
            Some("'command_succeeds' must name a program".to_string())
        }
        SkipCheck::All { checks } | SkipCheck::Any { checks } => {
            if checks.is_empty() {
                Some("'all'/'any' needs at least one check".to_string())
            } else {
                checks.iter().find_map(skip_check_problem)
            }
        }
        _ => None,
    }
}

/// Validate and return Result (for convenience).
///
/// # Errors
///
/// Returns `ConfigValidationError` if any validation rules fail.
pub fn validate(config: &PrimerConfig) -> Result<()> {
    let errors = validate_config(config);

    if errors.is_empty() {
        Ok(())
    } else {
        let messages: Vec<_> = errors.iter().map(|e| e.message.clone()).collect();
        Err(PrimerError::ConfigValidationError {
            message: messages.join("; "),
        })
    }
}
