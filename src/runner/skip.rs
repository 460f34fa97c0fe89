//! Declarative "already done" checks.
//!
//! Checks run before any step of a task, so a warm environment is detected
//! without touching package managers or the network.

use crate::config::SkipCheck;
use crate::shell::{CommandSpec, ToolInvoker};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

/// Result of running a skip check.
///
/// `description` is user-visible: it becomes the skip reason.
#[derive(Debug, Clone)]
pub struct CheckResult {
    /// Whether the check passed (task is already done).
    pub complete: bool,

    /// Description of what was checked.
    pub description: String,
}

impl CheckResult {
    fn complete(description: impl Into<String>) -> Self {
        Self {
            complete: true,
            description: description.into(),
        }
    }

    fn incomplete(description: impl Into<String>) -> Self {
        Self {
            complete: false,
            description: description.into(),
        }
    }
}

/// Everything a check needs from its surroundings.
pub struct CheckContext<'a> {
    pub project_root: &'a Path,
    pub invoker: &'a dyn ToolInvoker,
    pub env: &'a HashMap<String, String>,
}

/// Run a skip check.
pub fn run_check(check: &SkipCheck, ctx: &CheckContext<'_>) -> CheckResult {
    match check {
        SkipCheck::FileExists { path } => check_file_exists(path, ctx.project_root),
        SkipCheck::DirPopulated { path } => check_dir_populated(path, ctx.project_root),
        SkipCheck::CommandSucceeds { run } => check_command_succeeds(run, ctx),
        SkipCheck::All { checks } => check_all(checks, ctx),
        SkipCheck::Any { checks } => check_any(checks, ctx),
    }
}

fn resolve(path: &Path, project_root: &Path) -> std::path::PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        project_root.join(path)
    }
}

fn check_file_exists(path: &Path, project_root: &Path) -> CheckResult {
    if resolve(path, project_root).exists() {
        CheckResult::complete(format!("{} exists", path.display()))
    } else {
        CheckResult::incomplete(format!("{} missing", path.display()))
    }
}

fn check_dir_populated(path: &Path, project_root: &Path) -> CheckResult {
    let populated = fs::read_dir(resolve(path, project_root))
        .map(|mut entries| entries.next().is_some())
        .unwrap_or(false);

    if populated {
        CheckResult::complete(format!("{} populated", path.display()))
    } else {
        CheckResult::incomplete(format!("{} empty or missing", path.display()))
    }
}

fn check_command_succeeds(run: &[String], ctx: &CheckContext<'_>) -> CheckResult {
    let Some((program, args)) = run.split_first() else {
        return CheckResult::incomplete("empty command");
    };

    let spec = CommandSpec::new(program)
        .args(args.to_vec())
        .envs(ctx.env)
        .cwd(ctx.project_root);
    let shown = truncate(&spec.display(), 50);

    match ctx.invoker.invoke(&spec) {
        Ok(result) if result.success => CheckResult::complete(format!("`{}` succeeded", shown)),
        Ok(_) => CheckResult::incomplete(format!("`{}` failed", shown)),
        Err(e) => {
            tracing::debug!("Skip check `{}` could not run: {}", shown, e);
            CheckResult::incomplete(format!("`{}` could not run", shown))
        }
    }
}

fn check_all(checks: &[SkipCheck], ctx: &CheckContext<'_>) -> CheckResult {
    // Stop at the first incomplete check; later ones may be expensive.
    for check in checks {
        let result = run_check(check, ctx);
        if !result.complete {
            return result;
        }
    }
    CheckResult::complete(format!("all {} checks passed", checks.len()))
}

fn check_any(checks: &[SkipCheck], ctx: &CheckContext<'_>) -> CheckResult {
    let mut missed = Vec::new();
    for check in checks {
        let result = run_check(check, ctx);
        if result.complete {
            return result;
        }
        missed.push(result.description);
    }
    CheckResult::incomplete(missed.join("; "))
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let head: String = s.chars().take(max_len - 3).collect();
        format!("{}...", head)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Result;
    use crate::shell::CommandResult;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tempfile::TempDir;

    /// Succeeds for `true`, fails for anything else.
    #[derive(Default)]
    struct FakeInvoker {
        calls: AtomicUsize,
    }

    impl ToolInvoker for FakeInvoker {
        fn invoke(&self, spec: &CommandSpec) -> Result<CommandResult> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if spec.program == "true" {
                Ok(CommandResult::success(String::new(), String::new(), Duration::ZERO))
            } else {
                Ok(CommandResult::failure(Some(1), String::new(), String::new(), Duration::ZERO))
            }
        }
    }

    fn check(temp: &TempDir, invoker: &FakeInvoker, check: &SkipCheck) -> CheckResult {
        let env = HashMap::new();
        let ctx = CheckContext {
            project_root: temp.path(),
            invoker,
            env: &env,
        };
        run_check(check, &ctx)
    }

    #[test]
    fn file_exists_relative_to_project() {
        let temp = TempDir::new().unwrap();
        let invoker = FakeInvoker::default();
        let exists = SkipCheck::FileExists {
            path: PathBuf::from("uv.lock"),
        };

        assert!(!check(&temp, &invoker, &exists).complete);

        fs::write(temp.path().join("uv.lock"), "").unwrap();
        let result = check(&temp, &invoker, &exists);
        assert!(result.complete);
        assert_eq!(result.description, "uv.lock exists");
    }

    #[test]
    fn dir_populated_needs_an_entry() {
        let temp = TempDir::new().unwrap();
        let invoker = FakeInvoker::default();
        let populated = SkipCheck::DirPopulated {
            path: PathBuf::from(".venv/lib"),
        };

        assert!(!check(&temp, &invoker, &populated).complete);

        fs::create_dir_all(temp.path().join(".venv/lib")).unwrap();
        assert!(!check(&temp, &invoker, &populated).complete);

        fs::create_dir(temp.path().join(".venv/lib/python3.12")).unwrap();
        assert!(check(&temp, &invoker, &populated).complete);
    }

    #[test]
    fn command_succeeds_goes_through_invoker() {
        let temp = TempDir::new().unwrap();
        let invoker = FakeInvoker::default();

        let ok = SkipCheck::CommandSucceeds {
            run: vec!["true".into()],
        };
        let bad = SkipCheck::CommandSucceeds {
            run: vec!["dotnet".into(), "--version".into()],
        };

        assert!(check(&temp, &invoker, &ok).complete);
        assert!(!check(&temp, &invoker, &bad).complete);
        assert_eq!(invoker.calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn all_stops_at_first_incomplete() {
        let temp = TempDir::new().unwrap();
        let invoker = FakeInvoker::default();
        let all = SkipCheck::All {
            checks: vec![
                SkipCheck::FileExists {
                    path: PathBuf::from("missing"),
                },
                SkipCheck::CommandSucceeds {
                    run: vec!["true".into()],
                },
            ],
        };

        let result = check(&temp, &invoker, &all);

        assert!(!result.complete);
        assert_eq!(invoker.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn any_passes_on_one_match() {
        let temp = TempDir::new().unwrap();
        let invoker = FakeInvoker::default();
        let any = SkipCheck::Any {
            checks: vec![
                SkipCheck::FileExists {
                    path: PathBuf::from("missing"),
                },
                SkipCheck::CommandSucceeds {
                    run: vec!["true".into()],
                },
            ],
        };

        let result = check(&temp, &invoker, &any);

        assert!(result.complete);
        assert_eq!(result.description, "`true` succeeded");
    }

    #[test]
    fn truncate_long_commands() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("abcdefghijklmnop", 10), "abcdefg...");
    }
}
