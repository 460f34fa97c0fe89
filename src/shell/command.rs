//! External tool invocation.
//!
//! Every package manager, certificate store or driver query tool is reached
//! through [`ToolInvoker`]. The invoker never interprets what a tool does: a
//! non-zero exit is part of the [`CommandResult`], and only a program that
//! cannot be located or launched is an error ([`PrimerError::ToolNotFound`]).

use crate::error::{PrimerError, Result};
use std::collections::HashMap;
use std::ffi::OsString;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use super::platform::{detect_shell, is_ci};

/// How often a child with a deadline is polled for completion.
const POLL_INTERVAL: Duration = Duration::from_millis(25);

/// Number of trailing output lines kept for reporting.
pub const EXCERPT_LINES: usize = 20;

/// A fully-described external command.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CommandSpec {
    /// Program name (looked up on PATH) or path.
    pub program: String,

    /// Arguments passed verbatim.
    pub args: Vec<String>,

    /// Environment overrides (merged over the inherited environment).
    pub env: HashMap<String, String>,

    /// Working directory.
    pub cwd: Option<PathBuf>,

    /// Kill the command once this much time has elapsed.
    pub timeout: Option<Duration>,
}

impl CommandSpec {
    /// Create a spec for `program` with no arguments.
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            ..Default::default()
        }
    }

    /// Append one argument.
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Append several arguments.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Set one environment override.
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Merge environment overrides; existing keys are replaced.
    pub fn envs(mut self, env: &HashMap<String, String>) -> Self {
        self.env
            .extend(env.iter().map(|(k, v)| (k.clone(), v.clone())));
        self
    }

    /// Set the working directory.
    pub fn cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    /// Set the timeout.
    pub fn timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Human-readable command line, used in logs and dry runs.
    pub fn display(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .map(|part| {
                if part.is_empty() || part.contains(char::is_whitespace) {
                    format!("'{}'", part)
                } else {
                    part.to_string()
                }
            })
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Build a spec that runs `script` through the user's shell.
pub fn shell_command(script: &str) -> CommandSpec {
    let shell = detect_shell();
    CommandSpec::new(shell.executable.to_string_lossy())
        .arg(shell_flag())
        .arg(script)
}

/// Get the flag to pass a script to the shell.
///
/// Login shells pick up version managers activated in profile files. The
/// interactive flag is never used because bootstrap runs without a TTY.
fn shell_flag() -> &'static str {
    shell_flag_for(is_ci())
}

fn shell_flag_for(ci: bool) -> &'static str {
    if cfg!(target_os = "windows") {
        "/C"
    } else if ci {
        "-c"
    } else {
        "-lc"
    }
}

/// Result of executing an external command.
#[derive(Debug, Clone)]
pub struct CommandResult {
    /// Exit code (None if killed by signal or timeout).
    pub exit_code: Option<i32>,

    /// Standard output.
    pub stdout: String,

    /// Standard error.
    pub stderr: String,

    /// Execution duration.
    pub duration: Duration,

    /// Whether command succeeded (exit code 0).
    pub success: bool,

    /// Whether the command was killed at its deadline.
    pub timed_out: bool,
}

impl CommandResult {
    /// Create a success result.
    pub fn success(stdout: String, stderr: String, duration: Duration) -> Self {
        Self {
            exit_code: Some(0),
            stdout,
            stderr,
            duration,
            success: true,
            timed_out: false,
        }
    }

    /// Create a failure result.
    pub fn failure(
        exit_code: Option<i32>,
        stdout: String,
        stderr: String,
        duration: Duration,
    ) -> Self {
        Self {
            exit_code,
            stdout,
            stderr,
            duration,
            success: false,
            timed_out: false,
        }
    }

    /// Create a result for a command killed at its deadline.
    pub fn timed_out(duration: Duration) -> Self {
        Self {
            exit_code: None,
            stdout: String::new(),
            stderr: String::new(),
            duration,
            success: false,
            timed_out: true,
        }
    }

    /// The last `max_lines` lines of output, stderr after stdout.
    pub fn excerpt(&self, max_lines: usize) -> String {
        let lines: Vec<&str> = self
            .stdout
            .lines()
            .chain(self.stderr.lines())
            .filter(|l| !l.trim().is_empty())
            .collect();
        let start = lines.len().saturating_sub(max_lines);
        lines[start..].join("\n")
    }
}

/// Seam for running external tools.
///
/// The sequencer only talks to tools through this trait, which lets tests
/// count or script invocations.
pub trait ToolInvoker: Send + Sync {
    /// Run the command described by `spec`.
    fn invoke(&self, spec: &CommandSpec) -> Result<CommandResult>;

    /// Resolve a program the same way [`invoke`](ToolInvoker::invoke) would.
    fn locate(&self, program: &str, env: &HashMap<String, String>) -> Option<PathBuf> {
        resolve_program(program, None, env)
    }
}

/// Invoker that spawns real processes.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemInvoker;

impl ToolInvoker for SystemInvoker {
    fn invoke(&self, spec: &CommandSpec) -> Result<CommandResult> {
        execute(spec)
    }
}

/// Execute a command, capturing its output.
pub fn execute(spec: &CommandSpec) -> Result<CommandResult> {
    let start = Instant::now();

    let program = resolve_program(&spec.program, spec.cwd.as_deref(), &spec.env).ok_or_else(
        || PrimerError::ToolNotFound {
            tool: spec.program.clone(),
        },
    )?;

    tracing::debug!("Running command: {}", spec.display());

    let mut cmd = Command::new(&program);
    cmd.args(&spec.args);

    if let Some(cwd) = &spec.cwd {
        cmd.current_dir(cwd);
    }

    for (key, value) in &spec.env {
        cmd.env(key, value);
    }

    cmd.stdin(Stdio::null());
    cmd.stdout(Stdio::piped());
    cmd.stderr(Stdio::piped());

    let mut child = cmd.spawn().map_err(|e| {
        tracing::debug!("Failed to launch {}: {}", program.display(), e);
        PrimerError::ToolNotFound {
            tool: spec.program.clone(),
        }
    })?;

    let stdout_handle = child.stdout.take().map(drain);
    let stderr_handle = child.stderr.take().map(drain);

    let status = match spec.timeout {
        Some(timeout) => wait_with_deadline(&mut child, start + timeout)?,
        None => Some(child.wait()?),
    };

    let duration = start.elapsed();

    let Some(status) = status else {
        // Grandchildren may still hold the pipes; leave the readers detached.
        tracing::debug!(
            "Command timed out after {:?}: {}",
            duration,
            spec.display()
        );
        return Ok(CommandResult::timed_out(duration));
    };

    let stdout = join_output(stdout_handle);
    let stderr = join_output(stderr_handle);

    if status.success() {
        Ok(CommandResult::success(stdout, stderr, duration))
    } else {
        Ok(CommandResult::failure(status.code(), stdout, stderr, duration))
    }
}

/// Execute a command and return success/failure.
pub fn execute_check(spec: &CommandSpec) -> bool {
    execute(spec).map(|r| r.success).unwrap_or(false)
}

fn drain<R: Read + Send + 'static>(mut reader: R) -> JoinHandle<String> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = reader.read_to_end(&mut buf);
        String::from_utf8_lossy(&buf).into_owned()
    })
}

fn join_output(handle: Option<JoinHandle<String>>) -> String {
    handle
        .map(|h| h.join().unwrap_or_default())
        .unwrap_or_default()
}

/// Wait for `child` until `deadline`; kill it and return `None` on expiry.
fn wait_with_deadline(child: &mut Child, deadline: Instant) -> Result<Option<ExitStatus>> {
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(Some(status));
        }
        if Instant::now() >= deadline {
            let _ = child.kill();
            let _ = child.wait();
            return Ok(None);
        }
        thread::sleep(POLL_INTERVAL);
    }
}

/// Resolve a program to an executable path.
///
/// Programs containing a path separator are resolved against `cwd`. Bare
/// names are searched on the `PATH` from `env`, falling back to the
/// inherited `PATH`.
pub fn resolve_program(
    program: &str,
    cwd: Option<&Path>,
    env: &HashMap<String, String>,
) -> Option<PathBuf> {
    if program.is_empty() {
        return None;
    }

    let as_path = Path::new(program);
    if as_path.components().count() > 1 || as_path.is_absolute() {
        let full = match cwd {
            Some(dir) if as_path.is_relative() => dir.join(as_path),
            _ => as_path.to_path_buf(),
        };
        return (full.is_file() && is_executable(&full)).then_some(full);
    }

    let path_var: Option<OsString> = env
        .get("PATH")
        .map(OsString::from)
        .or_else(|| std::env::var_os("PATH"));

    let entries: Vec<PathBuf> = path_var
        .map(|p| std::env::split_paths(&p).collect())
        .unwrap_or_default();

    resolve_tool_path(program, &entries)
}

/// Resolve a tool's binary path by iterating over PATH entries.
///
/// Returns the first match that exists and is executable.
pub fn resolve_tool_path(tool: &str, path_entries: &[PathBuf]) -> Option<PathBuf> {
    for dir in path_entries {
        let candidate = dir.join(tool);
        if candidate.is_file() && is_executable(&candidate) {
            return Some(candidate);
        }
        if cfg!(windows) {
            let exe = dir.join(format!("{}.exe", tool));
            if exe.is_file() {
                return Some(exe);
            }
        }
    }
    None
}

/// Check whether a file has executable permission bits set.
#[cfg(unix)]
pub fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    path.metadata()
        .map(|m| m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

/// On Windows, executability is determined by file extension, not permission bits.
#[cfg(not(unix))]
pub fn is_executable(_path: &Path) -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn execute_successful_command() {
        let spec = CommandSpec::new("echo").arg("hello");

        let result = execute(&spec).unwrap();

        assert!(result.success);
        assert_eq!(result.exit_code, Some(0));
        assert!(result.stdout.contains("hello"));
    }

    #[test]
    fn execute_failing_command_is_not_an_error() {
        let result = execute(&CommandSpec::new("false")).unwrap();

        assert!(!result.success);
        assert_eq!(result.exit_code, Some(1));
        assert!(!result.timed_out);
    }

    #[test]
    fn execute_missing_program_is_tool_not_found() {
        let err = execute(&CommandSpec::new("definitely-not-a-real-tool-4242")).unwrap_err();
        assert!(matches!(err, PrimerError::ToolNotFound { tool } if tool == "definitely-not-a-real-tool-4242"));
    }

    #[test]
    fn execute_with_env_override() {
        let spec = shell_command("echo $PRIMER_TEST_VAR").env("PRIMER_TEST_VAR", "my_value");

        let result = execute(&spec).unwrap();

        assert!(result.success);
        assert!(result.stdout.contains("my_value"));
    }

    #[test]
    fn execute_with_cwd() {
        let temp = tempfile::TempDir::new().unwrap();
        let spec = CommandSpec::new("pwd").cwd(temp.path());

        let result = execute(&spec).unwrap();

        assert!(result.success);
        let reported = PathBuf::from(result.stdout.trim());
        assert_eq!(
            reported.canonicalize().unwrap(),
            temp.path().canonicalize().unwrap()
        );
    }

    #[test]
    fn execute_times_out() {
        let spec = CommandSpec::new("sleep")
            .arg("5")
            .timeout(Some(Duration::from_millis(100)));

        let result = execute(&spec).unwrap();

        assert!(result.timed_out);
        assert!(!result.success);
        assert!(result.duration < Duration::from_secs(5));
    }

    #[test]
    fn execute_check_returns_bool() {
        assert!(execute_check(&CommandSpec::new("true")));
        assert!(!execute_check(&CommandSpec::new("false")));
        assert!(!execute_check(&CommandSpec::new("no-such-tool-for-primer")));
    }

    #[test]
    fn resolve_program_uses_env_path() {
        let temp = tempfile::TempDir::new().unwrap();
        let mut env = HashMap::new();
        env.insert("PATH".to_string(), temp.path().display().to_string());

        assert!(resolve_program("echo", None, &env).is_none());
    }

    #[cfg(unix)]
    #[test]
    fn resolve_program_relative_to_cwd() {
        use std::os::unix::fs::PermissionsExt;

        let temp = tempfile::TempDir::new().unwrap();
        let bin = temp.path().join("bin");
        std::fs::create_dir(&bin).unwrap();
        let tool = bin.join("tool");
        std::fs::write(&tool, "#!/bin/sh\nexit 0\n").unwrap();
        std::fs::set_permissions(&tool, std::fs::Permissions::from_mode(0o755)).unwrap();

        let found = resolve_program("bin/tool", Some(temp.path()), &HashMap::new());
        assert_eq!(found, Some(tool));
        assert!(resolve_program("bin/other", Some(temp.path()), &HashMap::new()).is_none());
    }

    #[cfg(unix)]
    #[test]
    fn resolve_tool_path_skips_non_executable() {
        use std::os::unix::fs::PermissionsExt;

        let temp = tempfile::TempDir::new().unwrap();
        let file = temp.path().join("script");
        std::fs::write(&file, "data").unwrap();
        std::fs::set_permissions(&file, std::fs::Permissions::from_mode(0o644)).unwrap();

        assert!(resolve_tool_path("script", &[temp.path().to_path_buf()]).is_none());
    }

    #[test]
    fn display_quotes_whitespace() {
        let spec = CommandSpec::new("sh").args(["-c", "echo hi"]);
        assert_eq!(spec.display(), "sh -c 'echo hi'");
    }

    #[test]
    fn excerpt_keeps_last_lines() {
        let result = CommandResult::failure(
            Some(1),
            "one\ntwo\nthree\n".to_string(),
            "boom\n".to_string(),
            Duration::ZERO,
        );
        assert_eq!(result.excerpt(2), "three\nboom");
        assert_eq!(result.excerpt(10), "one\ntwo\nthree\nboom");
    }

    #[cfg(unix)]
    #[test]
    fn shell_flag_uses_plain_c_in_ci() {
        assert_eq!(shell_flag_for(true), "-c");
        assert_eq!(shell_flag_for(false), "-lc");
    }
}
