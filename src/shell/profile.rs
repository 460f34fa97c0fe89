//! Idempotent shell-profile edits.
//!
//! Setup tasks add `PATH` and environment lines to shell init files. Two
//! tasks may target the same file concurrently, so every append holds a
//! per-file lock for the whole read-check-write sequence. On Unix an
//! advisory `flock` additionally serializes appends from other processes.

use anyhow::Context;
use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, OnceLock};

use crate::error::Result;

/// Outcome of an append request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppendOutcome {
    /// The line was written.
    Appended,
    /// An identical line was already present.
    AlreadyPresent,
}

fn file_locks() -> &'static Mutex<HashMap<PathBuf, Arc<Mutex<()>>>> {
    static LOCKS: OnceLock<Mutex<HashMap<PathBuf, Arc<Mutex<()>>>>> = OnceLock::new();
    LOCKS.get_or_init(|| Mutex::new(HashMap::new()))
}

fn lock_for(path: &Path) -> Arc<Mutex<()>> {
    let mut locks = file_locks()
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    Arc::clone(locks.entry(path.to_path_buf()).or_default())
}

/// Append `line` to `path` unless an identical line already exists.
///
/// Lines are compared after trimming surrounding whitespace. Missing parent
/// directories and the file itself are created.
pub fn append_if_absent(path: &Path, line: &str) -> Result<AppendOutcome> {
    let wanted = line.trim();

    let lock = lock_for(path);
    let _guard = lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner());

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory {}", parent.display()))?;
    }

    let file = OpenOptions::new()
        .read(true)
        .append(true)
        .create(true)
        .open(path)
        .with_context(|| format!("Failed to open profile {}", path.display()))?;

    let _flock = FileLock::acquire(&file)?;

    let mut existing = String::new();
    (&file).seek(SeekFrom::Start(0))?;
    (&file).read_to_string(&mut existing)?;

    if existing.lines().any(|l| l.trim() == wanted) {
        tracing::debug!("Profile {} already contains line", path.display());
        return Ok(AppendOutcome::AlreadyPresent);
    }

    let mut chunk = String::new();
    if !existing.is_empty() && !existing.ends_with('\n') {
        chunk.push('\n');
    }
    chunk.push_str(wanted);
    chunk.push('\n');

    (&file).write_all(chunk.as_bytes())?;
    (&file).flush()?;

    tracing::info!("Added line to {}", path.display());
    Ok(AppendOutcome::Appended)
}

/// Advisory whole-file lock, released on drop.
struct FileLock<'a> {
    #[cfg_attr(not(unix), allow(dead_code))]
    file: &'a File,
}

impl<'a> FileLock<'a> {
    #[cfg(unix)]
    fn acquire(file: &'a File) -> Result<Self> {
        use std::os::unix::io::AsRawFd;

        // SAFETY: flock only reads the descriptor, which `file` keeps open.
        let rc = unsafe { libc::flock(file.as_raw_fd(), libc::LOCK_EX) };
        if rc != 0 {
            return Err(std::io::Error::last_os_error().into());
        }
        Ok(Self { file })
    }

    #[cfg(not(unix))]
    fn acquire(file: &'a File) -> Result<Self> {
        Ok(Self { file })
    }
}

#[cfg(unix)]
impl Drop for FileLock<'_> {
    fn drop(&mut self) {
        use std::os::unix::io::AsRawFd;

        // SAFETY: see `acquire`.
        unsafe {
            libc::flock(self.file.as_raw_fd(), libc::LOCK_UN);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use tempfile::TempDir;

    #[test]
    fn appends_to_new_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join(".bashrc");

        let outcome = append_if_absent(&path, "export PATH=\"$HOME/.dotnet/tools:$PATH\"").unwrap();

        assert_eq!(outcome, AppendOutcome::Appended);
        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "export PATH=\"$HOME/.dotnet/tools:$PATH\"\n"
        );
    }

    #[test]
    fn second_append_is_noop() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join(".bashrc");

        append_if_absent(&path, "export A=1").unwrap();
        let outcome = append_if_absent(&path, "  export A=1  ").unwrap();

        assert_eq!(outcome, AppendOutcome::AlreadyPresent);
        assert_eq!(fs::read_to_string(&path).unwrap(), "export A=1\n");
    }

    #[test]
    fn adds_missing_trailing_newline() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join(".profile");
        fs::write(&path, "alias ll='ls -l'").unwrap();

        append_if_absent(&path, "export B=2").unwrap();

        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "alias ll='ls -l'\nexport B=2\n"
        );
    }

    #[test]
    fn finds_line_in_existing_profile() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join(".zshrc");
        fs::write(&path, "alias ll='ls -l'\nexport D=4\nsetopt autocd\n").unwrap();

        let outcome = append_if_absent(&path, "export D=4").unwrap();

        assert_eq!(outcome, AppendOutcome::AlreadyPresent);
        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "alias ll='ls -l'\nexport D=4\nsetopt autocd\n"
        );
    }

    #[test]
    fn creates_parent_directories() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join(".config/fish/config.fish");

        append_if_absent(&path, "set -x C 3").unwrap();

        assert!(path.exists());
    }

    #[test]
    fn concurrent_appends_never_duplicate() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join(".bashrc");
        let lines = ["export A=1", "export B=2", "export A=1", "export B=2"];

        thread::scope(|s| {
            for _ in 0..4 {
                for line in lines {
                    let path = &path;
                    s.spawn(move || append_if_absent(path, line).unwrap());
                }
            }
        });

        let content = fs::read_to_string(&path).unwrap();
        let mut written: Vec<&str> = content.lines().collect();
        written.sort_unstable();
        assert_eq!(written, vec!["export A=1", "export B=2"]);
        assert!(content.ends_with('\n'));
    }
}
