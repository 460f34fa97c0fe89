//! Platform-specific shell detection.

use std::path::{Path, PathBuf};

/// Information about the current shell environment.
#[derive(Debug, Clone)]
pub struct ShellInfo {
    /// Shell executable path.
    pub executable: PathBuf,

    /// Shell name (bash, zsh, fish, powershell, cmd).
    pub name: ShellType,

    /// Init file that receives profile lines for this shell.
    pub profile_file: Option<PathBuf>,
}

/// Known shell types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShellType {
    Bash,
    Zsh,
    Fish,
    PowerShell,
    Cmd,
    Unknown,
}

impl ShellType {
    /// Parse shell type from executable name.
    pub fn from_executable(exe: &str) -> Self {
        let name = Path::new(exe)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("")
            .to_lowercase();

        match name.as_str() {
            "bash" => ShellType::Bash,
            "zsh" => ShellType::Zsh,
            "fish" => ShellType::Fish,
            "powershell" | "pwsh" => ShellType::PowerShell,
            "cmd" => ShellType::Cmd,
            _ => ShellType::Unknown,
        }
    }
}

/// Detect the current shell environment.
pub fn detect_shell() -> ShellInfo {
    let executable = get_shell_executable();
    let shell_type = ShellType::from_executable(&executable.to_string_lossy());

    ShellInfo {
        executable,
        name: shell_type,
        profile_file: get_profile_file(shell_type),
    }
}

fn get_shell_executable() -> PathBuf {
    if cfg!(target_os = "windows") {
        std::env::var("COMSPEC")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("cmd.exe"))
    } else {
        std::env::var("SHELL")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/bin/sh"))
    }
}

fn get_profile_file(shell_type: ShellType) -> Option<PathBuf> {
    let home = dirs::home_dir()?;

    match shell_type {
        ShellType::Bash | ShellType::Unknown => Some(home.join(".bashrc")),
        ShellType::Zsh => Some(home.join(".zshrc")),
        ShellType::Fish => Some(home.join(".config/fish/config.fish")),
        ShellType::PowerShell | ShellType::Cmd => None,
    }
}

/// Expand a leading `~` to the home directory and resolve relative paths
/// against `base`.
pub fn expand_path(path: &Path, base: &Path) -> PathBuf {
    if let Ok(rest) = path.strip_prefix("~") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }

    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

/// Check if running in a CI environment.
///
/// Checks common CI environment variables: `CI`, `GITHUB_ACTIONS`,
/// `GITLAB_CI`, `CIRCLECI`, `TRAVIS`, `JENKINS_URL`.
pub fn is_ci() -> bool {
    std::env::var("CI").is_ok()
        || std::env::var("GITHUB_ACTIONS").is_ok()
        || std::env::var("GITLAB_CI").is_ok()
        || std::env::var("CIRCLECI").is_ok()
        || std::env::var("TRAVIS").is_ok()
        || std::env::var("JENKINS_URL").is_ok()
}
