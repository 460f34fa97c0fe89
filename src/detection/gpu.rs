//! GPU passthrough detection.
//!
//! A GPU is present when a device node or a driver-info directory exists.
//! The query tool (`nvidia-smi` by default) only enriches the result: a
//! container can see the device without having any way to introspect it.

use std::collections::HashMap;
use std::env::VarError;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::capability::Capability;
use crate::error::PrimerError;
use crate::shell::{CommandSpec, ToolInvoker};

/// Capability tag for GPUs.
pub const GPU_TAG: &str = "gpu";

/// Environment variables that describe GPU visibility, and the metadata key
/// each is reported under.
const VISIBILITY_VARS: &[(&str, &str)] = &[
    ("NVIDIA_VISIBLE_DEVICES", "visible_devices"),
    ("NVIDIA_DRIVER_CAPABILITIES", "driver_capabilities"),
];

const QUERY_FIELDS: &[&str] = &["driver_version", "device_name", "utilization"];

const QUERY_TIMEOUT: Duration = Duration::from_secs(10);

/// Where to look for a GPU and how to introspect it.
#[derive(Debug, Clone, PartialEq)]
pub struct GpuProbe {
    /// Device nodes whose existence proves a GPU is passed through.
    pub device_paths: Vec<PathBuf>,
    /// Driver-info directories whose existence proves a loaded driver.
    pub driver_paths: Vec<PathBuf>,
    /// Optional introspection tool.
    pub query_tool: String,
}

impl Default for GpuProbe {
    fn default() -> Self {
        Self {
            device_paths: vec![
                PathBuf::from("/dev/nvidia0"),
                PathBuf::from("/dev/nvidiactl"),
            ],
            driver_paths: vec![PathBuf::from("/proc/driver/nvidia")],
            query_tool: "nvidia-smi".to_string(),
        }
    }
}

impl GpuProbe {
    /// Probe for a GPU, enriching the result with the query tool if available.
    pub fn detect_with_env<F>(&self, invoker: &dyn ToolInvoker, env_fn: &F) -> Capability
    where
        F: Fn(&str) -> Result<String, VarError> + ?Sized,
    {
        match self.probe_presence() {
            Ok(true) => {}
            Ok(false) => {
                tracing::debug!("No GPU device node or driver directory found");
                return Capability::absent(GPU_TAG);
            }
            Err(e) => {
                tracing::warn!("{}; treating GPU as absent", e);
                return Capability::absent(GPU_TAG);
            }
        }

        let capability = Capability::present(GPU_TAG);
        self.enrich(capability, invoker, env_fn)
    }

    /// Check device nodes and driver directories.
    ///
    /// Any confirmed path wins. Otherwise an unreadable path makes the
    /// result inconclusive.
    pub fn probe_presence(&self) -> Result<bool, PrimerError> {
        let mut inconclusive = None;

        for path in self.device_paths.iter().chain(&self.driver_paths) {
            match probe_path(path) {
                Ok(true) => {
                    tracing::debug!("GPU evidence found at {}", path.display());
                    return Ok(true);
                }
                Ok(false) => {}
                Err(e) => inconclusive = Some(e),
            }
        }

        match inconclusive {
            Some(e) => Err(e),
            None => Ok(false),
        }
    }

    fn enrich<F>(&self, mut capability: Capability, invoker: &dyn ToolInvoker, env_fn: &F) -> Capability
    where
        F: Fn(&str) -> Result<String, VarError> + ?Sized,
    {
        let mut env = HashMap::new();
        if let Ok(path) = env_fn("PATH") {
            env.insert("PATH".to_string(), path);
        }

        if invoker.locate(&self.query_tool, &env).is_none() {
            tracing::debug!(
                "GPU present but {} is not available; skipping introspection",
                self.query_tool
            );
            return capability;
        }

        let spec = CommandSpec::new(&self.query_tool)
            .arg("--query-gpu=driver_version,name,utilization.gpu")
            .arg("--format=csv,noheader,nounits")
            .envs(&env)
            .timeout(Some(QUERY_TIMEOUT));

        match invoker.invoke(&spec) {
            Ok(result) if result.success => {
                let metadata = parse_query_output(&result.stdout);
                capability.metadata.extend(metadata);
            }
            Ok(result) => {
                tracing::warn!(
                    "{} exited with {:?}; GPU details unavailable",
                    self.query_tool,
                    result.exit_code
                );
            }
            Err(e) => tracing::warn!("GPU introspection failed: {}", e),
        }

        for (var, key) in VISIBILITY_VARS {
            if let Ok(value) = env_fn(var) {
                capability.metadata.insert((*key).to_string(), value);
            }
        }

        capability
    }
}

/// Whether `path` exists. Errors other than "not found" are inconclusive.
fn probe_path(path: &Path) -> Result<bool, PrimerError> {
    match fs::metadata(path) {
        Ok(_) => Ok(true),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
        Err(e) => Err(PrimerError::DetectionInconclusive {
            tag: GPU_TAG.to_string(),
            message: format!("cannot inspect {}: {}", path.display(), e),
        }),
    }
}

/// Parse `driver_version, name, utilization` CSV rows.
///
/// The first row describes the primary device; `device_count` reports how
/// many rows were returned.
fn parse_query_output(stdout: &str) -> Vec<(String, String)> {
    let rows: Vec<&str> = stdout.lines().filter(|l| !l.trim().is_empty()).collect();
    let Some(first) = rows.first() else {
        return Vec::new();
    };

    let mut metadata: Vec<(String, String)> = QUERY_FIELDS
        .iter()
        .zip(first.split(','))
        .map(|(key, value)| (key.to_string(), value.trim().to_string()))
        .filter(|(_, value)| !value.is_empty() && value != "[N/A]")
        .collect();

    metadata.push(("device_count".to_string(), rows.len().to_string()));
    metadata
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Result;
    use crate::shell::CommandResult;
    use tempfile::TempDir;

    struct FakeSmi {
        stdout: &'static str,
    }

    impl ToolInvoker for FakeSmi {
        fn invoke(&self, _spec: &CommandSpec) -> Result<CommandResult> {
            Ok(CommandResult::success(
                self.stdout.to_string(),
                String::new(),
                Duration::ZERO,
            ))
        }

        fn locate(&self, program: &str, _env: &HashMap<String, String>) -> Option<PathBuf> {
            Some(PathBuf::from("/usr/bin").join(program))
        }
    }

    struct NoTools;

    impl ToolInvoker for NoTools {
        fn invoke(&self, spec: &CommandSpec) -> Result<CommandResult> {
            Err(PrimerError::ToolNotFound {
                tool: spec.program.clone(),
            })
        }

        fn locate(&self, _program: &str, _env: &HashMap<String, String>) -> Option<PathBuf> {
            None
        }
    }

    fn probe_in(root: &Path) -> GpuProbe {
        GpuProbe {
            device_paths: vec![root.join("dev/nvidia0")],
            driver_paths: vec![root.join("proc/driver/nvidia")],
            query_tool: "nvidia-smi".to_string(),
        }
    }

    fn env_with_visibility(key: &str) -> std::result::Result<String, VarError> {
        match key {
            "NVIDIA_VISIBLE_DEVICES" => Ok("all".to_string()),
            _ => Err(VarError::NotPresent),
        }
    }

    #[test]
    fn driver_directory_without_tool_is_present_with_empty_metadata() {
        let temp = TempDir::new().unwrap();
        fs::create_dir_all(temp.path().join("proc/driver/nvidia")).unwrap();

        let capability = probe_in(temp.path()).detect_with_env(&NoTools, &env_with_visibility);

        assert_eq!(capability, Capability::present(GPU_TAG));
        assert!(capability.metadata.is_empty());
    }

    #[test]
    fn device_node_is_enough() {
        let temp = TempDir::new().unwrap();
        fs::create_dir_all(temp.path().join("dev")).unwrap();
        fs::write(temp.path().join("dev/nvidia0"), "").unwrap();

        let capability = probe_in(temp.path()).detect_with_env(&NoTools, &env_with_visibility);

        assert!(capability.present);
    }

    #[test]
    fn nothing_found_is_absent() {
        let temp = TempDir::new().unwrap();

        let capability = probe_in(temp.path()).detect_with_env(&FakeSmi { stdout: "" }, &env_with_visibility);

        assert_eq!(capability, Capability::absent(GPU_TAG));
    }

    #[test]
    fn tool_enriches_metadata() {
        let temp = TempDir::new().unwrap();
        fs::create_dir_all(temp.path().join("proc/driver/nvidia")).unwrap();
        let smi = FakeSmi {
            stdout: "550.54.14, NVIDIA A100-SXM4-40GB, 3\n550.54.14, NVIDIA A100-SXM4-40GB, 0\n",
        };

        let capability = probe_in(temp.path()).detect_with_env(&smi, &env_with_visibility);

        assert!(capability.present);
        assert_eq!(capability.metadata["driver_version"], "550.54.14");
        assert_eq!(capability.metadata["device_name"], "NVIDIA A100-SXM4-40GB");
        assert_eq!(capability.metadata["utilization"], "3");
        assert_eq!(capability.metadata["device_count"], "2");
        assert_eq!(capability.metadata["visible_devices"], "all");
    }

    #[test]
    fn failing_tool_keeps_presence() {
        struct BrokenSmi;

        impl ToolInvoker for BrokenSmi {
            fn invoke(&self, _spec: &CommandSpec) -> Result<CommandResult> {
                Ok(CommandResult::failure(
                    Some(9),
                    String::new(),
                    "NVIDIA-SMI has failed".to_string(),
                    Duration::ZERO,
                ))
            }

            fn locate(&self, program: &str, _env: &HashMap<String, String>) -> Option<PathBuf> {
                Some(PathBuf::from(program))
            }
        }

        let temp = TempDir::new().unwrap();
        fs::create_dir_all(temp.path().join("proc/driver/nvidia")).unwrap();

        let capability = probe_in(temp.path()).detect_with_env(&BrokenSmi, &env_with_visibility);

        assert!(capability.present);
        assert!(!capability.metadata.contains_key("driver_version"));
    }

    #[cfg(unix)]
    #[test]
    fn unreadable_parent_is_inconclusive() {
        use std::os::unix::fs::PermissionsExt;

        let temp = TempDir::new().unwrap();
        let locked = temp.path().join("locked");
        fs::create_dir(&locked).unwrap();
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).unwrap();

        let probe = GpuProbe {
            device_paths: vec![locked.join("nvidia0")],
            driver_paths: vec![],
            query_tool: "nvidia-smi".to_string(),
        };
        let result = probe.probe_presence();

        fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();

        // Root can traverse unreadable directories, so only assert the
        // fail-safe outcome.
        match result {
            Ok(present) => assert!(!present),
            Err(e) => assert!(matches!(e, PrimerError::DetectionInconclusive { .. })),
        }
    }

    #[test]
    fn parse_query_output_skips_not_available() {
        let metadata = parse_query_output("535.104.05, Tesla T4, [N/A]\n");
        assert!(metadata.contains(&("driver_version".to_string(), "535.104.05".to_string())));
        assert!(!metadata.iter().any(|(k, _)| k == "utilization"));
    }

    #[test]
    fn parse_query_output_empty() {
        assert!(parse_query_output("\n").is_empty());
    }
}
