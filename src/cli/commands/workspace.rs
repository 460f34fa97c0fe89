//! Project state shared by the commands.

use std::path::{Path, PathBuf};

use crate::cache::{MarkerStore, MARKER_DIR};
use crate::config::{load_config, LoadedConfig};
use crate::detection::{FeatureDetector, GpuProbe, GPU_TAG};
use crate::error::Result;
use crate::runner::{tasks_from_config, Task};
use crate::shell::expand_path;

/// A project root with its loaded configuration.
pub struct Workspace {
    pub project_root: PathBuf,
    pub loaded: LoadedConfig,
}

impl Workspace {
    /// Load configuration for `project_root`.
    pub fn load(project_root: &Path, config: Option<&Path>) -> Result<Self> {
        let loaded = load_config(project_root, config)?;
        tracing::debug!("Using config: {}", loaded.source.describe());
        Ok(Self {
            project_root: project_root.to_path_buf(),
            loaded,
        })
    }

    /// Directory holding markers and the readiness file.
    pub fn state_dir(&self) -> PathBuf {
        expand_path(&self.loaded.config.settings.state_dir, &self.project_root)
    }

    /// Marker store under the state directory.
    pub fn marker_store(&self) -> MarkerStore {
        MarkerStore::new(self.state_dir().join(MARKER_DIR))
    }

    /// Readiness file path.
    pub fn readiness_path(&self) -> PathBuf {
        expand_path(
            &self.loaded.config.settings.readiness_path(),
            &self.project_root,
        )
    }

    /// Config files fingerprinting the "initialized" marker.
    pub fn global_sources(&self) -> Vec<PathBuf> {
        self.loaded.source.fingerprint_paths().to_vec()
    }

    /// Feature detector configured from the `gpu` section.
    pub fn detector(&self) -> FeatureDetector {
        let gpu = &self.loaded.config.gpu;
        let probe = GpuProbe {
            device_paths: gpu.device_paths.clone(),
            driver_paths: gpu.driver_paths.clone(),
            query_tool: gpu.query_tool.clone(),
        };
        FeatureDetector::new(probe).with_exports(GPU_TAG, gpu.env.clone())
    }

    /// Tasks in execution order.
    pub fn tasks(&self) -> Result<Vec<Task>> {
        tasks_from_config(&self.loaded.config, &self.project_root)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn paths_resolve_under_project() {
        let temp = TempDir::new().unwrap();
        fs::create_dir_all(temp.path().join(".primer")).unwrap();
        fs::write(
            temp.path().join(".primer/config.yml"),
            "settings:\n  state_dir: .state\ntasks:\n  a:\n    steps:\n      - run: [\"true\"]\n",
        )
        .unwrap();

        let ws = Workspace::load(temp.path(), None).unwrap();

        assert_eq!(ws.state_dir(), temp.path().join(".state"));
        assert_eq!(ws.readiness_path(), temp.path().join(".state/ready"));
        assert_eq!(ws.marker_store().root(), temp.path().join(".state/markers"));
        assert_eq!(
            ws.global_sources(),
            vec![temp.path().join(".primer/config.yml")]
        );
        assert_eq!(ws.tasks().unwrap().len(), 1);
    }
}
