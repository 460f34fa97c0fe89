//! Optional hardware and runtime feature detection.
//!
//! Detection never mutates state. It produces a [`CapabilitySet`] that tasks
//! consume read-only, plus the environment values a present capability
//! contributes to every task invocation.
//!
//! # Example
//!
//! ```no_run
//! use primer::detection::{FeatureDetector, GPU_TAG};
//! use primer::shell::SystemInvoker;
//!
//! let detector = FeatureDetector::default();
//! let gpu = detector.detect(GPU_TAG, &SystemInvoker);
//! println!("gpu present: {}", gpu.present);
//! ```

pub mod capability;
pub mod gpu;

pub use capability::{Capability, CapabilitySet};
pub use gpu::{GpuProbe, GPU_TAG};

use std::collections::{BTreeMap, HashMap};
use std::env::VarError;

use crate::shell::ToolInvoker;

/// Probes capabilities by tag.
#[derive(Debug, Clone, Default)]
pub struct FeatureDetector {
    gpu: GpuProbe,
    /// Environment contributed by each capability when present.
    exports: BTreeMap<String, BTreeMap<String, String>>,
}

impl FeatureDetector {
    /// Create a detector with the given GPU probe.
    pub fn new(gpu: GpuProbe) -> Self {
        Self {
            gpu,
            exports: BTreeMap::new(),
        }
    }

    /// Set the environment values a capability exports when present.
    pub fn with_exports(mut self, tag: impl Into<String>, env: BTreeMap<String, String>) -> Self {
        self.exports.insert(tag.into(), env);
        self
    }

    /// Detect one capability using the process environment.
    pub fn detect(&self, tag: &str, invoker: &dyn ToolInvoker) -> Capability {
        self.detect_with_env(tag, invoker, &|key: &str| std::env::var(key))
    }

    /// Detect one capability with a custom env var lookup (for testing).
    ///
    /// Unknown tags cannot be probed and are reported absent.
    pub fn detect_with_env<F>(&self, tag: &str, invoker: &dyn ToolInvoker, env_fn: &F) -> Capability
    where
        F: Fn(&str) -> Result<String, VarError> + ?Sized,
    {
        match tag {
            GPU_TAG => self.gpu.detect_with_env(invoker, env_fn),
            other => {
                tracing::warn!("No probe for capability '{}'; treating as absent", other);
                Capability::absent(other)
            }
        }
    }

    /// Detect every tag once.
    pub fn detect_all<'t, I, F>(&self, tags: I, invoker: &dyn ToolInvoker, env_fn: &F) -> CapabilitySet
    where
        I: IntoIterator<Item = &'t str>,
        F: Fn(&str) -> Result<String, VarError> + ?Sized,
    {
        let mut set = CapabilitySet::new();
        for tag in tags {
            if set.get(tag).is_none() {
                let capability = self.detect_with_env(tag, invoker, env_fn);
                tracing::info!(
                    "Capability {}: {}",
                    capability.tag,
                    if capability.present { "present" } else { "absent" }
                );
                set.insert(capability);
            }
        }
        set
    }

    /// Environment contributed by the present capabilities in `set`.
    pub fn exports_for(&self, set: &CapabilitySet) -> HashMap<String, String> {
        let mut env = HashMap::new();
        for capability in set.iter().filter(|c| c.present) {
            if let Some(vars) = self.exports.get(&capability.tag) {
                env.extend(vars.iter().map(|(k, v)| (k.clone(), v.clone())));
            }
        }
        env
    }
}
