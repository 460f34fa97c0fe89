//! Configuration loading, parsing, and validation.
//!
//! - Schema definitions in [`schema`]
//! - File discovery and loading in [`loader`]
//! - Deep merging in [`merger`]
//! - Validation in [`validator`]
//!
//! # Example
//!
//! ```
//! use primer::config::load_config;
//! use tempfile::TempDir;
//! use std::fs;
//!
//! let temp = TempDir::new().unwrap();
//! let dir = temp.path().join(".primer");
//! fs::create_dir_all(&dir).unwrap();
//! fs::write(
//!     dir.join("config.yml"),
//!     "tasks:\n  python:\n    steps:\n      - run: [python3, --version]\n",
//! )
//! .unwrap();
//!
//! let loaded = load_config(temp.path(), None).unwrap();
//! assert_eq!(loaded.config.ordered_task_names(), vec!["python"]);
//! ```
//!
//! # Configuration File Locations
//!
//! 1. `--config <path>` (or `PRIMER_CONFIG`), used alone
//! 2. Project config (`.primer/config.yml`) merged with
//!    local overrides (`.primer/config.local.yml`)
//! 3. The built-in default

pub mod loader;
pub mod merger;
pub mod schema;
pub mod validator;

pub use schema::{GpuConfig, PrimerConfig, Settings, SkipCheck, StepConfig, TaskConfig};

pub use loader::{
    builtin_config, load_config, load_config_file, load_config_value, load_merged_config,
    parse_config, ConfigPaths, ConfigSource, LoadedConfig, CONFIG_DIR,
};

pub use merger::{deep_merge, merge_configs};

pub use validator::{validate, validate_config, ValidationError};
