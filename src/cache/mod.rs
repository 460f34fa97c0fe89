//! Persistent "already done" markers.
//!
//! Markers are kept one file per key and can be tied to the modification
//! time of an input artifact, so editing the input invalidates the marker.

pub mod marker;
pub mod store;

pub use marker::{Fingerprint, Marker, Staleness};
pub use store::{capture_all, MarkerStore};

/// Key of the whole-environment "initialized" marker.
pub const INITIALIZED_KEY: &str = "initialized";

/// Directory under the state dir that holds marker files.
pub const MARKER_DIR: &str = "markers";
