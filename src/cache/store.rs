//! Marker storage implementation.

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use super::marker::{Fingerprint, Marker, Staleness};

/// Per-key marker files under one directory.
///
/// Each key lives in its own file, so writers for different keys never
/// touch the same bytes. Writes go through a temporary sibling and a rename,
/// and same-key writers are serialized by a per-key lock.
#[derive(Debug)]
pub struct MarkerStore {
    /// Directory holding marker files.
    root: PathBuf,
    key_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
    tmp_counter: AtomicU64,
}

impl MarkerStore {
    /// Create a marker store rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            key_locks: Mutex::new(HashMap::new()),
            tmp_counter: AtomicU64::new(0),
        }
    }

    /// Get the marker directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn ensure_dir(&self) -> Result<()> {
        fs::create_dir_all(&self.root)
            .with_context(|| format!("Failed to create marker directory {:?}", self.root))
    }

    /// Get the file path for a key.
    ///
    /// The readable part keeps the directory browsable; the digest keeps
    /// distinct keys distinct after sanitizing.
    pub fn marker_path(&self, key: &str) -> PathBuf {
        let readable: String = key
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .take(48)
            .collect();
        let hash = Sha256::digest(key.as_bytes());
        self.root
            .join(format!("{}-{}.json", readable, hex::encode(&hash[..6])))
    }

    fn lock_for(&self, key: &str) -> Arc<Mutex<()>> {
        let mut locks = self
            .key_locks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        Arc::clone(locks.entry(key.to_string()).or_default())
    }

    /// Load a marker. Unreadable or corrupt markers are treated as absent.
    pub fn load(&self, key: &str) -> Option<Marker> {
        let path = self.marker_path(key);
        let json = fs::read_to_string(&path).ok()?;
        match serde_json::from_str::<Marker>(&json) {
            Ok(marker) if marker.key == key => Some(marker),
            Ok(_) => None,
            Err(e) => {
                tracing::warn!("Ignoring corrupt marker {}: {}", path.display(), e);
                None
            }
        }
    }

    /// Explain whether the marker for `key` is valid against `source`.
    pub fn staleness(&self, key: &str, source: Option<&Path>) -> Staleness {
        self.staleness_all(key, source.as_slice())
    }

    /// Explain whether the marker for `key` is valid against every source.
    pub fn staleness_all<P: AsRef<Path>>(&self, key: &str, sources: &[P]) -> Staleness {
        match self.load(key) {
            Some(marker) => marker.check_all(sources),
            None => Staleness::Missing,
        }
    }

    /// Whether the marker for `key` exists and still matches `source`.
    pub fn is_valid(&self, key: &str, source: Option<&Path>) -> bool {
        self.staleness(key, source).is_current()
    }

    /// Whether the marker for `key` exists and still matches every source.
    pub fn is_valid_all<P: AsRef<Path>>(&self, key: &str, sources: &[P]) -> bool {
        self.staleness_all(key, sources).is_current()
    }

    /// Record a marker for `key`, fingerprinting `source` if given.
    pub fn record(&self, key: &str, source: Option<&Path>) -> Result<Marker> {
        self.record_all(key, source.as_slice())
    }

    /// Record a marker for `key`, fingerprinting every source as it is now.
    pub fn record_all<P: AsRef<Path>>(&self, key: &str, sources: &[P]) -> Result<Marker> {
        self.record_fingerprints(key, capture_all(key, sources))
    }

    /// Record a marker for `key` with fingerprints captured earlier.
    ///
    /// Used when the inputs must be read before the work they guard runs,
    /// so an edit made while the work was in flight still invalidates.
    pub fn record_fingerprints(&self, key: &str, fingerprints: Vec<Fingerprint>) -> Result<Marker> {
        let marker = Marker::new(key, fingerprints);
        let json = serde_json::to_string_pretty(&marker)?;

        let lock = self.lock_for(key);
        let _guard = lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner());

        self.ensure_dir()?;
        let path = self.marker_path(key);
        let tmp = path.with_extension(format!(
            "tmp-{}-{}",
            std::process::id(),
            self.tmp_counter.fetch_add(1, Ordering::Relaxed)
        ));
        fs::write(&tmp, json).with_context(|| format!("Failed to write {:?}", tmp))?;
        fs::rename(&tmp, &path).with_context(|| format!("Failed to move marker into {:?}", path))?;

        tracing::debug!("Recorded marker '{}'", key);
        Ok(marker)
    }

    /// Remove a marker.
    pub fn remove(&self, key: &str) -> Result<bool> {
        let lock = self.lock_for(key);
        let _guard = lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner());

        let path = self.marker_path(key);
        if path.exists() {
            fs::remove_file(&path)?;
            return Ok(true);
        }
        Ok(false)
    }

    /// List all markers, most recent first.
    pub fn list(&self) -> Result<Vec<Marker>> {
        if !self.root.exists() {
            return Ok(Vec::new());
        }

        let mut markers = Vec::new();

        for entry in fs::read_dir(&self.root)? {
            let path = entry?.path();

            if path.extension().is_some_and(|e| e == "json") {
                if let Ok(json) = fs::read_to_string(&path) {
                    if let Ok(marker) = serde_json::from_str::<Marker>(&json) {
                        markers.push(marker);
                    }
                }
            }
        }

        markers.sort_by(|a, b| b.recorded_at.cmp(&a.recorded_at));
        Ok(markers)
    }

    /// Remove all markers.
    pub fn clear(&self) -> Result<usize> {
        let markers = self.list()?;
        let mut removed = 0;

        for marker in markers {
            if self.remove(&marker.key)? {
                removed += 1;
            }
        }

        Ok(removed)
    }
}

/// Fingerprint every source as it is now, warning about missing ones.
pub fn capture_all<P: AsRef<Path>>(key: &str, sources: &[P]) -> Vec<Fingerprint> {
    sources
        .iter()
        .filter_map(|source| {
            let source = source.as_ref();
            let fingerprint = Fingerprint::capture(source);
            if fingerprint.is_none() {
                tracing::warn!(
                    "Fingerprint source {} is missing; marker for '{}' will not validate",
                    source.display(),
                    key
                );
            }
            fingerprint
        })
        .collect()
}
