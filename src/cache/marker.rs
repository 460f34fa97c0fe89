//! Marker and fingerprint types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// A persisted "already done" record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Marker {
    /// Key the marker was recorded under.
    pub key: String,
    /// When the marker was recorded.
    pub recorded_at: DateTime<Utc>,
    /// Inputs the marker depends on.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fingerprints: Vec<Fingerprint>,
}

/// Modification time of the input a marker was recorded against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fingerprint {
    /// Path of the input artifact.
    pub source: PathBuf,
    /// Modification time of `source` when the marker was recorded.
    pub modified: DateTime<Utc>,
}

impl Fingerprint {
    /// Capture the current fingerprint of `source`.
    ///
    /// Returns `None` when the file is missing or its mtime is unavailable.
    pub fn capture(source: &Path) -> Option<Self> {
        file_mtime(source).map(|modified| Self {
            source: source.to_path_buf(),
            modified,
        })
    }
}

/// Why a marker is not valid.
#[derive(Debug, Clone, PartialEq)]
pub enum Staleness {
    /// The marker is valid.
    Current,
    /// No marker was recorded.
    Missing,
    /// The marker was recorded without a fingerprint but one is now required.
    Unfingerprinted,
    /// The fingerprint source no longer exists.
    SourceMissing { source: PathBuf },
    /// The source changed after the marker was recorded.
    Changed {
        source: PathBuf,
        recorded: DateTime<Utc>,
        current: DateTime<Utc>,
    },
}

impl Staleness {
    /// Whether the marker can be trusted.
    pub fn is_current(&self) -> bool {
        matches!(self, Self::Current)
    }
}

impl Marker {
    /// Create a marker recorded now.
    pub fn new(key: impl Into<String>, fingerprints: Vec<Fingerprint>) -> Self {
        Self {
            key: key.into(),
            recorded_at: Utc::now(),
            fingerprints,
        }
    }

    /// Check this marker against the current state of `source`.
    pub fn check(&self, source: Option<&Path>) -> Staleness {
        self.check_all(source.as_slice())
    }

    /// Check this marker against every input in `sources`.
    ///
    /// Valid when each source has a stored fingerprint that is not older
    /// than the source's current modification time, and no fingerprinted
    /// input has dropped out of `sources`.
    pub fn check_all<P: AsRef<Path>>(&self, sources: &[P]) -> Staleness {
        for source in sources {
            let source = source.as_ref();

            let Some(current) = file_mtime(source) else {
                return Staleness::SourceMissing {
                    source: source.to_path_buf(),
                };
            };

            let Some(stored) = self.fingerprints.iter().find(|f| f.source == source) else {
                return Staleness::Unfingerprinted;
            };

            if stored.modified < current {
                return Staleness::Changed {
                    source: source.to_path_buf(),
                    recorded: stored.modified,
                    current,
                };
            }
        }

        if sources.is_empty() {
            return Staleness::Current;
        }

        match self
            .fingerprints
            .iter()
            .find(|f| !sources.iter().any(|s| s.as_ref() == f.source))
        {
            Some(dropped) => Staleness::SourceMissing {
                source: dropped.source.clone(),
            },
            None => Staleness::Current,
        }
    }
}

fn file_mtime(path: &Path) -> Option<DateTime<Utc>> {
    fs::metadata(path)
        .ok()
        .and_then(|m| m.modified().ok())
        .map(DateTime::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, SystemTime};
    use tempfile::TempDir;

    fn touch_forward(path: &Path, secs: u64) {
        let file = fs::File::options().write(true).open(path).unwrap();
        file.set_modified(SystemTime::now() + Duration::from_secs(secs))
            .unwrap();
    }

    #[test]
    fn marker_without_source_is_current() {
        let marker = Marker::new("python", vec![]);
        assert_eq!(marker.check(None), Staleness::Current);
    }

    #[test]
    fn marker_without_fingerprint_is_stale_when_source_given() {
        let temp = TempDir::new().unwrap();
        let source = temp.path().join("requirements.txt");
        fs::write(&source, "numpy\n").unwrap();

        let marker = Marker::new("python", vec![]);

        assert_eq!(marker.check(Some(&source)), Staleness::Unfingerprinted);
    }

    #[test]
    fn fingerprint_matches_unchanged_source() {
        let temp = TempDir::new().unwrap();
        let source = temp.path().join("requirements.txt");
        fs::write(&source, "numpy\n").unwrap();

        let marker = Marker::new("python", Fingerprint::capture(&source).into_iter().collect());

        assert!(marker.check(Some(&source)).is_current());
    }

    #[test]
    fn modified_source_is_changed() {
        let temp = TempDir::new().unwrap();
        let source = temp.path().join("requirements.txt");
        fs::write(&source, "numpy\n").unwrap();
        let marker = Marker::new("python", Fingerprint::capture(&source).into_iter().collect());

        fs::write(&source, "numpy\npandas\n").unwrap();
        touch_forward(&source, 5);

        assert!(matches!(
            marker.check(Some(&source)),
            Staleness::Changed { .. }
        ));
    }

    #[test]
    fn deleted_source_is_stale() {
        let temp = TempDir::new().unwrap();
        let source = temp.path().join("requirements.txt");
        fs::write(&source, "numpy\n").unwrap();
        let marker = Marker::new("python", Fingerprint::capture(&source).into_iter().collect());

        fs::remove_file(&source).unwrap();

        assert!(matches!(
            marker.check(Some(&source)),
            Staleness::SourceMissing { .. }
        ));
    }

    #[test]
    fn every_source_is_checked() {
        let temp = TempDir::new().unwrap();
        let base = temp.path().join("config.yml");
        let local = temp.path().join("config.local.yml");
        fs::write(&base, "tasks: {}\n").unwrap();
        fs::write(&local, "tasks: {}\n").unwrap();
        let sources = [base.clone(), local.clone()];
        let marker = Marker::new(
            "initialized",
            sources.iter().filter_map(|s| Fingerprint::capture(s)).collect(),
        );
        assert!(marker.check_all(&sources).is_current());

        touch_forward(&local, 5);

        assert!(matches!(
            marker.check_all(&sources),
            Staleness::Changed { source, .. } if source == local
        ));
    }

    #[test]
    fn added_source_is_unfingerprinted() {
        let temp = TempDir::new().unwrap();
        let base = temp.path().join("config.yml");
        let local = temp.path().join("config.local.yml");
        fs::write(&base, "tasks: {}\n").unwrap();
        let marker = Marker::new("initialized", Fingerprint::capture(&base).into_iter().collect());

        fs::write(&local, "tasks: {}\n").unwrap();

        assert_eq!(
            marker.check_all(&[base, local]),
            Staleness::Unfingerprinted
        );
    }

    #[test]
    fn dropped_source_is_stale() {
        let temp = TempDir::new().unwrap();
        let base = temp.path().join("config.yml");
        let local = temp.path().join("config.local.yml");
        fs::write(&base, "tasks: {}\n").unwrap();
        fs::write(&local, "tasks: {}\n").unwrap();
        let marker = Marker::new(
            "initialized",
            [&base, &local]
                .iter()
                .filter_map(|s| Fingerprint::capture(s))
                .collect(),
        );

        assert!(matches!(
            marker.check_all(&[base]),
            Staleness::SourceMissing { source } if source == local
        ));
    }

    #[test]
    fn capture_missing_file_is_none() {
        let temp = TempDir::new().unwrap();
        assert!(Fingerprint::capture(&temp.path().join("nope")).is_none());
    }
}
