use std::path::PathBuf;
use std::time::{Duration, SystemTime};

use thiserror::Error;

use crate::shared::constants::{
    DEBUG_DIR_NAME, DEFAULT_DEBUG_MAX_BYTES, DEFAULT_DEBUG_RETENTION, DEFAULT_SNAPSHOT_INTERVAL_SECS,
    DEFAULT_SNAPSHOT_RETENTION, SNAPSHOT_DIR_NAME,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ArtifactKind {
    /// Periodic or event-forced capture of the raw frame.
    Snapshot,
    /// Match evidence with the ROI and match region drawn in.
    Debug,
}

impl ArtifactKind {
    pub const ALL: [ArtifactKind; 2] = [ArtifactKind::Snapshot, ArtifactKind::Debug];

    /// File name prefix for this category.
    pub fn prefix(&self) -> &'static str {
        match self {
            ArtifactKind::Snapshot => "snapshot",
            ArtifactKind::Debug => "match",
        }
    }

    pub fn dir_name(&self) -> &'static str {
        match self {
            ArtifactKind::Snapshot => SNAPSHOT_DIR_NAME,
            ArtifactKind::Debug => DEBUG_DIR_NAME,
        }
    }
}

impl std::fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ArtifactKind::Snapshot => write!(f, "snapshot"),
            ArtifactKind::Debug => write!(f, "debug"),
        }
    }
}

/// A persisted image owned by a retention ledger until evicted.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Artifact {
    pub kind: ArtifactKind,
    /// Monotonically increasing across both categories; eviction order.
    pub sequence: u64,
    pub created_at: SystemTime,
    pub path: PathBuf,
    /// Size on disk, counted against the category's byte cap.
    pub size_bytes: u64,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ArtifactPolicy {
    /// Minimum time between two snapshot writes unless forced.
    pub snapshot_interval: Duration,
    /// Snapshots kept after eviction. Zero disables snapshot writes.
    pub snapshot_retention: usize,
    /// Debug images kept after eviction. Zero disables debug writes.
    pub debug_retention: usize,
    /// Total bytes of debug images kept after eviction; `None` is unbounded.
    pub debug_max_bytes: Option<u64>,
}

impl ArtifactPolicy {
    pub fn retention(&self, kind: ArtifactKind) -> usize {
        match kind {
            ArtifactKind::Snapshot => self.snapshot_retention,
            ArtifactKind::Debug => self.debug_retention,
        }
    }

    /// Byte cap of `kind`. Snapshots are bounded by count only.
    pub fn max_bytes(&self, kind: ArtifactKind) -> Option<u64> {
        match kind {
            ArtifactKind::Snapshot => None,
            ArtifactKind::Debug => self.debug_max_bytes,
        }
    }
}

impl Default for ArtifactPolicy {
    fn default() -> Self {
        Self {
            snapshot_interval: Duration::from_secs_f64(DEFAULT_SNAPSHOT_INTERVAL_SECS),
            snapshot_retention: DEFAULT_SNAPSHOT_RETENTION,
            debug_retention: DEFAULT_DEBUG_RETENTION,
            debug_max_bytes: Some(DEFAULT_DEBUG_MAX_BYTES),
        }
    }
}

#[derive(Error, Debug)]
pub enum ArtifactError {
    #[error("failed to write artifact {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to encode artifact {path}: {source}")]
    Encode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("failed to delete artifact {path}: {source}")]
    Delete {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to scan artifact directory {path}: {source}")]
    Scan {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_policy() {
        let policy = ArtifactPolicy::default();
        assert_eq!(policy.snapshot_interval, Duration::from_secs(5));
        assert_eq!(policy.retention(ArtifactKind::Snapshot), 50);
        assert_eq!(policy.retention(ArtifactKind::Debug), 2000);
        assert_eq!(policy.max_bytes(ArtifactKind::Debug), Some(1 << 30));
        assert_eq!(policy.max_bytes(ArtifactKind::Snapshot), None);
    }

    #[test]
    fn test_kinds_use_distinct_namespaces() {
        assert_ne!(
            ArtifactKind::Snapshot.dir_name(),
            ArtifactKind::Debug.dir_name()
        );
        assert_ne!(ArtifactKind::Snapshot.prefix(), ArtifactKind::Debug.prefix());
    }

    #[test]
    fn test_error_messages_name_the_path() {
        let err = ArtifactError::Delete {
            path: PathBuf::from("/tmp/a.png"),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        };
        assert!(err.to_string().contains("/tmp/a.png"));
    }
}
