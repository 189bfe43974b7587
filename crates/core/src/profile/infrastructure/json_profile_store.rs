use std::collections::HashSet;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::artifacts::domain::artifact::ArtifactPolicy;
use crate::capture::infrastructure::image_file_reader::ImageFileReader;
use crate::comparison::domain::reference::{ComparisonMethod, Reference};
use crate::detection::domain::detection_event::DetectionEvent;
use crate::profile::domain::metadata_store::{MetadataStore, StoreError};
use crate::profile::domain::profile_context::{clamp_detection_threshold, ProfileContext};
use crate::shared::constants::{
    DEFAULT_DEBUG_MAX_BYTES, DEFAULT_DEBUG_RETENTION, DEFAULT_DETECTION_THRESHOLD,
    DEFAULT_SNAPSHOT_INTERVAL_SECS, DEFAULT_SNAPSHOT_RETENTION, EVENTS_FILE_NAME,
    PROFILE_FILE_NAME,
};
use crate::shared::region::Region;

#[derive(Error, Debug)]
pub enum ProfileLoadError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid JSON in {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to decode reference image {path}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("invalid profile: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileFile {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default = "default_detection_threshold")]
    pub detection_threshold: f64,
    #[serde(default)]
    pub roi: Option<Region>,
    #[serde(default)]
    pub artifact_policy: ArtifactPolicyFile,
    #[serde(default)]
    pub references: Vec<ReferenceFile>,
    /// Restricts matching to one reference by name.
    #[serde(default)]
    pub selected_reference: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactPolicyFile {
    #[serde(default = "default_snapshot_interval")]
    pub capture_snapshot_interval_s: f64,
    #[serde(default = "default_snapshot_retention")]
    pub snapshot_retention: usize,
    #[serde(default = "default_debug_retention")]
    pub debug_retention: usize,
    /// `null` removes the byte cap.
    #[serde(default = "default_debug_max_bytes")]
    pub debug_max_bytes: Option<u64>,
}

impl Default for ArtifactPolicyFile {
    fn default() -> Self {
        Self {
            capture_snapshot_interval_s: default_snapshot_interval(),
            snapshot_retention: default_snapshot_retention(),
            debug_retention: default_debug_retention(),
            debug_max_bytes: default_debug_max_bytes(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReferenceFile {
    pub name: String,
    /// Image path, relative to the profile directory unless absolute.
    pub file: PathBuf,
    #[serde(default)]
    pub threshold: Option<f64>,
    #[serde(default)]
    pub method: ComparisonMethod,
}

fn default_detection_threshold() -> f64 {
    DEFAULT_DETECTION_THRESHOLD
}

fn default_snapshot_interval() -> f64 {
    DEFAULT_SNAPSHOT_INTERVAL_SECS
}

fn default_snapshot_retention() -> usize {
    DEFAULT_SNAPSHOT_RETENTION
}

fn default_debug_retention() -> usize {
    DEFAULT_DEBUG_RETENTION
}

fn default_debug_max_bytes() -> Option<u64> {
    Some(DEFAULT_DEBUG_MAX_BYTES)
}

/// Metadata store backed by a profile directory.
///
/// The directory holds `profile.json`, the reference images it names, and
/// `events.jsonl` where closed events are appended one JSON object per line.
pub struct JsonProfileStore {
    dir: PathBuf,
}

impl JsonProfileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn profile_path(&self) -> PathBuf {
        self.dir.join(PROFILE_FILE_NAME)
    }

    pub fn events_path(&self) -> PathBuf {
        self.dir.join(EVENTS_FILE_NAME)
    }

    pub fn load(&self) -> Result<ProfileContext, ProfileLoadError> {
        let path = self.profile_path();
        let json = fs::read_to_string(&path).map_err(|source| ProfileLoadError::Io {
            path: path.clone(),
            source,
        })?;
        let file: ProfileFile = serde_json::from_str(&json)
            .map_err(|source| ProfileLoadError::Parse { path, source })?;
        self.build(file)
    }

    /// Events recorded so far, oldest first. Missing file means none.
    pub fn read_events(&self) -> Result<Vec<DetectionEvent>, ProfileLoadError> {
        let path = self.events_path();
        let text = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => return Err(ProfileLoadError::Io { path, source }),
        };
        text.lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| {
                serde_json::from_str(line).map_err(|source| ProfileLoadError::Parse {
                    path: path.clone(),
                    source,
                })
            })
            .collect()
    }

    pub fn append_event(&self, event: &DetectionEvent) -> Result<(), ProfileLoadError> {
        let path = self.events_path();
        let io_err = |source| ProfileLoadError::Io {
            path: path.clone(),
            source,
        };
        let mut line = serde_json::to_string(event).map_err(|source| ProfileLoadError::Parse {
            path: path.clone(),
            source,
        })?;
        line.push('\n');
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(io_err)?;
        file.write_all(line.as_bytes()).map_err(io_err)
    }

    fn build(&self, file: ProfileFile) -> Result<ProfileContext, ProfileLoadError> {
        let name = match file.name {
            Some(name) if !name.trim().is_empty() => name,
            _ => self
                .dir
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .ok_or_else(|| ProfileLoadError::Invalid("profile has no name".into()))?,
        };

        let interval = file.artifact_policy.capture_snapshot_interval_s;
        let snapshot_interval = Duration::try_from_secs_f64(interval).map_err(|_| {
            ProfileLoadError::Invalid(format!(
                "capture_snapshot_interval_s must be a non-negative number of seconds, got {interval}"
            ))
        })?;

        let detection_threshold = clamp_detection_threshold(file.detection_threshold);
        let mut seen = HashSet::new();
        let mut references = Vec::with_capacity(file.references.len());
        for entry in file.references {
            if entry.name.trim().is_empty() {
                return Err(ProfileLoadError::Invalid("reference with empty name".into()));
            }
            if !seen.insert(entry.name.clone()) {
                return Err(ProfileLoadError::Invalid(format!(
                    "duplicate reference name {:?}",
                    entry.name
                )));
            }
            let path = self.dir.join(&entry.file);
            let image = ImageFileReader::read(&path, 0)
                .map_err(|source| ProfileLoadError::Decode { path, source })?;
            let threshold = clamp_detection_threshold(entry.threshold.unwrap_or(detection_threshold));
            references.push(Reference::from_frame(entry.name, &image, threshold, entry.method));
        }

        if let Some(selected) = &file.selected_reference {
            if !seen.contains(selected) {
                return Err(ProfileLoadError::Invalid(format!(
                    "selected_reference {selected:?} is not a reference of this profile"
                )));
            }
        }

        log::info!(
            "Loaded profile {name:?} with {} reference(s)",
            references.len()
        );

        Ok(ProfileContext {
            name,
            references,
            detection_threshold,
            roi: file.roi,
            selected_reference: file.selected_reference,
            artifact_policy: ArtifactPolicy {
                snapshot_interval,
                snapshot_retention: file.artifact_policy.snapshot_retention,
                debug_retention: file.artifact_policy.debug_retention,
                debug_max_bytes: file.artifact_policy.debug_max_bytes,
            },
        })
    }
}

impl MetadataStore for JsonProfileStore {
    fn load_active_profile(&mut self) -> Result<ProfileContext, StoreError> {
        Ok(self.load()?)
    }

    fn record_event(&mut self, event: DetectionEvent) -> Result<(), StoreError> {
        Ok(self.append_event(&event)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::time::SystemTime;

    fn write_reference(dir: &Path, name: &str) {
        let img = image::RgbImage::from_fn(12, 12, |x, y| {
            if (x / 4 + y / 4) % 2 == 0 {
                image::Rgb([255, 255, 255])
            } else {
                image::Rgb([0, 0, 0])
            }
        });
        img.save(dir.join(name)).unwrap();
    }

    fn write_profile(dir: &Path, json: &str) {
        fs::write(dir.join(PROFILE_FILE_NAME), json).unwrap();
    }

    #[test]
    fn test_load_full_profile() {
        let dir = tempfile::tempdir().unwrap();
        write_reference(dir.path(), "a.png");
        write_reference(dir.path(), "b.png");
        write_profile(
            dir.path(),
            r#"{
                "name": "alpha",
                "detection_threshold": 0.8,
                "roi": {"x": 1, "y": 2, "width": 30, "height": 40},
                "artifact_policy": {
                    "capture_snapshot_interval_s": 2.5,
                    "snapshot_retention": 3,
                    "debug_retention": 7,
                    "debug_max_bytes": null
                },
                "references": [
                    {"name": "a", "file": "a.png"},
                    {"name": "b", "file": "b.png", "threshold": 0.99, "method": "intensity_correlation"}
                ],
                "selected_reference": "b"
            }"#,
        );

        let profile = JsonProfileStore::new(dir.path()).load().unwrap();

        assert_eq!(profile.name, "alpha");
        assert_relative_eq!(profile.detection_threshold, 0.8);
        assert_eq!(profile.roi, Some(Region::new(1, 2, 30, 40)));
        assert_eq!(profile.artifact_policy.snapshot_interval, Duration::from_millis(2500));
        assert_eq!(profile.artifact_policy.snapshot_retention, 3);
        assert_eq!(profile.artifact_policy.debug_retention, 7);
        assert_eq!(profile.artifact_policy.debug_max_bytes, None);
        assert_eq!(profile.selected_reference.as_deref(), Some("b"));
        assert_eq!(profile.references.len(), 2);
        assert_relative_eq!(profile.references[0].threshold(), 0.8);
        assert_eq!(profile.references[0].method(), ComparisonMethod::EdgeCorrelation);
        assert_relative_eq!(profile.references[1].threshold(), 0.95);
        assert_eq!(
            profile.references[1].method(),
            ComparisonMethod::IntensityCorrelation
        );
    }

    #[test]
    fn test_missing_fields_use_defaults() {
        let dir = tempfile::tempdir().unwrap();
        write_profile(dir.path(), "{}");

        let profile = JsonProfileStore::new(dir.path()).load().unwrap();

        let dir_name = dir.path().file_name().unwrap().to_string_lossy();
        assert_eq!(profile.name, dir_name);
        assert_relative_eq!(profile.detection_threshold, 0.70);
        assert_eq!(profile.artifact_policy, ArtifactPolicy::default());
        assert!(profile.references.is_empty());
    }

    #[test]
    fn test_missing_profile_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = JsonProfileStore::new(dir.path()).load();
        assert!(matches!(result, Err(ProfileLoadError::Io { .. })));
    }

    #[test]
    fn test_malformed_json_is_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        write_profile(dir.path(), "{ not json");
        let result = JsonProfileStore::new(dir.path()).load();
        assert!(matches!(result, Err(ProfileLoadError::Parse { .. })));
    }

    #[test]
    fn test_missing_reference_image_is_decode_error() {
        let dir = tempfile::tempdir().unwrap();
        write_profile(
            dir.path(),
            r#"{"references": [{"name": "a", "file": "missing.png"}]}"#,
        );
        let result = JsonProfileStore::new(dir.path()).load();
        assert!(matches!(result, Err(ProfileLoadError::Decode { .. })));
    }

    #[test]
    fn test_duplicate_reference_names_rejected() {
        let dir = tempfile::tempdir().unwrap();
        write_reference(dir.path(), "a.png");
        write_profile(
            dir.path(),
            r#"{"references": [{"name": "a", "file": "a.png"}, {"name": "a", "file": "a.png"}]}"#,
        );
        let result = JsonProfileStore::new(dir.path()).load();
        assert!(matches!(result, Err(ProfileLoadError::Invalid(_))));
    }

    #[test]
    fn test_negative_interval_rejected() {
        let dir = tempfile::tempdir().unwrap();
        write_profile(
            dir.path(),
            r#"{"artifact_policy": {"capture_snapshot_interval_s": -1}}"#,
        );
        let result = JsonProfileStore::new(dir.path()).load();
        assert!(matches!(result, Err(ProfileLoadError::Invalid(_))));
    }

    #[test]
    fn test_unknown_selected_reference_rejected() {
        let dir = tempfile::tempdir().unwrap();
        write_reference(dir.path(), "a.png");
        write_profile(
            dir.path(),
            r#"{"references": [{"name": "a", "file": "a.png"}], "selected_reference": "b"}"#,
        );
        let result = JsonProfileStore::new(dir.path()).load();
        assert!(matches!(result, Err(ProfileLoadError::Invalid(_))));
    }

    #[test]
    fn test_oversized_interval_rejected() {
        let dir = tempfile::tempdir().unwrap();
        write_profile(
            dir.path(),
            r#"{"artifact_policy": {"capture_snapshot_interval_s": 1e20}}"#,
        );
        let result = JsonProfileStore::new(dir.path()).load();
        assert!(matches!(result, Err(ProfileLoadError::Invalid(_))));
    }

    #[test]
    fn test_events_are_appended_and_read_back() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = JsonProfileStore::new(dir.path());
        assert!(store.read_events().unwrap().is_empty());

        let start = SystemTime::UNIX_EPOCH + Duration::from_secs(100);
        let mut first = DetectionEvent::open("alpha", "a", 0.9, start);
        first.ended_at = Some(start + Duration::from_secs(3));
        let second = DetectionEvent::open("alpha", "b", 0.8, start + Duration::from_secs(9));

        store.record_event(first.clone()).unwrap();
        store.record_event(second.clone()).unwrap();

        assert_eq!(store.read_events().unwrap(), vec![first, second]);
    }

    #[test]
    fn test_metadata_store_boxes_load_errors() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = JsonProfileStore::new(dir.path());
        let err = store.load_active_profile().unwrap_err();
        assert!(err.to_string().contains(PROFILE_FILE_NAME));
    }
}
