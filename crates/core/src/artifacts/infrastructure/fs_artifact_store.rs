use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use image::error::{ParameterError, ParameterErrorKind};
use image::{DynamicImage, GrayImage, ImageError, ImageFormat, RgbImage, RgbaImage};

use crate::artifacts::domain::artifact::{Artifact, ArtifactError, ArtifactKind};
use crate::artifacts::domain::artifact_store::ArtifactStore;
use crate::shared::frame::Frame;

const ARTIFACT_EXTENSION: &str = "png";

/// Stores artifacts as PNG files under `<root>/snapshots` and `<root>/debug`.
///
/// File names are `<prefix>_<sequence>_<unix_ms>.png` with a zero-padded
/// sequence, so the ledger can be rebuilt from a directory listing alone.
/// Each file is encoded into a temporary file in the same directory and
/// renamed into place.
pub struct FsArtifactStore {
    root: PathBuf,
}

impl FsArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn dir(&self, kind: ArtifactKind) -> PathBuf {
        self.root.join(kind.dir_name())
    }

    pub fn file_name(kind: ArtifactKind, sequence: u64, created_at: SystemTime) -> String {
        let unix_ms = created_at
            .duration_since(SystemTime::UNIX_EPOCH)
            .map(|d| d.as_millis())
            .unwrap_or(0);
        format!(
            "{}_{sequence:012}_{unix_ms}.{ARTIFACT_EXTENSION}",
            kind.prefix()
        )
    }

    /// Inverse of [`FsArtifactStore::file_name`]; `None` for foreign files.
    pub fn parse_file_name(kind: ArtifactKind, name: &str) -> Option<(u64, SystemTime)> {
        let stem = name.strip_suffix(ARTIFACT_EXTENSION)?.strip_suffix('.')?;
        let rest = stem.strip_prefix(kind.prefix())?.strip_prefix('_')?;
        let (sequence, unix_ms) = rest.split_once('_')?;
        let sequence = sequence.parse().ok()?;
        let unix_ms: u64 = unix_ms.parse().ok()?;
        Some((sequence, SystemTime::UNIX_EPOCH + Duration::from_millis(unix_ms)))
    }
}

fn to_image(frame: &Frame) -> Option<DynamicImage> {
    let (w, h) = (frame.width(), frame.height());
    let data = frame.data().to_vec();
    match frame.channels() {
        1 => GrayImage::from_raw(w, h, data).map(DynamicImage::ImageLuma8),
        3 => RgbImage::from_raw(w, h, data).map(DynamicImage::ImageRgb8),
        4 => RgbaImage::from_raw(w, h, data).map(DynamicImage::ImageRgba8),
        _ => None,
    }
}

impl ArtifactStore for FsArtifactStore {
    fn write(
        &mut self,
        kind: ArtifactKind,
        sequence: u64,
        created_at: SystemTime,
        frame: &Frame,
    ) -> Result<Artifact, ArtifactError> {
        let dir = self.dir(kind);
        let path = dir.join(Self::file_name(kind, sequence, created_at));

        let image = to_image(frame).ok_or_else(|| ArtifactError::Encode {
            path: path.clone(),
            source: ImageError::Parameter(ParameterError::from_kind(
                ParameterErrorKind::DimensionMismatch,
            )),
        })?;

        let write_err = |source| ArtifactError::Write {
            path: path.clone(),
            source,
        };
        std::fs::create_dir_all(&dir).map_err(write_err)?;
        let mut tmp = tempfile::Builder::new()
            .prefix(".partial-")
            .tempfile_in(&dir)
            .map_err(write_err)?;
        {
            let mut writer = BufWriter::new(tmp.as_file_mut());
            image
                .write_to(&mut writer, ImageFormat::Png)
                .map_err(|source| ArtifactError::Encode {
                    path: path.clone(),
                    source,
                })?;
            writer.flush().map_err(write_err)?;
        }
        let size_bytes = tmp.as_file().metadata().map_err(write_err)?.len();
        tmp.persist(&path).map_err(|e| write_err(e.error))?;

        Ok(Artifact {
            kind,
            sequence,
            created_at,
            path,
            size_bytes,
        })
    }

    fn delete(&mut self, artifact: &Artifact) -> Result<(), ArtifactError> {
        match std::fs::remove_file(&artifact.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(ArtifactError::Delete {
                path: artifact.path.clone(),
                source,
            }),
        }
    }

    fn list(&self, kind: ArtifactKind) -> Result<Vec<Artifact>, ArtifactError> {
        let dir = self.dir(kind);
        let entries = match std::fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => return Err(ArtifactError::Scan { path: dir, source }),
        };

        let mut artifacts = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| ArtifactError::Scan {
                path: dir.clone(),
                source,
            })?;
            let name = entry.file_name();
            let Some((sequence, created_at)) = name
                .to_str()
                .and_then(|n| Self::parse_file_name(kind, n))
            else {
                continue;
            };
            let size_bytes = entry
                .metadata()
                .map_err(|source| ArtifactError::Scan {
                    path: entry.path(),
                    source,
                })?
                .len();
            artifacts.push(Artifact {
                kind,
                sequence,
                created_at,
                path: entry.path(),
                size_bytes,
            });
        }
        Ok(artifacts)
    }
}
