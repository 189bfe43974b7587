use std::path::{Path, PathBuf};

use crate::capture::domain::frame_source::FrameSource;
use crate::capture::infrastructure::image_file_reader::ImageFileReader;
use crate::shared::constants::IMAGE_EXTENSIONS;
use crate::shared::frame::Frame;

/// Replays a directory of still images as a live frame source.
///
/// Files are visited in lexicographic order; each call decodes one file.
/// With `looping` enabled the sequence restarts instead of ending.
pub struct ImageSequenceSource {
    files: Vec<PathBuf>,
    position: usize,
    emitted: u64,
    looping: bool,
}

impl ImageSequenceSource {
    pub fn open(dir: &Path) -> Result<Self, std::io::Error> {
        let mut files: Vec<PathBuf> = std::fs::read_dir(dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.is_file() && is_image(path))
            .collect();
        files.sort();
        Ok(Self::from_files(files))
    }

    pub fn from_files(files: Vec<PathBuf>) -> Self {
        Self {
            files,
            position: 0,
            emitted: 0,
            looping: false,
        }
    }

    pub fn with_looping(mut self, looping: bool) -> Self {
        self.looping = looping;
        self
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

pub fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}

impl FrameSource for ImageSequenceSource {
    fn current_frame(&mut self) -> Result<Option<Frame>, Box<dyn std::error::Error + Send + Sync>> {
        if self.position >= self.files.len() {
            if !self.looping || self.files.is_empty() {
                return Ok(None);
            }
            self.position = 0;
        }
        let path = &self.files[self.position];
        self.position += 1;
        let index = self.emitted;
        self.emitted += 1;
        let frame = ImageFileReader::read(path, index)
            .map_err(|e| format!("failed to decode {}: {e}", path.display()))?;
        Ok(Some(frame))
    }
}
