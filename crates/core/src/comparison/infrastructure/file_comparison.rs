use std::path::{Path, PathBuf};

use crate::capture::infrastructure::image_file_reader::ImageFileReader;
use crate::comparison::domain::frame_comparator::{CompareError, FrameComparator, Similarity};
use crate::comparison::domain::reference::Reference;
use crate::shared::constants::{CAPTURES_DIR_NAME, LATEST_CAPTURE_FILE_NAME};
use crate::shared::frame::Frame;
use crate::shared::region::Region;

/// Location of the latest persisted capture for a profile directory.
pub fn latest_capture_path(profile_dir: &Path) -> PathBuf {
    profile_dir
        .join(CAPTURES_DIR_NAME)
        .join(LATEST_CAPTURE_FILE_NAME)
}

/// Loads a persisted image as a frame for the file-based comparison path.
pub fn load_frame(path: &Path) -> Result<Frame, CompareError> {
    ImageFileReader::read(path, 0).map_err(|source| CompareError::Decode {
        path: path.to_path_buf(),
        source,
    })
}

/// File-based entry point: decodes `path` and delegates to the same
/// comparator the live pipeline uses, so identical pixels score identically.
pub fn compare_file(
    comparator: &dyn FrameComparator,
    path: &Path,
    reference: &Reference,
    roi: Option<Region>,
) -> Result<Similarity, CompareError> {
    let frame = load_frame(path)?;
    comparator.compare(&frame, reference, roi)
}
