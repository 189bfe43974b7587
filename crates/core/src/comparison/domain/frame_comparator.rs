use std::path::PathBuf;

use thiserror::Error;

use crate::comparison::domain::reference::Reference;
use crate::shared::frame::Frame;
use crate::shared::region::Region;

#[derive(Error, Debug)]
pub enum CompareError {
    #[error(
        "reference {reference} ({reference_width}x{reference_height}) does not fit \
         the {frame_width}x{frame_height} search area"
    )]
    DimensionMismatch {
        reference: String,
        reference_width: usize,
        reference_height: usize,
        frame_width: usize,
        frame_height: usize,
    },
    #[error("failed to decode {path}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
}

/// Result of comparing one frame against one reference.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Similarity {
    /// Best correlation over all placements, in `[0, 1]`.
    pub score: f64,
    /// Placement of the best score in full-frame coordinates, if any
    /// placement correlated positively.
    pub region: Option<Region>,
}

impl Similarity {
    pub fn none() -> Self {
        Self {
            score: 0.0,
            region: None,
        }
    }
}

/// Domain interface for scoring frames against references.
///
/// Implementations must be pure: identical inputs always produce
/// bit-identical scores.
pub trait FrameComparator: Send {
    fn compare(
        &self,
        frame: &Frame,
        reference: &Reference,
        roi: Option<Region>,
    ) -> Result<Similarity, CompareError>;

    /// Compares one frame against every reference, in order.
    ///
    /// Implementations may override this to share per-frame work.
    fn compare_all(
        &self,
        frame: &Frame,
        references: &[Reference],
        roi: Option<Region>,
    ) -> Vec<Result<Similarity, CompareError>> {
        references
            .iter()
            .map(|reference| self.compare(frame, reference, roi))
            .collect()
    }
}

/// A score matches when it reaches the threshold. No smoothing here.
pub fn matches(score: f64, threshold: f64) -> bool {
    score >= threshold
}
