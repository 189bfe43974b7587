use std::path::{Path, PathBuf};

use crate::comparison::domain::frame_comparator::{matches, CompareError, FrameComparator};
use crate::comparison::infrastructure::correlation_comparator::CorrelationComparator;
use crate::comparison::infrastructure::file_comparison::{latest_capture_path, load_frame};
use crate::profile::infrastructure::json_profile_store::JsonProfileStore;
use crate::shared::region::Region;

/// Outcome for one reference of the profile.
#[derive(Debug)]
pub struct ReferenceScore {
    pub reference: String,
    pub threshold: f64,
    pub score: Result<f64, CompareError>,
    pub region: Option<Region>,
}

impl ReferenceScore {
    pub fn is_match(&self) -> bool {
        self.score
            .as_ref()
            .map(|s| matches(*s, self.threshold))
            .unwrap_or(false)
    }
}

/// One-shot file-based comparison of a persisted image against every
/// reference of a profile.
pub struct CompareImageUseCase {
    comparator: Box<dyn FrameComparator>,
}

impl CompareImageUseCase {
    pub fn new() -> Self {
        Self {
            comparator: Box::new(CorrelationComparator::new()),
        }
    }

    pub fn with_comparator(comparator: Box<dyn FrameComparator>) -> Self {
        Self { comparator }
    }

    /// Compares `image`, or the profile's latest capture when `None`.
    pub fn execute(
        &self,
        profile_dir: &Path,
        image: Option<&Path>,
    ) -> Result<Vec<ReferenceScore>, Box<dyn std::error::Error>> {
        let profile = JsonProfileStore::new(profile_dir).load()?;
        let path: PathBuf = image
            .map(Path::to_path_buf)
            .unwrap_or_else(|| latest_capture_path(profile_dir));
        let frame = load_frame(&path)?;

        let results = self
            .comparator
            .compare_all(&frame, &profile.references, profile.roi);
        Ok(profile
            .references
            .iter()
            .zip(results)
            .map(|(reference, result)| {
                let region = result.as_ref().ok().and_then(|s| s.region);
                ReferenceScore {
                    reference: reference.name().to_string(),
                    threshold: reference.threshold(),
                    score: result.map(|s| s.score),
                    region,
                }
            })
            .collect())
    }
}

impl Default for CompareImageUseCase {
    fn default() -> Self {
        Self::new()
    }
}
