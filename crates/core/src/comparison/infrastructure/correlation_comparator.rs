use std::collections::HashMap;

use ndarray::Array2;

use crate::comparison::domain::feature_map::FeatureMap;
use crate::comparison::domain::frame_comparator::{CompareError, FrameComparator, Similarity};
use crate::comparison::domain::reference::{ComparisonMethod, Reference};
use crate::shared::constants::MATCH_GRID;
use crate::shared::frame::Frame;
use crate::shared::region::Region;

/// Windows with less variance than this are flat and never match.
const VARIANCE_EPSILON: f64 = 1e-9;

/// Exhaustive zero-mean normalized cross-correlation template search.
///
/// Every placement of the reference inside the (ROI-cropped) frame is
/// scored; the best correlation, clamped to `[0, 1]`, is the similarity.
/// Window sums come from integral images and all accumulation happens in
/// a fixed order, so scores are bit-for-bit reproducible.
pub struct CorrelationComparator {
    grid: i32,
}

impl CorrelationComparator {
    pub fn new() -> Self {
        Self { grid: MATCH_GRID }
    }

    /// Overrides the grid match placements are snapped to (1 disables it).
    pub fn with_grid(mut self, grid: i32) -> Self {
        self.grid = grid.max(1);
        self
    }

    fn search(
        &self,
        image: &SearchImage,
        reference: &Reference,
        roi: Option<Region>,
    ) -> Result<Similarity, CompareError> {
        let template = reference.template();
        let (tw, th) = (template.width(), template.height());
        let (iw, ih) = (image.features.width(), image.features.height());
        if tw == 0 || th == 0 || tw > iw || th > ih {
            return Err(CompareError::DimensionMismatch {
                reference: reference.name().to_string(),
                reference_width: tw,
                reference_height: th,
                frame_width: iw,
                frame_height: ih,
            });
        }
        if template.is_featureless() {
            return Ok(Similarity::none());
        }

        let n = (tw * th) as f64;
        let values = image.features.values();
        let mut best_score = 0.0f64;
        let mut best_at: Option<(usize, usize)> = None;

        for y in 0..=(ih - th) {
            for x in 0..=(iw - tw) {
                let sum = window_sum(&image.sum, y, x, th, tw);
                let sum_sq = window_sum(&image.sum_sq, y, x, th, tw);
                let variance = sum_sq - sum * sum / n;
                if variance <= VARIANCE_EPSILON {
                    continue;
                }
                let cross: f64 = template
                    .taps()
                    .iter()
                    .map(|&(dy, dx, v)| v * values[[y + dy, x + dx]])
                    .sum();
                let corr = (cross - template.mean() * sum) / (template.norm() * variance.sqrt());
                // Strictly greater: the first placement in raster order wins ties.
                if corr > best_score {
                    best_score = corr;
                    best_at = Some((x, y));
                }
            }
        }

        let (ox, oy) = roi.map_or((0, 0), |r| (r.x, r.y));
        let region = best_at.map(|(x, y)| {
            Region::new(x as i32, y as i32, tw as i32, th as i32)
                .snap_to_grid(self.grid)
                .offset(ox, oy)
        });
        Ok(Similarity {
            score: best_score.clamp(0.0, 1.0),
            region,
        })
    }
}

impl Default for CorrelationComparator {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameComparator for CorrelationComparator {
    fn compare(
        &self,
        frame: &Frame,
        reference: &Reference,
        roi: Option<Region>,
    ) -> Result<Similarity, CompareError> {
        let roi = effective_roi(frame, roi);
        let image = SearchImage::new(FeatureMap::from_frame(frame, reference.method(), roi));
        self.search(&image, reference, roi)
    }

    fn compare_all(
        &self,
        frame: &Frame,
        references: &[Reference],
        roi: Option<Region>,
    ) -> Vec<Result<Similarity, CompareError>> {
        let roi = effective_roi(frame, roi);
        let mut images: HashMap<ComparisonMethod, SearchImage> = HashMap::new();
        references
            .iter()
            .map(|reference| {
                let image = images.entry(reference.method()).or_insert_with(|| {
                    SearchImage::new(FeatureMap::from_frame(frame, reference.method(), roi))
                });
                self.search(image, reference, roi)
            })
            .collect()
    }
}

fn effective_roi(frame: &Frame, roi: Option<Region>) -> Option<Region> {
    roi.and_then(|r| r.sanitize_roi(frame.width(), frame.height()))
}

/// Frame features plus integral images for O(1) window statistics.
struct SearchImage {
    features: FeatureMap,
    sum: Array2<f64>,
    sum_sq: Array2<f64>,
}

impl SearchImage {
    fn new(features: FeatureMap) -> Self {
        let sum = integral(features.values(), |v| v);
        let sum_sq = integral(features.values(), |v| v * v);
        Self {
            features,
            sum,
            sum_sq,
        }
    }
}

fn integral(values: &Array2<f64>, f: impl Fn(f64) -> f64) -> Array2<f64> {
    let (h, w) = values.dim();
    let mut out = Array2::zeros((h + 1, w + 1));
    for y in 0..h {
        let mut row = 0.0;
        for x in 0..w {
            row += f(values[[y, x]]);
            out[[y + 1, x + 1]] = out[[y, x + 1]] + row;
        }
    }
    out
}

fn window_sum(table: &Array2<f64>, y: usize, x: usize, h: usize, w: usize) -> f64 {
    table[[y + h, x + w]] - table[[y, x + w]] - table[[y + h, x]] + table[[y, x]]
}
