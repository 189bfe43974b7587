use ndarray::{s, Array2};

use crate::comparison::domain::reference::ComparisonMethod;
use crate::shared::constants::EDGE_MAGNITUDE_THRESHOLD;
use crate::shared::frame::Frame;
use crate::shared::region::Region;

/// Integer BT.601 luma, identical for every channel layout carrying the
/// same visible pixels (gray `v` and RGB `(v, v, v)` both map to `v`).
pub fn luma(frame: &Frame) -> Array2<u8> {
    let view = frame.as_ndarray();
    let (h, w, c) = view.dim();
    Array2::from_shape_fn((h, w), |(y, x)| {
        if c < 3 {
            return view[[y, x, 0]];
        }
        let r = view[[y, x, 0]] as u32;
        let g = view[[y, x, 1]] as u32;
        let b = view[[y, x, 2]] as u32;
        ((299 * r + 587 * g + 114 * b + 500) / 1000) as u8
    })
}

/// Binary edge map from the L1 Sobel gradient magnitude, border replicated.
pub fn edge_map(gray: &Array2<u8>) -> Array2<f64> {
    let (h, w) = gray.dim();
    let px = |y: isize, x: isize| -> i32 {
        let yy = y.clamp(0, h as isize - 1) as usize;
        let xx = x.clamp(0, w as isize - 1) as usize;
        gray[[yy, xx]] as i32
    };
    Array2::from_shape_fn((h, w), |(y, x)| {
        let (y, x) = (y as isize, x as isize);
        let gx = (px(y - 1, x + 1) + 2 * px(y, x + 1) + px(y + 1, x + 1))
            - (px(y - 1, x - 1) + 2 * px(y, x - 1) + px(y + 1, x - 1));
        let gy = (px(y + 1, x - 1) + 2 * px(y + 1, x) + px(y + 1, x + 1))
            - (px(y - 1, x - 1) + 2 * px(y - 1, x) + px(y - 1, x + 1));
        if gx.abs() + gy.abs() >= EDGE_MAGNITUDE_THRESHOLD {
            1.0
        } else {
            0.0
        }
    })
}

/// Per-pixel features a comparison method correlates over.
#[derive(Clone, Debug, PartialEq)]
pub struct FeatureMap {
    values: Array2<f64>,
}

impl FeatureMap {
    /// Extracts features from `frame`, restricted to `roi` when given.
    ///
    /// The ROI must already be clamped to the frame.
    pub fn from_frame(frame: &Frame, method: ComparisonMethod, roi: Option<Region>) -> Self {
        let mut gray = luma(frame);
        if let Some(r) = roi {
            let (x0, y0) = (r.x as usize, r.y as usize);
            let (x1, y1) = (r.right() as usize, r.bottom() as usize);
            gray = gray.slice(s![y0..y1, x0..x1]).to_owned();
        }
        let values = match method {
            ComparisonMethod::EdgeCorrelation => edge_map(&gray),
            ComparisonMethod::IntensityCorrelation => gray.mapv(f64::from),
        };
        Self { values }
    }

    pub fn width(&self) -> usize {
        self.values.ncols()
    }

    pub fn height(&self) -> usize {
        self.values.nrows()
    }

    pub fn values(&self) -> &Array2<f64> {
        &self.values
    }
}

/// A reference's feature map prepared for zero-mean correlation.
///
/// Only non-zero taps are kept: the correlation numerator reduces to
/// `sum(T * I) - mean(T) * sum(I)`, so zero template pixels contribute
/// nothing and sparse edge templates stay cheap.
#[derive(Clone, Debug, PartialEq)]
pub struct Template {
    width: usize,
    height: usize,
    mean: f64,
    norm: f64,
    taps: Vec<(usize, usize, f64)>,
}

impl Template {
    pub fn new(features: &FeatureMap) -> Self {
        let values = features.values();
        let count = values.len().max(1) as f64;
        let mean = values.iter().sum::<f64>() / count;
        let norm = values
            .iter()
            .map(|v| (v - mean) * (v - mean))
            .sum::<f64>()
            .sqrt();
        let taps = values
            .indexed_iter()
            .filter(|(_, v)| **v != 0.0)
            .map(|((y, x), v)| (y, x, *v))
            .collect();
        Self {
            width: features.width(),
            height: features.height(),
            mean,
            norm,
            taps,
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn mean(&self) -> f64 {
        self.mean
    }

    /// Euclidean norm of the zero-mean template.
    pub fn norm(&self) -> f64 {
        self.norm
    }

    pub fn taps(&self) -> &[(usize, usize, f64)] {
        &self.taps
    }

    /// A template with no variation cannot be correlated against.
    pub fn is_featureless(&self) -> bool {
        self.norm <= f64::EPSILON
    }
}
