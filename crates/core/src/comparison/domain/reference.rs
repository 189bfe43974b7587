use serde::{Deserialize, Serialize};

use crate::comparison::domain::feature_map::{FeatureMap, Template};
use crate::shared::frame::Frame;

/// How a reference is correlated against frames.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComparisonMethod {
    /// Sobel edge maps; robust to lighting and color shifts.
    #[default]
    EdgeCorrelation,
    /// Raw grayscale intensities.
    IntensityCorrelation,
}

impl ComparisonMethod {
    pub const ALL: &[ComparisonMethod] = &[
        ComparisonMethod::EdgeCorrelation,
        ComparisonMethod::IntensityCorrelation,
    ];
}

impl std::fmt::Display for ComparisonMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ComparisonMethod::EdgeCorrelation => write!(f, "edge"),
            ComparisonMethod::IntensityCorrelation => write!(f, "intensity"),
        }
    }
}

/// A named visual template matched against incoming frames.
///
/// Features are extracted once at construction; a reference never changes
/// while it belongs to a loaded profile.
#[derive(Clone, Debug)]
pub struct Reference {
    name: String,
    threshold: f64,
    method: ComparisonMethod,
    template: Template,
}

impl Reference {
    pub fn from_frame(
        name: impl Into<String>,
        image: &Frame,
        threshold: f64,
        method: ComparisonMethod,
    ) -> Self {
        let features = FeatureMap::from_frame(image, method, None);
        Self {
            name: name.into(),
            threshold,
            method,
            template: Template::new(&features),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn method(&self) -> ComparisonMethod {
        self.method
    }

    pub fn template(&self) -> &Template {
        &self.template
    }

    pub fn width(&self) -> usize {
        self.template.width()
    }

    pub fn height(&self) -> usize {
        self.template.height()
    }
}
