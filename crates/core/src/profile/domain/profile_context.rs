use crate::artifacts::domain::artifact::ArtifactPolicy;
use crate::comparison::domain::reference::Reference;
use crate::shared::constants::{
    DEFAULT_DETECTION_THRESHOLD, MAX_DETECTION_THRESHOLD, MIN_DETECTION_THRESHOLD,
};
use crate::shared::region::Region;

/// Clamps a detection threshold into the accepted range. Non-finite input
/// falls back to the default.
pub fn clamp_detection_threshold(threshold: f64) -> f64 {
    if !threshold.is_finite() {
        return DEFAULT_DETECTION_THRESHOLD;
    }
    threshold.clamp(MIN_DETECTION_THRESHOLD, MAX_DETECTION_THRESHOLD)
}

/// The active monitoring configuration.
///
/// Built once and shared immutably; a profile switch replaces the whole
/// value between cycles.
#[derive(Clone, Debug)]
pub struct ProfileContext {
    pub name: String,
    /// Iteration order breaks ties between equally scored references.
    pub references: Vec<Reference>,
    pub detection_threshold: f64,
    pub roi: Option<Region>,
    pub artifact_policy: ArtifactPolicy,
    /// When set, only this reference is matched.
    pub selected_reference: Option<String>,
}

impl ProfileContext {
    pub fn new(name: impl Into<String>, references: Vec<Reference>) -> Self {
        Self {
            name: name.into(),
            references,
            detection_threshold: DEFAULT_DETECTION_THRESHOLD,
            roi: None,
            artifact_policy: ArtifactPolicy::default(),
            selected_reference: None,
        }
    }

    pub fn with_detection_threshold(mut self, threshold: f64) -> Self {
        self.detection_threshold = clamp_detection_threshold(threshold);
        self
    }

    pub fn with_roi(mut self, roi: Option<Region>) -> Self {
        self.roi = roi;
        self
    }

    pub fn with_artifact_policy(mut self, policy: ArtifactPolicy) -> Self {
        self.artifact_policy = policy;
        self
    }

    pub fn with_selected_reference(mut self, name: Option<String>) -> Self {
        self.selected_reference = name;
        self
    }

    pub fn reference(&self, name: &str) -> Option<&Reference> {
        self.references.iter().find(|r| r.name() == name)
    }

    /// References compared each cycle: the selected one alone, or all of
    /// them. A selection naming no loaded reference yields none.
    pub fn active_references(&self) -> &[Reference] {
        match &self.selected_reference {
            None => &self.references,
            Some(name) => self
                .references
                .iter()
                .position(|r| r.name() == name)
                .map_or(&[][..], |i| std::slice::from_ref(&self.references[i])),
        }
    }
}
