use std::time::{Duration, SystemTime};

use serde::{Deserialize, Serialize};

/// A contiguous interval during which at least one reference matched.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DetectionEvent {
    pub profile: String,
    /// Reference that opened the event.
    pub reference: String,
    pub started_at: SystemTime,
    /// `None` while the event is still open.
    pub ended_at: Option<SystemTime>,
    pub peak_score: f64,
    pub peak_reference: String,
    pub matched_cycles: u64,
}

impl DetectionEvent {
    pub fn open(profile: &str, reference: &str, score: f64, at: SystemTime) -> Self {
        Self {
            profile: profile.to_string(),
            reference: reference.to_string(),
            started_at: at,
            ended_at: None,
            peak_score: score,
            peak_reference: reference.to_string(),
            matched_cycles: 1,
        }
    }

    pub fn is_open(&self) -> bool {
        self.ended_at.is_none()
    }

    /// Elapsed time between start and end; `None` while open or when the
    /// wall clock went backwards in between.
    pub fn duration(&self) -> Option<Duration> {
        self.ended_at
            .and_then(|end| end.duration_since(self.started_at).ok())
    }
}
