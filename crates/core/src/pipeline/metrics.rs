use std::sync::{Arc, Mutex, MutexGuard};
use std::time::SystemTime;

use crate::detection::domain::detection_state_machine::DetectionState;
use crate::pipeline::monitoring_state::{InvalidTransition, MonitoringState};

/// Point-in-time view of the monitor for dashboards.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MetricsSnapshot {
    pub monitoring_state: MonitoringState,
    pub detection_state: DetectionState,
    pub detection_paused: bool,
    pub profile: String,
    /// Last score per reference in profile order; `None` when the reference
    /// could not be compared this cycle.
    pub last_scores: Vec<(String, Option<f64>)>,
    pub best_score: Option<f64>,
    pub frames_processed: u64,
    pub frames_dropped: u64,
    pub queue_len: usize,
    pub queue_capacity: usize,
    pub snapshot_count: usize,
    pub debug_count: usize,
    pub artifact_errors: u64,
    pub events_opened: u64,
    pub last_detection_at: Option<SystemTime>,
    pub processing_fps: f64,
}

impl MetricsSnapshot {
    pub fn queue_fill(&self) -> f64 {
        if self.queue_capacity == 0 {
            0.0
        } else {
            self.queue_len as f64 / self.queue_capacity as f64
        }
    }

    pub fn score_for(&self, reference: &str) -> Option<f64> {
        self.last_scores
            .iter()
            .find(|(name, _)| name == reference)
            .and_then(|(_, score)| *score)
    }
}

/// Shared, polled metrics. The pipeline writes, any number of readers poll.
#[derive(Clone, Default)]
pub struct MetricsFeed {
    inner: Arc<Mutex<MetricsSnapshot>>,
}

impl MetricsFeed {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        self.lock().clone()
    }

    pub fn monitoring_state(&self) -> MonitoringState {
        self.lock().monitoring_state
    }

    pub fn update(&self, f: impl FnOnce(&mut MetricsSnapshot)) {
        f(&mut self.lock());
    }

    pub fn transition(&self, to: MonitoringState) -> Result<(), InvalidTransition> {
        let mut metrics = self.lock();
        metrics.monitoring_state = metrics.monitoring_state.transition(to)?;
        log::debug!("Monitoring state -> {to}");
        Ok(())
    }

    /// Marks the monitor as failed from any state.
    pub fn fail(&self) {
        self.lock().monitoring_state = MonitoringState::Failed;
    }

    fn lock(&self) -> MutexGuard<'_, MetricsSnapshot> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}
