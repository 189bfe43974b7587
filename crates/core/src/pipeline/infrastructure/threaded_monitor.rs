use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use crate::pipeline::metrics::MetricsFeed;
use crate::pipeline::monitor_pipeline::{
    DetectionPause, MonitorPipeline, ProfileSwitcher, RunSummary,
};
use crate::pipeline::monitoring_state::{InvalidTransition, MonitoringState};

/// Handle to a monitor pipeline running on its own thread.
pub struct MonitorHandle {
    cancelled: Arc<AtomicBool>,
    switcher: ProfileSwitcher,
    pause: DetectionPause,
    metrics: MetricsFeed,
    handle: JoinHandle<Result<RunSummary, InvalidTransition>>,
}

/// Moves `pipeline` onto a dedicated worker thread.
///
/// The monitoring state goes to STARTING here and to RUNNING once the worker
/// enters its loop. Setting `cancelled` stops the worker at its next cycle
/// boundary.
pub fn spawn_monitor(mut pipeline: MonitorPipeline, cancelled: Arc<AtomicBool>) -> MonitorHandle {
    let metrics = pipeline.metrics();
    let switcher = pipeline.switcher();
    let pause = pipeline.pause_control();
    if let Err(e) = metrics.transition(MonitoringState::Starting) {
        log::warn!("{e}");
    }
    let flag = cancelled.clone();
    let handle = std::thread::spawn(move || pipeline.run(&flag));
    MonitorHandle {
        cancelled,
        switcher,
        pause,
        metrics,
        handle,
    }
}

impl MonitorHandle {
    pub fn switcher(&self) -> &ProfileSwitcher {
        &self.switcher
    }

    /// Detection pause; capture keeps draining while paused.
    pub fn pause(&self) -> &DetectionPause {
        &self.pause
    }

    pub fn metrics(&self) -> &MetricsFeed {
        &self.metrics
    }

    /// Requests a stop; the current cycle still completes.
    pub fn stop(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Waits for the worker. A panic or lifecycle error marks the monitor
    /// as FAILED.
    pub fn join(self) -> Result<RunSummary, Box<dyn std::error::Error>> {
        match self.handle.join() {
            Ok(Ok(summary)) => Ok(summary),
            Ok(Err(e)) => {
                self.metrics.fail();
                Err(e.into())
            }
            Err(_) => {
                self.metrics.fail();
                Err("Monitor thread panicked".into())
            }
        }
    }
}
