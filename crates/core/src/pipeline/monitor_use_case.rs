use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;

use crate::artifacts::domain::artifact_manager::ArtifactManager;
use crate::artifacts::infrastructure::fs_artifact_store::FsArtifactStore;
use crate::capture::domain::frame_source::FrameSource;
use crate::capture::frame_queue::frame_queue;
use crate::capture::infrastructure::capture_worker::{spawn_capture, CaptureSummary};
use crate::comparison::infrastructure::correlation_comparator::CorrelationComparator;
use crate::detection::domain::notifier::CooldownNotifier;
use crate::detection::infrastructure::log_notifier::LogNotifier;
use crate::pipeline::infrastructure::threaded_monitor::spawn_monitor;
use crate::pipeline::monitor_config::MonitorConfig;
use crate::pipeline::monitor_pipeline::{MonitorPipeline, RunSummary};
use crate::pipeline::pipeline_logger::PipelineLogger;
use crate::profile::infrastructure::json_profile_store::JsonProfileStore;
use crate::shared::clock::{Clock, SystemClock};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MonitorReport {
    pub capture: CaptureSummary,
    pub run: RunSummary,
}

/// Live monitoring session: frame source → queue → detection worker.
///
/// The profile comes from a profile directory; artifacts go under the
/// configured root. Closed events are appended to the profile's event log.
pub struct MonitorUseCase {
    config: MonitorConfig,
    clock: Arc<dyn Clock>,
}

impl MonitorUseCase {
    pub fn new(config: MonitorConfig) -> Self {
        Self {
            config,
            clock: Arc::new(SystemClock::new()),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Runs until the source is exhausted or `cancelled` is set.
    pub fn execute(
        &self,
        source: Box<dyn FrameSource>,
        frame_interval: Option<Duration>,
        logger: Box<dyn PipelineLogger>,
        cancelled: Arc<AtomicBool>,
    ) -> Result<MonitorReport, Box<dyn std::error::Error>> {
        let store = JsonProfileStore::new(&self.config.profile_dir);
        let profile = store.load()?;

        let artifacts = ArtifactManager::open(
            Box::new(FsArtifactStore::new(&self.config.artifact_root)),
            self.clock.clone(),
            profile.artifact_policy.clone(),
        )?;
        log::info!(
            "Writing artifacts to {}",
            self.config.artifact_root.display()
        );

        let (producer, consumer) = frame_queue(self.config.queue_capacity);
        let pipeline = MonitorPipeline::new(
            consumer,
            Box::new(CorrelationComparator::new()),
            artifacts,
            Box::new(store),
            profile,
            self.clock.clone(),
        )
        .with_logger(logger)
        .with_notifier(Box::new(CooldownNotifier::new(
            Box::new(LogNotifier::new()),
            self.clock.clone(),
            self.config.alert_cooldown,
        )))
        .with_poll_interval(self.config.poll_interval);

        let monitor = spawn_monitor(pipeline, cancelled.clone());
        let capture = spawn_capture(source, producer, frame_interval, cancelled);

        let capture = capture.join().map_err(|_| "Capture thread panicked")?;
        let run = monitor.join()?;
        Ok(MonitorReport { capture, run })
    }
}
