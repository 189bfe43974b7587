use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, Sender};
use thiserror::Error;

use crate::artifacts::domain::artifact::{Artifact, ArtifactError, ArtifactKind};
use crate::artifacts::domain::artifact_manager::ArtifactManager;
use crate::artifacts::domain::debug_overlay::render_debug_frame;
use crate::capture::frame_queue::{FrameConsumer, QueueClosed};
use crate::comparison::domain::frame_comparator::{matches, CompareError, FrameComparator};
use crate::comparison::infrastructure::file_comparison::load_frame;
use crate::detection::domain::detection_event::DetectionEvent;
use crate::detection::domain::detection_state_machine::{
    CycleMatch, DetectionState, DetectionStateMachine, Transition,
};
use crate::detection::domain::notifier::{Notifier, NullNotifier};
use crate::pipeline::metrics::MetricsFeed;
use crate::pipeline::monitoring_state::{InvalidTransition, MonitoringState};
use crate::pipeline::pipeline_logger::{NullPipelineLogger, PipelineLogger};
use crate::profile::domain::metadata_store::{MetadataStore, StoreError};
use crate::profile::domain::profile_context::ProfileContext;
use crate::shared::clock::Clock;
use crate::shared::constants::DEFAULT_POLL_INTERVAL_MS;
use crate::shared::frame::Frame;
use crate::shared::region::Region;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("monitor pipeline has stopped")]
pub struct PipelineStopped;

/// Requests a profile switch. The pipeline applies it at its next cycle
/// boundary; when several are pending only the latest is applied.
#[derive(Clone)]
pub struct ProfileSwitcher {
    tx: Sender<ProfileContext>,
}

impl ProfileSwitcher {
    pub fn switch_profile(&self, profile: ProfileContext) -> Result<(), PipelineStopped> {
        self.tx.send(profile).map_err(|_| PipelineStopped)
    }
}

/// Pauses and resumes detection on a running pipeline.
///
/// While paused the consumer keeps draining the queue so capture never
/// stalls, but frames skip comparison and the detection state is left as
/// it was.
#[derive(Clone, Default)]
pub struct DetectionPause {
    paused: Arc<AtomicBool>,
}

impl DetectionPause {
    pub fn pause(&self) {
        self.paused.store(true, Ordering::Relaxed);
    }

    pub fn resume(&self) {
        self.paused.store(false, Ordering::Relaxed);
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::Relaxed)
    }
}

/// What one detection cycle did.
#[derive(Clone, Debug)]
pub struct CycleReport {
    pub frame_index: u64,
    /// Score per active reference in profile order; `None` when skipped.
    pub scores: Vec<(String, Option<f64>)>,
    pub best: Option<CycleMatch>,
    pub transition: Transition,
    pub snapshot: Option<Artifact>,
    pub debug: Option<Artifact>,
}

#[derive(Clone, Debug)]
pub enum StepOutcome {
    Processed(CycleReport),
    /// Detection is paused; the frame with this index was discarded.
    Skipped(u64),
    /// No frame arrived within the poll interval.
    Idle,
    /// The producer is gone and every queued frame was processed.
    Closed,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StopReason {
    Cancelled,
    QueueClosed,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RunSummary {
    pub reason: StopReason,
    pub cycles: u64,
    pub events_opened: u64,
    pub events_closed: u64,
    pub frames_dropped: u64,
    /// Frames consumed while detection was paused.
    pub frames_skipped: u64,
    pub artifact_errors: u64,
}

/// The detection consumer: queue pop, compare, state machine, artifacts.
///
/// Single-threaded; every cycle runs to completion before cancellation or a
/// profile switch is looked at. Recoverable failures (artifact I/O, event
/// persistence, per-reference comparison errors) are logged and counted but
/// never end the loop.
pub struct MonitorPipeline {
    consumer: FrameConsumer,
    comparator: Box<dyn FrameComparator>,
    artifacts: ArtifactManager,
    metadata: Box<dyn MetadataStore>,
    clock: Arc<dyn Clock>,
    logger: Box<dyn PipelineLogger>,
    notifier: Box<dyn Notifier>,
    metrics: MetricsFeed,
    profile: Arc<ProfileContext>,
    detection: DetectionStateMachine,
    switch_tx: Sender<ProfileContext>,
    switch_rx: Receiver<ProfileContext>,
    pause: DetectionPause,
    poll_interval: Duration,
    started_at: Duration,
    cycles: u64,
    events_opened: u64,
    events_closed: u64,
    frames_skipped: u64,
    artifact_errors: u64,
}

impl MonitorPipeline {
    pub fn new(
        consumer: FrameConsumer,
        comparator: Box<dyn FrameComparator>,
        mut artifacts: ArtifactManager,
        metadata: Box<dyn MetadataStore>,
        profile: ProfileContext,
        clock: Arc<dyn Clock>,
    ) -> Self {
        artifacts.set_policy(profile.artifact_policy.clone());
        let (switch_tx, switch_rx) = crossbeam_channel::unbounded();
        let started_at = clock.monotonic();
        let pipeline = Self {
            consumer,
            comparator,
            artifacts,
            metadata,
            clock,
            logger: Box::new(NullPipelineLogger),
            notifier: Box::new(NullNotifier),
            metrics: MetricsFeed::new(),
            detection: DetectionStateMachine::new(profile.name.clone()),
            profile: Arc::new(profile),
            switch_tx,
            switch_rx,
            pause: DetectionPause::default(),
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
            started_at,
            cycles: 0,
            events_opened: 0,
            events_closed: 0,
            frames_skipped: 0,
            artifact_errors: 0,
        };
        pipeline.publish_profile();
        pipeline
    }

    /// Builds the pipeline around the metadata store's active profile.
    pub fn load(
        consumer: FrameConsumer,
        comparator: Box<dyn FrameComparator>,
        artifacts: ArtifactManager,
        mut metadata: Box<dyn MetadataStore>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, StoreError> {
        let profile = metadata.load_active_profile()?;
        Ok(Self::new(consumer, comparator, artifacts, metadata, profile, clock))
    }

    pub fn with_logger(mut self, logger: Box<dyn PipelineLogger>) -> Self {
        self.logger = logger;
        self
    }

    pub fn with_metrics(mut self, metrics: MetricsFeed) -> Self {
        self.metrics = metrics;
        self.publish_profile();
        self
    }

    /// Alerts on every newly opened detection event.
    pub fn with_notifier(mut self, notifier: Box<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn profile(&self) -> &ProfileContext {
        &self.profile
    }

    pub fn detection_state(&self) -> DetectionState {
        self.detection.state()
    }

    pub fn open_event(&self) -> Option<&DetectionEvent> {
        self.detection.open_event()
    }

    pub fn queue(&self) -> &FrameConsumer {
        &self.consumer
    }

    pub fn artifacts(&self) -> &ArtifactManager {
        &self.artifacts
    }

    pub fn metrics(&self) -> MetricsFeed {
        self.metrics.clone()
    }

    pub fn switcher(&self) -> ProfileSwitcher {
        ProfileSwitcher {
            tx: self.switch_tx.clone(),
        }
    }

    pub fn pause_control(&self) -> DetectionPause {
        self.pause.clone()
    }

    /// Runs one full detection cycle on `frame`.
    pub fn process_frame(&mut self, frame: Frame) -> CycleReport {
        let profile = Arc::clone(&self.profile);

        let compare_start = Instant::now();
        let references = profile.active_references();
        let results = self.comparator.compare_all(&frame, references, profile.roi);
        self.logger.timing("compare", elapsed_ms(compare_start));

        let mut scores = Vec::with_capacity(results.len());
        let mut best: Option<(CycleMatch, Option<Region>)> = None;
        for (reference, result) in references.iter().zip(results) {
            match result {
                Ok(similarity) => {
                    scores.push((reference.name().to_string(), Some(similarity.score)));
                    let stronger = best
                        .as_ref()
                        .map_or(true, |(current, _)| similarity.score > current.score);
                    if matches(similarity.score, reference.threshold()) && stronger {
                        let cycle_match = CycleMatch {
                            reference: reference.name().to_string(),
                            score: similarity.score,
                        };
                        best = Some((cycle_match, similarity.region));
                    }
                }
                Err(e) => {
                    log::warn!("Skipping reference for frame {}: {e}", frame.index());
                    scores.push((reference.name().to_string(), None));
                }
            }
        }
        let (best, match_region) = match best {
            Some((cycle_match, region)) => (Some(cycle_match), region),
            None => (None, None),
        };

        let transition = self.detection.observe(best.as_ref(), frame.captured_at());

        let artifacts_start = Instant::now();
        let mut debug = None;
        match &transition {
            Transition::Started(event) => {
                self.events_opened += 1;
                self.logger.info(&format!(
                    "Detection started: {} matched in profile {:?} (score {:.3})",
                    event.reference, event.profile, event.peak_score
                ));
                self.notifier.notify(event);
                let roi = profile
                    .roi
                    .and_then(|r| r.sanitize_roi(frame.width(), frame.height()));
                let evidence = render_debug_frame(&frame, roi, match_region);
                debug = self.write_artifact(|artifacts| artifacts.record_debug(&evidence));
            }
            Transition::Ended(event) => {
                self.logger.info(&format!(
                    "Detection ended: {} cycle(s), peak {:.3} on {}",
                    event.matched_cycles, event.peak_score, event.peak_reference
                ));
                self.close_event(event.clone());
            }
            Transition::Continued | Transition::Unchanged => {}
        }
        let force = matches!(transition, Transition::Started(_));
        let snapshot = self.write_artifact(|artifacts| artifacts.capture_snapshot(&frame, force));
        self.logger.timing("artifacts", elapsed_ms(artifacts_start));

        self.cycles += 1;
        let best_score = scores
            .iter()
            .filter_map(|(_, score)| *score)
            .fold(None, |acc: Option<f64>, s| Some(acc.map_or(s, |a| a.max(s))));
        if let Some(score) = best_score {
            self.logger.metric("best_score", score);
        }
        self.logger.metric("queue_depth", self.consumer.len() as f64);
        self.logger.cycle(self.cycles);

        let started = matches!(transition, Transition::Started(_));
        self.publish_cycle(&scores, best_score, started.then(|| frame.captured_at()));

        CycleReport {
            frame_index: frame.index(),
            scores,
            best,
            transition,
            snapshot,
            debug,
        }
    }

    /// File-based cycle: decodes `path` and runs the same cycle as the live
    /// path. A decode failure skips the cycle without touching any state.
    pub fn process_file(&mut self, path: &Path) -> Result<CycleReport, CompareError> {
        let frame = load_frame(path).map_err(|e| {
            log::warn!("{e}; skipping cycle");
            e
        })?;
        Ok(self.process_frame(frame.with_captured_at(self.clock.wall())))
    }

    /// Replaces the active profile. Any open event is force-closed now and
    /// persisted; the queue and the monitoring state are left alone.
    pub fn switch_to(&mut self, profile: ProfileContext) -> Option<DetectionEvent> {
        let closed = self.detection.force_close(self.clock.wall());
        if let Some(event) = &closed {
            self.close_event(event.clone());
        }
        self.logger.info(&format!(
            "Switching profile {:?} -> {:?}",
            self.profile.name, profile.name
        ));
        self.artifacts.set_policy(profile.artifact_policy.clone());
        self.detection = DetectionStateMachine::new(profile.name.clone());
        self.profile = Arc::new(profile);
        self.publish_profile();
        closed
    }

    /// Applies the most recent pending switch request, if any.
    pub fn apply_pending_switch(&mut self) -> bool {
        let latest = self.switch_rx.try_iter().last();
        match latest {
            Some(profile) => {
                self.switch_to(profile);
                true
            }
            None => false,
        }
    }

    /// Reloads the active profile from the metadata store and switches to it.
    pub fn reload_active_profile(&mut self) -> Result<Option<DetectionEvent>, StoreError> {
        let profile = self.metadata.load_active_profile()?;
        Ok(self.switch_to(profile))
    }

    /// One cycle boundary: apply a pending switch, then wait up to the poll
    /// interval for a frame and process it, or discard it while paused.
    pub fn step(&mut self) -> StepOutcome {
        self.apply_pending_switch();
        let paused = self.pause.is_paused();
        self.metrics.update(|m| m.detection_paused = paused);
        match self.consumer.pop_timeout(self.poll_interval) {
            Ok(Some(frame)) if paused => {
                self.frames_skipped += 1;
                StepOutcome::Skipped(frame.index())
            }
            Ok(Some(frame)) => StepOutcome::Processed(self.process_frame(frame)),
            Ok(None) => StepOutcome::Idle,
            Err(QueueClosed) => StepOutcome::Closed,
        }
    }

    /// Runs until `cancelled` is set or the queue closes, then force-closes
    /// any open event.
    pub fn run(&mut self, cancelled: &AtomicBool) -> Result<RunSummary, InvalidTransition> {
        if self.metrics.monitoring_state() != MonitoringState::Starting {
            self.metrics.transition(MonitoringState::Starting)?;
        }
        self.metrics.transition(MonitoringState::Running)?;
        self.logger
            .info(&format!("Monitoring profile {:?}", self.profile.name));

        let reason = loop {
            if cancelled.load(Ordering::Relaxed) {
                break StopReason::Cancelled;
            }
            if let StepOutcome::Closed = self.step() {
                break StopReason::QueueClosed;
            }
        };

        self.metrics.transition(MonitoringState::Stopping)?;
        self.shutdown();
        self.metrics.transition(MonitoringState::Idle)?;
        self.logger.summary();

        Ok(RunSummary {
            reason,
            cycles: self.cycles,
            events_opened: self.events_opened,
            events_closed: self.events_closed,
            frames_dropped: self.consumer.dropped(),
            frames_skipped: self.frames_skipped,
            artifact_errors: self.artifact_errors,
        })
    }

    fn shutdown(&mut self) {
        if let Some(event) = self.detection.force_close(self.clock.wall()) {
            self.logger.info("Closing open detection on shutdown");
            self.close_event(event);
        }
        self.metrics
            .update(|m| m.detection_state = DetectionState::Idle);
    }

    fn close_event(&mut self, event: DetectionEvent) {
        self.events_closed += 1;
        if let Err(e) = self.metadata.record_event(event) {
            log::warn!("Failed to record detection event: {e}");
        }
    }

    fn write_artifact(
        &mut self,
        write: impl FnOnce(&mut ArtifactManager) -> Result<Option<Artifact>, ArtifactError>,
    ) -> Option<Artifact> {
        match write(&mut self.artifacts) {
            Ok(artifact) => artifact,
            Err(e) => {
                self.artifact_errors += 1;
                log::warn!("{e}; continuing");
                None
            }
        }
    }

    fn publish_profile(&self) {
        let profile = &self.profile;
        let last_scores = profile
            .active_references()
            .iter()
            .map(|r| (r.name().to_string(), None))
            .collect();
        let name = profile.name.clone();
        let (snapshots, debug) = self.artifact_counts();
        let capacity = self.consumer.capacity();
        self.metrics.update(|m| {
            m.profile = name;
            m.detection_state = DetectionState::Idle;
            m.last_scores = last_scores;
            m.best_score = None;
            m.queue_capacity = capacity;
            m.snapshot_count = snapshots;
            m.debug_count = debug;
        });
    }

    fn publish_cycle(
        &self,
        scores: &[(String, Option<f64>)],
        best_score: Option<f64>,
        detected_at: Option<std::time::SystemTime>,
    ) {
        let elapsed = self
            .clock
            .monotonic()
            .saturating_sub(self.started_at)
            .as_secs_f64();
        let fps = if elapsed > 0.0 {
            self.cycles as f64 / elapsed
        } else {
            0.0
        };
        let (snapshots, debug) = self.artifact_counts();
        let state = self.detection.state();
        self.metrics.update(|m| {
            m.detection_state = state;
            m.last_scores = scores.to_vec();
            m.best_score = best_score;
            m.frames_processed = self.cycles;
            m.frames_dropped = self.consumer.dropped();
            m.queue_len = self.consumer.len();
            m.snapshot_count = snapshots;
            m.debug_count = debug;
            m.artifact_errors = self.artifact_errors;
            m.events_opened = self.events_opened;
            if detected_at.is_some() {
                m.last_detection_at = detected_at;
            }
            m.processing_fps = fps;
        });
    }

    fn artifact_counts(&self) -> (usize, usize) {
        (
            self.artifacts.count(ArtifactKind::Snapshot),
            self.artifacts.count(ArtifactKind::Debug),
        )
    }
}

fn elapsed_ms(start: Instant) -> f64 {
    start.elapsed().as_secs_f64() * 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifacts::domain::artifact::ArtifactPolicy;
    use crate::artifacts::domain::artifact_store::ArtifactStore;
    use crate::artifacts::infrastructure::fs_artifact_store::FsArtifactStore;
    use crate::capture::frame_queue::{frame_queue, FrameProducer};
    use crate::comparison::domain::frame_comparator::Similarity;
    use crate::comparison::domain::reference::{ComparisonMethod, Reference};
    use crate::comparison::infrastructure::correlation_comparator::CorrelationComparator;
    use crate::profile::infrastructure::in_memory_metadata_store::InMemoryMetadataStore;
    use crate::shared::clock::ManualClock;
    use std::collections::HashMap;
    use std::time::SystemTime;

    // --- Stubs ---

    /// Scores per reference name, indexed by frame index.
    struct ScriptedComparator {
        scores: HashMap<String, Vec<f64>>,
    }

    impl ScriptedComparator {
        fn new(scores: Vec<(&str, Vec<f64>)>) -> Self {
            Self {
                scores: scores
                    .into_iter()
                    .map(|(name, s)| (name.to_string(), s))
                    .collect(),
            }
        }
    }

    impl FrameComparator for ScriptedComparator {
        fn compare(
            &self,
            frame: &Frame,
            reference: &Reference,
            _roi: Option<Region>,
        ) -> Result<Similarity, CompareError> {
            let score = self.scores[reference.name()][frame.index() as usize];
            Ok(Similarity {
                score,
                region: Some(Region::new(0, 0, 4, 4)),
            })
        }
    }

    struct FailingMetadataStore;

    impl MetadataStore for FailingMetadataStore {
        fn load_active_profile(&mut self) -> Result<ProfileContext, StoreError> {
            Err("unavailable".into())
        }

        fn record_event(&mut self, _event: DetectionEvent) -> Result<(), StoreError> {
            Err("database locked".into())
        }
    }

    struct BrokenArtifactStore;

    impl ArtifactStore for BrokenArtifactStore {
        fn write(
            &mut self,
            _kind: ArtifactKind,
            _sequence: u64,
            _created_at: SystemTime,
            _frame: &Frame,
        ) -> Result<Artifact, ArtifactError> {
            Err(ArtifactError::Write {
                path: "broken.png".into(),
                source: std::io::Error::new(std::io::ErrorKind::Other, "disk full"),
            })
        }

        fn delete(&mut self, _artifact: &Artifact) -> Result<(), ArtifactError> {
            Ok(())
        }

        fn list(&self, _kind: ArtifactKind) -> Result<Vec<Artifact>, ArtifactError> {
            Ok(Vec::new())
        }
    }

    // --- Fixtures ---

    const START_SECS: u64 = 1_000;

    fn at(secs: u64) -> SystemTime {
        SystemTime::UNIX_EPOCH + Duration::from_secs(secs)
    }

    fn frame(index: u64) -> Frame {
        Frame::new(vec![0; 100], 10, 10, 1, index).with_captured_at(at(START_SECS + index))
    }

    fn reference(name: &str, threshold: f64) -> Reference {
        let image = Frame::new(vec![0; 16], 4, 4, 1, 0);
        Reference::from_frame(name, &image, threshold, ComparisonMethod::default())
    }

    fn profile(name: &str, refs: &[&str]) -> ProfileContext {
        ProfileContext::new(name, refs.iter().map(|r| reference(r, 0.9)).collect())
            .with_artifact_policy(ArtifactPolicy {
                snapshot_interval: Duration::from_secs(60),
                snapshot_retention: 10,
                debug_retention: 10,
                debug_max_bytes: None,
            })
    }

    struct Harness {
        pipeline: MonitorPipeline,
        producer: FrameProducer,
        events: InMemoryMetadataStore,
        clock: Arc<ManualClock>,
        _dir: tempfile::TempDir,
    }

    fn harness_with(
        profile: ProfileContext,
        comparator: Box<dyn FrameComparator>,
        store: Box<dyn ArtifactStore>,
        capacity: usize,
        dir: tempfile::TempDir,
    ) -> Harness {
        let clock = Arc::new(ManualClock::new(at(START_SECS)));
        let artifacts =
            ArtifactManager::open(store, clock.clone(), profile.artifact_policy.clone()).unwrap();
        let (producer, consumer) = frame_queue(capacity);
        let events = InMemoryMetadataStore::new(profile.clone());
        let pipeline = MonitorPipeline::new(
            consumer,
            comparator,
            artifacts,
            Box::new(events.clone()),
            profile,
            clock.clone(),
        )
        .with_poll_interval(Duration::from_millis(5));
        Harness {
            pipeline,
            producer,
            events,
            clock,
            _dir: dir,
        }
    }

    fn harness(profile: ProfileContext, comparator: ScriptedComparator, capacity: usize) -> Harness {
        let dir = tempfile::tempdir().unwrap();
        let store = Box::new(FsArtifactStore::new(dir.path()));
        harness_with(profile, Box::new(comparator), store, capacity, dir)
    }

    // --- Tests ---

    #[test]
    fn test_three_matching_cycles_then_drop_yield_one_event() {
        let comparator = ScriptedComparator::new(vec![("ref", vec![0.95, 0.95, 0.95, 0.5])]);
        let mut h = harness(profile("alpha", &["ref"]), comparator, 1);

        for i in 0..4 {
            h.pipeline.process_frame(frame(i));
        }

        let events = h.events.events();
        assert_eq!(events.len(), 1);
        let event = &events[0];
        assert_eq!(event.profile, "alpha");
        assert_eq!(event.reference, "ref");
        assert_eq!(event.started_at, at(START_SECS));
        assert_eq!(event.ended_at, Some(at(START_SECS + 3)));
        assert_eq!(event.matched_cycles, 3);
        assert_eq!(event.peak_score, 0.95);
        assert_eq!(h.pipeline.detection_state(), DetectionState::Idle);
    }

    #[test]
    fn test_forced_snapshot_on_activation_within_interval() {
        let comparator = ScriptedComparator::new(vec![("ref", vec![0.1, 0.95, 0.95])]);
        let mut h = harness(profile("alpha", &["ref"]), comparator, 1);

        let idle = h.pipeline.process_frame(frame(0));
        assert!(idle.snapshot.is_some());

        h.clock.advance(Duration::from_secs(1));
        let started = h.pipeline.process_frame(frame(1));
        assert!(matches!(started.transition, Transition::Started(_)));
        assert!(started.snapshot.is_some());
        assert!(started.debug.is_some());

        h.clock.advance(Duration::from_secs(1));
        let continued = h.pipeline.process_frame(frame(2));
        assert!(continued.snapshot.is_none());
        assert!(continued.debug.is_none());

        assert_eq!(h.pipeline.artifacts().count(ArtifactKind::Snapshot), 2);
        assert_eq!(h.pipeline.artifacts().count(ArtifactKind::Debug), 1);
    }

    #[test]
    fn test_strongest_reference_triggers_and_ties_keep_profile_order() {
        let comparator = ScriptedComparator::new(vec![
            ("a", vec![0.95, 0.0, 0.92]),
            ("b", vec![0.95, 0.0, 0.97]),
        ]);
        let mut h = harness(profile("alpha", &["a", "b"]), comparator, 1);

        let tie = h.pipeline.process_frame(frame(0));
        assert_eq!(tie.best.unwrap().reference, "a");
        h.pipeline.process_frame(frame(1));

        let stronger = h.pipeline.process_frame(frame(2));
        assert_eq!(stronger.best.unwrap().reference, "b");
    }

    #[test]
    fn test_below_threshold_never_triggers() {
        let comparator = ScriptedComparator::new(vec![("ref", vec![0.89, 0.5])]);
        let mut h = harness(profile("alpha", &["ref"]), comparator, 1);

        for i in 0..2 {
            let report = h.pipeline.process_frame(frame(i));
            assert_eq!(report.transition, Transition::Unchanged);
        }
        assert!(h.events.events().is_empty());
    }

    #[test]
    fn test_switch_force_closes_and_keeps_queue() {
        let comparator = ScriptedComparator::new(vec![
            ("ref", vec![0.95, 0.95, 0.95]),
            ("other", vec![0.0, 0.0, 0.0]),
        ]);
        let mut h = harness(profile("alpha", &["ref"]), comparator, 4);
        let metrics = h.pipeline.metrics();
        metrics.transition(MonitoringState::Starting).unwrap();
        metrics.transition(MonitoringState::Running).unwrap();
        for i in 0..3 {
            h.producer.push(frame(i)).unwrap();
        }

        assert!(matches!(h.pipeline.step(), StepOutcome::Processed(_)));
        assert_eq!(h.pipeline.detection_state(), DetectionState::Active);

        h.clock.advance(Duration::from_secs(5));
        h.pipeline
            .switcher()
            .switch_profile(profile("beta", &["other"]))
            .unwrap();
        assert!(h.pipeline.apply_pending_switch());

        let events = h.events.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].ended_at, Some(at(START_SECS + 5)));
        assert_eq!(h.pipeline.queue().len(), 2);
        assert_eq!(h.pipeline.detection_state(), DetectionState::Idle);
        assert_eq!(h.pipeline.profile().name, "beta");
        assert_eq!(metrics.monitoring_state(), MonitoringState::Running);
        assert_eq!(metrics.snapshot().profile, "beta");

        for expected in 1..=2 {
            match h.pipeline.step() {
                StepOutcome::Processed(report) => {
                    assert_eq!(report.frame_index, expected);
                    assert_eq!(report.scores, vec![("other".to_string(), Some(0.0))]);
                }
                other => panic!("expected a processed frame, got {other:?}"),
            }
        }
        assert_eq!(h.events.events().len(), 1);
    }

    #[test]
    fn test_latest_pending_switch_wins() {
        let comparator = ScriptedComparator::new(vec![("ref", vec![0.0])]);
        let mut h = harness(profile("alpha", &["ref"]), comparator, 1);
        let switcher = h.pipeline.switcher();
        switcher.switch_profile(profile("beta", &["ref"])).unwrap();
        switcher.switch_profile(profile("gamma", &["ref"])).unwrap();

        assert!(h.pipeline.apply_pending_switch());
        assert_eq!(h.pipeline.profile().name, "gamma");
        assert!(!h.pipeline.apply_pending_switch());
        assert!(h.events.events().is_empty());
    }

    #[test]
    fn test_cancellation_force_closes_open_event() {
        let comparator = ScriptedComparator::new(vec![("ref", vec![0.95])]);
        let mut h = harness(profile("alpha", &["ref"]), comparator, 1);
        h.pipeline.process_frame(frame(0));
        h.clock.advance(Duration::from_secs(2));

        let cancelled = AtomicBool::new(true);
        let summary = h.pipeline.run(&cancelled).unwrap();

        assert_eq!(summary.reason, StopReason::Cancelled);
        assert_eq!(summary.events_opened, 1);
        assert_eq!(summary.events_closed, 1);
        let events = h.events.events();
        assert_eq!(events[0].ended_at, Some(at(START_SECS + 2)));
        assert_eq!(h.pipeline.metrics().monitoring_state(), MonitoringState::Idle);
    }

    #[test]
    fn test_closed_queue_is_drained_before_exit() {
        let comparator = ScriptedComparator::new(vec![("ref", vec![0.0, 0.95, 0.0])]);
        let Harness {
            mut pipeline,
            producer,
            events,
            _dir,
            ..
        } = harness(profile("alpha", &["ref"]), comparator, 4);
        for i in 0..3 {
            producer.push(frame(i)).unwrap();
        }
        drop(producer);

        let summary = pipeline.run(&AtomicBool::new(false)).unwrap();

        assert_eq!(summary.reason, StopReason::QueueClosed);
        assert_eq!(summary.cycles, 3);
        assert_eq!(events.events().len(), 1);
        assert_eq!(events.events()[0].ended_at, Some(at(START_SECS + 2)));
    }

    #[derive(Clone, Default)]
    struct CountingNotifier {
        alerts: Arc<std::sync::Mutex<Vec<String>>>,
    }

    impl Notifier for CountingNotifier {
        fn notify(&mut self, event: &DetectionEvent) {
            self.alerts.lock().unwrap().push(event.reference.clone());
        }
    }

    #[test]
    fn test_notifier_fires_once_per_opened_event() {
        let comparator =
            ScriptedComparator::new(vec![("ref", vec![0.95, 0.95, 0.1, 0.95, 0.95])]);
        let notifier = CountingNotifier::default();
        let mut h = harness(profile("alpha", &["ref"]), comparator, 1);
        h.pipeline = h.pipeline.with_notifier(Box::new(notifier.clone()));

        for i in 0..5 {
            h.pipeline.process_frame(frame(i));
        }

        assert_eq!(*notifier.alerts.lock().unwrap(), vec!["ref", "ref"]);
    }

    #[test]
    fn test_selected_reference_limits_matching() {
        let comparator = ScriptedComparator::new(vec![
            ("a", vec![0.99, 0.99]),
            ("b", vec![0.5, 0.95]),
        ]);
        let selected = profile("alpha", &["a", "b"]).with_selected_reference(Some("b".into()));
        let mut h = harness(selected, comparator, 1);

        let first = h.pipeline.process_frame(frame(0));
        assert_eq!(first.scores, vec![("b".to_string(), Some(0.5))]);
        assert!(matches!(first.transition, Transition::Unchanged));

        let second = h.pipeline.process_frame(frame(1));
        assert!(matches!(second.transition, Transition::Started(_)));
        assert_eq!(second.best.unwrap().reference, "b");
        assert_eq!(h.pipeline.metrics().snapshot().last_scores.len(), 1);
    }

    #[test]
    fn test_paused_detection_consumes_frames_without_matching() {
        let comparator = ScriptedComparator::new(vec![("ref", vec![0.95, 0.95, 0.95])]);
        let mut h = harness(profile("alpha", &["ref"]), comparator, 4);
        let pause = h.pipeline.pause_control();
        for i in 0..3 {
            h.producer.push(frame(i)).unwrap();
        }

        pause.pause();
        assert!(matches!(h.pipeline.step(), StepOutcome::Skipped(0)));
        assert!(matches!(h.pipeline.step(), StepOutcome::Skipped(1)));
        assert_eq!(h.pipeline.detection_state(), DetectionState::Idle);
        assert!(h.pipeline.metrics().snapshot().detection_paused);

        pause.resume();
        assert!(matches!(h.pipeline.step(), StepOutcome::Processed(_)));
        assert_eq!(h.pipeline.detection_state(), DetectionState::Active);
        assert!(!h.pipeline.metrics().snapshot().detection_paused);

        drop(h.producer);
        let summary = h.pipeline.run(&AtomicBool::new(false)).unwrap();
        assert_eq!(summary.frames_skipped, 2);
        assert_eq!(summary.cycles, 1);
        assert_eq!(summary.events_opened, 1);
    }

    #[test]
    fn test_mismatched_reference_is_skipped() {
        let mut data = vec![0u8; 24 * 24];
        for y in 0..24 {
            for x in 0..24 {
                if (x / 4 + y / 4) % 2 == 0 {
                    data[y * 24 + x] = 255;
                }
            }
        }
        let scene = Frame::new(data, 24, 24, 1, 0);
        let huge = Frame::new(vec![0; 900], 30, 30, 1, 0);
        let refs = vec![
            Reference::from_frame("huge", &huge, 0.9, ComparisonMethod::EdgeCorrelation),
            Reference::from_frame("same", &scene, 0.9, ComparisonMethod::EdgeCorrelation),
        ];
        let dir = tempfile::tempdir().unwrap();
        let mut h = harness_with(
            ProfileContext::new("alpha", refs),
            Box::new(CorrelationComparator::new()),
            Box::new(FsArtifactStore::new(dir.path())),
            1,
            dir,
        );

        let report = h.pipeline.process_frame(scene);

        assert_eq!(report.scores[0], ("huge".to_string(), None));
        assert!(report.scores[1].1.unwrap() > 0.99);
        assert_eq!(report.best.unwrap().reference, "same");
        assert!(matches!(report.transition, Transition::Started(_)));
    }

    #[test]
    fn test_failed_event_persistence_does_not_stop_pipeline() {
        let comparator = ScriptedComparator::new(vec![("ref", vec![0.95, 0.0, 0.95])]);
        let dir = tempfile::tempdir().unwrap();
        let clock = Arc::new(ManualClock::new(at(START_SECS)));
        let policy = ArtifactPolicy::default();
        let artifacts = ArtifactManager::open(
            Box::new(FsArtifactStore::new(dir.path())),
            clock.clone(),
            policy,
        )
        .unwrap();
        let (_producer, consumer) = frame_queue(1);
        let mut pipeline = MonitorPipeline::new(
            consumer,
            Box::new(comparator),
            artifacts,
            Box::new(FailingMetadataStore),
            profile("alpha", &["ref"]),
            clock,
        );

        pipeline.process_frame(frame(0));
        pipeline.process_frame(frame(1));
        let report = pipeline.process_frame(frame(2));

        assert!(matches!(report.transition, Transition::Started(_)));
        assert!(pipeline.reload_active_profile().is_err());
        assert_eq!(pipeline.profile().name, "alpha");
    }

    #[test]
    fn test_artifact_write_failure_does_not_interrupt_detection() {
        let comparator = ScriptedComparator::new(vec![("ref", vec![0.95, 0.0])]);
        let mut h = harness_with(
            profile("alpha", &["ref"]),
            Box::new(comparator),
            Box::new(BrokenArtifactStore),
            1,
            tempfile::tempdir().unwrap(),
        );

        let started = h.pipeline.process_frame(frame(0));
        assert!(matches!(started.transition, Transition::Started(_)));
        assert!(started.snapshot.is_none());
        h.pipeline.process_frame(frame(1));

        assert_eq!(h.events.events().len(), 1);
        // Debug and forced snapshot on activation, then the still-due periodic one.
        assert_eq!(h.pipeline.metrics().snapshot().artifact_errors, 3);
    }

    #[test]
    fn test_file_decode_error_skips_cycle() {
        let comparator = ScriptedComparator::new(vec![("ref", vec![0.95])]);
        let mut h = harness(profile("alpha", &["ref"]), comparator, 1);

        let result = h.pipeline.process_file(Path::new("/nonexistent/latest.png"));

        assert!(matches!(result, Err(CompareError::Decode { .. })));
        assert_eq!(h.pipeline.metrics().snapshot().frames_processed, 0);
        assert_eq!(h.pipeline.detection_state(), DetectionState::Idle);
    }

    #[test]
    fn test_metrics_reflect_last_cycle() {
        let comparator = ScriptedComparator::new(vec![("a", vec![0.95]), ("b", vec![0.4])]);
        let mut h = harness(profile("alpha", &["a", "b"]), comparator, 1);

        h.pipeline.process_frame(frame(0));

        let m = h.pipeline.metrics().snapshot();
        assert_eq!(m.detection_state, DetectionState::Active);
        assert_eq!(m.score_for("a"), Some(0.95));
        assert_eq!(m.score_for("b"), Some(0.4));
        assert_eq!(m.best_score, Some(0.95));
        assert_eq!(m.frames_processed, 1);
        assert_eq!(m.events_opened, 1);
        assert_eq!(m.last_detection_at, Some(at(START_SECS)));
        assert_eq!(m.snapshot_count, 1);
        assert_eq!(m.debug_count, 1);
        assert_eq!(m.queue_capacity, 1);
    }
}
