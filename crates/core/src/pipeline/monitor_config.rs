use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::shared::constants::{
    APP_DIR_NAME, ARTIFACTS_DIR_NAME, DEFAULT_ALERT_COOLDOWN_S, DEFAULT_POLL_INTERVAL_MS,
    DEFAULT_QUEUE_CAPACITY,
};

/// Platform data directory for artifacts, e.g.
/// `~/.local/share/FrameTrace/artifacts` on Linux.
pub fn default_artifact_root() -> Option<PathBuf> {
    dirs::data_dir().map(|d| d.join(APP_DIR_NAME).join(ARTIFACTS_DIR_NAME))
}

/// Runtime settings for one monitoring session.
#[derive(Clone, Debug)]
pub struct MonitorConfig {
    pub profile_dir: PathBuf,
    pub artifact_root: PathBuf,
    pub queue_capacity: usize,
    /// How long the consumer waits for a frame before rechecking
    /// cancellation and pending profile switches.
    pub poll_interval: Duration,
    /// Minimum spacing between alerts for newly opened detections.
    pub alert_cooldown: Duration,
}

impl MonitorConfig {
    /// Uses the platform artifact root, or `<profile_dir>/artifacts` when the
    /// platform has no data directory.
    pub fn new(profile_dir: impl Into<PathBuf>) -> Self {
        let profile_dir = profile_dir.into();
        let artifact_root =
            default_artifact_root().unwrap_or_else(|| profile_dir.join(ARTIFACTS_DIR_NAME));
        Self {
            profile_dir,
            artifact_root,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
            alert_cooldown: Duration::from_secs(DEFAULT_ALERT_COOLDOWN_S),
        }
    }

    pub fn with_artifact_root(mut self, root: impl AsRef<Path>) -> Self {
        self.artifact_root = root.as_ref().to_path_buf();
        self
    }

    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity.max(1);
        self
    }

    pub fn with_alert_cooldown(mut self, cooldown: Duration) -> Self {
        self.alert_cooldown = cooldown;
        self
    }
}
