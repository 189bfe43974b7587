pub const DEFAULT_DETECTION_THRESHOLD: f64 = 0.70;
pub const MIN_DETECTION_THRESHOLD: f64 = 0.50;
pub const MAX_DETECTION_THRESHOLD: f64 = 0.95;

/// Default queue depth: only the newest frame is kept.
pub const DEFAULT_QUEUE_CAPACITY: usize = 1;

pub const DEFAULT_SNAPSHOT_INTERVAL_SECS: f64 = 5.0;
pub const DEFAULT_SNAPSHOT_RETENTION: usize = 50;
pub const DEFAULT_DEBUG_RETENTION: usize = 2000;
/// Total size cap for debug images (1 GiB).
pub const DEFAULT_DEBUG_MAX_BYTES: u64 = 1_073_741_824;

/// Smallest accepted ROI side after clamping, in pixels.
pub const MIN_ROI_SIDE: i32 = 10;

/// Match placements are snapped to this grid so overlays do not jitter.
pub const MATCH_GRID: i32 = 8;

/// L1 Sobel magnitude at or above which a pixel counts as an edge.
pub const EDGE_MAGNITUDE_THRESHOLD: i32 = 128;

pub const SNAPSHOT_DIR_NAME: &str = "snapshots";
pub const DEBUG_DIR_NAME: &str = "debug";

pub const PROFILE_FILE_NAME: &str = "profile.json";
pub const EVENTS_FILE_NAME: &str = "events.jsonl";

pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp", "tiff", "tif", "webp"];

/// Well-known capture written by external tooling for the file-based path.
pub const CAPTURES_DIR_NAME: &str = "captures";
pub const LATEST_CAPTURE_FILE_NAME: &str = "latest.png";

pub const APP_DIR_NAME: &str = "FrameTrace";
pub const ARTIFACTS_DIR_NAME: &str = "artifacts";

/// Minimum spacing between detection alerts.
pub const DEFAULT_ALERT_COOLDOWN_S: u64 = 5;

/// Consumer wait per pop before rechecking cancellation and switches.
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 50;
