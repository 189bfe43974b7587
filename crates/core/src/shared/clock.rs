use std::sync::Mutex;
use std::time::{Duration, Instant, SystemTime};

/// Time source for the pipeline.
///
/// `monotonic` drives throttling and is immune to wall-clock adjustments;
/// `wall` stamps events that leave the pipeline.
pub trait Clock: Send + Sync {
    /// Time elapsed since an arbitrary fixed origin.
    fn monotonic(&self) -> Duration;

    fn wall(&self) -> SystemTime;
}

pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn monotonic(&self) -> Duration {
        self.origin.elapsed()
    }

    fn wall(&self) -> SystemTime {
        SystemTime::now()
    }
}

/// Manually advanced clock for deterministic tests and replays.
///
/// Both readings move together on [`ManualClock::advance`]; the wall clock
/// can additionally be set to simulate a clock jump.
pub struct ManualClock {
    state: Mutex<(Duration, SystemTime)>,
}

impl ManualClock {
    pub fn new(wall_start: SystemTime) -> Self {
        Self {
            state: Mutex::new((Duration::ZERO, wall_start)),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.0 += by;
        state.1 += by;
    }

    pub fn set_wall(&self, wall: SystemTime) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.1 = wall;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new(SystemTime::UNIX_EPOCH)
    }
}

impl Clock for ManualClock {
    fn monotonic(&self) -> Duration {
        self.state.lock().unwrap_or_else(|e| e.into_inner()).0
    }

    fn wall(&self) -> SystemTime {
        self.state.lock().unwrap_or_else(|e| e.into_inner()).1
    }
}
