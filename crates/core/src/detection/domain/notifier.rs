use std::sync::Arc;
use std::time::Duration;

use crate::detection::domain::detection_event::DetectionEvent;
use crate::shared::clock::Clock;

/// Receives an alert when a detection event opens.
pub trait Notifier: Send {
    fn notify(&mut self, event: &DetectionEvent);
}

pub struct NullNotifier;

impl Notifier for NullNotifier {
    fn notify(&mut self, _event: &DetectionEvent) {}
}

/// Forwards at most one alert per cooldown window.
///
/// The window runs on the monotonic clock, so wall-clock jumps neither
/// silence alerts nor release a burst of them.
pub struct CooldownNotifier {
    inner: Box<dyn Notifier>,
    clock: Arc<dyn Clock>,
    cooldown: Duration,
    last_sent: Option<Duration>,
    suppressed: u64,
}

impl CooldownNotifier {
    pub fn new(inner: Box<dyn Notifier>, clock: Arc<dyn Clock>, cooldown: Duration) -> Self {
        Self {
            inner,
            clock,
            cooldown,
            last_sent: None,
            suppressed: 0,
        }
    }

    /// Alerts dropped because they fell inside the cooldown window.
    pub fn suppressed(&self) -> u64 {
        self.suppressed
    }
}

impl Notifier for CooldownNotifier {
    fn notify(&mut self, event: &DetectionEvent) {
        let now = self.clock.monotonic();
        if self
            .last_sent
            .is_some_and(|sent| now.saturating_sub(sent) < self.cooldown)
        {
            self.suppressed += 1;
            log::debug!("Alert for {} suppressed by cooldown", event.reference);
            return;
        }
        self.last_sent = Some(now);
        self.inner.notify(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::clock::ManualClock;
    use std::sync::Mutex;
    use std::time::SystemTime;

    #[derive(Clone, Default)]
    struct Recorder {
        seen: Arc<Mutex<Vec<String>>>,
    }

    impl Notifier for Recorder {
        fn notify(&mut self, event: &DetectionEvent) {
            self.seen.lock().unwrap().push(event.reference.clone());
        }
    }

    fn event(reference: &str) -> DetectionEvent {
        DetectionEvent::open("alpha", reference, 0.95, SystemTime::UNIX_EPOCH)
    }

    #[test]
    fn test_alerts_inside_cooldown_are_suppressed() {
        let clock = Arc::new(ManualClock::default());
        let recorder = Recorder::default();
        let mut notifier =
            CooldownNotifier::new(Box::new(recorder.clone()), clock.clone(), Duration::from_secs(5));

        notifier.notify(&event("a"));
        clock.advance(Duration::from_secs(4));
        notifier.notify(&event("b"));
        clock.advance(Duration::from_secs(1));
        notifier.notify(&event("c"));

        assert_eq!(*recorder.seen.lock().unwrap(), vec!["a", "c"]);
        assert_eq!(notifier.suppressed(), 1);
    }

    #[test]
    fn test_wall_clock_jump_does_not_reset_cooldown() {
        let clock = Arc::new(ManualClock::default());
        let recorder = Recorder::default();
        let mut notifier =
            CooldownNotifier::new(Box::new(recorder.clone()), clock.clone(), Duration::from_secs(5));

        notifier.notify(&event("a"));
        clock.set_wall(SystemTime::UNIX_EPOCH + Duration::from_secs(3_600));
        notifier.notify(&event("b"));

        assert_eq!(*recorder.seen.lock().unwrap(), vec!["a"]);
    }

    #[test]
    fn test_zero_cooldown_forwards_everything() {
        let clock = Arc::new(ManualClock::default());
        let recorder = Recorder::default();
        let mut notifier =
            CooldownNotifier::new(Box::new(recorder.clone()), clock, Duration::ZERO);

        notifier.notify(&event("a"));
        notifier.notify(&event("b"));

        assert_eq!(recorder.seen.lock().unwrap().len(), 2);
        assert_eq!(notifier.suppressed(), 0);
    }
}
