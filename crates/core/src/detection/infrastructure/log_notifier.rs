use crate::detection::domain::detection_event::DetectionEvent;
use crate::detection::domain::notifier::Notifier;

/// Alerts through the `log` facade at warn level so they stand out from
/// routine cycle output.
#[derive(Default)]
pub struct LogNotifier {
    sent: u64,
}

impl LogNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> u64 {
        self.sent
    }
}

impl Notifier for LogNotifier {
    fn notify(&mut self, event: &DetectionEvent) {
        self.sent += 1;
        log::warn!(
            "Detected {} in profile {:?} (score {:.3})",
            event.reference,
            event.profile,
            event.peak_score
        );
    }
}
