use std::time::SystemTime;

use crate::detection::domain::detection_event::DetectionEvent;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum DetectionState {
    #[default]
    Idle,
    Active,
}

impl std::fmt::Display for DetectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DetectionState::Idle => write!(f, "IDLE"),
            DetectionState::Active => write!(f, "ACTIVE"),
        }
    }
}

/// The best matching reference of one cycle.
#[derive(Clone, Debug, PartialEq)]
pub struct CycleMatch {
    pub reference: String,
    pub score: f64,
}

/// Outcome of feeding one cycle into the state machine.
#[derive(Clone, Debug, PartialEq)]
pub enum Transition {
    /// Still idle.
    Unchanged,
    /// IDLE -> ACTIVE. Carries a copy of the newly opened event.
    Started(DetectionEvent),
    /// Still active; the open event absorbed this cycle's match.
    Continued,
    /// ACTIVE -> IDLE. Carries the closed event.
    Ended(DetectionEvent),
}

/// Per-profile IDLE/ACTIVE tracker.
///
/// All references of a profile share one event: the first match opens it
/// and the first cycle without any match closes it.
pub struct DetectionStateMachine {
    profile: String,
    open: Option<DetectionEvent>,
}

impl DetectionStateMachine {
    pub fn new(profile: impl Into<String>) -> Self {
        Self {
            profile: profile.into(),
            open: None,
        }
    }

    pub fn profile(&self) -> &str {
        &self.profile
    }

    pub fn state(&self) -> DetectionState {
        if self.open.is_some() {
            DetectionState::Active
        } else {
            DetectionState::Idle
        }
    }

    pub fn open_event(&self) -> Option<&DetectionEvent> {
        self.open.as_ref()
    }

    /// Applies one cycle. `best` is the strongest matching reference, or
    /// `None` when no reference reached its threshold.
    pub fn observe(&mut self, best: Option<&CycleMatch>, at: SystemTime) -> Transition {
        let Some(best) = best else {
            return match self.open.take() {
                Some(mut event) => {
                    event.ended_at = Some(at);
                    Transition::Ended(event)
                }
                None => Transition::Unchanged,
            };
        };

        if let Some(event) = self.open.as_mut() {
            event.matched_cycles += 1;
            if best.score > event.peak_score {
                event.peak_score = best.score;
                event.peak_reference = best.reference.clone();
            }
            return Transition::Continued;
        }

        let event = DetectionEvent::open(&self.profile, &best.reference, best.score, at);
        self.open = Some(event.clone());
        Transition::Started(event)
    }

    /// Closes the open event at `at`, e.g. on profile switch or shutdown.
    pub fn force_close(&mut self, at: SystemTime) -> Option<DetectionEvent> {
        self.open.take().map(|mut event| {
            event.ended_at = Some(at);
            event
        })
    }
}
