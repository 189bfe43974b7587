use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Lifecycle of the monitoring worker. Independent of detection state and
/// untouched by profile switches.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MonitoringState {
    #[default]
    Idle,
    Starting,
    Running,
    Stopping,
    Failed,
}

impl std::fmt::Display for MonitoringState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            MonitoringState::Idle => "IDLE",
            MonitoringState::Starting => "STARTING",
            MonitoringState::Running => "RUNNING",
            MonitoringState::Stopping => "STOPPING",
            MonitoringState::Failed => "FAILED",
        };
        f.write_str(label)
    }
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("invalid monitoring transition {from} -> {to}")]
pub struct InvalidTransition {
    pub from: MonitoringState,
    pub to: MonitoringState,
}

impl MonitoringState {
    pub fn can_transition_to(self, to: MonitoringState) -> bool {
        use MonitoringState::*;
        matches!(
            (self, to),
            (Idle, Starting)
                | (Failed, Starting)
                | (Starting, Running)
                | (Starting, Failed)
                | (Running, Stopping)
                | (Running, Failed)
                | (Stopping, Idle)
                | (Stopping, Failed)
        )
    }

    pub fn transition(self, to: MonitoringState) -> Result<MonitoringState, InvalidTransition> {
        if self.can_transition_to(to) {
            Ok(to)
        } else {
            Err(InvalidTransition { from: self, to })
        }
    }

    pub fn is_active(self) -> bool {
        matches!(
            self,
            MonitoringState::Starting | MonitoringState::Running | MonitoringState::Stopping
        )
    }
}
