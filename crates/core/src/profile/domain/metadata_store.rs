use crate::detection::domain::detection_event::DetectionEvent;
use crate::profile::domain::profile_context::ProfileContext;

pub type StoreError = Box<dyn std::error::Error + Send + Sync>;

/// Persistence collaborator for profiles and closed detection events.
pub trait MetadataStore: Send {
    fn load_active_profile(&mut self) -> Result<ProfileContext, StoreError>;

    /// Takes ownership of a closed event.
    fn record_event(&mut self, event: DetectionEvent) -> Result<(), StoreError>;
}
