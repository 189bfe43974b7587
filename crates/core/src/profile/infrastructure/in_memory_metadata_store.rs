use std::sync::{Arc, Mutex};

use crate::detection::domain::detection_event::DetectionEvent;
use crate::profile::domain::metadata_store::{MetadataStore, StoreError};
use crate::profile::domain::profile_context::ProfileContext;

/// Metadata store kept in memory, for embedding and tests.
///
/// Clones share the recorded events, so a caller can keep one handle while
/// the pipeline owns another.
#[derive(Clone)]
pub struct InMemoryMetadataStore {
    profile: ProfileContext,
    events: Arc<Mutex<Vec<DetectionEvent>>>,
}

impl InMemoryMetadataStore {
    pub fn new(profile: ProfileContext) -> Self {
        Self {
            profile,
            events: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn set_active_profile(&mut self, profile: ProfileContext) {
        self.profile = profile;
    }

    pub fn events(&self) -> Vec<DetectionEvent> {
        self.events
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

impl MetadataStore for InMemoryMetadataStore {
    fn load_active_profile(&mut self) -> Result<ProfileContext, StoreError> {
        Ok(self.profile.clone())
    }

    fn record_event(&mut self, event: DetectionEvent) -> Result<(), StoreError> {
        self.events
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(event);
        Ok(())
    }
}
