use std::collections::VecDeque;

use crate::artifacts::domain::artifact::Artifact;
use crate::artifacts::domain::artifact_store::ArtifactStore;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct EvictionOutcome {
    pub deleted: usize,
    pub failed: usize,
}

/// Per-category list of live artifacts ordered by sequence number.
///
/// Artifacts past the retention count or byte cap move to a pending list and
/// stay there until the store confirms their deletion.
#[derive(Debug, Default)]
pub struct RetentionLedger {
    live: VecDeque<Artifact>,
    live_bytes: u64,
    pending_deletes: Vec<Artifact>,
}

impl RetentionLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_artifacts(mut artifacts: Vec<Artifact>) -> Self {
        artifacts.sort_by_key(|a| a.sequence);
        let live_bytes = artifacts.iter().map(|a| a.size_bytes).sum();
        Self {
            live: artifacts.into(),
            live_bytes,
            pending_deletes: Vec::new(),
        }
    }

    pub fn record(&mut self, artifact: Artifact) {
        self.live_bytes += artifact.size_bytes;
        match self.live.back() {
            Some(last) if last.sequence > artifact.sequence => {
                let at = self
                    .live
                    .partition_point(|a| a.sequence < artifact.sequence);
                self.live.insert(at, artifact);
            }
            _ => self.live.push_back(artifact),
        }
    }

    pub fn len(&self) -> usize {
        self.live.len()
    }

    pub fn is_empty(&self) -> bool {
        self.live.is_empty()
    }

    /// Bytes held by live artifacts.
    pub fn total_bytes(&self) -> u64 {
        self.live_bytes
    }

    pub fn iter(&self) -> impl Iterator<Item = &Artifact> {
        self.live.iter()
    }

    pub fn max_sequence(&self) -> Option<u64> {
        self.live
            .back()
            .map(|a| a.sequence)
            .into_iter()
            .chain(self.pending_deletes.iter().map(|a| a.sequence))
            .max()
    }

    pub fn pending_deletes(&self) -> usize {
        self.pending_deletes.len()
    }

    /// Drops oldest entries while more than `retention` remain or their
    /// total size exceeds `max_bytes`, then retries every pending delete.
    /// Running it again without new records only touches deletes that
    /// failed before.
    pub fn evict(
        &mut self,
        retention: usize,
        max_bytes: Option<u64>,
        store: &mut dyn ArtifactStore,
    ) -> EvictionOutcome {
        while self.live.len() > retention || max_bytes.is_some_and(|max| self.live_bytes > max) {
            let Some(oldest) = self.live.pop_front() else {
                break;
            };
            self.live_bytes -= oldest.size_bytes;
            self.pending_deletes.push(oldest);
        }

        let mut outcome = EvictionOutcome::default();
        self.pending_deletes.retain(|artifact| match store.delete(artifact) {
            Ok(()) => {
                log::debug!("Evicted {} #{}", artifact.kind, artifact.sequence);
                outcome.deleted += 1;
                false
            }
            Err(e) => {
                log::warn!("{e}; will retry on next eviction");
                outcome.failed += 1;
                true
            }
        });
        outcome
    }
}
