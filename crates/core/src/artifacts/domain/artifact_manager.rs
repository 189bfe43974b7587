use std::sync::Arc;
use std::time::Duration;

use crate::artifacts::domain::artifact::{Artifact, ArtifactError, ArtifactKind, ArtifactPolicy};
use crate::artifacts::domain::artifact_store::ArtifactStore;
use crate::artifacts::domain::retention_ledger::{EvictionOutcome, RetentionLedger};
use crate::shared::clock::Clock;
use crate::shared::frame::Frame;

/// Writes snapshots and debug images under an [`ArtifactPolicy`] and keeps
/// each category within its retention count.
///
/// Snapshot writes are throttled on the monotonic clock; a forced snapshot
/// bypasses the throttle. Every successful write is followed by eviction of
/// the affected category. Sequence numbers are shared by both categories and
/// never reused, including after a restart.
pub struct ArtifactManager {
    store: Box<dyn ArtifactStore>,
    clock: Arc<dyn Clock>,
    policy: ArtifactPolicy,
    snapshots: RetentionLedger,
    debug: RetentionLedger,
    next_sequence: u64,
    last_snapshot_at: Option<Duration>,
}

impl ArtifactManager {
    /// Rebuilds both ledgers from the store and evicts anything beyond the
    /// policy's retention counts.
    pub fn open(
        store: Box<dyn ArtifactStore>,
        clock: Arc<dyn Clock>,
        policy: ArtifactPolicy,
    ) -> Result<Self, ArtifactError> {
        let snapshots = RetentionLedger::from_artifacts(store.list(ArtifactKind::Snapshot)?);
        let debug = RetentionLedger::from_artifacts(store.list(ArtifactKind::Debug)?);
        let next_sequence = snapshots
            .max_sequence()
            .into_iter()
            .chain(debug.max_sequence())
            .max()
            .map_or(1, |max| max + 1);

        if !snapshots.is_empty() || !debug.is_empty() {
            log::info!(
                "Recovered {} snapshot(s) and {} debug image(s), next sequence {next_sequence}",
                snapshots.len(),
                debug.len()
            );
        }

        let mut manager = Self {
            store,
            clock,
            policy,
            snapshots,
            debug,
            next_sequence,
            last_snapshot_at: None,
        };
        manager.evict_all();
        Ok(manager)
    }

    pub fn policy(&self) -> &ArtifactPolicy {
        &self.policy
    }

    /// Replaces the policy wholesale and enforces the new retention counts.
    /// The snapshot throttle keeps its last write time.
    pub fn set_policy(&mut self, policy: ArtifactPolicy) {
        self.policy = policy;
        self.evict_all();
    }

    pub fn count(&self, kind: ArtifactKind) -> usize {
        self.ledger(kind).len()
    }

    /// Bytes held by live artifacts of `kind`.
    pub fn bytes(&self, kind: ArtifactKind) -> u64 {
        self.ledger(kind).total_bytes()
    }

    pub fn pending_deletes(&self, kind: ArtifactKind) -> usize {
        self.ledger(kind).pending_deletes()
    }

    pub fn artifacts(&self, kind: ArtifactKind) -> impl Iterator<Item = &Artifact> {
        self.ledger(kind).iter()
    }

    /// Whether an unforced snapshot would be written now.
    pub fn snapshot_due(&self) -> bool {
        match self.last_snapshot_at {
            None => true,
            Some(last) => {
                self.clock.monotonic().saturating_sub(last) >= self.policy.snapshot_interval
            }
        }
    }

    /// Writes a snapshot when the throttle interval has elapsed or `force`
    /// is set. Returns `Ok(None)` when nothing was written.
    pub fn capture_snapshot(
        &mut self,
        frame: &Frame,
        force: bool,
    ) -> Result<Option<Artifact>, ArtifactError> {
        if self.policy.snapshot_retention == 0 || !(force || self.snapshot_due()) {
            return Ok(None);
        }
        let artifact = self.write(ArtifactKind::Snapshot, frame)?;
        self.last_snapshot_at = Some(self.clock.monotonic());
        Ok(Some(artifact))
    }

    /// Writes a debug image. Not throttled.
    pub fn record_debug(&mut self, frame: &Frame) -> Result<Option<Artifact>, ArtifactError> {
        if self.policy.debug_retention == 0 {
            return Ok(None);
        }
        self.write(ArtifactKind::Debug, frame).map(Some)
    }

    /// Enforces the retention count and byte cap of `kind` and retries
    /// failed deletes.
    pub fn evict(&mut self, kind: ArtifactKind) -> EvictionOutcome {
        let retention = self.policy.retention(kind);
        let max_bytes = self.policy.max_bytes(kind);
        let ledger = match kind {
            ArtifactKind::Snapshot => &mut self.snapshots,
            ArtifactKind::Debug => &mut self.debug,
        };
        ledger.evict(retention, max_bytes, self.store.as_mut())
    }

    fn evict_all(&mut self) {
        for kind in ArtifactKind::ALL {
            self.evict(kind);
        }
    }

    fn write(&mut self, kind: ArtifactKind, frame: &Frame) -> Result<Artifact, ArtifactError> {
        let sequence = self.next_sequence;
        self.next_sequence += 1;
        let artifact = self.store.write(kind, sequence, self.clock.wall(), frame)?;
        log::debug!("Wrote {kind} #{sequence} to {}", artifact.path.display());

        match kind {
            ArtifactKind::Snapshot => self.snapshots.record(artifact.clone()),
            ArtifactKind::Debug => self.debug.record(artifact.clone()),
        }
        self.evict(kind);
        Ok(artifact)
    }

    fn ledger(&self, kind: ArtifactKind) -> &RetentionLedger {
        match kind {
            ArtifactKind::Snapshot => &self.snapshots,
            ArtifactKind::Debug => &self.debug,
        }
    }
}
