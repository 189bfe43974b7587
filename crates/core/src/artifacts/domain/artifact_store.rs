use std::time::SystemTime;

use crate::artifacts::domain::artifact::{Artifact, ArtifactError, ArtifactKind};
use crate::shared::frame::Frame;

/// Persistence for artifact images, one namespace per [`ArtifactKind`].
pub trait ArtifactStore: Send {
    /// Persists `frame` so readers never observe a partially written file.
    fn write(
        &mut self,
        kind: ArtifactKind,
        sequence: u64,
        created_at: SystemTime,
        frame: &Frame,
    ) -> Result<Artifact, ArtifactError>;

    /// Removes an artifact. Deleting one that is already gone succeeds.
    fn delete(&mut self, artifact: &Artifact) -> Result<(), ArtifactError>;

    /// Lists existing artifacts of `kind` in any order.
    fn list(&self, kind: ArtifactKind) -> Result<Vec<Artifact>, ArtifactError>;
}
