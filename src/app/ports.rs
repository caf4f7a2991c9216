use async_trait::async_trait;
use std::path::{Path, PathBuf};

use crate::artifact::{ArtifactMeta, ArtifactRef, RunRecord, StampedArtifact};
use crate::error::Result;

/// The versioned artifact store the cleaning step reads from and publishes
/// to. Implementations: local filesystem store, remote HTTP store.
#[async_trait]
pub trait ArtifactStorePort: Send + Sync {
    /// Resolves a qualified reference and materializes the payload as a
    /// local readable file, returning its path.
    async fn fetch(&self, reference: &ArtifactRef) -> Result<PathBuf>;

    /// Publishes a file as a new immutable version of the named artifact.
    async fn publish(&self, meta: &ArtifactMeta, file: &Path) -> Result<StampedArtifact>;
}

/// Append-only provenance log of step executions.
#[async_trait]
pub trait RunLogPort: Send + Sync {
    async fn append(&self, record: &RunRecord) -> Result<()>;
}
