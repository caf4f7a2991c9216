use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::warn;

use crate::app::ports::{ArtifactStorePort, RunLogPort};
use crate::artifact::{ArtifactMeta, ArtifactRef, ArtifactVersion, RunRecord, StampedArtifact};
use crate::error::{CleanError, Result};

const CAS_PREFIX: &str = "cas:sha256:";

/// Per-artifact manifest: an ordered list of immutable versions. The last
/// entry is what `latest` resolves to.
#[derive(Debug, Default, Serialize, Deserialize)]
struct ArtifactManifest {
    versions: Vec<StampedArtifact>,
}

/// Local filesystem artifact store.
///
/// Layout under the data root:
/// ```text
/// cas/sha256/<h0h1>/<h2h3>/<hex>   content-addressed payloads
/// artifacts/<name>.json            version manifests
/// runs/runs.ndjson                 append-only run log
/// ```
pub struct FsArtifactStore {
    root: PathBuf,
}

impl FsArtifactStore {
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        let root = root.into();
        for dir in ["cas", "artifacts", "runs"] {
            if let Err(e) = fs::create_dir_all(root.join(dir)) {
                warn!(dir = %root.join(dir).display(), "failed to create store directory: {}", e);
            }
        }
        Self { root }
    }

    fn manifest_path(&self, name: &str) -> Result<PathBuf> {
        // Artifact names become file names; path separators would escape
        // the manifest directory.
        if name.contains('/') || name.contains('\\') {
            return Err(CleanError::Config(format!(
                "invalid artifact name '{}': must not contain path separators",
                name
            )));
        }
        Ok(self.root.join("artifacts").join(format!("{}.json", name)))
    }

    fn load_manifest(&self, name: &str) -> Result<Option<ArtifactManifest>> {
        let path = self.manifest_path(name)?;
        if !path.exists() {
            return Ok(None);
        }
        let raw = fs::read_to_string(&path)?;
        Ok(Some(serde_json::from_str(&raw)?))
    }

    /// Rewrites the manifest atomically: versions already published must
    /// never be lost to a partial write.
    fn save_manifest(&self, name: &str, manifest: &ArtifactManifest) -> Result<()> {
        let path = self.manifest_path(name)?;
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_vec_pretty(manifest)?)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }

    fn blob_path(&self, hex: &str) -> PathBuf {
        self.root
            .join("cas")
            .join("sha256")
            .join(&hex[0..2])
            .join(&hex[2..4])
            .join(hex)
    }

    /// Writes a payload into content-addressed storage, returning its
    /// `cas:sha256:<hex>` reference. Identical payloads share one blob.
    fn write_cas(&self, bytes: &[u8]) -> Result<String> {
        let mut hasher = Sha256::new();
        hasher.update(bytes);
        let hex = hex::encode(hasher.finalize());
        let path = self.blob_path(&hex);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        if !path.exists() {
            fs::write(&path, bytes)?;
        }
        Ok(format!("{}{}", CAS_PREFIX, hex))
    }

    fn resolve_version<'a>(
        manifest: &'a ArtifactManifest,
        reference: &ArtifactRef,
    ) -> Option<&'a StampedArtifact> {
        match &reference.version {
            ArtifactVersion::Latest => manifest.versions.last(),
            ArtifactVersion::Label(label) => {
                manifest.versions.iter().find(|v| &v.version == label)
            }
        }
    }
}

#[async_trait]
impl ArtifactStorePort for FsArtifactStore {
    async fn fetch(&self, reference: &ArtifactRef) -> Result<PathBuf> {
        let manifest = self
            .load_manifest(&reference.name)?
            .ok_or_else(|| CleanError::ArtifactNotFound(reference.to_string()))?;
        let stamped = Self::resolve_version(&manifest, reference)
            .ok_or_else(|| CleanError::ArtifactNotFound(reference.to_string()))?;

        let hex = stamped
            .payload_ref
            .strip_prefix(CAS_PREFIX)
            .filter(|h| h.len() >= 4)
            .ok_or_else(|| {
                CleanError::Store(format!("bad payload ref '{}'", stamped.payload_ref))
            })?;
        let path = self.blob_path(hex);
        if !path.exists() {
            return Err(CleanError::Fetch(format!(
                "payload for {} missing from content store",
                reference
            )));
        }
        Ok(path)
    }

    async fn publish(&self, meta: &ArtifactMeta, file: &Path) -> Result<StampedArtifact> {
        let bytes = fs::read(file)
            .map_err(|e| CleanError::Store(format!("cannot read staged file: {}", e)))?;
        let payload_ref = self.write_cas(&bytes)?;

        let mut manifest = self.load_manifest(&meta.name)?.unwrap_or_default();
        let stamped = StampedArtifact {
            name: meta.name.clone(),
            version: format!("v{}", manifest.versions.len() + 1),
            artifact_type: meta.artifact_type.clone(),
            description: meta.description.clone(),
            payload_ref,
            size_bytes: bytes.len() as u64,
            created_at: Utc::now(),
        };
        manifest.versions.push(stamped.clone());
        self.save_manifest(&meta.name, &manifest)?;
        Ok(stamped)
    }
}

/// Append-only NDJSON run log under the same data root.
pub struct FsRunLog {
    path: PathBuf,
}

impl FsRunLog {
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self {
            path: root.into().join("runs").join("runs.ndjson"),
        }
    }
}

#[async_trait]
impl RunLogPort for FsRunLog {
    async fn append(&self, record: &RunRecord) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        let line = serde_json::to_string(record)?;
        writeln!(file, "{}", line)?;
        Ok(())
    }
}
