use async_trait::async_trait;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};

use crate::app::ports::{ArtifactStorePort, RunLogPort};
use crate::artifact::{ArtifactMeta, ArtifactRef, ArtifactVersion, RunRecord, StampedArtifact};
use crate::error::{CleanError, Result};

const TOKEN_ENV: &str = "DATAPREP_API_TOKEN";

#[derive(Debug, Deserialize)]
struct RemoteManifest {
    versions: Vec<StampedArtifact>,
}

/// Client for a remote artifact store exposing manifests, content-addressed
/// blobs, and a run endpoint:
///
/// ```text
/// GET  {base}/artifacts/{name}           version manifest
/// GET  {base}/blobs/{hex}                payload bytes
/// POST {base}/blobs/{hex}                payload upload
/// POST {base}/artifacts/{name}/versions  allocate a new version
/// POST {base}/runs                       run provenance records
/// ```
///
/// A bearer token is read from `DATAPREP_API_TOKEN` when present.
pub struct HttpArtifactStore {
    base_url: String,
    client: reqwest::Client,
    token: Option<String>,
    download_dir: PathBuf,
}

impl HttpArtifactStore {
    pub fn new<P: Into<PathBuf>>(base_url: &str, download_dir: P) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
            token: std::env::var(TOKEN_ENV).ok().filter(|t| !t.is_empty()),
            download_dir: download_dir.into(),
        }
    }

    fn authorize(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }

    async fn get_manifest(&self, name: &str) -> Result<RemoteManifest> {
        let url = format!("{}/artifacts/{}", self.base_url, name);
        let resp = self.authorize(self.client.get(&url)).send().await?;
        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(CleanError::ArtifactNotFound(name.to_string()));
        }
        if !resp.status().is_success() {
            return Err(CleanError::Fetch(format!(
                "manifest request for '{}' returned {}",
                name,
                resp.status()
            )));
        }
        Ok(resp.json().await?)
    }
}

#[async_trait]
impl ArtifactStorePort for HttpArtifactStore {
    async fn fetch(&self, reference: &ArtifactRef) -> Result<PathBuf> {
        let manifest = self.get_manifest(&reference.name).await?;
        let stamped = match &reference.version {
            ArtifactVersion::Latest => manifest.versions.last(),
            ArtifactVersion::Label(label) => {
                manifest.versions.iter().find(|v| &v.version == label)
            }
        }
        .ok_or_else(|| CleanError::ArtifactNotFound(reference.to_string()))?;

        let hex = stamped
            .payload_ref
            .rsplit(':')
            .next()
            .unwrap_or_default()
            .to_string();
        let url = format!("{}/blobs/{}", self.base_url, hex);
        let resp = self.authorize(self.client.get(&url)).send().await?;
        if !resp.status().is_success() {
            return Err(CleanError::Fetch(format!(
                "blob download for {} returned {}",
                reference,
                resp.status()
            )));
        }
        let bytes = resp.bytes().await?;

        fs::create_dir_all(&self.download_dir)?;
        let path = self.download_dir.join(&hex);
        fs::write(&path, &bytes)?;
        Ok(path)
    }

    async fn publish(&self, meta: &ArtifactMeta, file: &Path) -> Result<StampedArtifact> {
        let bytes = fs::read(file)
            .map_err(|e| CleanError::Store(format!("cannot read staged file: {}", e)))?;
        let mut hasher = Sha256::new();
        hasher.update(&bytes);
        let hex = hex::encode(hasher.finalize());

        let blob_url = format!("{}/blobs/{}", self.base_url, hex);
        let resp = self
            .authorize(self.client.post(&blob_url))
            .body(bytes.clone())
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(CleanError::Store(format!(
                "blob upload returned {}",
                resp.status()
            )));
        }

        let version_url = format!("{}/artifacts/{}/versions", self.base_url, meta.name);
        let body = serde_json::json!({
            "artifact_type": meta.artifact_type,
            "description": meta.description,
            "sha256": hex,
            "size_bytes": bytes.len() as u64,
        });
        let resp = self
            .authorize(self.client.post(&version_url))
            .json(&body)
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(CleanError::Store(format!(
                "version allocation for '{}' returned {}",
                meta.name,
                resp.status()
            )));
        }
        Ok(resp.json().await?)
    }
}

/// Run log that forwards provenance records to the remote store.
pub struct HttpRunLog {
    base_url: String,
    client: reqwest::Client,
    token: Option<String>,
}

impl HttpRunLog {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
            token: std::env::var(TOKEN_ENV).ok().filter(|t| !t.is_empty()),
        }
    }
}

#[async_trait]
impl RunLogPort for HttpRunLog {
    async fn append(&self, record: &RunRecord) -> Result<()> {
        let url = format!("{}/runs", self.base_url);
        let mut req = self.client.post(&url).json(record);
        if let Some(token) = &self.token {
            req = req.bearer_auth(token);
        }
        let resp = req.send().await?;
        if !resp.status().is_success() {
            return Err(CleanError::Store(format!(
                "run record submission returned {}",
                resp.status()
            )));
        }
        Ok(())
    }
}
