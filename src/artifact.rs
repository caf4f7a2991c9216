use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::CleanError;

/// A qualified reference to a published artifact, e.g. `sample.csv:latest`
/// or `sample.csv:v2`. A bare name resolves to `latest`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactRef {
    pub name: String,
    pub version: ArtifactVersion,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ArtifactVersion {
    Latest,
    Label(String),
}

impl fmt::Display for ArtifactRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.version {
            ArtifactVersion::Latest => write!(f, "{}:latest", self.name),
            ArtifactVersion::Label(label) => write!(f, "{}:{}", self.name, label),
        }
    }
}

impl FromStr for ArtifactRef {
    type Err = CleanError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (name, version) = match s.rsplit_once(':') {
            Some((name, version)) => (name, version),
            None => (s, "latest"),
        };
        if name.is_empty() {
            return Err(CleanError::Config(format!(
                "invalid artifact reference '{}': empty name",
                s
            )));
        }
        let version = match version {
            "" | "latest" => ArtifactVersion::Latest,
            label => {
                // Accept both `v3` and bare `3`.
                let normalized = if label.chars().all(|c| c.is_ascii_digit()) {
                    format!("v{}", label)
                } else {
                    label.to_string()
                };
                ArtifactVersion::Label(normalized)
            }
        };
        Ok(ArtifactRef {
            name: name.to_string(),
            version,
        })
    }
}

/// Metadata supplied by the caller when publishing a new artifact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactMeta {
    pub name: String,
    pub artifact_type: String,
    pub description: String,
}

impl ArtifactMeta {
    pub fn validate(&self) -> Result<(), CleanError> {
        for (field, value) in [
            ("output_artifact", &self.name),
            ("output_type", &self.artifact_type),
            ("output_description", &self.description),
        ] {
            if value.trim().is_empty() {
                return Err(CleanError::Config(format!("{} must be non-empty", field)));
            }
        }
        Ok(())
    }
}

/// A published artifact version as recorded by the store. Immutable once
/// written; each publish of the same name allocates the next version label.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StampedArtifact {
    pub name: String,
    pub version: String,
    pub artifact_type: String,
    pub description: String,
    /// Content address of the payload, `cas:sha256:<hex>`.
    pub payload_ref: String,
    pub size_bytes: u64,
    pub created_at: DateTime<Utc>,
}

impl StampedArtifact {
    pub fn qualified_ref(&self) -> String {
        format!("{}:{}", self.name, self.version)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Started,
    Finished,
}

/// One execution of a pipeline step, recorded for provenance: which project
/// and job produced it, the configuration it ran with, and the artifact
/// lineage in and out.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunRecord {
    pub run_id: String,
    pub project: String,
    pub job_type: String,
    pub group: String,
    pub status: RunStatus,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub config: serde_json::Value,
    pub input_artifacts: Vec<String>,
    pub output_artifacts: Vec<String>,
}

impl RunRecord {
    pub fn start(project: &str, job_type: &str, group: &str, config: serde_json::Value) -> Self {
        Self {
            run_id: uuid::Uuid::new_v4().to_string(),
            project: project.to_string(),
            job_type: job_type.to_string(),
            group: group.to_string(),
            status: RunStatus::Started,
            started_at: Utc::now(),
            finished_at: None,
            config,
            input_artifacts: Vec::new(),
            output_artifacts: Vec::new(),
        }
    }

    pub fn finish(mut self, inputs: Vec<String>, outputs: Vec<String>) -> Self {
        self.status = RunStatus::Finished;
        self.finished_at = Some(Utc::now());
        self.input_artifacts = inputs;
        self.output_artifacts = outputs;
        self
    }
}
