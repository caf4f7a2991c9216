use chrono::Utc;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::app::ports::{ArtifactStorePort, RunLogPort};
use crate::artifact::{ArtifactMeta, ArtifactRef, RunRecord};
use crate::cleaning::{clean_csv, CleanOptions, CleanStats};
use crate::config::TrackingConfig;
use crate::error::Result;

/// Everything the cleaning step needs for one invocation. Mirrors the CLI
/// surface one-to-one so the whole set can be attached to the run record.
#[derive(Debug, Clone, Serialize)]
pub struct CleanParams {
    pub input_artifact: String,
    pub output_artifact: String,
    pub output_type: String,
    pub output_description: String,
    pub min_price: f64,
    pub max_price: f64,
}

/// Outcome of a successful cleaning run.
#[derive(Debug, Clone, Serialize)]
pub struct CleanSummary {
    pub stats: CleanStats,
    pub input_ref: String,
    pub output_ref: String,
    pub staged_file: String,
}

/// Orchestrates one cleaning run: fetch the input artifact, apply the
/// transform, stage the result locally, publish it as a new artifact
/// version, and record the run for provenance.
pub struct CleanUseCase {
    store: Box<dyn ArtifactStorePort>,
    run_log: Box<dyn RunLogPort>,
    tracking: TrackingConfig,
    output_dir: PathBuf,
}

impl CleanUseCase {
    pub fn new(
        store: Box<dyn ArtifactStorePort>,
        run_log: Box<dyn RunLogPort>,
        tracking: TrackingConfig,
    ) -> Self {
        Self {
            store,
            run_log,
            tracking,
            output_dir: PathBuf::from("output"),
        }
    }

    pub fn with_output_dir<P: Into<PathBuf>>(mut self, dir: P) -> Self {
        self.output_dir = dir.into();
        self
    }

    pub async fn run(&self, params: CleanParams) -> Result<CleanSummary> {
        let input_ref: ArtifactRef = params.input_artifact.parse()?;
        let meta = ArtifactMeta {
            name: params.output_artifact.clone(),
            artifact_type: params.output_type.clone(),
            description: params.output_description.clone(),
        };
        meta.validate()?;

        let run = RunRecord::start(
            &self.tracking.project,
            &self.tracking.job_type,
            &self.tracking.group,
            serde_json::to_value(&params)?,
        );
        self.run_log.append(&run).await?;
        info!(run_id = %run.run_id, input = %input_ref, "cleaning run started");

        let input_path = self.store.fetch(&input_ref).await?;
        let input_bytes = fs::read(&input_path)?;
        info!(bytes = input_bytes.len(), path = %input_path.display(), "fetched input artifact");

        let cleaned = clean_csv(
            &input_bytes,
            &CleanOptions {
                min_price: params.min_price,
                max_price: params.max_price,
            },
        )?;
        info!(
            rows_in = cleaned.stats.rows_in,
            rows_kept = cleaned.stats.rows_kept,
            dates_missing = cleaned.stats.dates_missing,
            "applied cleaning transform"
        );

        let staged_path = self.stage(&params.output_artifact, &cleaned.bytes)?;
        let stamped = self.store.publish(&meta, &staged_path).await?;
        info!(artifact = %stamped.qualified_ref(), payload = %stamped.payload_ref, "published cleaned artifact");

        let finished = run.finish(
            vec![input_ref.to_string()],
            vec![stamped.qualified_ref()],
        );
        self.run_log.append(&finished).await?;

        Ok(CleanSummary {
            stats: cleaned.stats,
            input_ref: input_ref.to_string(),
            output_ref: stamped.qualified_ref(),
            staged_file: staged_path.to_string_lossy().to_string(),
        })
    }

    /// Writes the cleaned bytes to a timestamp-prefixed file in the output
    /// directory; this local copy is what gets published.
    fn stage(&self, output_name: &str, bytes: &[u8]) -> Result<PathBuf> {
        fs::create_dir_all(&self.output_dir)?;
        let ts = Utc::now().format("%Y%m%d_%H%M%S");
        let file_name = Path::new(output_name)
            .file_name()
            .map(|f| f.to_string_lossy().to_string())
            .unwrap_or_else(|| "clean_sample.csv".to_string());
        let path = self.output_dir.join(format!("{}_{}", ts, file_name));
        fs::write(&path, bytes)?;
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifact::{RunStatus, StampedArtifact};
    use crate::error::CleanError;
    use async_trait::async_trait;
    use std::sync::Arc;

    struct MockStore {
        payload: Vec<u8>,
        published: Arc<tokio::sync::Mutex<Vec<(ArtifactMeta, Vec<u8>)>>>,
        dir: tempfile::TempDir,
    }

    impl MockStore {
        fn new(payload: &str) -> Self {
            Self {
                payload: payload.as_bytes().to_vec(),
                published: Arc::new(tokio::sync::Mutex::new(Vec::new())),
                dir: tempfile::tempdir().unwrap(),
            }
        }
    }

    #[async_trait]
    impl ArtifactStorePort for MockStore {
        async fn fetch(&self, reference: &ArtifactRef) -> Result<PathBuf> {
            if reference.name == "missing.csv" {
                return Err(CleanError::ArtifactNotFound(reference.to_string()));
            }
            let path = self.dir.path().join("input.csv");
            fs::write(&path, &self.payload)?;
            Ok(path)
        }

        async fn publish(&self, meta: &ArtifactMeta, file: &Path) -> Result<StampedArtifact> {
            let bytes = fs::read(file)?;
            self.published.lock().await.push((meta.clone(), bytes.clone()));
            Ok(StampedArtifact {
                name: meta.name.clone(),
                version: format!("v{}", self.published.lock().await.len()),
                artifact_type: meta.artifact_type.clone(),
                description: meta.description.clone(),
                payload_ref: "cas:sha256:test".to_string(),
                size_bytes: bytes.len() as u64,
                created_at: Utc::now(),
            })
        }
    }

    struct MockRunLog {
        records: Arc<tokio::sync::Mutex<Vec<RunRecord>>>,
    }

    #[async_trait]
    impl RunLogPort for MockRunLog {
        async fn append(&self, record: &RunRecord) -> Result<()> {
            self.records.lock().await.push(record.clone());
            Ok(())
        }
    }

    fn params() -> CleanParams {
        CleanParams {
            input_artifact: "sample.csv:latest".to_string(),
            output_artifact: "clean_sample.csv".to_string(),
            output_type: "clean_sample".to_string(),
            output_description: "price-filtered listings".to_string(),
            min_price: 10.0,
            max_price: 500.0,
        }
    }

    fn use_case(store: MockStore, records: Arc<tokio::sync::Mutex<Vec<RunRecord>>>) -> CleanUseCase {
        let staging = tempfile::tempdir().unwrap();
        CleanUseCase::new(
            Box::new(store),
            Box::new(MockRunLog { records }),
            TrackingConfig::default(),
        )
        .with_output_dir(staging.into_path())
    }

    #[tokio::test]
    async fn publishes_filtered_table_and_records_run() {
        let csv = "id,price,last_review\n1,50,2019-01-01\n2,5,not-a-date\n3,1000,2019-06-01\n";
        let store = MockStore::new(csv);
        let published = store.published.clone();
        let records = Arc::new(tokio::sync::Mutex::new(Vec::new()));
        let uc = use_case(store, records.clone());

        let summary = uc.run(params()).await.unwrap();
        assert_eq!(summary.stats.rows_in, 3);
        assert_eq!(summary.stats.rows_kept, 1);
        assert_eq!(summary.output_ref, "clean_sample.csv:v1");

        let published = published.lock().await;
        assert_eq!(published.len(), 1);
        let body = String::from_utf8(published[0].1.clone()).unwrap();
        assert_eq!(body, "id,price,last_review\n1,50,2019-01-01\n");

        let records = records.lock().await;
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].status, RunStatus::Started);
        assert_eq!(records[1].status, RunStatus::Finished);
        assert_eq!(records[0].run_id, records[1].run_id);
        assert_eq!(records[1].input_artifacts, vec!["sample.csv:latest"]);
        assert_eq!(records[1].output_artifacts, vec!["clean_sample.csv:v1"]);
    }

    #[tokio::test]
    async fn fetch_failure_propagates_and_publishes_nothing() {
        let store = MockStore::new("price,last_review\n");
        let published = store.published.clone();
        let records = Arc::new(tokio::sync::Mutex::new(Vec::new()));
        let uc = use_case(store, records.clone());

        let mut p = params();
        p.input_artifact = "missing.csv:latest".to_string();
        let err = uc.run(p).await.unwrap_err();
        assert!(matches!(err, CleanError::ArtifactNotFound(_)));

        assert!(published.lock().await.is_empty());
        // The started line is recorded; no finished line follows a failure.
        let records = records.lock().await;
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].status, RunStatus::Started);
    }

    #[tokio::test]
    async fn blank_metadata_is_rejected_before_any_side_effect() {
        let store = MockStore::new("price,last_review\n");
        let records = Arc::new(tokio::sync::Mutex::new(Vec::new()));
        let uc = use_case(store, records.clone());

        let mut p = params();
        p.output_type = "".to_string();
        assert!(uc.run(p).await.is_err());
        assert!(records.lock().await.is_empty());
    }
}
