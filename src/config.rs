use crate::error::{CleanError, Result};
use serde::Deserialize;
use std::fs;
use std::path::Path;

const CONFIG_PATH: &str = "dataprep.toml";

/// Experiment-tracking metadata attached to every run.
#[derive(Debug, Clone, Deserialize)]
pub struct TrackingConfig {
    #[serde(default = "default_project")]
    pub project: String,
    #[serde(default = "default_job_type")]
    pub job_type: String,
    #[serde(default = "default_group")]
    pub group: String,
}

/// Where artifacts live: a local data root, and optionally a remote
/// artifact-store base URL that takes precedence when set.
#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_data_root")]
    pub data_root: String,
    #[serde(default)]
    pub remote_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default = "TrackingConfig::default")]
    pub tracking: TrackingConfig,
    #[serde(default = "StoreConfig::default")]
    pub store: StoreConfig,
}

fn default_project() -> String {
    "nyc_airbnb".to_string()
}
fn default_job_type() -> String {
    "basic_cleaning".to_string()
}
fn default_group() -> String {
    "cleaning".to_string()
}
fn default_data_root() -> String {
    "data".to_string()
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            project: default_project(),
            job_type: default_job_type(),
            group: default_group(),
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            data_root: default_data_root(),
            remote_url: None,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            tracking: TrackingConfig::default(),
            store: StoreConfig::default(),
        }
    }
}

impl Config {
    /// Loads `dataprep.toml` if present, falls back to defaults otherwise,
    /// then applies environment overrides (`DATAPREP_DATA_ROOT`,
    /// `DATAPREP_REMOTE_URL`).
    pub fn load() -> Result<Self> {
        let mut config = if Path::new(CONFIG_PATH).exists() {
            let raw = fs::read_to_string(CONFIG_PATH).map_err(|e| {
                CleanError::Config(format!("failed to read '{}': {}", CONFIG_PATH, e))
            })?;
            toml::from_str(&raw)?
        } else {
            Config::default()
        };

        if let Ok(root) = std::env::var("DATAPREP_DATA_ROOT") {
            if !root.is_empty() {
                config.store.data_root = root;
            }
        }
        if let Ok(url) = std::env::var("DATAPREP_REMOTE_URL") {
            if !url.is_empty() {
                config.store.remote_url = Some(url);
            }
        }

        Ok(config)
    }
}
