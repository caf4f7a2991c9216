use thiserror::Error;

#[derive(Error, Debug)]
pub enum CleanError {
    #[error("artifact not found: {0}")]
    ArtifactNotFound(String),

    #[error("artifact fetch failed: {0}")]
    Fetch(String),

    #[error("missing required column: {0}")]
    MissingColumn(String),

    #[error("CSV processing failed: {0}")]
    Csv(#[from] csv::Error),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON deserialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML deserialization failed: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("artifact store error: {0}")]
    Store(String),
}

pub type Result<T> = std::result::Result<T, CleanError>;
