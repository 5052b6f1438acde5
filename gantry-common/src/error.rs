use std::sync::Arc;

use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum GantryError {
    #[error("I/O Error: {0}")]
    Io(#[from] Arc<std::io::Error>),

    #[error("HTTP Request Error: {0}")]
    Http(#[from] Arc<reqwest::Error>),

    #[error("JSON Parsing Error: {0}")]
    Json(#[from] Arc<serde_json::Error>),

    #[error("Configuration Error: {0}")]
    Config(String),

    #[error("Parsing Error in {0}: {1}")]
    ParseError(&'static str, String),

    #[error("Resource Not Found: {0}")]
    NotFound(String),

    #[error("DownloadError: Failed to download '{0}' from '{1}': {2}")]
    DownloadError(String, String, String),

    #[error("Checksum Mismatch: {0}")]
    ChecksumMismatch(String),

    #[error("Validation Error: {0}")]
    ValidationError(String),

    #[error("Dependency cycle detected: {0}")]
    Cycle(String),

    #[error("Unresolvable version conflict for {identity}:\n{details}")]
    Unresolvable { identity: String, details: String },

    #[error("Timed out: {0}")]
    Timeout(String),

    #[error("Dependency Error: {0}")]
    DependencyError(String),

    #[error("Realm Error: {0}")]
    Realm(String),
}

impl From<std::io::Error> for GantryError {
    fn from(err: std::io::Error) -> Self {
        GantryError::Io(Arc::new(err))
    }
}

impl From<reqwest::Error> for GantryError {
    fn from(err: reqwest::Error) -> Self {
        GantryError::Http(Arc::new(err))
    }
}

impl From<serde_json::Error> for GantryError {
    fn from(err: serde_json::Error) -> Self {
        GantryError::Json(Arc::new(err))
    }
}

pub type Result<T> = std::result::Result<T, GantryError>;
