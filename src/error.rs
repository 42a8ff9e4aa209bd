use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EtlError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to read CSV '{}': {source}", .path.display())]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("CSV '{}' has no header row", .path.display())]
    MissingHeader { path: PathBuf },

    #[error("Missing required column '{column}' in {dataset}")]
    MissingColumn { dataset: String, column: String },

    #[error("Schema error: {0}")]
    Schema(String),

    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("Store error: {0}")]
    Store(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("TOML deserialization failed: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("JSON serialization failed: {0}")]
    Json(#[from] serde_json::Error),
}

/// Coarse failure classes surfaced to the caller. Every class is fatal to a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Io,
    Schema,
    Storage,
    Config,
}

impl EtlError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            EtlError::Io(_)
            | EtlError::Csv { .. }
            | EtlError::MissingHeader { .. }
            | EtlError::Json(_) => ErrorKind::Io,
            EtlError::MissingColumn { .. } | EtlError::Schema(_) => ErrorKind::Schema,
            EtlError::Storage(_) | EtlError::Store(_) => ErrorKind::Storage,
            EtlError::Config(_) | EtlError::Toml(_) => ErrorKind::Config,
        }
    }
}

pub type Result<T> = std::result::Result<T, EtlError>;
