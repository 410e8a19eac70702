//! Error handling for the pipeline.

use std::{fmt, io};

use parquet::errors::ParquetError;

/// Specialized error type for pipeline operations
#[derive(Debug)]
pub enum IntegraError {
    /// Error reading or writing local files
    IoError(io::Error),
    /// Error talking to a remote government API
    HttpError(reqwest::Error),
    /// Error from the local SQLite store
    DatabaseError(sqlx::Error),
    /// Error reading or writing a parquet snapshot
    ParquetError(ParquetError),
    /// Error converting rows to or from Arrow batches
    ArrowError(arrow::error::ArrowError),
    /// Error decoding a JSON payload
    JsonError(serde_json::Error),
    /// A required source returned data the pipeline cannot use
    SourceError(String),
    /// Error with contextual information from a lower layer
    Other(anyhow::Error),
}

impl From<io::Error> for IntegraError {
    fn from(error: io::Error) -> Self {
        Self::IoError(error)
    }
}

impl From<reqwest::Error> for IntegraError {
    fn from(error: reqwest::Error) -> Self {
        Self::HttpError(error)
    }
}

impl From<sqlx::Error> for IntegraError {
    fn from(error: sqlx::Error) -> Self {
        Self::DatabaseError(error)
    }
}

impl From<ParquetError> for IntegraError {
    fn from(error: ParquetError) -> Self {
        Self::ParquetError(error)
    }
}

impl From<arrow::error::ArrowError> for IntegraError {
    fn from(error: arrow::error::ArrowError) -> Self {
        Self::ArrowError(error)
    }
}

impl From<serde_json::Error> for IntegraError {
    fn from(error: serde_json::Error) -> Self {
        Self::JsonError(error)
    }
}

impl From<serde_arrow::Error> for IntegraError {
    fn from(error: serde_arrow::Error) -> Self {
        Self::Other(anyhow::Error::new(error))
    }
}

impl From<anyhow::Error> for IntegraError {
    fn from(error: anyhow::Error) -> Self {
        Self::Other(error)
    }
}

impl fmt::Display for IntegraError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::IoError(e) => write!(f, "IO error: {e}"),
            Self::HttpError(e) => write!(f, "HTTP error: {e}"),
            Self::DatabaseError(e) => write!(f, "Database error: {e}"),
            Self::ParquetError(e) => write!(f, "Parquet error: {e}"),
            Self::ArrowError(e) => write!(f, "Arrow error: {e}"),
            Self::JsonError(e) => write!(f, "JSON error: {e}"),
            Self::SourceError(msg) => write!(f, "Source error: {msg}"),
            Self::Other(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for IntegraError {}

/// Result type for pipeline operations
pub type Result<T> = std::result::Result<T, IntegraError>;
