//! Error types for metadata loading.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum GgufArchError {
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid metadata: {0}")]
    InvalidMetadata(String),

    #[error("Unknown GGML type: {0}")]
    UnknownGgmlType(String),
}

pub type Result<T> = std::result::Result<T, GgufArchError>;
