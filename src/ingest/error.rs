use crate::{indexer::IndexerError, storage::StorageError};
use axum::extract::multipart::MultipartError;
use axum::http::StatusCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("File of {size} bytes exceeds the {limit} byte limit")]
    PayloadTooLarge { size: usize, limit: usize },

    #[error("Request body too large: {0}")]
    RequestTooLarge(String),

    #[error("Malformed upload: {0}")]
    MalformedUpload(String),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Face indexing failed: {0}")]
    Indexer(#[from] IndexerError),
}

impl From<MultipartError> for IngestError {
    fn from(err: MultipartError) -> Self {
        if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
            IngestError::RequestTooLarge(err.body_text())
        } else {
            IngestError::MalformedUpload(err.body_text())
        }
    }
}
