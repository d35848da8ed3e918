use crate::{albums::AlbumError, indexer::IndexerError, ingest::IngestError, storage::StorageError};
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;

/// Failure of a match query. Responses carry a single `detail` field so a
/// client can tell a failed query apart from an empty result.
#[derive(Debug, Error)]
pub enum MatchError {
    #[error("{0}")]
    InvalidRequest(String),

    #[error("Album not found")]
    AlbumNotFound(String),

    #[error("{0}")]
    ProbeTooLarge(String),

    #[error("{0}")]
    Rejected(String),

    #[error("Face service timed out after {0:?}")]
    Timeout(Duration),

    #[error("{0}")]
    ServiceError(String),

    #[error("Storage error: {0}")]
    Storage(String),
}

#[derive(Serialize)]
struct DetailBody {
    detail: String,
}

impl MatchError {
    pub fn status(&self) -> StatusCode {
        match self {
            MatchError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            MatchError::AlbumNotFound(_) => StatusCode::NOT_FOUND,
            MatchError::ProbeTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            MatchError::Rejected(_) => StatusCode::UNPROCESSABLE_ENTITY,
            MatchError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            MatchError::ServiceError(_) => StatusCode::BAD_GATEWAY,
            MatchError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<IndexerError> for MatchError {
    fn from(err: IndexerError) -> Self {
        match err {
            IndexerError::Timeout(after) => MatchError::Timeout(after),
            ref e if e.is_rejection() => MatchError::Rejected(e.detail()),
            other => MatchError::ServiceError(other.detail()),
        }
    }
}

impl From<StorageError> for MatchError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::InvalidAlbumId(_) => {
                MatchError::InvalidRequest("Invalid album ID".to_string())
            }
            other => MatchError::Storage(other.to_string()),
        }
    }
}

impl From<AlbumError> for MatchError {
    fn from(err: AlbumError) -> Self {
        match err {
            AlbumError::AlbumNotFound(reference) => MatchError::AlbumNotFound(reference),
            other => MatchError::Storage(other.to_string()),
        }
    }
}

impl From<IngestError> for MatchError {
    fn from(err: IngestError) -> Self {
        match err {
            IngestError::PayloadTooLarge { .. } | IngestError::RequestTooLarge(_) => {
                MatchError::ProbeTooLarge(err.to_string())
            }
            IngestError::MalformedUpload(reason) => MatchError::InvalidRequest(reason),
            IngestError::Storage(e) => e.into(),
            IngestError::Indexer(e) => e.into(),
        }
    }
}

impl IntoResponse for MatchError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(status = %status, "Match query failed: {}", self);
        } else {
            tracing::warn!(status = %status, "Match query refused: {}", self);
        }

        (
            status,
            Json(DetailBody {
                detail: self.to_string(),
            }),
        )
            .into_response()
    }
}
