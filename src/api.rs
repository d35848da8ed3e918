use crate::{
    albums::AlbumError, ingest::IngestError, session::SessionError, storage::StorageError,
};
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

/// Error returned by the JSON endpoints. The `Display` text is the `error`
/// field of the response body, the payload is its `details`.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),

    #[error("Album not found")]
    AlbumNotFound(String),

    #[error("Photo not found")]
    PhotoNotFound(String),

    #[error("File too large")]
    PayloadTooLarge(String),

    #[error("Malformed upload")]
    MalformedUpload(String),

    #[error("Owner session required")]
    Unauthorized,

    #[error("Not the album owner")]
    Forbidden(String),

    #[error("Storage error")]
    Storage(String),

    #[error("Failed to update thumbnail")]
    UpdateFailed(String),

    #[error("Face server failed")]
    RemoteService(String),
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) | ApiError::MalformedUpload(_) => StatusCode::BAD_REQUEST,
            ApiError::AlbumNotFound(_) | ApiError::PhotoNotFound(_) => StatusCode::NOT_FOUND,
            ApiError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::Storage(_) | ApiError::UpdateFailed(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::RemoteService(_) => StatusCode::BAD_GATEWAY,
        }
    }

    pub fn details(&self) -> Option<&str> {
        match self {
            ApiError::Validation(_) | ApiError::Unauthorized => None,
            ApiError::AlbumNotFound(d)
            | ApiError::PhotoNotFound(d)
            | ApiError::PayloadTooLarge(d)
            | ApiError::MalformedUpload(d)
            | ApiError::Forbidden(d)
            | ApiError::Storage(d)
            | ApiError::UpdateFailed(d)
            | ApiError::RemoteService(d) => Some(d),
        }
    }

    pub fn body(&self) -> ErrorBody {
        ErrorBody {
            error: self.to_string(),
            details: self.details().map(str::to_string),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(status = %status, details = ?self.details(), "{}", self);
        } else {
            tracing::warn!(status = %status, details = ?self.details(), "{}", self);
        }

        (status, Json(self.body())).into_response()
    }
}

impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::InvalidAlbumId(_) => ApiError::Validation("Invalid album ID".to_string()),
            StorageError::InvalidFilename(_) => ApiError::Validation("Invalid filename".to_string()),
            StorageError::NotFound(photo) => ApiError::PhotoNotFound(photo),
            other @ (StorageError::IoError(_) | StorageError::StorageCollision(_)) => {
                ApiError::Storage(other.to_string())
            }
        }
    }
}

impl From<AlbumError> for ApiError {
    fn from(err: AlbumError) -> Self {
        match err {
            AlbumError::AlbumNotFound(reference) => ApiError::AlbumNotFound(reference),
            AlbumError::UpdateFailed(reason) => ApiError::UpdateFailed(reason),
            AlbumError::SlugTaken(slug) => {
                ApiError::Validation(format!("Album slug already exists: {}", slug))
            }
            other @ (AlbumError::DatabaseError(_) | AlbumError::IoError(_)) => {
                ApiError::Storage(other.to_string())
            }
        }
    }
}

impl From<SessionError> for ApiError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::MissingSession => ApiError::Unauthorized,
            SessionError::NotOwner(album_id) => ApiError::Forbidden(album_id),
        }
    }
}

impl From<IngestError> for ApiError {
    fn from(err: IngestError) -> Self {
        match err {
            IngestError::PayloadTooLarge { .. } | IngestError::RequestTooLarge(_) => {
                ApiError::PayloadTooLarge(err.to_string())
            }
            IngestError::MalformedUpload(reason) => ApiError::MalformedUpload(reason),
            IngestError::Storage(e) => e.into(),
            IngestError::Indexer(e) => ApiError::RemoteService(e.detail()),
        }
    }
}

/// Trims a request parameter, treating blank as absent.
pub(crate) fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[derive(Serialize)]
pub struct HealthResponse {
    status: String,
}

pub async fn health_handler(
    axum::extract::State(app_state): axum::extract::State<crate::AppState>,
) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: format!(
            "{} running (indexer: {})",
            app_state.config.app.name,
            app_state.indexer.name()
        ),
    })
}
