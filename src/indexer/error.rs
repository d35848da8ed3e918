use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum IndexerError {
    #[error("Indexer configuration error: {0}")]
    ConfigError(String),

    #[error("Face service request failed: {0}")]
    RequestError(String),

    #[error("Face service timed out after {0:?}")]
    Timeout(Duration),

    #[error("Face service returned {status}: {detail}")]
    ServiceError { status: u16, detail: String },

    #[error("Invalid face service response: {0}")]
    InvalidResponse(String),
}

impl IndexerError {
    /// The message to surface to callers; the remote's own text when it sent one.
    pub fn detail(&self) -> String {
        match self {
            IndexerError::ServiceError { detail, .. } => detail.clone(),
            other => other.to_string(),
        }
    }

    /// True when the face service rejected the image itself (a 4xx answer).
    pub fn is_rejection(&self) -> bool {
        matches!(self, IndexerError::ServiceError { status, .. } if (400..500).contains(status))
    }
}
