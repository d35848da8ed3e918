use crate::{api::ErrorBody, ingest::IngestError, storage::StoredPhoto};
use axum::http::StatusCode;
use serde::{Deserialize, Serialize};

/// One file taken off the wire, not yet stored.
#[derive(Debug, Clone)]
pub struct IncomingFile {
    pub original_name: Option<String>,
    pub bytes: Vec<u8>,
}

impl IncomingFile {
    pub fn new(original_name: Option<String>, bytes: Vec<u8>) -> Self {
        Self {
            original_name,
            bytes,
        }
    }
}

/// A batch entry. Files refused while reading the request still take their
/// place in the batch so the response lines up with what was sent.
#[derive(Debug)]
pub enum UploadItem {
    Received(IncomingFile),
    Rejected {
        original_name: Option<String>,
        error: IngestError,
    },
}

impl UploadItem {
    pub fn original_name(&self) -> Option<&str> {
        match self {
            UploadItem::Received(file) => file.original_name.as_deref(),
            UploadItem::Rejected { original_name, .. } => original_name.as_deref(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct IngestedPhoto {
    pub photo: StoredPhoto,
    pub indexed: bool,
    pub index_error: Option<String>,
}

#[derive(Serialize)]
#[serde(untagged)]
pub enum IngestOutcome {
    Stored {
        file: Option<String>,
        url: String,
        filename: String,
        indexed: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        index_error: Option<String>,
    },
    Failed {
        file: Option<String>,
        #[serde(flatten)]
        error: ErrorBody,
        #[serde(skip)]
        status: StatusCode,
    },
}

impl IngestOutcome {
    pub fn is_stored(&self) -> bool {
        matches!(self, IngestOutcome::Stored { .. })
    }

    pub fn status(&self) -> StatusCode {
        match self {
            IngestOutcome::Stored { .. } => StatusCode::OK,
            IngestOutcome::Failed { status, .. } => *status,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReindexReport {
    pub reindexed: usize,
    pub failed: usize,
}
