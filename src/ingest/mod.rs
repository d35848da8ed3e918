// Photo ingestion - multipart uploads to storage and the face indexer
mod error;
pub(crate) mod form;
mod handlers;
mod pipeline;
mod types;

pub use error::IngestError;
pub use handlers::{reindex_handler, upload_handler};
pub use pipeline::IngestPipeline;
pub use types::{IncomingFile, IngestOutcome, IngestedPhoto, ReindexReport, UploadItem};
