use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Stored file already exists: {0}")]
    StorageCollision(String),

    #[error("Invalid album identifier: {0}")]
    InvalidAlbumId(String),

    #[error("Invalid filename: {0}")]
    InvalidFilename(String),

    #[error("Photo not found: {0}")]
    NotFound(String),
}
