use thiserror::Error;

#[derive(Debug, Error)]
pub enum AlbumError {
    #[error("Album not found: {0}")]
    AlbumNotFound(String),

    #[error("Album slug already exists: {0}")]
    SlugTaken(String),

    #[error("Failed to update album: {0}")]
    UpdateFailed(String),

    #[error("Album database error: {0}")]
    DatabaseError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}
