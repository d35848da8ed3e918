// Photo storage - per-album namespaces on the local filesystem
mod error;
mod handlers;
mod naming;
mod store;

pub use error::StorageError;
pub use handlers::{download_handler, list_photos_handler, photo_handler};
pub use naming::{DEFAULT_EXTENSION, generate_filename, is_safe_filename, is_valid_album_id};
pub use store::{PhotoListing, PhotoStore, StoredPhoto};
