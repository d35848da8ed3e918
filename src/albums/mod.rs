mod error;
mod gate;
mod handlers;
mod store;
mod types;

pub use error::AlbumError;
pub use gate::{AlbumGate, AlbumRef};
pub use handlers::{get_album_handler, set_thumbnail_handler};
pub use store::{AlbumDatabase, AlbumStore, DynAlbumStore, TomlAlbumStore};
pub use types::{Album, Thumbnail, slugify};
