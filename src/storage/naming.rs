//! Storage names for uploaded photos.
//!
//! A generated name is `<unix millis>_<64 random bits as hex>.<ext>`. The
//! timestamp keeps directory listings in upload order and the random suffix
//! separates uploads that land in the same millisecond. Only the extension of
//! the caller's filename survives, lower-cased and restricted to ASCII
//! alphanumerics.

use chrono::Utc;
use rand::Rng;

pub const DEFAULT_EXTENSION: &str = "jpg";

const MAX_EXTENSION_LEN: usize = 8;
const MAX_FILENAME_LEN: usize = 255;
const MAX_ALBUM_ID_LEN: usize = 128;

pub fn generate_filename(original_name: Option<&str>) -> String {
    let extension = original_name
        .and_then(extension_of)
        .unwrap_or_else(|| DEFAULT_EXTENSION.to_string());
    let suffix: u64 = rand::rng().random();

    format!(
        "{}_{:016x}.{}",
        Utc::now().timestamp_millis(),
        suffix,
        extension
    )
}

fn extension_of(original_name: &str) -> Option<String> {
    let base_name = original_name.rsplit(['/', '\\']).next()?;
    let (stem, extension) = base_name.rsplit_once('.')?;

    if stem.is_empty()
        || extension.is_empty()
        || extension.len() > MAX_EXTENSION_LEN
        || !extension.chars().all(|c| c.is_ascii_alphanumeric())
    {
        return None;
    }

    Some(extension.to_ascii_lowercase())
}

/// True for a single path component made of `[A-Za-z0-9._-]` that is not hidden.
pub fn is_safe_filename(name: &str) -> bool {
    !name.is_empty()
        && name.len() <= MAX_FILENAME_LEN
        && !name.starts_with('.')
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
}

pub fn is_valid_album_id(album_id: &str) -> bool {
    !album_id.is_empty()
        && album_id.len() <= MAX_ALBUM_ID_LEN
        && album_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-'))
}
