use super::IngestError;
use axum::extract::multipart::Field;

pub(crate) enum FieldBody {
    Complete(Vec<u8>),
    TooLarge(usize),
}

/// Reads a multipart field, keeping at most `limit` bytes. An oversized field
/// is still drained so the following fields remain readable.
pub(crate) async fn read_limited(
    field: &mut Field<'_>,
    limit: usize,
) -> Result<FieldBody, IngestError> {
    let mut bytes = Vec::new();
    let mut size = 0usize;

    while let Some(chunk) = field.chunk().await? {
        size += chunk.len();
        if size <= limit {
            bytes.extend_from_slice(&chunk);
        } else if !bytes.is_empty() {
            bytes = Vec::new();
        }
    }

    if size > limit {
        Ok(FieldBody::TooLarge(size))
    } else {
        Ok(FieldBody::Complete(bytes))
    }
}
