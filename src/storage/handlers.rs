use super::PhotoListing;
use crate::{AppState, api::ApiError};
use axum::{
    Json,
    body::Body,
    extract::{Path, State},
    http::{StatusCode, header},
    response::Response,
};
use std::time::UNIX_EPOCH;
use tokio_util::io::ReaderStream;
use tracing::debug;

pub async fn list_photos_handler(
    State(app_state): State<AppState>,
    Path(album_id): Path<String>,
) -> Result<Json<PhotoListing>, ApiError> {
    app_state.albums.resolve_id(&album_id).await?;
    let listing = app_state.photos.list(&album_id).await?;
    debug!(
        album_id = %album_id,
        photos = listing.photos.len(),
        unindexed = listing.unindexed.len(),
        "Listed album photos"
    );
    Ok(Json(listing))
}

pub async fn photo_handler(
    State(app_state): State<AppState>,
    Path((album_id, filename)): Path<(String, String)>,
) -> Result<Response, ApiError> {
    serve_photo(&app_state, &album_id, &filename, false).await
}

pub async fn download_handler(
    State(app_state): State<AppState>,
    Path((album_id, filename)): Path<(String, String)>,
) -> Result<Response, ApiError> {
    serve_photo(&app_state, &album_id, &filename, true).await
}

async fn serve_photo(
    app_state: &AppState,
    album_id: &str,
    filename: &str,
    as_attachment: bool,
) -> Result<Response, ApiError> {
    let (file, metadata) = app_state.photos.open(album_id, filename).await?;

    let content_type = if as_attachment {
        "application/octet-stream".to_string()
    } else {
        mime_guess::from_path(filename)
            .first_or_octet_stream()
            .to_string()
    };

    let mut response = Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, content_type)
        .header(header::CONTENT_LENGTH, metadata.len())
        .header(header::CACHE_CONTROL, "public, max-age=31536000, immutable");

    if as_attachment {
        response = response.header(
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", filename),
        );
    }

    if let Ok(modified) = metadata.modified()
        && let Ok(duration) = modified.duration_since(UNIX_EPOCH)
    {
        response = response.header(header::LAST_MODIFIED, httpdate::fmt_http_date(modified));
        let etag = format!("\"{}-{}\"", duration.as_secs(), metadata.len());
        response = response.header(header::ETAG, etag);
    }

    response
        .body(Body::from_stream(ReaderStream::new(file)))
        .map_err(|e| ApiError::Storage(e.to_string()))
}
