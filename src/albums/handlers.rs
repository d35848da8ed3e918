use super::Thumbnail;
use crate::{
    AppState,
    api::{ApiError, non_empty},
};
use axum::{
    Json,
    extract::{Query, State, rejection::JsonRejection},
    http::HeaderMap,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct GetAlbumQuery {
    id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct AlbumResponse {
    pub title: String,
    pub thumbnail: Option<Thumbnail>,
    pub id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetThumbnailRequest {
    album_slug: Option<String>,
    filename: Option<String>,
    path: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

pub async fn get_album_handler(
    State(app_state): State<AppState>,
    Query(query): Query<GetAlbumQuery>,
) -> Result<Json<AlbumResponse>, ApiError> {
    let slug = non_empty(query.id)
        .ok_or_else(|| ApiError::Validation("Missing or invalid album slug".to_string()))?;

    let album = app_state.albums.resolve(&slug).await?;

    Ok(Json(AlbumResponse {
        title: album.title,
        thumbnail: album.thumbnail,
        id: album.album_id,
    }))
}

pub async fn set_thumbnail_handler(
    State(app_state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<SetThumbnailRequest>, JsonRejection>,
) -> Result<Json<MessageResponse>, ApiError> {
    let missing = || ApiError::Validation("Missing parameters".to_string());
    let Json(request) = payload.map_err(|_| missing())?;

    let slug = non_empty(request.album_slug).ok_or_else(missing)?;
    let filename = non_empty(request.filename).ok_or_else(missing)?;
    let path = non_empty(request.path).ok_or_else(missing)?;

    let album = app_state.albums.resolve_slug(&slug).await?;
    app_state.sessions.authorize(&headers, &album)?;

    app_state
        .albums
        .set_thumbnail(&slug, &filename, &path)
        .await?;

    Ok(Json(MessageResponse {
        message: "Thumbnail updated successfully".to_string(),
    }))
}
