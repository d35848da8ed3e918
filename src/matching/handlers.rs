use super::MatchError;
use crate::{
    AppState,
    api::non_empty,
    ingest::{
        IngestError,
        form::{FieldBody, read_limited},
    },
};
use axum::{
    Json,
    extract::{Multipart, Query, State, multipart::MultipartRejection},
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct CompareQuery {
    album_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MatchResponse {
    pub matches: Vec<String>,
}

pub async fn compare_handler(
    State(app_state): State<AppState>,
    Query(query): Query<CompareQuery>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<MatchResponse>, MatchError> {
    let mut multipart =
        multipart.map_err(|rejection| MatchError::InvalidRequest(rejection.body_text()))?;
    let limit = app_state.ingest.max_file_bytes();

    let mut album_id = non_empty(query.album_id);
    let mut probe = None;

    while let Some(mut field) = multipart.next_field().await.map_err(IngestError::from)? {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("album_id") if album_id.is_none() => {
                album_id = non_empty(Some(field.text().await.map_err(IngestError::from)?));
            }
            Some("file") if probe.is_none() => match read_limited(&mut field, limit).await? {
                FieldBody::Complete(bytes) => probe = Some(bytes),
                FieldBody::TooLarge(size) => {
                    return Err(IngestError::PayloadTooLarge { size, limit }.into());
                }
            },
            _ => {}
        }
    }

    let (Some(album_id), Some(probe)) = (album_id, probe) else {
        return Err(MatchError::InvalidRequest(
            "Missing file or album ID".to_string(),
        ));
    };

    let album = app_state.albums.resolve_id(&album_id).await?;
    let matches = app_state.matcher.run(&album.id, probe).await?;

    Ok(Json(MatchResponse { matches }))
}
