use super::{
    IncomingFile, IngestError, IngestOutcome, ReindexReport, UploadItem,
    form::{FieldBody, read_limited},
};
use crate::{
    AppState,
    api::{ApiError, non_empty},
};
use axum::{
    Json,
    extract::{Multipart, Path, State, multipart::MultipartRejection},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use serde::Serialize;
use tracing::{debug, info};

#[derive(Serialize)]
pub struct UploadResponse {
    pub uploads: Vec<IngestOutcome>,
}

struct UploadForm {
    album_id: Option<String>,
    files: Vec<UploadItem>,
}

async fn read_upload_form(
    multipart: &mut Multipart,
    max_file_bytes: usize,
) -> Result<UploadForm, IngestError> {
    let mut form = UploadForm {
        album_id: None,
        files: Vec::new(),
    };

    while let Some(mut field) = multipart.next_field().await? {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("album_id") => form.album_id = Some(field.text().await?),
            Some("file") => {
                let original_name = field.file_name().map(str::to_string);
                let item = match read_limited(&mut field, max_file_bytes).await? {
                    FieldBody::Complete(bytes) => {
                        UploadItem::Received(IncomingFile::new(original_name, bytes))
                    }
                    FieldBody::TooLarge(size) => UploadItem::Rejected {
                        original_name,
                        error: IngestError::PayloadTooLarge {
                            size,
                            limit: max_file_bytes,
                        },
                    },
                };
                form.files.push(item);
            }
            other => debug!("Ignoring multipart field {:?}", other),
        }
    }

    Ok(form)
}

pub async fn upload_handler(
    State(app_state): State<AppState>,
    headers: HeaderMap,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Response, ApiError> {
    let mut multipart =
        multipart.map_err(|rejection| ApiError::MalformedUpload(rejection.body_text()))?;
    let form = read_upload_form(&mut multipart, app_state.ingest.max_file_bytes()).await?;

    let album_id = match non_empty(form.album_id) {
        Some(album_id) if !form.files.is_empty() => album_id,
        _ => return Err(ApiError::Validation("Missing file or album ID".to_string())),
    };

    let album = app_state.albums.resolve_id(&album_id).await?;
    app_state.sessions.authorize(&headers, &album)?;

    let uploads = app_state.ingest.ingest_batch(&album.id, form.files).await;

    let stored = uploads.iter().filter(|outcome| outcome.is_stored()).count();
    let status = if stored > 0 {
        StatusCode::OK
    } else {
        uploads
            .first()
            .map(IngestOutcome::status)
            .unwrap_or(StatusCode::BAD_REQUEST)
    };
    info!(
        album_id = %album.id,
        stored,
        failed = uploads.len() - stored,
        "Upload batch processed"
    );

    Ok((status, Json(UploadResponse { uploads })).into_response())
}

pub async fn reindex_handler(
    State(app_state): State<AppState>,
    headers: HeaderMap,
    Path(album_id): Path<String>,
) -> Result<Json<ReindexReport>, ApiError> {
    let album = app_state.albums.resolve_id(&album_id).await?;
    app_state.sessions.authorize(&headers, &album)?;

    let report = app_state.ingest.reindex(&album.id).await?;
    Ok(Json(report))
}
