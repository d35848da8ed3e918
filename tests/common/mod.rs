#![allow(dead_code)]

use axum::{
    Json, Router,
    extract::{Multipart, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
};
use axum_test::TestServer;
use flashback::{
    AppState, Config,
    albums::{Album, AlbumStore, TomlAlbumStore},
    indexer::{HttpIndexerConfig, IndexerProviderConfig, create_indexer},
    router,
};
use serde::Deserialize;
use serde_json::json;
use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
    time::Duration,
};
use tempfile::TempDir;

pub const ALBUM_SLUG: &str = "wedding";
pub const ALBUM_ID: &str = "wedding-1";
pub const OWNER_ID: &str = "owner-1";
pub const MAX_FILE_BYTES: usize = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaceMode {
    Healthy,
    NoFace,
    Broken,
    Slow,
    /// Answers 200 with a body that is not a match result.
    Garbled,
}

#[derive(Default)]
struct FakeState {
    mode: Option<FaceMode>,
    albums: HashMap<String, Vec<(String, Vec<u8>)>>,
}

/// Stand-in for the face match service. Matches a probe against registered
/// images with identical bytes.
#[derive(Clone, Default)]
pub struct FakeFaceService {
    state: Arc<Mutex<FakeState>>,
}

#[derive(Deserialize)]
struct AlbumQuery {
    album_id: String,
}

impl FakeFaceService {
    pub fn set_mode(&self, mode: FaceMode) {
        self.state.lock().unwrap().mode = Some(mode);
    }

    fn mode(&self) -> FaceMode {
        self.state.lock().unwrap().mode.unwrap_or(FaceMode::Healthy)
    }

    pub fn registered(&self, album_id: &str) -> Vec<String> {
        self.state
            .lock()
            .unwrap()
            .albums
            .get(album_id)
            .map(|entries| entries.iter().map(|(name, _)| name.clone()).collect())
            .unwrap_or_default()
    }

    /// Serves the fake on an ephemeral local port and returns its base URL.
    pub async fn spawn(&self) -> String {
        let app = Router::new()
            .route("/add_to_db/", post(register))
            .route("/compare/", post(compare))
            .with_state(self.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }
}

async fn read_file(multipart: &mut Multipart) -> (String, Vec<u8>) {
    while let Some(field) = multipart.next_field().await.unwrap() {
        if field.name() == Some("file") {
            let name = field.file_name().unwrap_or("upload.jpg").to_string();
            return (name, field.bytes().await.unwrap().to_vec());
        }
    }
    panic!("no file part");
}

async fn failure(mode: FaceMode, no_face_detail: &str) -> Option<Response> {
    match mode {
        FaceMode::Healthy => None,
        FaceMode::NoFace => Some(
            (
                StatusCode::BAD_REQUEST,
                Json(json!({ "detail": no_face_detail })),
            )
                .into_response(),
        ),
        FaceMode::Broken => {
            Some((StatusCode::INTERNAL_SERVER_ERROR, "model crashed").into_response())
        }
        FaceMode::Slow => {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Some(StatusCode::OK.into_response())
        }
        FaceMode::Garbled => Some(Json(json!({ "message": "queued" })).into_response()),
    }
}

async fn register(
    State(service): State<FakeFaceService>,
    Query(query): Query<AlbumQuery>,
    mut multipart: Multipart,
) -> Response {
    let (name, bytes) = read_file(&mut multipart).await;
    if let Some(response) = failure(service.mode(), "No face found in image.").await {
        return response;
    }

    service
        .state
        .lock()
        .unwrap()
        .albums
        .entry(query.album_id)
        .or_default()
        .push((name.clone(), bytes));
    Json(json!({ "message": "Image added to album database.", "filename": name })).into_response()
}

async fn compare(
    State(service): State<FakeFaceService>,
    Query(query): Query<AlbumQuery>,
    mut multipart: Multipart,
) -> Response {
    let (_, probe) = read_file(&mut multipart).await;
    if let Some(response) = failure(service.mode(), "No face detected in selfie.").await {
        return response;
    }

    let matches: Vec<String> = service
        .state
        .lock()
        .unwrap()
        .albums
        .get(&query.album_id)
        .map(|entries| {
            entries
                .iter()
                .filter(|(_, bytes)| *bytes == probe)
                .map(|(name, _)| format!("{}/{}", query.album_id, name))
                .collect()
        })
        .unwrap_or_default();
    Json(json!({ "matches": matches })).into_response()
}

pub struct TestApp {
    pub temp_dir: TempDir,
    pub server: TestServer,
    pub state: AppState,
    pub faces: FakeFaceService,
}

pub struct TestOptions {
    pub session_secret: Option<String>,
    pub indexer_timeout_ms: u64,
}

impl Default for TestOptions {
    fn default() -> Self {
        Self {
            session_secret: None,
            indexer_timeout_ms: 2_000,
        }
    }
}

pub async fn setup() -> TestApp {
    setup_with(TestOptions::default()).await
}

/// Builds the app against a fake face service with one album
/// (`wedding` / `wedding-1`, owned by `owner-1`).
pub async fn setup_with(options: TestOptions) -> TestApp {
    let temp_dir = TempDir::new().unwrap();
    let faces = FakeFaceService::default();
    let base_url = faces.spawn().await;

    let db_dir = temp_dir.path().join("db");
    std::fs::create_dir_all(&db_dir).unwrap();

    let mut config = Config::default();
    config.app.session_secret = options.session_secret;
    config.storage.root = temp_dir.path().join("uploads");
    config.storage.max_file_bytes = MAX_FILE_BYTES;
    config.albums.database = db_dir.join("albums.toml");
    config.indexer.timeout_ms = options.indexer_timeout_ms;
    config.indexer.provider = IndexerProviderConfig::Http(HttpIndexerConfig { base_url });

    let album_store = TomlAlbumStore::open(config.albums.database.clone())
        .await
        .unwrap();
    album_store
        .insert(Album::new(ALBUM_SLUG, "Anna & Ben", OWNER_ID).with_id(ALBUM_ID))
        .await
        .unwrap();

    let indexer = create_indexer(&config.indexer).unwrap();
    let state = AppState::new(config, Arc::new(album_store), indexer);
    let server = TestServer::new(router(state.clone()).into_make_service()).unwrap();

    TestApp {
        temp_dir,
        server,
        state,
        faces,
    }
}

/// Serves the app on a real local port for the HTTP client.
pub async fn serve(state: AppState) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = router(state);
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

pub fn jpeg(seed: u8, len: usize) -> Vec<u8> {
    let mut bytes = vec![0xFF, 0xD8, 0xFF, 0xE0];
    bytes.resize(len.max(4), seed);
    bytes.truncate(len);
    bytes
}
