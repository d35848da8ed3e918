use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub mod albums;
pub mod api;
pub mod client;
pub mod gallery;
pub mod indexer;
pub mod ingest;
pub mod matching;
pub mod session;
pub mod startup_checks;
pub mod storage;

use albums::{AlbumError, AlbumGate, DynAlbumStore, TomlAlbumStore};
use indexer::{DynFaceIndexer, IndexerConfig, IndexerError, create_indexer};
use ingest::IngestPipeline;
use matching::MatchQuery;
use session::SessionReader;
use storage::PhotoStore;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub server: ServerConfig,
    pub app: AppConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub albums: AlbumsConfig,
    #[serde(default)]
    pub indexer: IndexerConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    pub name: String,
    pub log_level: String,
    #[serde(default)]
    pub base_url: Option<String>,
    /// Key for owner session cookies. Owner checks are skipped when unset.
    #[serde(default)]
    pub session_secret: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    #[serde(default = "default_storage_root")]
    pub root: PathBuf,
    #[serde(default = "default_max_file_bytes")]
    pub max_file_bytes: usize,
    #[serde(default = "default_max_request_bytes")]
    pub max_request_bytes: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AlbumsConfig {
    #[serde(default = "default_album_database")]
    pub database: PathBuf,
}

fn default_storage_root() -> PathBuf {
    PathBuf::from("uploads")
}

fn default_max_file_bytes() -> usize {
    20 * 1024 * 1024
}

fn default_max_request_bytes() -> usize {
    200 * 1024 * 1024
}

fn default_album_database() -> PathBuf {
    PathBuf::from("albums.toml")
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root: default_storage_root(),
            max_file_bytes: default_max_file_bytes(),
            max_request_bytes: default_max_request_bytes(),
        }
    }
}

impl Default for AlbumsConfig {
    fn default() -> Self {
        Self {
            database: default_album_database(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 3000,
            },
            app: AppConfig {
                name: "Flashback".to_string(),
                log_level: "info".to_string(),
                base_url: None,
                session_secret: None,
            },
            storage: StorageConfig::default(),
            albums: AlbumsConfig::default(),
            indexer: IndexerConfig::default(),
        }
    }
}

use axum::{Router, extract::DefaultBodyLimit, routing::get, routing::post};
use thiserror::Error;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

#[derive(Debug, Error)]
pub enum InitError {
    #[error("Failed to open album database: {0}")]
    Albums(#[from] AlbumError),

    #[error("Failed to set up face indexer: {0}")]
    Indexer(#[from] IndexerError),
}

#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub albums: AlbumGate,
    pub photos: PhotoStore,
    pub indexer: DynFaceIndexer,
    pub ingest: IngestPipeline,
    pub matcher: MatchQuery,
    pub sessions: SessionReader,
}

impl AppState {
    pub fn new(config: Config, album_store: DynAlbumStore, indexer: DynFaceIndexer) -> Self {
        let photos = PhotoStore::new(config.storage.root.clone());
        let ingest = IngestPipeline::new(
            photos.clone(),
            indexer.clone(),
            config.storage.max_file_bytes,
        );
        let matcher = MatchQuery::new(indexer.clone(), photos.clone());
        let sessions = SessionReader::new(config.app.session_secret.clone());

        Self {
            albums: AlbumGate::new(album_store),
            photos,
            indexer,
            ingest,
            matcher,
            sessions,
            config,
        }
    }

    pub async fn from_config(config: Config) -> Result<Self, InitError> {
        let album_store = TomlAlbumStore::open(config.albums.database.clone()).await?;
        let indexer = create_indexer(&config.indexer)?;
        Ok(Self::new(config, std::sync::Arc::new(album_store), indexer))
    }
}

pub async fn create_app(config: Config) -> Result<Router, InitError> {
    let app_state = AppState::from_config(config).await?;
    Ok(router(app_state))
}

pub fn router(app_state: AppState) -> Router {
    let max_request_bytes = app_state.config.storage.max_request_bytes;

    Router::new()
        .route("/", get(api::health_handler))
        .route("/api/upload", post(ingest::upload_handler))
        .route("/api/get-album", get(albums::get_album_handler))
        .route("/api/set-thumbnail", post(albums::set_thumbnail_handler))
        .route(
            "/api/albums/{album_id}/reindex",
            post(ingest::reindex_handler),
        )
        .route("/photos/{album_id}", get(storage::list_photos_handler))
        .route(
            "/photos/{album_id}/{filename}",
            get(storage::photo_handler),
        )
        .route(
            "/download/{album_id}/{filename}",
            get(storage::download_handler),
        )
        .route("/compare", post(matching::compare_handler))
        .route("/compare/", post(matching::compare_handler))
        .layer(
            ServiceBuilder::new()
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(|request: &axum::http::Request<_>| {
                            let method = request.method();
                            let uri = request.uri();
                            let matched_path = request
                                .extensions()
                                .get::<axum::extract::MatchedPath>()
                                .map(|matched_path| matched_path.as_str());

                            tracing::info_span!(
                                "http_request",
                                method = %method,
                                uri = %uri,
                                matched_path,
                            )
                        })
                        .on_request(|request: &axum::http::Request<_>, _span: &tracing::Span| {
                            let method = request.method();
                            let uri = request.uri();
                            let user_agent = request
                                .headers()
                                .get("user-agent")
                                .and_then(|h| h.to_str().ok())
                                .unwrap_or("-");
                            let content_length = request
                                .headers()
                                .get("content-length")
                                .and_then(|h| h.to_str().ok())
                                .unwrap_or("-");

                            tracing::info!(
                                target: "access_log",
                                method = %method,
                                path = %uri.path(),
                                query = ?uri.query(),
                                user_agent = %user_agent,
                                content_length = %content_length,
                                "request"
                            );
                        })
                        .on_response(
                            |response: &axum::http::Response<_>,
                             latency: std::time::Duration,
                             _span: &tracing::Span| {
                                let status = response.status();
                                let size = response
                                    .headers()
                                    .get("content-length")
                                    .and_then(|h| h.to_str().ok())
                                    .unwrap_or("-");

                                tracing::info!(
                                    target: "access_log",
                                    status = %status,
                                    size = %size,
                                    latency_ms = %latency.as_millis(),
                                    "response"
                                );
                            },
                        ),
                )
                .layer(DefaultBodyLimit::max(max_request_bytes)),
        )
        .with_state(app_state)
}
