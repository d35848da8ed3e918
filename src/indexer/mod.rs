pub mod config;
pub mod error;
pub mod providers;

pub use config::*;
pub use error::*;

use async_trait::async_trait;
use std::sync::Arc;

/// Remote face registration and matching.
///
/// `compare` returns `<album_id>/<filename>` references in the order the
/// matcher ranked them.
#[async_trait]
pub trait FaceIndexer: Send + Sync {
    async fn register(
        &self,
        album_id: &str,
        filename: &str,
        image: Vec<u8>,
    ) -> Result<(), IndexerError>;

    async fn compare(&self, album_id: &str, probe: Vec<u8>) -> Result<Vec<String>, IndexerError>;

    fn name(&self) -> &str;
}

pub type DynFaceIndexer = Arc<dyn FaceIndexer>;

pub fn create_indexer(config: &IndexerConfig) -> Result<DynFaceIndexer, IndexerError> {
    match &config.provider {
        IndexerProviderConfig::Http(http_config) => Ok(Arc::new(
            providers::http::HttpIndexer::new(
                http_config,
                config.timeout(),
                config.connect_timeout(),
            )?,
        )),
        IndexerProviderConfig::Memory => Ok(Arc::new(providers::memory::MemoryIndexer::new())),
    }
}
