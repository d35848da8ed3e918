use crate::indexer::{FaceIndexer, IndexerError};
use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::debug;

/// In-process indexer that matches a probe against byte-identical registered
/// images. Useful for development and tests; it knows nothing about faces.
pub struct MemoryIndexer {
    albums: RwLock<HashMap<String, Vec<(String, [u8; 32])>>>,
}

impl MemoryIndexer {
    pub fn new() -> Self {
        Self {
            albums: RwLock::new(HashMap::new()),
        }
    }

    pub async fn registered(&self, album_id: &str) -> Vec<String> {
        let albums = self.albums.read().await;
        albums
            .get(album_id)
            .map(|entries| entries.iter().map(|(name, _)| name.clone()).collect())
            .unwrap_or_default()
    }
}

impl Default for MemoryIndexer {
    fn default() -> Self {
        Self::new()
    }
}

fn digest(bytes: &[u8]) -> [u8; 32] {
    let mut out = [0u8; 32];
    out.copy_from_slice(&Sha256::digest(bytes));
    out
}

#[async_trait]
impl FaceIndexer for MemoryIndexer {
    async fn register(
        &self,
        album_id: &str,
        filename: &str,
        image: Vec<u8>,
    ) -> Result<(), IndexerError> {
        let hash = digest(&image);
        let mut albums = self.albums.write().await;
        let entries = albums.entry(album_id.to_string()).or_default();

        match entries.iter_mut().find(|(name, _)| name == filename) {
            Some(entry) => entry.1 = hash,
            None => entries.push((filename.to_string(), hash)),
        }

        debug!(album_id, filename, "Registered image in memory index");
        Ok(())
    }

    async fn compare(&self, album_id: &str, probe: Vec<u8>) -> Result<Vec<String>, IndexerError> {
        let hash = digest(&probe);
        let albums = self.albums.read().await;

        Ok(albums
            .get(album_id)
            .map(|entries| {
                entries
                    .iter()
                    .filter(|(_, registered)| *registered == hash)
                    .map(|(name, _)| format!("{}/{}", album_id, name))
                    .collect()
            })
            .unwrap_or_default())
    }

    fn name(&self) -> &str {
        "In-memory exact matcher"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_compare_returns_identical_images_in_registration_order() {
        let indexer = MemoryIndexer::new();
        indexer.register("album", "b.jpg", b"face".to_vec()).await.unwrap();
        indexer.register("album", "a.jpg", b"other".to_vec()).await.unwrap();
        indexer.register("album", "c.jpg", b"face".to_vec()).await.unwrap();

        let matches = indexer.compare("album", b"face".to_vec()).await.unwrap();
        assert_eq!(matches, vec!["album/b.jpg", "album/c.jpg"]);
    }

    #[tokio::test]
    async fn test_albums_are_isolated() {
        let indexer = MemoryIndexer::new();
        indexer.register("one", "x.jpg", b"face".to_vec()).await.unwrap();

        assert!(indexer.compare("two", b"face".to_vec()).await.unwrap().is_empty());
        assert!(indexer.compare("one", b"nobody".to_vec()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_reregistering_replaces_entry() {
        let indexer = MemoryIndexer::new();
        indexer.register("album", "x.jpg", b"old".to_vec()).await.unwrap();
        indexer.register("album", "x.jpg", b"new".to_vec()).await.unwrap();

        assert_eq!(indexer.registered("album").await, vec!["x.jpg"]);
        assert!(indexer.compare("album", b"old".to_vec()).await.unwrap().is_empty());
        assert_eq!(
            indexer.compare("album", b"new".to_vec()).await.unwrap(),
            vec!["album/x.jpg"]
        );
    }

    #[test]
    fn test_name() {
        assert_eq!(MemoryIndexer::new().name(), "In-memory exact matcher");
    }
}
