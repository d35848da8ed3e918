use super::MatchError;
use crate::{indexer::DynFaceIndexer, storage::PhotoStore};
use tracing::{debug, info, warn};

/// Forwards a probe image to the face indexer and returns the matching photo
/// references of one album.
///
/// The result keeps the indexer's order. References that do not name a photo
/// stored in the queried album are dropped, so a match set is always a subset
/// of the album listing.
#[derive(Clone)]
pub struct MatchQuery {
    indexer: DynFaceIndexer,
    photos: PhotoStore,
}

impl MatchQuery {
    pub fn new(indexer: DynFaceIndexer, photos: PhotoStore) -> Self {
        Self { indexer, photos }
    }

    pub async fn run(&self, album_id: &str, probe: Vec<u8>) -> Result<Vec<String>, MatchError> {
        if probe.is_empty() {
            return Err(MatchError::InvalidRequest("Probe image is empty".to_string()));
        }

        let references = self.indexer.compare(album_id, probe).await?;
        let returned = references.len();

        let mut matches = Vec::with_capacity(returned);
        for reference in references {
            if self.is_stored_in(album_id, &reference).await {
                matches.push(reference);
            } else {
                warn!(album_id, reference = %reference, "Dropping match outside the album");
            }
        }

        debug!(album_id, returned, kept = matches.len(), "Filtered match references");
        info!(album_id, matches = matches.len(), "Match query finished");
        Ok(matches)
    }

    async fn is_stored_in(&self, album_id: &str, reference: &str) -> bool {
        match reference.split_once('/') {
            Some((album, filename)) if album == album_id => {
                self.photos.contains(album_id, filename).await
            }
            _ => false,
        }
    }
}
