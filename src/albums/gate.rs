use super::{Album, AlbumError, DynAlbumStore, Thumbnail};
use serde::Serialize;
use tracing::info;

/// Resolves album references for the rest of the service. Lookups are
/// read-only; the thumbnail update is the only write.
#[derive(Clone)]
pub struct AlbumGate {
    store: DynAlbumStore,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlbumRef {
    pub album_id: String,
    pub title: String,
    pub thumbnail: Option<Thumbnail>,
}

impl From<&Album> for AlbumRef {
    fn from(album: &Album) -> Self {
        Self {
            album_id: album.id.clone(),
            title: album.title.clone(),
            thumbnail: album.thumbnail.clone(),
        }
    }
}

impl AlbumGate {
    pub fn new(store: DynAlbumStore) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &DynAlbumStore {
        &self.store
    }

    pub async fn resolve(&self, slug: &str) -> Result<AlbumRef, AlbumError> {
        self.store
            .get_by_slug(slug)
            .await?
            .as_ref()
            .map(AlbumRef::from)
            .ok_or_else(|| AlbumError::AlbumNotFound(slug.to_string()))
    }

    pub async fn resolve_id(&self, album_id: &str) -> Result<Album, AlbumError> {
        self.store
            .get_by_id(album_id)
            .await?
            .ok_or_else(|| AlbumError::AlbumNotFound(album_id.to_string()))
    }

    pub async fn resolve_slug(&self, slug: &str) -> Result<Album, AlbumError> {
        self.store
            .get_by_slug(slug)
            .await?
            .ok_or_else(|| AlbumError::AlbumNotFound(slug.to_string()))
    }

    /// Points the album's thumbnail at a stored photo. Not retried on failure.
    pub async fn set_thumbnail(
        &self,
        slug: &str,
        filename: &str,
        path: &str,
    ) -> Result<(), AlbumError> {
        let album = self.resolve_slug(slug).await?;
        self.store
            .set_thumbnail(
                &album.id,
                Thumbnail {
                    filename: filename.to_string(),
                    path: path.to_string(),
                },
            )
            .await?;

        info!(slug, album_id = %album.id, filename, "Album thumbnail updated");
        Ok(())
    }
}
