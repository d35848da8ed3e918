use super::{Album, AlbumError, Thumbnail};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
    sync::Arc,
};
use tokio::{fs, sync::RwLock};
use tracing::{info, warn};

/// Record store holding album metadata, keyed by slug.
#[async_trait]
pub trait AlbumStore: Send + Sync {
    async fn get_by_slug(&self, slug: &str) -> Result<Option<Album>, AlbumError>;
    async fn get_by_id(&self, album_id: &str) -> Result<Option<Album>, AlbumError>;
    async fn list(&self) -> Result<Vec<Album>, AlbumError>;
    async fn insert(&self, album: Album) -> Result<(), AlbumError>;
    async fn remove(&self, slug: &str) -> Result<Option<Album>, AlbumError>;
    async fn set_thumbnail(&self, album_id: &str, thumbnail: Thumbnail) -> Result<(), AlbumError>;
}

pub type DynAlbumStore = Arc<dyn AlbumStore>;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AlbumDatabase {
    #[serde(default)]
    pub albums: BTreeMap<String, Album>,
}

impl AlbumDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn load_from_file(path: &Path) -> Result<Self, AlbumError> {
        let contents = fs::read_to_string(path).await?;
        let doc = contents
            .parse::<toml_edit::DocumentMut>()
            .map_err(|e| AlbumError::DatabaseError(e.to_string()))?;

        let mut db: AlbumDatabase = toml_edit::de::from_document(doc)
            .map_err(|e| AlbumError::DatabaseError(e.to_string()))?;
        for (slug, album) in db.albums.iter_mut() {
            album.slug = slug.clone();
        }
        Ok(db)
    }

    /// Writes to a sibling temp file and renames it over the database.
    pub async fn save_to_file(&self, path: &Path) -> Result<(), AlbumError> {
        let value = toml_edit::ser::to_document(self)
            .map_err(|e| AlbumError::DatabaseError(e.to_string()))?;

        let temp_path = path.with_extension("toml.tmp");
        fs::write(&temp_path, value.to_string()).await?;
        if let Err(e) = fs::rename(&temp_path, path).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(e.into());
        }
        Ok(())
    }

    pub fn find_by_id(&self, album_id: &str) -> Option<&Album> {
        self.albums.values().find(|album| album.id == album_id)
    }
}

/// `AlbumStore` backed by a TOML file. Every write replaces the file before
/// the in-memory copy changes, so a failed write leaves both untouched.
pub struct TomlAlbumStore {
    path: PathBuf,
    db: RwLock<AlbumDatabase>,
}

impl TomlAlbumStore {
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, AlbumError> {
        let path = path.into();
        let db = if fs::try_exists(&path).await? {
            let db = AlbumDatabase::load_from_file(&path).await?;
            info!("Loaded {} albums from {:?}", db.albums.len(), path);
            db
        } else {
            warn!("Album database {:?} does not exist, starting empty", path);
            AlbumDatabase::new()
        };

        Ok(Self {
            path,
            db: RwLock::new(db),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl AlbumStore for TomlAlbumStore {
    async fn get_by_slug(&self, slug: &str) -> Result<Option<Album>, AlbumError> {
        let db = self.db.read().await;
        Ok(db.albums.get(slug).cloned())
    }

    async fn get_by_id(&self, album_id: &str) -> Result<Option<Album>, AlbumError> {
        let db = self.db.read().await;
        Ok(db.find_by_id(album_id).cloned())
    }

    async fn list(&self) -> Result<Vec<Album>, AlbumError> {
        let db = self.db.read().await;
        Ok(db.albums.values().cloned().collect())
    }

    async fn insert(&self, album: Album) -> Result<(), AlbumError> {
        let mut db = self.db.write().await;
        if db.albums.contains_key(&album.slug) {
            return Err(AlbumError::SlugTaken(album.slug));
        }
        if db.find_by_id(&album.id).is_some() {
            return Err(AlbumError::DatabaseError(format!(
                "album id {} is already in use",
                album.id
            )));
        }

        let mut updated = db.clone();
        updated.albums.insert(album.slug.clone(), album);
        updated.save_to_file(&self.path).await?;
        *db = updated;
        Ok(())
    }

    async fn remove(&self, slug: &str) -> Result<Option<Album>, AlbumError> {
        let mut db = self.db.write().await;
        let mut updated = db.clone();
        let removed = updated.albums.remove(slug);
        if removed.is_some() {
            updated.save_to_file(&self.path).await?;
            *db = updated;
        }
        Ok(removed)
    }

    async fn set_thumbnail(&self, album_id: &str, thumbnail: Thumbnail) -> Result<(), AlbumError> {
        let mut db = self.db.write().await;
        let mut updated = db.clone();

        let album = updated
            .albums
            .values_mut()
            .find(|album| album.id == album_id)
            .ok_or_else(|| AlbumError::AlbumNotFound(album_id.to_string()))?;
        album.thumbnail = Some(thumbnail);

        updated
            .save_to_file(&self.path)
            .await
            .map_err(|e| AlbumError::UpdateFailed(e.to_string()))?;
        *db = updated;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn open_store(temp_dir: &TempDir) -> TomlAlbumStore {
        TomlAlbumStore::open(temp_dir.path().join("albums.toml"))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_missing_file_opens_empty() {
        let temp_dir = TempDir::new().unwrap();
        let store = open_store(&temp_dir).await;
        assert!(store.list().await.unwrap().is_empty());
        assert!(!store.path().exists());
    }

    #[tokio::test]
    async fn test_insert_and_lookup() {
        let temp_dir = TempDir::new().unwrap();
        let store = open_store(&temp_dir).await;

        let album = Album::new("wedding", "Wedding", "owner-1").with_id("wedding-1");
        store.insert(album.clone()).await.unwrap();

        assert_eq!(store.get_by_slug("wedding").await.unwrap(), Some(album.clone()));
        assert_eq!(store.get_by_id("wedding-1").await.unwrap(), Some(album));
        assert_eq!(store.get_by_slug("wedding-1").await.unwrap(), None);
        assert_eq!(store.get_by_id("wedding").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_duplicate_slug_is_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let store = open_store(&temp_dir).await;

        store
            .insert(Album::new("party", "Party", "owner-1"))
            .await
            .unwrap();
        let result = store.insert(Album::new("party", "Other", "owner-2")).await;
        assert!(matches!(result, Err(AlbumError::SlugTaken(slug)) if slug == "party"));
    }

    #[tokio::test]
    async fn test_changes_survive_reopen() {
        let temp_dir = TempDir::new().unwrap();
        {
            let store = open_store(&temp_dir).await;
            store
                .insert(
                    Album::new("gala", "Gala Night", "owner-1")
                        .with_id("gala-id")
                        .with_password("secret"),
                )
                .await
                .unwrap();
            store
                .set_thumbnail(
                    "gala-id",
                    Thumbnail {
                        filename: "cover.jpg".to_string(),
                        path: "gala-id/cover.jpg".to_string(),
                    },
                )
                .await
                .unwrap();
        }

        let store = open_store(&temp_dir).await;
        let album = store.get_by_slug("gala").await.unwrap().unwrap();
        assert_eq!(album.slug, "gala");
        assert_eq!(album.title, "Gala Night");
        assert_eq!(album.access_password.as_deref(), Some("secret"));
        assert_eq!(
            album.thumbnail,
            Some(Thumbnail {
                filename: "cover.jpg".to_string(),
                path: "gala-id/cover.jpg".to_string(),
            })
        );
    }

    #[tokio::test]
    async fn test_set_thumbnail_unknown_album() {
        let temp_dir = TempDir::new().unwrap();
        let store = open_store(&temp_dir).await;
        let result = store
            .set_thumbnail(
                "missing",
                Thumbnail {
                    filename: "a.jpg".to_string(),
                    path: "missing/a.jpg".to_string(),
                },
            )
            .await;
        assert!(matches!(result, Err(AlbumError::AlbumNotFound(_))));
    }

    #[tokio::test]
    async fn test_failed_write_leaves_state_unchanged() {
        let temp_dir = TempDir::new().unwrap();
        let db_dir = temp_dir.path().join("db");
        std::fs::create_dir(&db_dir).unwrap();
        let store = TomlAlbumStore::open(db_dir.join("albums.toml")).await.unwrap();
        store
            .insert(Album::new("trip", "Trip", "owner-1").with_id("trip-id"))
            .await
            .unwrap();

        std::fs::remove_dir_all(&db_dir).unwrap();

        let result = store
            .set_thumbnail(
                "trip-id",
                Thumbnail {
                    filename: "a.jpg".to_string(),
                    path: "trip-id/a.jpg".to_string(),
                },
            )
            .await;
        assert!(matches!(result, Err(AlbumError::UpdateFailed(_))));
        assert_eq!(
            store.get_by_id("trip-id").await.unwrap().unwrap().thumbnail,
            None
        );
    }

    #[tokio::test]
    async fn test_remove() {
        let temp_dir = TempDir::new().unwrap();
        let store = open_store(&temp_dir).await;
        store
            .insert(Album::new("old", "Old", "owner-1"))
            .await
            .unwrap();

        assert!(store.remove("old").await.unwrap().is_some());
        assert!(store.remove("old").await.unwrap().is_none());
        assert!(open_store(&temp_dir).await.list().await.unwrap().is_empty());
    }
}
