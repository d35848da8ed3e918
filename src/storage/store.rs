use super::{StorageError, generate_filename, is_safe_filename, is_valid_album_id};
use serde::{Deserialize, Serialize};
use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
};
use tokio::{fs, io::AsyncWriteExt};
use tracing::{debug, warn};

const UNINDEXED_DIR: &str = ".unindexed";
const TEMP_PREFIX: &str = ".upload-";
const TEMP_SUFFIX: &str = ".tmp";

#[derive(Debug, Clone)]
pub struct PhotoStore {
    root: PathBuf,
}

#[derive(Debug, Clone, Serialize)]
pub struct StoredPhoto {
    pub album_id: String,
    pub filename: String,
    #[serde(skip)]
    pub storage_path: PathBuf,
}

impl StoredPhoto {
    /// Public reference in the `<album_id>/<filename>` form used by the API.
    pub fn reference(&self) -> String {
        format!("{}/{}", self.album_id, self.filename)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PhotoListing {
    pub photos: Vec<String>,
    pub unindexed: Vec<String>,
}

impl PhotoStore {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn namespace(&self, album_id: &str) -> Result<PathBuf, StorageError> {
        if !is_valid_album_id(album_id) {
            return Err(StorageError::InvalidAlbumId(album_id.to_string()));
        }
        Ok(self.root.join(album_id))
    }

    pub fn photo_path(&self, album_id: &str, filename: &str) -> Result<PathBuf, StorageError> {
        if !is_safe_filename(filename) {
            return Err(StorageError::InvalidFilename(filename.to_string()));
        }
        Ok(self.namespace(album_id)?.join(filename))
    }

    /// Creates the album namespace if it does not exist yet.
    pub async fn ensure_namespace(&self, album_id: &str) -> Result<PathBuf, StorageError> {
        let dir = self.namespace(album_id)?;
        fs::create_dir_all(&dir).await?;
        Ok(dir)
    }

    /// Writes `bytes` under a freshly generated name.
    ///
    /// The data lands in a hidden temp file first and is then hard-linked to its
    /// final name, so a reader never sees a partial photo and an existing photo
    /// is never replaced.
    pub async fn persist(
        &self,
        album_id: &str,
        original_name: Option<&str>,
        bytes: &[u8],
    ) -> Result<StoredPhoto, StorageError> {
        let filename = generate_filename(original_name);
        self.persist_as(album_id, &filename, bytes).await
    }

    async fn persist_as(
        &self,
        album_id: &str,
        filename: &str,
        bytes: &[u8],
    ) -> Result<StoredPhoto, StorageError> {
        let dir = self.ensure_namespace(album_id).await?;
        let final_path = self.photo_path(album_id, filename)?;
        let temp_path = dir.join(format!(
            "{}{}{}",
            TEMP_PREFIX,
            uuid::Uuid::new_v4().simple(),
            TEMP_SUFFIX
        ));

        if let Err(e) = write_fully(&temp_path, bytes).await {
            remove_temp(&temp_path).await;
            return Err(e.into());
        }

        let linked = fs::hard_link(&temp_path, &final_path).await;
        remove_temp(&temp_path).await;

        match linked {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                warn!(album_id, filename, "Generated filename collided with a stored photo");
                return Err(StorageError::StorageCollision(filename.to_string()));
            }
            Err(e) => return Err(e.into()),
        }

        debug!(album_id, filename, size = bytes.len(), "Stored photo");

        Ok(StoredPhoto {
            album_id: album_id.to_string(),
            filename: filename.to_string(),
            storage_path: final_path,
        })
    }

    /// Lists the photos of an album in upload order. A namespace that was never
    /// created lists as empty.
    pub async fn list(&self, album_id: &str) -> Result<PhotoListing, StorageError> {
        let dir = self.namespace(album_id)?;

        let mut entries = match fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(PhotoListing::default()),
            Err(e) => return Err(e.into()),
        };

        let mut photos = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_file() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str()
                && is_safe_filename(name)
            {
                photos.push(name.to_string());
            }
        }
        photos.sort();

        let mut unindexed = self.unindexed_markers(&dir).await?;
        unindexed.retain(|name| photos.binary_search(name).is_ok());
        unindexed.sort();

        Ok(PhotoListing { photos, unindexed })
    }

    async fn unindexed_markers(&self, dir: &Path) -> Result<Vec<String>, StorageError> {
        let marker_dir = dir.join(UNINDEXED_DIR);
        let mut entries = match fs::read_dir(&marker_dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) if e.kind() == ErrorKind::NotADirectory => {
                warn!("Unindexed flag path is not a directory: {:?}", marker_dir);
                return Ok(Vec::new());
            }
            Err(e) => return Err(e.into()),
        };

        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if let Some(name) = entry.file_name().to_str() {
                names.push(name.to_string());
            }
        }
        Ok(names)
    }

    pub async fn read(&self, album_id: &str, filename: &str) -> Result<Vec<u8>, StorageError> {
        let path = self.photo_path(album_id, filename)?;
        match fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Err(StorageError::NotFound(format!("{}/{}", album_id, filename)))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Opens a stored photo for streaming.
    pub async fn open(
        &self,
        album_id: &str,
        filename: &str,
    ) -> Result<(fs::File, std::fs::Metadata), StorageError> {
        let path = self.photo_path(album_id, filename)?;
        let not_found = || StorageError::NotFound(format!("{}/{}", album_id, filename));

        let metadata = match fs::metadata(&path).await {
            Ok(metadata) if metadata.is_file() => metadata,
            Ok(_) => return Err(not_found()),
            Err(e) if e.kind() == ErrorKind::NotFound => return Err(not_found()),
            Err(e) => return Err(e.into()),
        };
        let file = fs::File::open(&path).await?;

        Ok((file, metadata))
    }

    pub async fn contains(&self, album_id: &str, filename: &str) -> bool {
        match self.photo_path(album_id, filename) {
            Ok(path) => fs::metadata(path)
                .await
                .map(|metadata| metadata.is_file())
                .unwrap_or(false),
            Err(_) => false,
        }
    }

    /// Removes temp files left behind by uploads that never finished. Only
    /// safe while no upload is in flight, so it runs at startup.
    pub async fn sweep_temp_files(&self) -> Result<usize, StorageError> {
        let mut albums = match fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e.into()),
        };

        let mut removed = 0;
        while let Some(album) = albums.next_entry().await? {
            if !album.file_type().await?.is_dir() {
                continue;
            }
            let mut entries = fs::read_dir(album.path()).await?;
            while let Some(entry) = entries.next_entry().await? {
                let is_temp = entry
                    .file_name()
                    .to_str()
                    .is_some_and(|name| name.starts_with(TEMP_PREFIX) && name.ends_with(TEMP_SUFFIX));
                if is_temp && entry.file_type().await?.is_file() {
                    debug!("Removing stale temp upload {:?}", entry.path());
                    fs::remove_file(entry.path()).await?;
                    removed += 1;
                }
            }
        }
        Ok(removed)
    }

    /// Flags a stored photo as not registered with the face indexer.
    pub async fn mark_unindexed(&self, album_id: &str, filename: &str) -> Result<(), StorageError> {
        self.photo_path(album_id, filename)?;
        let marker_dir = self.namespace(album_id)?.join(UNINDEXED_DIR);
        fs::create_dir_all(&marker_dir).await?;
        fs::write(marker_dir.join(filename), b"").await?;
        Ok(())
    }

    pub async fn clear_unindexed(&self, album_id: &str, filename: &str) -> Result<(), StorageError> {
        self.photo_path(album_id, filename)?;
        let marker = self.namespace(album_id)?.join(UNINDEXED_DIR).join(filename);
        match fs::remove_file(marker).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

async fn write_fully(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut file = fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .await?;
    file.write_all(bytes).await?;
    file.sync_all().await?;
    Ok(())
}

async fn remove_temp(path: &Path) {
    if let Err(e) = fs::remove_file(path).await
        && e.kind() != ErrorKind::NotFound
    {
        warn!("Failed to remove temp upload {:?}: {}", path, e);
    }
}
