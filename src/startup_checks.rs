use crate::{
    Config,
    indexer::{IndexerProviderConfig, create_indexer},
    storage::PhotoStore,
};
use thiserror::Error;
use tracing::{error, info, warn};

#[derive(Debug, Error)]
pub enum StartupCheckError {
    #[error("Failed to create storage root: {0}")]
    StorageRootCreationFailed(#[from] std::io::Error),

    #[error("Storage root is not a directory: {0}")]
    StorageRootNotDirectory(String),

    #[error("Album database does not exist: {0}")]
    AlbumDatabaseMissing(String),

    #[error("Invalid face indexer configuration: {0}")]
    InvalidIndexerConfig(String),
}

impl StartupCheckError {
    /// Critical failures stop the server from starting.
    pub fn is_critical(&self) -> bool {
        !matches!(self, StartupCheckError::AlbumDatabaseMissing(_))
    }
}

pub async fn perform_startup_checks(config: &Config) -> Result<(), Vec<StartupCheckError>> {
    let mut errors = Vec::new();

    info!("Performing startup checks...");

    let root = &config.storage.root;
    if !root.exists() {
        info!("Storage root does not exist, creating: {:?}", root);
        if let Err(e) = tokio::fs::create_dir_all(root).await {
            error!("Failed to create storage root {:?}: {}", root, e);
            errors.push(StartupCheckError::StorageRootCreationFailed(e));
        } else {
            info!("Storage root created successfully");
        }
    } else if !root.is_dir() {
        error!("Storage root is not a directory: {:?}", root);
        errors.push(StartupCheckError::StorageRootNotDirectory(
            root.display().to_string(),
        ));
    } else {
        info!("Storage root exists: {:?}", root);
        match PhotoStore::new(root.clone()).sweep_temp_files().await {
            Ok(0) => {}
            Ok(removed) => info!("Removed {} unfinished uploads", removed),
            Err(e) => warn!("Failed to sweep unfinished uploads: {}", e),
        }
    }

    let database = &config.albums.database;
    if !database.exists() {
        warn!(
            "Album database does not exist: {:?}; no album will resolve until one is added",
            database
        );
        errors.push(StartupCheckError::AlbumDatabaseMissing(
            database.display().to_string(),
        ));
    } else {
        info!("Album database exists: {:?}", database);
    }

    match create_indexer(&config.indexer) {
        Ok(indexer) => match &config.indexer.provider {
            IndexerProviderConfig::Http(http) => {
                info!("Face indexer: {} at {}", indexer.name(), http.base_url)
            }
            IndexerProviderConfig::Memory => {
                warn!("Face indexer: {} (development only)", indexer.name())
            }
        },
        Err(e) => {
            error!("Face indexer configuration is invalid: {}", e);
            errors.push(StartupCheckError::InvalidIndexerConfig(e.to_string()));
        }
    }

    if errors.is_empty() {
        info!("All startup checks passed");
        Ok(())
    } else {
        error!("Startup checks failed with {} errors", errors.len());
        Err(errors)
    }
}
