use super::{IncomingFile, IngestError, IngestOutcome, IngestedPhoto, ReindexReport, UploadItem};
use crate::{api::ApiError, indexer::DynFaceIndexer, storage::PhotoStore};
use tokio::task::{JoinError, JoinSet};
use tracing::{error, info, warn};

const MAX_CONCURRENT_UPLOADS: usize = 4;

/// Stores uploaded photos and registers them with the face indexer.
///
/// Each file is handled on its own: a failure only affects that file's
/// outcome. A photo the indexer refuses stays stored and is flagged
/// unindexed so it still shows up in the album.
#[derive(Clone)]
pub struct IngestPipeline {
    photos: PhotoStore,
    indexer: DynFaceIndexer,
    max_file_bytes: usize,
}

impl IngestPipeline {
    pub fn new(photos: PhotoStore, indexer: DynFaceIndexer, max_file_bytes: usize) -> Self {
        Self {
            photos,
            indexer,
            max_file_bytes,
        }
    }

    pub fn max_file_bytes(&self) -> usize {
        self.max_file_bytes
    }

    pub fn check_size(&self, size: usize) -> Result<(), IngestError> {
        if size > self.max_file_bytes {
            return Err(IngestError::PayloadTooLarge {
                size,
                limit: self.max_file_bytes,
            });
        }
        Ok(())
    }

    /// Ingests the items of a batch concurrently, at most
    /// `MAX_CONCURRENT_UPLOADS` at a time. Outcomes come back in the order of
    /// `items`.
    pub async fn ingest_batch(&self, album_id: &str, items: Vec<UploadItem>) -> Vec<IngestOutcome> {
        let mut outcomes: Vec<Option<IngestOutcome>> = (0..items.len()).map(|_| None).collect();
        let mut tasks = JoinSet::new();

        for (index, item) in items.into_iter().enumerate() {
            while tasks.len() >= MAX_CONCURRENT_UPLOADS {
                if let Some(joined) = tasks.join_next().await {
                    record(&mut outcomes, joined);
                }
            }

            let pipeline = self.clone();
            let album_id = album_id.to_string();
            tasks.spawn(async move {
                let original_name = item.original_name().map(str::to_string);
                let result = match item {
                    UploadItem::Received(file) => pipeline.ingest_one(&album_id, file).await,
                    UploadItem::Rejected { error, .. } => Err(error),
                };
                (index, outcome(original_name, result))
            });
        }

        while let Some(joined) = tasks.join_next().await {
            record(&mut outcomes, joined);
        }

        outcomes
            .into_iter()
            .map(|outcome| {
                outcome.unwrap_or_else(|| {
                    failed(None, ApiError::Storage("Upload task did not complete".to_string()))
                })
            })
            .collect()
    }

    pub async fn ingest_one(
        &self,
        album_id: &str,
        file: IncomingFile,
    ) -> Result<IngestedPhoto, IngestError> {
        self.check_size(file.bytes.len())?;
        if file.bytes.is_empty() {
            return Err(IngestError::MalformedUpload("File is empty".to_string()));
        }

        let photo = self
            .photos
            .persist(album_id, file.original_name.as_deref(), &file.bytes)
            .await?;
        drop(file);

        // From here on the photo is stored under its final name, so nothing
        // below may turn the outcome into a failure.
        let marked = match self.photos.mark_unindexed(album_id, &photo.filename).await {
            Ok(()) => true,
            Err(e) => {
                error!(
                    album_id,
                    filename = %photo.filename,
                    "Failed to flag photo as unindexed: {}",
                    e
                );
                false
            }
        };

        let registered = match self.photos.read(album_id, &photo.filename).await {
            Ok(stored_bytes) => self
                .indexer
                .register(album_id, &photo.filename, stored_bytes)
                .await
                .map_err(|e| e.detail()),
            Err(e) => Err(e.to_string()),
        };

        let index_error = match registered {
            Ok(()) => {
                if marked
                    && let Err(e) = self.photos.clear_unindexed(album_id, &photo.filename).await
                {
                    warn!(
                        album_id,
                        filename = %photo.filename,
                        "Photo indexed but its unindexed flag could not be cleared: {}",
                        e
                    );
                }
                None
            }
            Err(detail) => {
                warn!(
                    album_id,
                    filename = %photo.filename,
                    flagged = marked,
                    "Photo stored but not indexed: {}",
                    detail
                );
                Some(detail)
            }
        };

        info!(
            album_id,
            filename = %photo.filename,
            indexed = index_error.is_none(),
            "Photo ingested"
        );

        Ok(IngestedPhoto {
            photo,
            indexed: index_error.is_none(),
            index_error,
        })
    }

    /// Re-submits every unindexed photo of an album to the indexer.
    pub async fn reindex(&self, album_id: &str) -> Result<ReindexReport, IngestError> {
        let listing = self.photos.list(album_id).await?;
        let mut report = ReindexReport::default();

        for filename in listing.unindexed {
            let bytes = self.photos.read(album_id, &filename).await?;
            match self.indexer.register(album_id, &filename, bytes).await {
                Ok(()) => {
                    self.photos.clear_unindexed(album_id, &filename).await?;
                    report.reindexed += 1;
                }
                Err(e) => {
                    warn!(album_id, filename = %filename, "Reindex failed: {}", e);
                    report.failed += 1;
                }
            }
        }

        info!(
            album_id,
            reindexed = report.reindexed,
            failed = report.failed,
            "Reindex finished"
        );
        Ok(report)
    }
}

fn outcome(file: Option<String>, result: Result<IngestedPhoto, IngestError>) -> IngestOutcome {
    match result {
        Ok(ingested) => IngestOutcome::Stored {
            file,
            url: ingested.photo.reference(),
            filename: ingested.photo.filename,
            indexed: ingested.indexed,
            index_error: ingested.index_error,
        },
        Err(e) => {
            warn!(file = ?file, "Upload failed: {}", e);
            failed(file, e.into())
        }
    }
}

fn record(
    outcomes: &mut [Option<IngestOutcome>],
    joined: Result<(usize, IngestOutcome), JoinError>,
) {
    match joined {
        Ok((index, outcome)) => outcomes[index] = Some(outcome),
        Err(e) => error!("Upload task failed: {}", e),
    }
}

fn failed(file: Option<String>, error: ApiError) -> IngestOutcome {
    IngestOutcome::Failed {
        file,
        status: error.status(),
        error: error.body(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indexer::{FaceIndexer, IndexerError, providers::memory::MemoryIndexer};
    use async_trait::async_trait;
    use axum::http::StatusCode;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::time::Duration;
    use tempfile::TempDir;

    /// Refuses registrations while `down` is set.
    struct FlakyIndexer {
        down: AtomicBool,
        inner: MemoryIndexer,
    }

    #[async_trait]
    impl FaceIndexer for FlakyIndexer {
        async fn register(
            &self,
            album_id: &str,
            filename: &str,
            image: Vec<u8>,
        ) -> Result<(), IndexerError> {
            if self.down.load(Ordering::SeqCst) {
                return Err(IndexerError::ServiceError {
                    status: 400,
                    detail: "No face found in image.".to_string(),
                });
            }
            self.inner.register(album_id, filename, image).await
        }

        async fn compare(
            &self,
            album_id: &str,
            probe: Vec<u8>,
        ) -> Result<Vec<String>, IndexerError> {
            self.inner.compare(album_id, probe).await
        }

        fn name(&self) -> &str {
            "flaky"
        }
    }

    /// Records how many registrations run at the same time.
    #[derive(Default)]
    struct CountingIndexer {
        in_flight: AtomicUsize,
        peak: AtomicUsize,
    }

    #[async_trait]
    impl FaceIndexer for CountingIndexer {
        async fn register(
            &self,
            _album_id: &str,
            _filename: &str,
            _image: Vec<u8>,
        ) -> Result<(), IndexerError> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            Ok(())
        }

        async fn compare(
            &self,
            _album_id: &str,
            _probe: Vec<u8>,
        ) -> Result<Vec<String>, IndexerError> {
            Ok(Vec::new())
        }

        fn name(&self) -> &str {
            "counting"
        }
    }

    fn pipeline(temp_dir: &TempDir, indexer: DynFaceIndexer, limit: usize) -> IngestPipeline {
        IngestPipeline::new(PhotoStore::new(temp_dir.path().join("photos")), indexer, limit)
    }

    fn file(name: &str, bytes: &[u8]) -> UploadItem {
        UploadItem::Received(IncomingFile::new(Some(name.to_string()), bytes.to_vec()))
    }

    #[tokio::test]
    async fn test_same_original_name_gets_distinct_stored_names() {
        let temp_dir = TempDir::new().unwrap();
        let indexer = Arc::new(MemoryIndexer::new());
        let pipeline = pipeline(&temp_dir, indexer.clone(), 1024);

        let outcomes = pipeline
            .ingest_batch(
                "wedding-1",
                vec![file("photo.jpg", b"first"), file("photo.jpg", b"second")],
            )
            .await;

        let names: Vec<String> = outcomes
            .iter()
            .map(|outcome| match outcome {
                IngestOutcome::Stored {
                    filename, indexed, ..
                } => {
                    assert!(indexed);
                    filename.clone()
                }
                IngestOutcome::Failed { .. } => panic!("upload failed"),
            })
            .collect();
        assert_ne!(names[0], names[1]);

        let listing = pipeline.photos.list("wedding-1").await.unwrap();
        assert_eq!(listing.photos.len(), 2);
        assert!(listing.unindexed.is_empty());
        assert_eq!(indexer.registered("wedding-1").await.len(), 2);
    }

    #[tokio::test]
    async fn test_size_limit_boundary() {
        let temp_dir = TempDir::new().unwrap();
        let pipeline = pipeline(&temp_dir, Arc::new(MemoryIndexer::new()), 8);

        let outcomes = pipeline
            .ingest_batch(
                "album",
                vec![file("exact.jpg", &[1u8; 8]), file("over.jpg", &[1u8; 9])],
            )
            .await;

        assert!(outcomes[0].is_stored());
        assert_eq!(outcomes[1].status(), StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(pipeline.photos.list("album").await.unwrap().photos.len(), 1);
    }

    #[tokio::test]
    async fn test_rejected_item_does_not_abort_siblings() {
        let temp_dir = TempDir::new().unwrap();
        let pipeline = pipeline(&temp_dir, Arc::new(MemoryIndexer::new()), 1024);

        let outcomes = pipeline
            .ingest_batch(
                "album",
                vec![
                    UploadItem::Rejected {
                        original_name: Some("huge.jpg".to_string()),
                        error: IngestError::PayloadTooLarge {
                            size: 4096,
                            limit: 1024,
                        },
                    },
                    file("ok.jpg", b"fine"),
                    file("empty.jpg", b""),
                ],
            )
            .await;

        assert_eq!(outcomes[0].status(), StatusCode::PAYLOAD_TOO_LARGE);
        assert!(outcomes[1].is_stored());
        assert_eq!(outcomes[2].status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_indexer_failure_keeps_photo_unindexed_until_reindex() {
        let temp_dir = TempDir::new().unwrap();
        let indexer = Arc::new(FlakyIndexer {
            down: AtomicBool::new(true),
            inner: MemoryIndexer::new(),
        });
        let pipeline = pipeline(&temp_dir, indexer.clone(), 1024);

        let ingested = pipeline
            .ingest_one("album", IncomingFile::new(None, b"face".to_vec()))
            .await
            .unwrap();
        assert!(!ingested.indexed);
        assert_eq!(ingested.index_error.as_deref(), Some("No face found in image."));

        let listing = pipeline.photos.list("album").await.unwrap();
        assert_eq!(listing.photos, vec![ingested.photo.filename.clone()]);
        assert_eq!(listing.unindexed, vec![ingested.photo.filename.clone()]);

        let report = pipeline.reindex("album").await.unwrap();
        assert_eq!(report, ReindexReport { reindexed: 0, failed: 1 });

        indexer.down.store(false, Ordering::SeqCst);
        let report = pipeline.reindex("album").await.unwrap();
        assert_eq!(report, ReindexReport { reindexed: 1, failed: 0 });
        assert!(pipeline.photos.list("album").await.unwrap().unindexed.is_empty());
        assert_eq!(
            indexer.compare("album", b"face".to_vec()).await.unwrap(),
            vec![ingested.photo.reference()]
        );
    }

    #[tokio::test]
    async fn test_batch_concurrency_is_bounded() {
        let temp_dir = TempDir::new().unwrap();
        let indexer = Arc::new(CountingIndexer::default());
        let pipeline = pipeline(&temp_dir, indexer.clone(), 1024);

        let items = (0..12u8)
            .map(|i| file(&format!("photo-{}.jpg", i), &[i + 1; 16]))
            .collect();
        let outcomes = pipeline.ingest_batch("album", items).await;

        assert_eq!(outcomes.len(), 12);
        assert!(outcomes.iter().all(IngestOutcome::is_stored));
        for (i, outcome) in outcomes.iter().enumerate() {
            assert!(matches!(
                outcome,
                IngestOutcome::Stored { file: Some(name), .. } if *name == format!("photo-{}.jpg", i)
            ));
        }
        let peak = indexer.peak.load(Ordering::SeqCst);
        assert!(peak >= 1 && peak <= MAX_CONCURRENT_UPLOADS, "peak {}", peak);
    }

    #[tokio::test]
    async fn test_flag_failure_does_not_fail_a_stored_photo() {
        let temp_dir = TempDir::new().unwrap();
        let indexer = Arc::new(FlakyIndexer {
            down: AtomicBool::new(false),
            inner: MemoryIndexer::new(),
        });
        let pipeline = pipeline(&temp_dir, indexer.clone(), 1024);

        // A plain file where the flag directory should be makes every flag
        // write fail.
        let namespace = pipeline.photos.ensure_namespace("album").await.unwrap();
        std::fs::write(namespace.join(".unindexed"), b"").unwrap();

        let ingested = pipeline
            .ingest_one("album", IncomingFile::new(Some("a.jpg".to_string()), b"face".to_vec()))
            .await
            .unwrap();
        assert!(ingested.indexed);
        assert_eq!(indexer.inner.registered("album").await, vec![ingested.photo.filename.clone()]);

        indexer.down.store(true, Ordering::SeqCst);
        let outcomes = pipeline
            .ingest_batch("album", vec![file("b.jpg", b"other")])
            .await;
        assert!(matches!(
            &outcomes[0],
            IngestOutcome::Stored { indexed: false, index_error: Some(detail), .. }
                if detail == "No face found in image."
        ));

        let listing = pipeline.photos.list("album").await.unwrap();
        assert_eq!(listing.photos.len(), 2);
        assert!(listing.unindexed.is_empty());
    }
}
