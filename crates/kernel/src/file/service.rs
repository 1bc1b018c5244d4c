//! Photo upload service.
//!
//! Runs a batch of uploads through the pipeline and stores the results
//! without letting a property exceed its photo quota.

use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use crate::error::{BatchError, PhotoError, PhotoResult};
use crate::file::property::PropertyId;
use crate::file::quota::QuotaLocks;
use crate::file::storage::{PhotoStore, StoredImageRecord};
use crate::metrics::Metrics;
use crate::photo::pipeline::PhotoPipeline;
use crate::photo::policy::PhotoPolicy;
use crate::photo::types::{EncodedArtifact, RawUpload};

/// Default number of photos processed at once across all requests.
pub const DEFAULT_MAX_CONCURRENT_PROCESSING: usize = 4;

/// Current quota usage for a property.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuotaStatus {
    pub property_id: String,
    pub count: usize,
    pub max: usize,
    pub remaining: usize,
}

/// Photo service for processing and storing listing photos.
pub struct PhotoService {
    pipeline: PhotoPipeline,
    store: Arc<dyn PhotoStore>,
    locks: QuotaLocks,
    /// Bounds CPU-heavy pipeline runs.
    processing: Arc<Semaphore>,
    metrics: Arc<Metrics>,
}

impl PhotoService {
    /// Create a new photo service.
    pub fn new(
        pipeline: PhotoPipeline,
        store: Arc<dyn PhotoStore>,
        max_concurrent_processing: usize,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            pipeline,
            store,
            locks: QuotaLocks::new(),
            processing: Arc::new(Semaphore::new(max_concurrent_processing.max(1))),
            metrics,
        }
    }

    pub fn policy(&self) -> &PhotoPolicy {
        self.pipeline.policy()
    }

    pub fn store(&self) -> &Arc<dyn PhotoStore> {
        &self.store
    }

    /// Report how many photos a property holds and how many more it may take.
    pub async fn quota(&self, raw_id: &str) -> PhotoResult<QuotaStatus> {
        let property = PropertyId::parse(raw_id)?;
        let count = self.store.count_existing(&property).await?;
        let max = self.policy().max_photos_per_property;
        Ok(QuotaStatus {
            property_id: property.to_string(),
            count,
            max,
            remaining: max.saturating_sub(count),
        })
    }

    /// Process and store a batch of uploads for one property.
    ///
    /// All or nothing: either every file is stored and returned in
    /// submission order, or none is.
    pub async fn upload_batch(
        &self,
        raw_id: &str,
        uploads: Vec<RawUpload>,
    ) -> Result<Vec<StoredImageRecord>, BatchError> {
        let result = self.run_batch(raw_id, uploads).await;
        match &result {
            Ok(records) => {
                for record in records {
                    self.metrics.record_upload(&record.mime, record.bytes as u64);
                }
            }
            Err(e) => {
                self.metrics.record_rejection(e.source.code());
                debug!(code = e.source.code(), index = ?e.index, "photo batch rejected");
            }
        }
        result
    }

    async fn run_batch(
        &self,
        raw_id: &str,
        uploads: Vec<RawUpload>,
    ) -> Result<Vec<StoredImageRecord>, BatchError> {
        let property = PropertyId::parse(raw_id)?;
        let policy = self.policy();
        let incoming = uploads.len();

        if incoming == 0 {
            return Err(PhotoError::processing(anyhow::anyhow!("no files in upload")).into());
        }
        if incoming > policy.max_batch_files {
            return Err(PhotoError::QuotaExceeded {
                existing: 0,
                incoming,
                max: policy.max_batch_files,
            }
            .into());
        }

        // Reject early so an over-quota batch costs no decoding.
        self.check_quota(&property, incoming).await?;

        let mut artifacts = Vec::with_capacity(incoming);
        for (index, upload) in uploads.into_iter().enumerate() {
            let original = upload.original.clone();
            let artifact = self
                .process_one(upload)
                .await
                .map_err(|e| BatchError::at(index, e))?;
            artifacts.push((artifact, original));
        }

        let guard = self.locks.acquire(&property).await;
        // Another request may have stored photos while this batch was processing.
        let stored = self.check_quota(&property, incoming).await;
        let result = match stored {
            Ok(()) => self.persist_all(&property, &artifacts).await,
            Err(e) => Err(e.into()),
        };
        drop(guard);
        self.locks.release_idle();

        if let Ok(records) = &result {
            info!(property = %property, count = records.len(), "photos stored");
        }
        result
    }

    async fn check_quota(&self, property: &PropertyId, incoming: usize) -> PhotoResult<()> {
        let existing = self.store.count_existing(property).await?;
        let max = self.policy().max_photos_per_property;
        if existing + incoming > max {
            return Err(PhotoError::QuotaExceeded {
                existing,
                incoming,
                max,
            });
        }
        Ok(())
    }

    /// Run the pipeline for one upload on a blocking thread.
    async fn process_one(&self, upload: RawUpload) -> PhotoResult<EncodedArtifact> {
        let _permit = self
            .processing
            .acquire()
            .await
            .map_err(PhotoError::processing)?;

        let pipeline = self.pipeline.clone();
        let started = Instant::now();
        let artifact = tokio::task::spawn_blocking(move || pipeline.process(&upload))
            .await
            .map_err(PhotoError::processing)??;

        self.metrics
            .record_processing(artifact.attempts, started.elapsed().as_secs_f64());
        Ok(artifact)
    }

    /// Persist artifacts in order; on failure remove what this batch wrote.
    async fn persist_all(
        &self,
        property: &PropertyId,
        artifacts: &[(EncodedArtifact, String)],
    ) -> Result<Vec<StoredImageRecord>, BatchError> {
        let mut records = Vec::with_capacity(artifacts.len());
        for (index, (artifact, original)) in artifacts.iter().enumerate() {
            match self.store.persist(property, artifact, original).await {
                Ok(record) => records.push(record),
                Err(e) => {
                    self.rollback(&records).await;
                    return Err(BatchError::at(index, e));
                }
            }
        }
        Ok(records)
    }

    async fn rollback(&self, records: &[StoredImageRecord]) {
        for record in records {
            if let Err(e) = self.store.remove(&record.path).await {
                warn!(path = %record.path, error = %e, "failed to roll back stored photo");
            }
        }
    }
}

impl std::fmt::Debug for PhotoService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PhotoService")
            .field("pipeline", &self.pipeline)
            .field("store", &self.store.scheme())
            .field("locks", &self.locks)
            .finish()
    }
}
