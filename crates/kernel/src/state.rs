//! Application state shared across all handlers.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;

use crate::config::Config;
use crate::file::{LocalPhotoStore, PhotoService};
use crate::metrics::Metrics;
use crate::photo::{PhotoPipeline, PhotoPolicy};

/// Shared application state.
///
/// Wrapped in Arc internally so Clone is cheap.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    /// Photo upload service.
    photos: Arc<PhotoService>,

    /// Prometheus metrics.
    metrics: Arc<Metrics>,

    /// Root of stored photos on disk.
    uploads_dir: PathBuf,

    /// Mount point for serving stored photos.
    files_url: String,
}

impl AppState {
    /// Build state from configuration, creating the uploads directory.
    pub async fn new(config: &Config) -> Result<Self> {
        tokio::fs::create_dir_all(&config.uploads_dir)
            .await
            .with_context(|| {
                format!(
                    "failed to create uploads directory {}",
                    config.uploads_dir.display()
                )
            })?;

        let policy =
            Arc::new(PhotoPolicy::default().with_watermark_text(config.watermark_text.clone()));
        let metrics = Arc::new(Metrics::new());
        let store = Arc::new(LocalPhotoStore::new(&config.uploads_dir));
        let photos = Arc::new(PhotoService::new(
            PhotoPipeline::new(policy),
            store,
            config.max_concurrent_processing,
            metrics.clone(),
        ));

        info!(
            uploads_dir = %config.uploads_dir.display(),
            max_concurrent_processing = config.max_concurrent_processing,
            "photo service initialized"
        );

        Ok(Self::from_parts(
            photos,
            metrics,
            config.uploads_dir.clone(),
            config.files_url.clone(),
        ))
    }

    /// Assemble state from already-built services.
    pub fn from_parts(
        photos: Arc<PhotoService>,
        metrics: Arc<Metrics>,
        uploads_dir: PathBuf,
        files_url: String,
    ) -> Self {
        Self {
            inner: Arc::new(AppStateInner {
                photos,
                metrics,
                uploads_dir,
                files_url,
            }),
        }
    }

    /// Get the photo service.
    pub fn photos(&self) -> &Arc<PhotoService> {
        &self.inner.photos
    }

    /// Get the metrics registry.
    pub fn metrics(&self) -> &Arc<Metrics> {
        &self.inner.metrics
    }

    pub fn uploads_dir(&self) -> &Path {
        &self.inner.uploads_dir
    }

    pub fn files_url(&self) -> &str {
        &self.inner.files_url
    }

    /// Check that the uploads directory exists and is a directory.
    pub async fn uploads_healthy(&self) -> bool {
        tokio::fs::metadata(&self.inner.uploads_dir)
            .await
            .is_ok_and(|meta| meta.is_dir())
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("photos", &self.inner.photos)
            .field("uploads_dir", &self.inner.uploads_dir)
            .field("files_url", &self.inner.files_url)
            .finish()
    }
}
