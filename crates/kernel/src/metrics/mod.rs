//! Prometheus metrics collection.
//!
//! Provides photo pipeline metrics in Prometheus format.

use prometheus_client::encoding::{EncodeLabelSet, text::encode};
use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::family::Family;
use prometheus_client::metrics::histogram::{Histogram, exponential_buckets, linear_buckets};
use prometheus_client::registry::Registry;

/// Rejection labels.
#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct RejectionLabels {
    pub code: String,
}

/// Output format labels.
#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct FormatLabels {
    pub mime: String,
}

/// Application metrics.
pub struct Metrics {
    registry: Registry,

    /// Photos stored, by output mime type.
    pub photo_uploads: Family<FormatLabels, Counter>,

    /// Encoded bytes stored.
    pub photo_upload_bytes: Counter,

    /// Rejected batches by error code.
    pub photo_rejections: Family<RejectionLabels, Counter>,

    /// Encode attempts per stored photo.
    pub photo_encode_attempts: Histogram,

    /// Time spent in the pipeline per photo.
    pub photo_processing_seconds: Histogram,
}

impl Metrics {
    /// Create a new metrics registry.
    pub fn new() -> Self {
        let mut registry = Registry::default();

        let photo_uploads = Family::<FormatLabels, Counter>::default();
        registry.register(
            "photo_uploads",
            "Photos stored",
            photo_uploads.clone(),
        );

        let photo_upload_bytes = Counter::default();
        registry.register(
            "photo_upload_bytes",
            "Encoded photo bytes stored",
            photo_upload_bytes.clone(),
        );

        let photo_rejections = Family::<RejectionLabels, Counter>::default();
        registry.register(
            "photo_rejections",
            "Rejected photo uploads by error code",
            photo_rejections.clone(),
        );

        let photo_encode_attempts = Histogram::new(linear_buckets(1.0, 1.0, 11));
        registry.register(
            "photo_encode_attempts",
            "Encoder quality levels tried per photo",
            photo_encode_attempts.clone(),
        );

        let photo_processing_seconds = Histogram::new(exponential_buckets(0.01, 2.0, 12));
        registry.register(
            "photo_processing_seconds",
            "Pipeline time per photo in seconds",
            photo_processing_seconds.clone(),
        );

        Self {
            registry,
            photo_uploads,
            photo_upload_bytes,
            photo_rejections,
            photo_encode_attempts,
            photo_processing_seconds,
        }
    }

    /// Record a stored photo.
    pub fn record_upload(&self, mime: &str, bytes: u64) {
        self.photo_uploads
            .get_or_create(&FormatLabels {
                mime: mime.to_string(),
            })
            .inc();
        self.photo_upload_bytes.inc_by(bytes);
    }

    /// Record a rejected batch.
    pub fn record_rejection(&self, code: &str) {
        self.photo_rejections
            .get_or_create(&RejectionLabels {
                code: code.to_string(),
            })
            .inc();
    }

    /// Record one pipeline run.
    pub fn record_processing(&self, attempts: usize, duration_secs: f64) {
        self.photo_encode_attempts.observe(attempts as f64);
        self.photo_processing_seconds.observe(duration_secs);
    }

    /// Encode metrics in Prometheus text format.
    ///
    /// # Panics
    ///
    /// Panics if Prometheus metric encoding to a `String` buffer fails.
    /// The `fmt::Write` impl for `String` is infallible, and all metric
    /// labels use derived `EncodeLabelSet` impls that do not produce
    /// `fmt::Error`.
    pub fn encode(&self) -> String {
        let mut buffer = String::new();
        // Prometheus encoding to String buffer is infallible
        #[allow(clippy::expect_used)]
        encode(&mut buffer, &self.registry).expect("encoding metrics");
        buffer
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Metrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Metrics").finish()
    }
}

#[cfg(test)]
// Tests are allowed to use unwrap/expect freely.
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_new() {
        let metrics = Metrics::new();
        let output = metrics.encode();
        assert!(output.contains("photo_upload_bytes_total"));
        assert!(output.contains("photo_encode_attempts"));
    }

    #[test]
    fn test_record_upload_and_rejection() {
        let metrics = Metrics::new();
        metrics.record_upload("image/jpeg", 400_000);
        metrics.record_rejection("IMG_004");
        metrics.record_processing(3, 0.2);

        let output = metrics.encode();
        assert!(output.contains(r#"photo_uploads_total{mime="image/jpeg"} 1"#));
        assert!(output.contains(r#"photo_rejections_total{code="IMG_004"} 1"#));
        assert!(output.contains("photo_upload_bytes_total 400000"));
    }
}
