//! The synchronous photo pipeline: validate, normalize, watermark, encode.

use std::sync::Arc;

use tracing::debug;

use crate::error::PhotoResult;
use crate::photo::encode::{CandidateEncoder, ImageCodec, encode};
use crate::photo::normalize::normalize;
use crate::photo::policy::PhotoPolicy;
use crate::photo::types::{EncodedArtifact, OutputFormat, RawUpload};
use crate::photo::validate::validate;
use crate::photo::watermark::{WatermarkStyle, composite};

/// Turns one raw upload into a stored-ready artifact.
///
/// CPU-bound and free of shared mutable state; callers on an async runtime
/// should run [`PhotoPipeline::process`] on a blocking thread.
#[derive(Clone)]
pub struct PhotoPipeline {
    policy: Arc<PhotoPolicy>,
    watermark: WatermarkStyle,
    codec: Arc<dyn CandidateEncoder>,
}

impl PhotoPipeline {
    /// Create a pipeline using the `image` codecs.
    pub fn new(policy: Arc<PhotoPolicy>) -> Self {
        Self::with_codec(policy, Arc::new(ImageCodec))
    }

    /// Create a pipeline with a custom candidate encoder.
    pub fn with_codec(policy: Arc<PhotoPolicy>, codec: Arc<dyn CandidateEncoder>) -> Self {
        let watermark = WatermarkStyle::new(policy.watermark_text.clone());
        Self {
            policy,
            watermark,
            codec,
        }
    }

    pub fn policy(&self) -> &PhotoPolicy {
        &self.policy
    }

    /// Run every stage for one upload. The first failing stage aborts.
    pub fn process(&self, upload: &RawUpload) -> PhotoResult<EncodedArtifact> {
        let source = validate(&self.policy, &upload.mime, upload.bytes.len())?;
        let frame = normalize(&upload.bytes, self.policy.max_dimension)?;
        let format = OutputFormat::select(source, frame.has_transparency);

        debug!(
            original = %upload.original,
            ?source,
            ?format,
            width = frame.width(),
            height = frame.height(),
            "processing photo"
        );

        let marked = composite(frame, &self.watermark)?;
        encode(&marked, format, &self.policy, self.codec.as_ref())
    }
}

impl std::fmt::Debug for PhotoPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PhotoPipeline")
            .field("policy", &self.policy)
            .field("watermark", &self.watermark)
            .finish()
    }
}
