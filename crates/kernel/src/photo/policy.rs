//! Photo pipeline policy.
//!
//! Every numeric threshold the pipeline enforces lives here. The policy is
//! built once at startup and shared read-only by the pipeline, the store,
//! and the upload service.

/// Maximum accepted upload size and encoded artifact size (1 MiB).
pub const MAX_BYTES: usize = 1_048_576;

/// Lower edge of the preferred encoded size band (300 KiB).
pub const TARGET_MIN_BYTES: usize = 307_200;

/// Upper edge of the preferred encoded size band (600 KiB).
pub const TARGET_MAX_BYTES: usize = 614_400;

/// Size the encoder steers towards when nothing lands in the band.
pub const TARGET_MID_BYTES: usize = 512_000;

/// Longest edge allowed after normalization.
pub const MAX_DIMENSION: u32 = 1600;

/// Maximum stored photos per property.
pub const MAX_PHOTOS_PER_PROPERTY: usize = 10;

/// Maximum files accepted in one upload batch.
pub const MAX_BATCH_FILES: usize = 10;

/// JPEG quality ladder, highest first.
pub const LOSSY_QUALITY_LADDER: &[u8] = &[80, 75, 70, 65, 60, 55, 50, 45, 40, 35, 30];

/// PNG quality ladder, highest first.
pub const ALPHA_QUALITY_LADDER: &[u8] = &[80, 70, 60, 50, 40];

/// Label stamped onto every photo unless configured otherwise.
pub const DEFAULT_WATERMARK_TEXT: &str = "© Listings";

/// Thresholds and ladders for the photo pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhotoPolicy {
    /// Largest raw upload accepted before decoding.
    pub max_input_bytes: usize,
    /// Hard ceiling on the encoded artifact.
    pub max_output_bytes: usize,
    /// Preferred band lower edge (inclusive).
    pub target_min_bytes: usize,
    /// Preferred band upper edge (inclusive).
    pub target_max_bytes: usize,
    /// Closest-candidate target.
    pub target_mid_bytes: usize,
    /// Longest allowed edge after normalization.
    pub max_dimension: u32,
    pub lossy_ladder: Vec<u8>,
    pub alpha_ladder: Vec<u8>,
    pub max_photos_per_property: usize,
    pub max_batch_files: usize,
    pub watermark_text: String,
}

impl Default for PhotoPolicy {
    fn default() -> Self {
        Self {
            max_input_bytes: MAX_BYTES,
            max_output_bytes: MAX_BYTES,
            target_min_bytes: TARGET_MIN_BYTES,
            target_max_bytes: TARGET_MAX_BYTES,
            target_mid_bytes: TARGET_MID_BYTES,
            max_dimension: MAX_DIMENSION,
            lossy_ladder: LOSSY_QUALITY_LADDER.to_vec(),
            alpha_ladder: ALPHA_QUALITY_LADDER.to_vec(),
            max_photos_per_property: MAX_PHOTOS_PER_PROPERTY,
            max_batch_files: MAX_BATCH_FILES,
            watermark_text: DEFAULT_WATERMARK_TEXT.to_string(),
        }
    }
}

impl PhotoPolicy {
    /// Override the watermark label.
    pub fn with_watermark_text(mut self, text: impl Into<String>) -> Self {
        self.watermark_text = text.into();
        self
    }

    /// Whether an encoded size falls inside the preferred band.
    pub fn in_target_band(&self, len: usize) -> bool {
        (self.target_min_bytes..=self.target_max_bytes).contains(&len)
    }

    /// Distance of an encoded size from the band midpoint.
    pub fn distance_from_target(&self, len: usize) -> usize {
        len.abs_diff(self.target_mid_bytes)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_published_limits() {
        let policy = PhotoPolicy::default();
        assert_eq!(policy.max_input_bytes, 1_048_576);
        assert_eq!(policy.max_output_bytes, 1_048_576);
        assert_eq!(policy.max_dimension, 1600);
        assert_eq!(policy.max_photos_per_property, 10);
        assert_eq!(policy.lossy_ladder.len(), 11);
        assert_eq!(policy.alpha_ladder, vec![80, 70, 60, 50, 40]);
    }

    #[test]
    fn ladders_descend() {
        let policy = PhotoPolicy::default();
        assert!(policy.lossy_ladder.windows(2).all(|w| w[0] > w[1]));
        assert!(policy.alpha_ladder.windows(2).all(|w| w[0] > w[1]));
    }

    #[test]
    fn band_edges_are_inclusive() {
        let policy = PhotoPolicy::default();
        assert!(policy.in_target_band(307_200));
        assert!(policy.in_target_band(614_400));
        assert!(!policy.in_target_band(307_199));
        assert!(!policy.in_target_band(614_401));
    }

    #[test]
    fn distance_is_symmetric() {
        let policy = PhotoPolicy::default();
        assert_eq!(policy.distance_from_target(500_000), 12_000);
        assert_eq!(policy.distance_from_target(524_000), 12_000);
    }
}
