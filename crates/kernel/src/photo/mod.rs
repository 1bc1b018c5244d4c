//! Listing photo processing.
//!
//! Stages run in order and each produces a new value:
//! validate → normalize → watermark → encode.

pub mod encode;
pub mod normalize;
pub mod pipeline;
pub mod policy;
pub mod types;
pub mod validate;
pub mod watermark;

pub use encode::{CandidateEncoder, ImageCodec};
pub use pipeline::PhotoPipeline;
pub use policy::PhotoPolicy;
pub use types::{
    EncodedArtifact, NormalizedFrame, OutputFormat, RawUpload, SourceFormat, WatermarkedFrame,
};
pub use watermark::WatermarkStyle;
