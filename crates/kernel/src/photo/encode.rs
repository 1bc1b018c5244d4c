//! Byte-budget encoding.
//!
//! Walks a descending quality ladder and keeps the first candidate inside
//! the target band. When no level lands in the band, the candidate closest
//! to the band midpoint (and under the hard ceiling) wins.

use std::io::Cursor;

use anyhow::Context;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::{CompressionType, FilterType as PngFilterType, PngEncoder};
use image::{DynamicImage, RgbaImage};
use tracing::{debug, trace};

use crate::error::{PhotoError, PhotoResult};
use crate::photo::policy::PhotoPolicy;
use crate::photo::types::{EncodedArtifact, OutputFormat, WatermarkedFrame};

/// Produces one encoded candidate at a given quality level.
pub trait CandidateEncoder: Send + Sync {
    fn encode(
        &self,
        image: &DynamicImage,
        format: OutputFormat,
        quality: u8,
    ) -> anyhow::Result<Vec<u8>>;
}

/// Encoder backed by the `image` crate's JPEG and PNG codecs.
///
/// PNG has no quality setting, so for the alpha-preserving format the
/// quality level picks how many bits of each colour channel survive before
/// compression. Alpha is always kept exact.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImageCodec;

impl CandidateEncoder for ImageCodec {
    fn encode(
        &self,
        image: &DynamicImage,
        format: OutputFormat,
        quality: u8,
    ) -> anyhow::Result<Vec<u8>> {
        let mut buf = Cursor::new(Vec::new());
        match format {
            OutputFormat::Lossy => {
                let encoder = JpegEncoder::new_with_quality(&mut buf, quality);
                image
                    .write_with_encoder(encoder)
                    .context("JPEG encode failed")?;
            }
            OutputFormat::AlphaPreserving => {
                let reduced = posterize(&image.to_rgba8(), quality);
                let encoder = PngEncoder::new_with_quality(
                    &mut buf,
                    CompressionType::Best,
                    PngFilterType::Adaptive,
                );
                reduced
                    .write_with_encoder(encoder)
                    .context("PNG encode failed")?;
            }
        }
        Ok(buf.into_inner())
    }
}

/// Significant bits kept per colour channel at a PNG quality level.
pub(crate) fn png_colour_bits(quality: u8) -> u32 {
    u32::from(quality / 10).saturating_sub(2).clamp(1, 8)
}

fn posterize(image: &RgbaImage, quality: u8) -> RgbaImage {
    let mask = 0xFFu8 << (8 - png_colour_bits(quality));
    let mut out = image.clone();
    for px in out.pixels_mut() {
        px.0[0] &= mask;
        px.0[1] &= mask;
        px.0[2] &= mask;
    }
    out
}

/// Convert the frame to the pixel layout the chosen container stores.
fn prepare(frame: &WatermarkedFrame, format: OutputFormat) -> DynamicImage {
    match format {
        OutputFormat::Lossy => DynamicImage::ImageRgb8(frame.image.to_rgb8()),
        OutputFormat::AlphaPreserving => DynamicImage::ImageRgba8(frame.image.to_rgba8()),
    }
}

/// Run the quality search for `frame` in `format`.
pub fn encode<E: CandidateEncoder + ?Sized>(
    frame: &WatermarkedFrame,
    format: OutputFormat,
    policy: &PhotoPolicy,
    codec: &E,
) -> PhotoResult<EncodedArtifact> {
    let ladder = match format {
        OutputFormat::Lossy => &policy.lossy_ladder,
        OutputFormat::AlphaPreserving => &policy.alpha_ladder,
    };
    let image = prepare(frame, format);

    let mut best: Option<(u8, Vec<u8>)> = None;
    let mut attempts = 0;
    let mut in_band = false;

    for &quality in ladder {
        attempts += 1;
        let bytes = codec
            .encode(&image, format, quality)
            .map_err(PhotoError::processing)?;
        let len = bytes.len();
        trace!(quality, len, ?format, "encoded candidate");

        if policy.in_target_band(len) {
            best = Some((quality, bytes));
            in_band = true;
            break;
        }

        if len <= policy.max_output_bytes {
            let closer = best.as_ref().is_none_or(|(_, current)| {
                policy.distance_from_target(len) < policy.distance_from_target(current.len())
            });
            if closer {
                best = Some((quality, bytes));
            }
        }
    }

    let Some((quality, bytes)) = best else {
        return Err(PhotoError::processing(anyhow::anyhow!(
            "no candidate under {} bytes after {attempts} attempts",
            policy.max_output_bytes
        )));
    };

    if bytes.len() > policy.max_output_bytes {
        return Err(PhotoError::processing(anyhow::anyhow!(
            "chosen candidate of {} bytes exceeds {} byte ceiling",
            bytes.len(),
            policy.max_output_bytes
        )));
    }

    debug!(
        ?format,
        quality,
        len = bytes.len(),
        attempts,
        in_band,
        "photo encoded"
    );

    Ok(EncodedArtifact {
        width: frame.width(),
        height: frame.height(),
        bytes,
        format,
        quality,
        attempts,
    })
}
