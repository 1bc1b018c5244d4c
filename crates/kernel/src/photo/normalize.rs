//! Decode, orient, and bound uploaded photos.

use std::io::Cursor;

use anyhow::Context;
use image::imageops::FilterType;
use image::metadata::Orientation;
use image::{DynamicImage, ImageDecoder, ImageReader, Limits};
use tracing::debug;

use crate::error::{PhotoError, PhotoResult};
use crate::photo::types::NormalizedFrame;

/// Largest edge a decoder may report before we refuse to allocate.
/// Bounds memory for tiny files that declare huge dimensions.
const MAX_DECODE_EDGE: u32 = 16_384;

/// Allocation ceiling for a single decode (256 MB).
const MAX_DECODE_ALLOC: u64 = 256 * 1024 * 1024;

/// Decode `bytes`, apply EXIF orientation, and fit inside `max_dimension`.
///
/// Images already inside the bounding box are returned at their original
/// size; the normalizer never enlarges.
pub fn normalize(bytes: &[u8], max_dimension: u32) -> PhotoResult<NormalizedFrame> {
    let image = decode_upright(bytes).map_err(PhotoError::processing)?;
    let has_transparency = has_transparency(&image);
    let (source_width, source_height) = (image.width(), image.height());

    let image = fit_inside(image, max_dimension);

    debug!(
        source_width,
        source_height,
        width = image.width(),
        height = image.height(),
        has_transparency,
        "normalized photo"
    );

    Ok(NormalizedFrame {
        image,
        has_transparency,
    })
}

fn decode_upright(bytes: &[u8]) -> anyhow::Result<DynamicImage> {
    let mut reader = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .context("failed to sniff image format")?;
    reader.limits(decode_limits());

    let mut decoder = reader.into_decoder().context("unrecognised image data")?;
    // Unreadable orientation metadata is not fatal; the pixels still decode.
    let orientation = decoder.orientation().unwrap_or(Orientation::NoTransforms);

    let mut image = DynamicImage::from_decoder(decoder).context("failed to decode image")?;
    image.apply_orientation(orientation);

    if image.width() == 0 || image.height() == 0 {
        anyhow::bail!("decoded image has zero area");
    }
    Ok(image)
}

fn decode_limits() -> Limits {
    let mut limits = Limits::default();
    limits.max_image_width = Some(MAX_DECODE_EDGE);
    limits.max_image_height = Some(MAX_DECODE_EDGE);
    limits.max_alloc = Some(MAX_DECODE_ALLOC);
    limits
}

/// Shrink to fit a `max × max` box, preserving aspect ratio.
pub(crate) fn fit_inside(image: DynamicImage, max: u32) -> DynamicImage {
    if image.width() <= max && image.height() <= max {
        return image;
    }
    image.resize(max, max, FilterType::Lanczos3)
}

/// True when at least one pixel is not fully opaque.
///
/// An alpha channel alone is not enough; many PNG exporters write RGBA for
/// fully opaque photos.
pub(crate) fn has_transparency(image: &DynamicImage) -> bool {
    if !image.color().has_alpha() {
        return false;
    }
    match image {
        DynamicImage::ImageRgba8(buf) => buf.pixels().any(|p| p.0[3] < u8::MAX),
        DynamicImage::ImageLumaA8(buf) => buf.pixels().any(|p| p.0[1] < u8::MAX),
        other => other.to_rgba16().pixels().any(|p| p.0[3] < u16::MAX),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use image::{ImageFormat, Rgb, RgbImage, Rgba, RgbaImage};

    fn encode(image: &DynamicImage, format: ImageFormat) -> Vec<u8> {
        let mut buf = Cursor::new(Vec::new());
        image.write_to(&mut buf, format).unwrap();
        buf.into_inner()
    }

    #[test]
    fn small_images_pass_through_unresized() {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(320, 200, Rgb([10, 20, 30])));
        let frame = normalize(&encode(&img, ImageFormat::Png), 1600).unwrap();
        assert_eq!((frame.width(), frame.height()), (320, 200));
        assert!(!frame.has_transparency);
    }

    #[test]
    fn landscape_bounded_on_long_edge() {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(2000, 1500, Rgb([200, 10, 10])));
        let frame = normalize(&encode(&img, ImageFormat::Jpeg), 1600).unwrap();
        assert_eq!((frame.width(), frame.height()), (1600, 1200));
    }

    #[test]
    fn portrait_bounded_on_long_edge() {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(900, 3600, Rgb([0, 0, 0])));
        let frame = fit_inside(img, 1600);
        assert_eq!((frame.width(), frame.height()), (400, 1600));
    }

    #[test]
    fn exact_bound_is_untouched() {
        let img = DynamicImage::ImageRgb8(RgbImage::new(1600, 900));
        let frame = fit_inside(img, 1600);
        assert_eq!((frame.width(), frame.height()), (1600, 900));
    }

    #[test]
    fn corrupt_bytes_fail_as_processing() {
        let err = normalize(b"\xFF\xD8\xFF\xE0 definitely not a jpeg", 1600).unwrap_err();
        assert_eq!(err.code(), "IMG_003");

        let err = normalize(&[], 1600).unwrap_err();
        assert_eq!(err.code(), "IMG_003");
    }

    #[test]
    fn truncated_stream_fails_as_processing() {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(64, 64, Rgb([1, 2, 3])));
        let bytes = encode(&img, ImageFormat::Png);
        let err = normalize(&bytes[..bytes.len() / 2], 1600).unwrap_err();
        assert_eq!(err.code(), "IMG_003");
    }

    #[test]
    fn opaque_rgba_is_not_transparent() {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(8, 8, Rgba([1, 2, 3, 255])));
        assert!(!has_transparency(&img));
    }

    #[test]
    fn single_translucent_pixel_counts() {
        let mut buf = RgbaImage::from_pixel(8, 8, Rgba([1, 2, 3, 255]));
        buf.put_pixel(7, 7, Rgba([1, 2, 3, 254]));
        assert!(has_transparency(&DynamicImage::ImageRgba8(buf)));
    }
}
