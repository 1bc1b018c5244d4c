//! Listing photo test utilities.
//!
//! Deterministic in-memory fixture images: opaque JPEG and PNG photos,
//! transparent PNGs, and JPEGs carrying an EXIF orientation tag.

// Fixture generation has no meaningful failure mode worth propagating.
#![allow(clippy::expect_used)]

use std::io::Cursor;

use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, ImageFormat, Rgb, RgbImage, Rgba, RgbaImage};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// A photo-like RGB image: diagonal gradient with mild per-pixel noise.
pub fn photo_rgb(width: u32, height: u32, seed: u64) -> RgbImage {
    let mut rng = StdRng::seed_from_u64(seed);
    RgbImage::from_fn(width, height, |x, y| {
        let fx = x as f32 / width.max(1) as f32;
        let fy = y as f32 / height.max(1) as f32;
        let mut jitter = || rng.gen_range(-6i16..=6);
        Rgb([
            channel(40.0 + 180.0 * fx, jitter()),
            channel(60.0 + 150.0 * fy, jitter()),
            channel(200.0 - 120.0 * (fx + fy) / 2.0, jitter()),
        ])
    })
}

/// Encode an opaque photo as JPEG at `quality`.
pub fn opaque_jpeg(width: u32, height: u32, quality: u8) -> Vec<u8> {
    encode_jpeg(&photo_rgb(width, height, 7), quality)
}

/// The highest-quality opaque JPEG of this size that fits in `max_bytes`.
///
/// Falls back to the smallest attempt when nothing fits.
pub fn opaque_jpeg_within(width: u32, height: u32, max_bytes: usize) -> Vec<u8> {
    let img = photo_rgb(width, height, 11);
    let mut smallest = Vec::new();
    for quality in (10..=95).rev().step_by(5) {
        let bytes = encode_jpeg(&img, quality);
        if bytes.len() <= max_bytes {
            return bytes;
        }
        smallest = bytes;
    }
    smallest
}

/// Encode an opaque photo as PNG.
pub fn opaque_png(width: u32, height: u32) -> Vec<u8> {
    encode(DynamicImage::ImageRgb8(photo_rgb(width, height, 3)), ImageFormat::Png)
}

/// RGBA PNG whose alpha channel is fully opaque everywhere.
pub fn rgba_png_fully_opaque(width: u32, height: u32) -> Vec<u8> {
    let rgb = photo_rgb(width, height, 5);
    let rgba = RgbaImage::from_fn(width, height, |x, y| {
        let Rgb([r, g, b]) = *rgb.get_pixel(x, y);
        Rgba([r, g, b, u8::MAX])
    });
    encode(DynamicImage::ImageRgba8(rgba), ImageFormat::Png)
}

/// RGBA PNG with a transparent left half over a photo-like right half.
pub fn transparent_png(width: u32, height: u32) -> Vec<u8> {
    let rgb = photo_rgb(width, height, 9);
    let rgba = RgbaImage::from_fn(width, height, |x, y| {
        let Rgb([r, g, b]) = *rgb.get_pixel(x, y);
        let alpha = if x < width / 2 { 0 } else { u8::MAX };
        Rgba([r, g, b, alpha])
    });
    encode(DynamicImage::ImageRgba8(rgba), ImageFormat::Png)
}

/// JPEG stored sideways with an EXIF orientation tag (1..=8).
///
/// The pixel data is `width`×`height`; viewers honouring the tag show it
/// rotated or flipped.
pub fn exif_oriented_jpeg(width: u32, height: u32, orientation: u16) -> Vec<u8> {
    let jpeg = opaque_jpeg(width, height, 90);
    with_exif_orientation(&jpeg, orientation)
}

/// Insert an APP1 EXIF segment carrying only an orientation tag right
/// after the JPEG start-of-image marker.
pub fn with_exif_orientation(jpeg: &[u8], orientation: u16) -> Vec<u8> {
    assert!(jpeg.starts_with(&[0xFF, 0xD8]), "not a JPEG");

    let mut tiff = Vec::new();
    // Big-endian TIFF header, first IFD at offset 8.
    tiff.extend_from_slice(b"MM\x00\x2A\x00\x00\x00\x08");
    tiff.extend_from_slice(&1u16.to_be_bytes());
    tiff.extend_from_slice(&0x0112u16.to_be_bytes());
    tiff.extend_from_slice(&3u16.to_be_bytes());
    tiff.extend_from_slice(&1u32.to_be_bytes());
    tiff.extend_from_slice(&orientation.to_be_bytes());
    tiff.extend_from_slice(&[0, 0]);
    tiff.extend_from_slice(&0u32.to_be_bytes());

    let payload_len = 2 + 6 + tiff.len();
    let segment_len = u16::try_from(payload_len).expect("EXIF segment fits in u16");

    let mut out = Vec::with_capacity(jpeg.len() + payload_len + 2);
    out.extend_from_slice(&jpeg[..2]);
    out.extend_from_slice(&[0xFF, 0xE1]);
    out.extend_from_slice(&segment_len.to_be_bytes());
    out.extend_from_slice(b"Exif\x00\x00");
    out.extend_from_slice(&tiff);
    out.extend_from_slice(&jpeg[2..]);
    out
}

/// Append filler after the image data until the buffer is `total` bytes.
pub fn padded_to(mut bytes: Vec<u8>, total: usize) -> Vec<u8> {
    if bytes.len() < total {
        bytes.resize(total, 0);
    }
    bytes
}

fn channel(base: f32, jitter: i16) -> u8 {
    (base as i16 + jitter).clamp(0, 255) as u8
}

fn encode_jpeg(img: &RgbImage, quality: u8) -> Vec<u8> {
    let mut out = Vec::new();
    JpegEncoder::new_with_quality(&mut out, quality)
        .encode_image(img)
        .expect("encoding fixture JPEG");
    out
}

fn encode(img: DynamicImage, format: ImageFormat) -> Vec<u8> {
    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, format).expect("encoding fixture image");
    out.into_inner()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn fixtures_decode_with_expected_dimensions() {
        let jpeg = image::load_from_memory(&opaque_jpeg(40, 30, 90)).unwrap();
        assert_eq!((jpeg.width(), jpeg.height()), (40, 30));

        let png = image::load_from_memory(&transparent_png(20, 10)).unwrap();
        assert!(png.color().has_alpha());
    }

    #[test]
    fn exif_segment_follows_soi() {
        let bytes = exif_oriented_jpeg(16, 8, 6);
        assert_eq!(&bytes[..4], &[0xFF, 0xD8, 0xFF, 0xE1]);
        assert_eq!(&bytes[6..12], b"Exif\x00\x00");
        assert!(image::load_from_memory(&bytes).is_ok());
    }

    #[test]
    fn padding_reaches_requested_size() {
        let bytes = padded_to(opaque_jpeg(8, 8, 80), 5000);
        assert_eq!(bytes.len(), 5000);
    }
}
