//! Watermark compositing.
//!
//! The mark is a short text label drawn as an SVG overlay, rasterised with
//! resvg, and alpha-blended onto the bottom-right corner of the frame.

use std::sync::{Arc, LazyLock};

use anyhow::Context;
use image::{DynamicImage, Rgba, RgbaImage, imageops};
use resvg::{tiny_skia, usvg};
use tracing::{debug, warn};

use crate::error::{PhotoError, PhotoResult};
use crate::photo::types::{NormalizedFrame, WatermarkedFrame};

/// Smallest padding between the mark and the image edge.
const MIN_PADDING: u32 = 12;

/// Smallest label font size.
const MIN_FONT_SIZE: u32 = 16;

/// Padding as a fraction of the shorter image edge.
const PADDING_RATIO: f64 = 0.025;

/// Font size as a fraction of the shorter image edge.
const FONT_RATIO: f64 = 0.045;

/// System fonts, loaded once per process.
static FONTS: LazyLock<Arc<usvg::fontdb::Database>> = LazyLock::new(|| {
    let mut db = usvg::fontdb::Database::new();
    db.load_system_fonts();
    if db.is_empty() {
        warn!("no system fonts found; watermark labels will not render");
    } else {
        debug!(faces = db.len(), "loaded watermark fonts");
    }
    Arc::new(db)
});

/// Label and placement for the watermark.
#[derive(Debug, Clone)]
pub struct WatermarkStyle {
    pub text: String,
}

impl WatermarkStyle {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }

    /// Padding and font size for a frame, both in pixels.
    pub fn metrics(width: u32, height: u32) -> MarkMetrics {
        let short = f64::from(width.min(height));
        MarkMetrics {
            padding: ((short * PADDING_RATIO).round() as u32).max(MIN_PADDING),
            font_size: ((short * FONT_RATIO).round() as u32).max(MIN_FONT_SIZE),
        }
    }

    fn overlay_svg(&self, width: u32, height: u32) -> String {
        let MarkMetrics { padding, font_size } = Self::metrics(width, height);
        let x = width.saturating_sub(padding);
        // Lift the baseline so descenders stay inside the padding box.
        let y = f64::from(height.saturating_sub(padding)) - f64::from(font_size) * 0.2;
        let stroke = (f64::from(font_size) / 24.0).max(0.75);

        format!(
            concat!(
                r#"<svg xmlns="http://www.w3.org/2000/svg" width="{w}" height="{h}" viewBox="0 0 {w} {h}">"#,
                r#"<text x="{x}" y="{y:.1}" text-anchor="end" "#,
                r#"font-family="DejaVu Sans, Liberation Sans, Arial, Helvetica, sans-serif" "#,
                r##"font-size="{fs}" font-weight="bold" fill="#ffffff" fill-opacity="0.75" "##,
                r##"stroke="#000000" stroke-opacity="0.35" stroke-width="{sw:.2}">{label}</text>"##,
                "</svg>"
            ),
            w = width,
            h = height,
            x = x,
            y = y,
            fs = font_size,
            sw = stroke,
            label = escape_xml(&self.text),
        )
    }
}

/// Pixel sizes for a watermark on one frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MarkMetrics {
    pub padding: u32,
    pub font_size: u32,
}

/// Composite the watermark onto `frame`. Dimensions are unchanged.
pub fn composite(frame: NormalizedFrame, style: &WatermarkStyle) -> PhotoResult<WatermarkedFrame> {
    let (width, height) = (frame.width(), frame.height());
    let overlay = render_overlay(style, width, height).map_err(PhotoError::processing)?;

    let mut base = frame.image.into_rgba8();
    imageops::overlay(&mut base, &overlay, 0, 0);

    Ok(WatermarkedFrame {
        image: DynamicImage::ImageRgba8(base),
        has_transparency: frame.has_transparency,
    })
}

fn render_overlay(style: &WatermarkStyle, width: u32, height: u32) -> anyhow::Result<RgbaImage> {
    let svg = style.overlay_svg(width, height);

    let mut options = usvg::Options::default();
    options.fontdb = Arc::clone(&FONTS);
    let tree = usvg::Tree::from_str(&svg, &options).context("failed to parse watermark overlay")?;

    let mut pixmap = tiny_skia::Pixmap::new(width, height)
        .context("failed to allocate watermark pixmap")?;
    resvg::render(&tree, tiny_skia::Transform::default(), &mut pixmap.as_mut());

    // tiny-skia stores premultiplied colour; image expects straight alpha.
    let mut overlay = RgbaImage::new(width, height);
    for (dst, src) in overlay.pixels_mut().zip(pixmap.pixels()) {
        let c = src.demultiply();
        *dst = Rgba([c.red(), c.green(), c.blue(), c.alpha()]);
    }
    Ok(overlay)
}

fn escape_xml(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            c => out.push(c),
        }
    }
    out
}
