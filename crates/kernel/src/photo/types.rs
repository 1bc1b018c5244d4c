//! Values passed between pipeline stages.

use image::DynamicImage;

/// An uploaded file as received from the request layer.
#[derive(Clone)]
pub struct RawUpload {
    pub bytes: Vec<u8>,
    /// Declared mime type.
    pub mime: String,
    /// Caller-supplied filename, carried through as metadata only.
    pub original: String,
}

impl RawUpload {
    pub fn new(bytes: Vec<u8>, mime: impl Into<String>, original: impl Into<String>) -> Self {
        Self {
            bytes,
            mime: mime.into(),
            original: original.into(),
        }
    }
}

impl std::fmt::Debug for RawUpload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RawUpload")
            .field("len", &self.bytes.len())
            .field("mime", &self.mime)
            .field("original", &self.original)
            .finish()
    }
}

/// Accepted upload formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    Jpeg,
    Png,
}

impl SourceFormat {
    /// Parse a declared mime type. Parameters such as `; charset=` are ignored.
    pub fn from_mime(mime: &str) -> Option<Self> {
        let essence = mime.split(';').next().unwrap_or("").trim();
        if essence.eq_ignore_ascii_case("image/jpeg") {
            Some(SourceFormat::Jpeg)
        } else if essence.eq_ignore_ascii_case("image/png") {
            Some(SourceFormat::Png)
        } else {
            None
        }
    }
}

/// Container chosen for the encoded artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// JPEG.
    Lossy,
    /// PNG, kept only for sources with real transparency.
    AlphaPreserving,
}

impl OutputFormat {
    /// Pick the output container once, before the quality search.
    pub fn select(source: SourceFormat, has_transparency: bool) -> Self {
        match (source, has_transparency) {
            (SourceFormat::Png, true) => OutputFormat::AlphaPreserving,
            _ => OutputFormat::Lossy,
        }
    }

    pub fn mime(self) -> &'static str {
        match self {
            OutputFormat::Lossy => "image/jpeg",
            OutputFormat::AlphaPreserving => "image/png",
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Lossy => "jpg",
            OutputFormat::AlphaPreserving => "png",
        }
    }
}

/// Upright, bounded pixels decoded from an upload.
#[derive(Debug, Clone)]
pub struct NormalizedFrame {
    pub image: DynamicImage,
    /// True when at least one pixel is not fully opaque.
    pub has_transparency: bool,
}

impl NormalizedFrame {
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }
}

/// A normalized frame with the watermark composited in.
#[derive(Debug, Clone)]
pub struct WatermarkedFrame {
    pub image: DynamicImage,
    pub has_transparency: bool,
}

impl WatermarkedFrame {
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }
}

/// Final encoded bytes ready to be stored.
#[derive(Clone)]
pub struct EncodedArtifact {
    pub bytes: Vec<u8>,
    pub format: OutputFormat,
    pub width: u32,
    pub height: u32,
    /// Ladder level that produced these bytes.
    pub quality: u8,
    /// Encodes tried before this one was chosen, inclusive.
    pub attempts: usize,
}

impl EncodedArtifact {
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl std::fmt::Debug for EncodedArtifact {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EncodedArtifact")
            .field("len", &self.bytes.len())
            .field("format", &self.format)
            .field("width", &self.width)
            .field("height", &self.height)
            .field("quality", &self.quality)
            .field("attempts", &self.attempts)
            .finish()
    }
}
