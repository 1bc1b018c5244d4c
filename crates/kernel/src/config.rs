//! Configuration loaded from environment variables.

use std::env;
use std::path::PathBuf;

use anyhow::{Context, Result};

use crate::file::service::DEFAULT_MAX_CONCURRENT_PROCESSING;
use crate::photo::policy::DEFAULT_WATERMARK_TEXT;

/// Application configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP server port (default: 3000).
    pub port: u16,

    /// Path to uploads directory (default: ./uploads).
    pub uploads_dir: PathBuf,

    /// Base URL for serving stored photos (default: /files).
    pub files_url: String,

    /// CORS allowed origins (comma-separated, default: "*").
    pub cors_allowed_origins: Vec<String>,

    /// Photos decoded and encoded at once across all requests (default: 4).
    pub max_concurrent_processing: usize,

    /// Watermark label drawn on every photo.
    pub watermark_text: String,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let port = lookup("PORT")
            .unwrap_or_else(|| "3000".to_string())
            .parse()
            .context("PORT must be a valid u16")?;

        let uploads_dir = lookup("UPLOADS_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("./uploads"));

        let files_url = normalize_mount(
            &lookup("FILES_URL").unwrap_or_else(|| "/files".to_string()),
        )
        .context("FILES_URL must be a non-root path such as /files")?;

        let cors_allowed_origins = lookup("CORS_ALLOWED_ORIGINS")
            .map(|v| v.split(',').map(|s| s.trim().to_string()).collect())
            .unwrap_or_else(|| vec!["*".to_string()]);

        let max_concurrent_processing: usize = lookup("MAX_CONCURRENT_PROCESSING")
            .unwrap_or_else(|| DEFAULT_MAX_CONCURRENT_PROCESSING.to_string())
            .parse()
            .context("MAX_CONCURRENT_PROCESSING must be a positive integer")?;
        if max_concurrent_processing == 0 {
            anyhow::bail!("MAX_CONCURRENT_PROCESSING must be a positive integer");
        }

        let watermark_text = lookup("WATERMARK_TEXT")
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_WATERMARK_TEXT.to_string());

        Ok(Self {
            port,
            uploads_dir,
            files_url,
            cors_allowed_origins,
            max_concurrent_processing,
            watermark_text,
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 3000,
            uploads_dir: PathBuf::from("./uploads"),
            files_url: "/files".to_string(),
            cors_allowed_origins: vec!["*".to_string()],
            max_concurrent_processing: DEFAULT_MAX_CONCURRENT_PROCESSING,
            watermark_text: DEFAULT_WATERMARK_TEXT.to_string(),
        }
    }
}

/// `files/` → `/files`; rejects `/` and empty values.
fn normalize_mount(raw: &str) -> Option<String> {
    let trimmed = raw.trim().trim_matches('/');
    if trimmed.is_empty() {
        return None;
    }
    Some(format!("/{trimmed}"))
}
