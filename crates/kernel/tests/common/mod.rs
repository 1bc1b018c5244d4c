#![allow(clippy::unwrap_used, clippy::expect_used)]
//! Common test utilities for integration tests.
//!
//! Each [`TestApp`] owns a fresh temporary uploads directory and the real
//! router built from it.

#![allow(dead_code)]

use std::path::{Path, PathBuf};

use axum::Router;
use axum::body::Body;
use axum::http::{Request, header};
use axum::response::Response;
use http_body_util::BodyExt;
use tower::ServiceExt;

use listing_photos_kernel::{AppState, Config, routes};

/// Multipart boundary used by [`multipart_body`].
pub const BOUNDARY: &str = "listing-photos-test-boundary";

/// One file part of a multipart upload.
pub struct Part<'a> {
    pub field: &'a str,
    pub filename: &'a str,
    pub content_type: Option<&'a str>,
    pub data: &'a [u8],
}

impl<'a> Part<'a> {
    pub fn photo(filename: &'a str, content_type: &'a str, data: &'a [u8]) -> Self {
        Self {
            field: "photos",
            filename,
            content_type: Some(content_type),
            data,
        }
    }
}

/// Test application backed by a temporary uploads directory.
pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    _dir: tempfile::TempDir,
}

impl TestApp {
    /// Create a new test application with default configuration.
    pub async fn new() -> Self {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let config = Config {
            uploads_dir: dir.path().join("uploads"),
            ..Config::default()
        };
        let state = AppState::new(&config)
            .await
            .expect("Failed to create app state");
        let router = routes::app(state.clone());

        Self {
            router,
            state,
            _dir: dir,
        }
    }

    pub fn uploads_dir(&self) -> &Path {
        self.state.uploads_dir()
    }

    /// Place `count` placeholder files in a property directory.
    pub fn seed_photos(&self, property_id: &str, count: usize) -> PathBuf {
        let dir = self.uploads_dir().join(property_id);
        std::fs::create_dir_all(&dir).unwrap();
        for i in 0..count {
            std::fs::write(dir.join(format!("seed-{i}.jpg")), b"seed").unwrap();
        }
        dir
    }

    /// Send a request through the router.
    pub async fn request(&self, request: Request<Body>) -> Response {
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request")
    }

    pub async fn get(&self, uri: &str) -> Response {
        self.request(Request::get(uri).body(Body::empty()).unwrap())
            .await
    }

    /// POST a multipart batch to the property's photo endpoint.
    pub async fn upload(&self, property_id: &str, parts: &[Part<'_>]) -> Response {
        let request = Request::post(format!("/api/properties/{property_id}/photos"))
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(multipart_body(parts)))
            .unwrap();
        self.request(request).await
    }
}

/// Build a multipart/form-data body from parts.
pub fn multipart_body(parts: &[Part<'_>]) -> Vec<u8> {
    let mut body = Vec::new();
    for part in parts {
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        body.extend_from_slice(
            format!(
                "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n",
                part.field, part.filename
            )
            .as_bytes(),
        );
        if let Some(content_type) = part.content_type {
            body.extend_from_slice(format!("Content-Type: {content_type}\r\n").as_bytes());
        }
        body.extend_from_slice(b"\r\n");
        body.extend_from_slice(part.data);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

/// Read a response body to bytes.
pub async fn body_bytes(response: Response) -> Vec<u8> {
    response
        .into_body()
        .collect()
        .await
        .expect("Failed to read body")
        .to_bytes()
        .to_vec()
}

/// Read a response body as JSON.
pub async fn body_json(response: Response) -> serde_json::Value {
    serde_json::from_slice(&body_bytes(response).await).expect("Response is not JSON")
}
