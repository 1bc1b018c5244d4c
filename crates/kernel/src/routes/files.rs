//! Serving stored photos.

use axum::{
    Router,
    extract::{Path, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use tracing::debug;

use crate::state::AppState;

/// Stored names are never reused, so responses can be cached forever.
const CACHE_CONTROL: &str = "public, max-age=31536000, immutable";

/// Create the stored-photo router mounted at `files_url`.
pub fn router(files_url: &str) -> Router<AppState> {
    Router::new().route(&format!("{files_url}/{{*path}}"), get(serve_file))
}

/// Serve a stored photo by its relative path.
async fn serve_file(State(state): State<AppState>, Path(path): Path<String>) -> Response {
    match state.photos().store().read(&path).await {
        Ok(Some(content)) => (
            StatusCode::OK,
            [
                (header::CONTENT_TYPE, mime_from_path(&path)),
                (header::CACHE_CONTROL, CACHE_CONTROL),
                (header::X_CONTENT_TYPE_OPTIONS, "nosniff"),
            ],
            content,
        )
            .into_response(),
        Ok(None) => not_found(),
        Err(e) => {
            debug!(path = %path.escape_debug(), error = %e, "stored photo lookup rejected");
            not_found()
        }
    }
}

fn not_found() -> Response {
    (StatusCode::NOT_FOUND, "Not found").into_response()
}

fn mime_from_path(path: &str) -> &'static str {
    match path.rsplit_once('.').map(|(_, ext)| ext) {
        Some("jpg") => "image/jpeg",
        Some("png") => "image/png",
        _ => "application/octet-stream",
    }
}
