//! Listing photo route handlers.

use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, Multipart, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::Serialize;
use tracing::{debug, warn};

use crate::file::StoredImageRecord;
use crate::photo::{PhotoPolicy, RawUpload};
use crate::state::AppState;

/// Multipart field names that carry a photo.
const PHOTO_FIELDS: &[&str] = &["photos", "photos[]", "file"];

/// Headroom for multipart framing on top of the raw file bytes.
const MULTIPART_SLACK_BYTES: usize = 1024 * 1024;

/// Create the photo router.
pub fn router(policy: &PhotoPolicy) -> Router<AppState> {
    Router::new()
        .route(
            "/api/properties/{property_id}/photos",
            post(upload_photos).layer(DefaultBodyLimit::max(body_limit(policy))),
        )
        .route(
            "/api/properties/{property_id}/photos/quota",
            get(photo_quota),
        )
}

/// Room for one file past the batch cap, so an oversized batch of large
/// files still reaches the batch-size check instead of the body limit.
pub fn body_limit(policy: &PhotoPolicy) -> usize {
    policy
        .max_batch_files
        .saturating_add(1)
        .saturating_mul(policy.max_input_bytes)
        .saturating_add(MULTIPART_SLACK_BYTES)
}

/// Upload response.
#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub success: bool,
    pub photos: Vec<StoredImageRecord>,
}

#[derive(Debug, Serialize)]
struct RequestErrorBody {
    success: bool,
    error: RequestErrorDetail,
}

#[derive(Debug, Serialize)]
struct RequestErrorDetail {
    code: &'static str,
    message: String,
}

/// Upload photos for a property.
///
/// POST /api/properties/{property_id}/photos
/// Content-Type: multipart/form-data
///
/// Every `photos`, `photos[]` or `file` field is one photo, in order.
async fn upload_photos(
    State(state): State<AppState>,
    Path(property_id): Path<String>,
    mut multipart: Multipart,
) -> Response {
    let mut uploads = Vec::new();

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => {
                warn!(error = %e, "failed to read multipart body");
                return request_error(e.status(), e.body_text());
            }
        };

        let name = field.name().unwrap_or("").to_string();
        if !PHOTO_FIELDS.contains(&name.as_str()) {
            debug!(field = %name, "ignoring multipart field");
            continue;
        }

        let filename = field.file_name().unwrap_or("").to_string();
        let content_type = field.content_type().map(|s| s.to_string());

        let data = match field.bytes().await {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(error = %e, "failed to read upload data");
                return request_error(e.status(), e.body_text());
            }
        };

        let mime = detect_mime(content_type, &data, &filename);
        uploads.push(RawUpload::new(data.to_vec(), mime, filename));
    }

    match state.photos().upload_batch(&property_id, uploads).await {
        Ok(photos) => (
            StatusCode::OK,
            Json(UploadResponse {
                success: true,
                photos,
            }),
        )
            .into_response(),
        Err(e) => e.into_response(),
    }
}

/// Report quota usage for a property.
///
/// GET /api/properties/{property_id}/photos/quota
async fn photo_quota(State(state): State<AppState>, Path(property_id): Path<String>) -> Response {
    match state.photos().quota(&property_id).await {
        Ok(status) => Json(status).into_response(),
        Err(e) => e.into_response(),
    }
}

fn request_error(status: StatusCode, message: String) -> Response {
    (
        status,
        Json(RequestErrorBody {
            success: false,
            error: RequestErrorDetail {
                code: "BAD_REQUEST",
                message,
            },
        }),
    )
        .into_response()
}

/// Declared part type first, then content sniffing, then the extension.
fn detect_mime(declared: Option<String>, data: &[u8], filename: &str) -> String {
    declared
        .filter(|ct| !ct.trim().is_empty() && ct != "application/octet-stream")
        .or_else(|| infer::get(data).map(|kind| kind.mime_type().to_string()))
        .or_else(|| guess_mime_type(filename))
        .unwrap_or_else(|| "application/octet-stream".to_string())
}

/// Guess MIME type from filename extension.
fn guess_mime_type(filename: &str) -> Option<String> {
    let (_, ext) = filename.rsplit_once('.')?;
    let mime = match ext.to_lowercase().as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "heic" => "image/heic",
        _ => return None,
    };
    Some(mime.to_string())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    const PNG_MAGIC: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0x0D];

    #[test]
    fn declared_type_wins() {
        let mime = detect_mime(Some("image/jpeg".to_string()), PNG_MAGIC, "a.png");
        assert_eq!(mime, "image/jpeg");
    }

    #[test]
    fn octet_stream_falls_back_to_sniffing() {
        let mime = detect_mime(
            Some("application/octet-stream".to_string()),
            PNG_MAGIC,
            "a.jpg",
        );
        assert_eq!(mime, "image/png");
    }

    #[test]
    fn extension_is_last_resort() {
        assert_eq!(detect_mime(None, b"????", "Kitchen.JPEG"), "image/jpeg");
        assert_eq!(detect_mime(None, b"????", "noext"), "application/octet-stream");
    }

    #[test]
    fn body_limit_covers_one_file_past_the_batch_cap() {
        let policy = PhotoPolicy::default();
        assert_eq!(
            body_limit(&policy),
            (policy.max_batch_files + 1) * policy.max_input_bytes + MULTIPART_SLACK_BYTES
        );
    }
}
