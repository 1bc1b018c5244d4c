//! Upload format and size checks.
//!
//! Runs before any decoding so hostile input never reaches the codecs.

use crate::error::{PhotoError, PhotoResult};
use crate::photo::policy::PhotoPolicy;
use crate::photo::types::SourceFormat;

/// Check the declared mime type, then the raw byte length.
pub fn validate(policy: &PhotoPolicy, mime: &str, byte_len: usize) -> PhotoResult<SourceFormat> {
    let Some(format) = SourceFormat::from_mime(mime) else {
        return Err(PhotoError::InvalidFormat {
            mime: mime.to_string(),
        });
    };

    if byte_len > policy.max_input_bytes {
        return Err(PhotoError::TooLarge {
            size: byte_len,
            max: policy.max_input_bytes,
        });
    }

    Ok(format)
}
