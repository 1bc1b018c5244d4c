//! Property identifiers used as storage directory names.

use std::sync::LazyLock;

use regex::Regex;

use crate::error::{PhotoError, PhotoResult};

/// Longest accepted property identifier.
pub const MAX_PROPERTY_ID_LEN: usize = 64;

#[allow(clippy::expect_used)]
static PROPERTY_ID_RE: LazyLock<Regex> = LazyLock::new(|| {
    // Static pattern; compilation cannot fail.
    Regex::new(r"^[A-Za-z0-9_-]{1,64}$").expect("property id pattern is valid")
});

/// A property identifier that is safe to use as a single path segment.
///
/// Only ASCII letters, digits, `_` and `-` are accepted, so the value can
/// never contain a separator, `..`, or a drive prefix.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PropertyId(String);

impl PropertyId {
    /// Validate a caller-supplied identifier.
    pub fn parse(raw: &str) -> PhotoResult<Self> {
        if !PROPERTY_ID_RE.is_match(raw) {
            return Err(PhotoError::processing(anyhow::anyhow!(
                "invalid property identifier ({} bytes)",
                raw.len()
            )));
        }
        Ok(Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for PropertyId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn accepts_safe_identifiers() {
        for id in ["42", "prop_123", "a-b-c", "ABCdef_09-", &"x".repeat(MAX_PROPERTY_ID_LEN)] {
            assert_eq!(PropertyId::parse(id).unwrap().as_str(), id);
        }
    }

    // Traversal and injection vectors must all fail closed.
    #[test]
    fn rejects_unsafe_identifiers() {
        let long = "x".repeat(MAX_PROPERTY_ID_LEN + 1);
        for id in [
            "",
            "..",
            ".",
            "../../etc",
            "a/b",
            "a\\b",
            "/etc",
            "C:",
            "prop 1",
            "prop\0",
            "prop\n",
            "prop.1",
            "%2e%2e",
            "ümlaut",
            long.as_str(),
        ] {
            let err = PropertyId::parse(id).unwrap_err();
            assert_eq!(err.code(), "IMG_003", "{id:?}");
        }
    }
}
