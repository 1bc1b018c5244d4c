//! Photo storage backends.
//!
//! The directory for each property is the quota ledger: the number of
//! regular files in it is the number of stored photos.

use std::path::{Component, Path, PathBuf};

use anyhow::Context;
use async_trait::async_trait;
use serde::Serialize;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use crate::error::{PhotoError, PhotoResult};
use crate::file::property::PropertyId;
use crate::photo::types::{EncodedArtifact, OutputFormat};

/// What the caller gets back for each stored photo.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoredImageRecord {
    /// Path relative to the storage root, `/`-separated.
    pub path: String,
    pub bytes: usize,
    pub width: u32,
    pub height: u32,
    pub mime: String,
    /// Original filename as submitted. Not validated.
    pub original: String,
}

/// Photo storage backend trait.
#[async_trait]
pub trait PhotoStore: Send + Sync {
    /// Count photos already stored for a property. A property with no
    /// directory yet has zero photos.
    async fn count_existing(&self, property: &PropertyId) -> PhotoResult<usize>;

    /// Write an artifact under a fresh, collision-resistant name.
    async fn persist(
        &self,
        property: &PropertyId,
        artifact: &EncodedArtifact,
        original: &str,
    ) -> PhotoResult<StoredImageRecord>;

    /// Delete a stored photo by its relative path. Missing files are not an error.
    async fn remove(&self, relative_path: &str) -> PhotoResult<()>;

    /// Read a stored photo by its relative path.
    async fn read(&self, relative_path: &str) -> PhotoResult<Option<Vec<u8>>>;

    /// Get the storage scheme (e.g., "local").
    fn scheme(&self) -> &'static str;
}

/// Local filesystem storage.
pub struct LocalPhotoStore {
    /// Root directory; one subdirectory per property.
    base_path: PathBuf,
}

impl LocalPhotoStore {
    /// Create a new local photo store.
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Resolve the directory for a property.
    ///
    /// `PropertyId` already forbids separators; the lexical containment
    /// check below holds independently of that grammar.
    fn property_dir(&self, property: &PropertyId) -> PhotoResult<PathBuf> {
        let dir = self.base_path.join(property.as_str());
        ensure_strict_descendant(&self.base_path, &dir)?;
        Ok(dir)
    }

    /// Resolve a relative storage path, rejecting anything that is not a
    /// plain sequence of normal components.
    fn resolve_relative(&self, relative_path: &str) -> PhotoResult<PathBuf> {
        if relative_path.is_empty() || relative_path.contains('\0') || relative_path.contains('\\')
        {
            return Err(traversal(relative_path));
        }
        for component in Path::new(relative_path).components() {
            if !matches!(component, Component::Normal(_)) {
                return Err(traversal(relative_path));
            }
        }
        let path = self.base_path.join(relative_path);
        ensure_strict_descendant(&self.base_path, &path)?;
        Ok(path)
    }
}

#[async_trait]
impl PhotoStore for LocalPhotoStore {
    async fn count_existing(&self, property: &PropertyId) -> PhotoResult<usize> {
        let dir = self.property_dir(property)?;

        let mut entries = match fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => {
                return Err(PhotoError::processing(
                    anyhow::Error::new(e).context("failed to list property directory"),
                ));
            }
        };

        let mut count = 0;
        while let Some(entry) = entries
            .next_entry()
            .await
            .context("failed to read property directory entry")
            .map_err(PhotoError::processing)?
        {
            let file_type = entry
                .file_type()
                .await
                .context("failed to stat property directory entry")
                .map_err(PhotoError::processing)?;
            if file_type.is_file() {
                count += 1;
            }
        }

        debug!(property = %property, count, "counted stored photos");
        Ok(count)
    }

    async fn persist(
        &self,
        property: &PropertyId,
        artifact: &EncodedArtifact,
        original: &str,
    ) -> PhotoResult<StoredImageRecord> {
        let dir = self.property_dir(property)?;
        fs::create_dir_all(&dir)
            .await
            .context("failed to create property directory")
            .map_err(PhotoError::processing)?;

        let filename = generate_filename(artifact.format);
        let path = dir.join(&filename);

        write_new(&path, &artifact.bytes)
            .await
            .map_err(PhotoError::processing)?;

        let relative = format!("{}/{}", property.as_str(), filename);
        debug!(path = %relative, size = artifact.len(), "photo written");

        Ok(StoredImageRecord {
            path: relative,
            bytes: artifact.len(),
            width: artifact.width,
            height: artifact.height,
            mime: artifact.format.mime().to_string(),
            original: original.to_string(),
        })
    }

    async fn remove(&self, relative_path: &str) -> PhotoResult<()> {
        let path = self.resolve_relative(relative_path)?;
        match fs::remove_file(&path).await {
            Ok(()) => {
                debug!(path = %relative_path, "photo deleted");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!(path = %relative_path, "photo not found for deletion");
                Ok(())
            }
            Err(e) => Err(PhotoError::processing(
                anyhow::Error::new(e).context("failed to delete photo"),
            )),
        }
    }

    async fn read(&self, relative_path: &str) -> PhotoResult<Option<Vec<u8>>> {
        let path = self.resolve_relative(relative_path)?;
        match fs::read(&path).await {
            Ok(data) => Ok(Some(data)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(PhotoError::processing(
                anyhow::Error::new(e).context("failed to read photo"),
            )),
        }
    }

    fn scheme(&self) -> &'static str {
        "local"
    }
}

impl std::fmt::Debug for LocalPhotoStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalPhotoStore")
            .field("base_path", &self.base_path)
            .finish()
    }
}

/// Create `path` exclusively and write `data` to it.
///
/// A failed write removes the file it created; an existing file is never
/// touched.
async fn write_new(path: &Path, data: &[u8]) -> anyhow::Result<()> {
    let mut file = fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .await
        .context("failed to create photo file")?;

    let written = async {
        file.write_all(data).await?;
        file.flush().await?;
        file.sync_all().await
    }
    .await;

    if let Err(e) = written {
        drop(file);
        if let Err(cleanup) = fs::remove_file(path).await {
            warn!(error = %cleanup, path = ?path, "failed to remove partial photo");
        }
        return Err(anyhow::Error::new(e).context("failed to write photo file"));
    }
    Ok(())
}

/// Nanosecond timestamp plus 64 random bits, e.g. `1760000000123456789-9f86d081884c7d65.jpg`.
pub(crate) fn generate_filename(format: OutputFormat) -> String {
    let nanos = chrono::Utc::now()
        .timestamp_nanos_opt()
        .unwrap_or(i64::MAX);
    let suffix: [u8; 8] = rand::random();
    format!("{nanos}-{}.{}", hex::encode(suffix), format.extension())
}

fn traversal(path: &str) -> PhotoError {
    PhotoError::processing(anyhow::anyhow!(
        "storage path rejected: {}",
        path.escape_debug()
    ))
}

/// Fail unless `path` lies strictly below `base` after lexical normalization.
fn ensure_strict_descendant(base: &Path, path: &Path) -> PhotoResult<()> {
    let base = normalize_path(base);
    let path = normalize_path(path);
    if path == base || !path.starts_with(&base) {
        return Err(traversal(&path.to_string_lossy()));
    }
    Ok(())
}

/// Normalize a path by resolving `..` components without filesystem access.
fn normalize_path(path: &Path) -> PathBuf {
    let mut components = Vec::new();
    for component in path.components() {
        match component {
            Component::ParentDir => match components.last() {
                Some(Component::Normal(_)) => {
                    components.pop();
                }
                // `..` at the root stays at the root
                Some(Component::RootDir | Component::Prefix(_)) => {}
                // Leading `..` runs of a relative path are all kept
                _ => components.push(component),
            },
            Component::CurDir => {} // Skip `.`
            c => components.push(c),
        }
    }
    components.iter().collect()
}

#[cfg(test)]
// Tests are allowed to use unwrap/expect freely.
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn artifact(format: OutputFormat) -> EncodedArtifact {
        EncodedArtifact {
            bytes: vec![7; 1234],
            format,
            width: 40,
            height: 30,
            quality: 80,
            attempts: 1,
        }
    }

    fn prop(id: &str) -> PropertyId {
        PropertyId::parse(id).unwrap()
    }

    #[test]
    fn normalize_path_resolves_parent_components() {
        assert_eq!(normalize_path(Path::new("/a/b/../c")), PathBuf::from("/a/c"));
        assert_eq!(normalize_path(Path::new("/a/b/../../c")), PathBuf::from("/c"));
        assert_eq!(normalize_path(Path::new("/a/./b/c")), PathBuf::from("/a/b/c"));
        assert_eq!(normalize_path(Path::new("/../x")), PathBuf::from("/x"));
        assert_eq!(normalize_path(Path::new("../x")), PathBuf::from("../x"));
    }

    #[test]
    fn descendant_check_is_strict() {
        let base = Path::new("/srv/uploads");
        assert!(ensure_strict_descendant(base, Path::new("/srv/uploads/p1")).is_ok());
        assert!(ensure_strict_descendant(base, Path::new("/srv/uploads")).is_err());
        assert!(ensure_strict_descendant(base, Path::new("/srv/uploads/.")).is_err());
        assert!(ensure_strict_descendant(base, Path::new("/srv/uploads/../etc")).is_err());
        assert!(ensure_strict_descendant(base, Path::new("/srv/uploads2")).is_err());
    }

    #[test]
    fn relative_base_still_contains() {
        let base = Path::new("./uploads");
        assert!(ensure_strict_descendant(base, Path::new("./uploads/p1")).is_ok());
        assert!(ensure_strict_descendant(base, Path::new("./uploads/p1/../../x")).is_err());
    }

    #[test]
    fn leading_parent_runs_are_kept() {
        assert_eq!(normalize_path(Path::new("../../up")), PathBuf::from("../../up"));
        assert_eq!(normalize_path(Path::new("../../../up/p")), PathBuf::from("../../../up/p"));
        assert_eq!(normalize_path(Path::new("../x/../..")), PathBuf::from("../.."));
    }

    #[test]
    fn base_above_cwd_rejects_escapes() {
        let base = Path::new("../../up");
        assert!(ensure_strict_descendant(base, Path::new("../../up/p")).is_ok());
        assert!(ensure_strict_descendant(base, Path::new("../../../up/p")).is_err());
        assert!(ensure_strict_descendant(base, Path::new("../../up/../up2/p")).is_err());
    }

    #[test]
    fn filenames_are_unique_and_typed() {
        let a = generate_filename(OutputFormat::Lossy);
        let b = generate_filename(OutputFormat::Lossy);
        assert_ne!(a, b);
        assert!(a.ends_with(".jpg"));
        assert!(generate_filename(OutputFormat::AlphaPreserving).ends_with(".png"));
        let (stamp, rest) = a.split_once('-').unwrap();
        assert!(stamp.chars().all(|c| c.is_ascii_digit()));
        assert_eq!(rest.len(), 16 + ".jpg".len());
    }

    #[tokio::test]
    async fn missing_directory_counts_zero() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalPhotoStore::new(dir.path());
        assert_eq!(store.count_existing(&prop("fresh")).await.unwrap(), 0);
        assert!(!dir.path().join("fresh").exists());
    }

    #[tokio::test]
    async fn persist_then_count() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalPhotoStore::new(dir.path());
        let property = prop("prop-1");

        let record = store
            .persist(&property, &artifact(OutputFormat::Lossy), "kitchen.HEIC.jpg")
            .await
            .unwrap();

        assert!(record.path.starts_with("prop-1/"));
        assert!(!Path::new(&record.path).is_absolute());
        assert_eq!(record.bytes, 1234);
        assert_eq!((record.width, record.height), (40, 30));
        assert_eq!(record.mime, "image/jpeg");
        assert_eq!(record.original, "kitchen.HEIC.jpg");
        assert_eq!(std::fs::read(dir.path().join(&record.path)).unwrap().len(), 1234);

        store
            .persist(&property, &artifact(OutputFormat::AlphaPreserving), "logo.png")
            .await
            .unwrap();
        assert_eq!(store.count_existing(&property).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn count_ignores_subdirectories() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalPhotoStore::new(dir.path());
        std::fs::create_dir_all(dir.path().join("p").join("nested")).unwrap();
        std::fs::write(dir.path().join("p").join("one.jpg"), b"x").unwrap();
        assert_eq!(store.count_existing(&prop("p")).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn remove_and_read_reject_traversal() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalPhotoStore::new(dir.path().join("uploads"));
        std::fs::write(dir.path().join("secret"), b"s").unwrap();

        for bad in ["../secret", "p/../../secret", "/etc/passwd", "", "p\\..\\x"] {
            assert_eq!(store.read(bad).await.unwrap_err().code(), "IMG_003", "{bad}");
            assert_eq!(store.remove(bad).await.unwrap_err().code(), "IMG_003", "{bad}");
        }
        assert!(dir.path().join("secret").exists());
    }

    #[tokio::test]
    async fn remove_deletes_and_tolerates_missing() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalPhotoStore::new(dir.path());
        let property = prop("p");
        let record = store
            .persist(&property, &artifact(OutputFormat::Lossy), "a.jpg")
            .await
            .unwrap();

        assert!(store.read(&record.path).await.unwrap().is_some());
        store.remove(&record.path).await.unwrap();
        assert!(store.read(&record.path).await.unwrap().is_none());
        store.remove(&record.path).await.unwrap();
        assert_eq!(store.count_existing(&property).await.unwrap(), 0);
    }

    #[test]
    fn record_serializes_with_public_keys() {
        let record = StoredImageRecord {
            path: "p/1-ab.jpg".to_string(),
            bytes: 10,
            width: 2,
            height: 1,
            mime: "image/jpeg".to_string(),
            original: "a.jpg".to_string(),
        };
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "path": "p/1-ab.jpg",
                "bytes": 10,
                "width": 2,
                "height": 1,
                "mime": "image/jpeg",
                "original": "a.jpg"
            })
        );
    }
}
