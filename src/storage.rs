//! Scratch storage for uploaded images

use crate::config::StorageConfig;
use crate::error::Result;
use crate::types::UploadedImage;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Directory uploads are written to before they are decoded.
///
/// Every upload gets a fresh UUID file name. The client filename only
/// contributes a sanitized extension.
#[derive(Debug, Clone)]
pub struct ScratchStore {
    dir: PathBuf,
    retain: bool,
}

impl ScratchStore {
    pub fn new(config: &StorageConfig) -> Self {
        Self {
            dir: PathBuf::from(&config.uploads_dir),
            retain: config.retain_uploads,
        }
    }

    /// Create the scratch directory if it does not exist yet
    pub fn init(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.dir)?;
        info!(dir = %self.dir.display(), retain = self.retain, "Scratch storage ready");
        Ok(())
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write the upload to a new, uniquely named file.
    ///
    /// The returned guard deletes the file when dropped unless uploads are
    /// retained, so cleanup also happens when the request is cancelled.
    pub async fn persist(&self, upload: &UploadedImage) -> Result<ScratchFile> {
        let id = Uuid::new_v4();
        let file_name = match upload.safe_extension() {
            Some(ext) => format!("{}.{}", id, ext),
            None => id.to_string(),
        };
        // guard exists before the write so a cancelled or failed write is cleaned up too
        let file = ScratchFile {
            path: self.dir.join(file_name),
            remove_on_drop: !self.retain,
        };

        tokio::fs::write(&file.path, &upload.bytes).await?;

        debug!(
            path = %file.path.display(),
            client_name = upload.file_name.as_deref().unwrap_or(""),
            bytes = upload.bytes.len(),
            "Upload persisted"
        );

        Ok(file)
    }
}

/// A persisted upload. Removed from disk on drop when uploads are not retained.
#[derive(Debug)]
pub struct ScratchFile {
    path: PathBuf,
    remove_on_drop: bool,
}

impl ScratchFile {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ScratchFile {
    fn drop(&mut self) {
        if !self.remove_on_drop {
            return;
        }
        match std::fs::remove_file(&self.path) {
            Ok(()) => debug!(path = %self.path.display(), "Scratch file removed"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(path = %self.path.display(), error = %e, "Failed to remove scratch file"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Bytes;
    use std::collections::HashSet;
    use tempfile::tempdir;

    fn store(dir: &Path, retain: bool) -> ScratchStore {
        ScratchStore::new(&StorageConfig {
            uploads_dir: dir.to_string_lossy().into_owned(),
            retain_uploads: retain,
        })
    }

    #[test]
    fn test_init_creates_directory() {
        let root = tempdir().unwrap();
        let nested = root.path().join("a").join("uploads");
        let store = store(&nested, true);

        store.init().unwrap();
        assert!(nested.is_dir());
        // idempotent
        store.init().unwrap();
    }

    #[tokio::test]
    async fn test_persist_writes_bytes() {
        let root = tempdir().unwrap();
        let store = store(root.path(), true);

        let upload = UploadedImage::new(Some("dog.png".to_string()), Bytes::from_static(b"pixels"));
        let file = store.persist(&upload).await.unwrap();
        let path = file.path();

        assert_eq!(path.parent().unwrap(), root.path());
        assert_eq!(path.extension().unwrap(), "png");
        assert_eq!(std::fs::read(path).unwrap(), b"pixels");
    }

    #[tokio::test]
    async fn test_same_client_name_gets_unique_paths() {
        let root = tempdir().unwrap();
        let store = store(root.path(), true);

        let mut paths = HashSet::new();
        for i in 0..10u8 {
            let upload = UploadedImage::new(Some("cat.jpg".to_string()), Bytes::from(vec![i]));
            paths.insert(store.persist(&upload).await.unwrap().path().to_path_buf());
        }
        assert_eq!(paths.len(), 10);
    }

    #[tokio::test]
    async fn test_traversal_name_stays_inside_dir() {
        let root = tempdir().unwrap();
        let uploads = root.path().join("uploads");
        let store = store(&uploads, true);
        store.init().unwrap();

        let upload = UploadedImage::new(
            Some("../../escape.png".to_string()),
            Bytes::from_static(b"x"),
        );
        let file = store.persist(&upload).await.unwrap();

        assert_eq!(file.path().parent().unwrap(), uploads.as_path());
        assert!(!root.path().join("escape.png").exists());
    }

    #[tokio::test]
    async fn test_drop_respects_retention() {
        let root = tempdir().unwrap();
        let upload = UploadedImage::new(None, Bytes::from_static(b"x"));

        let keep = store(root.path(), true);
        let kept = keep.persist(&upload).await.unwrap();
        let kept_path = kept.path().to_path_buf();
        drop(kept);
        assert!(kept_path.exists());

        let discard = store(root.path(), false);
        let dropped = discard.persist(&upload).await.unwrap();
        let dropped_path = dropped.path().to_path_buf();
        assert!(dropped_path.exists());
        drop(dropped);
        assert!(!dropped_path.exists());
    }

    #[tokio::test]
    async fn test_drop_after_external_removal_does_not_panic() {
        let root = tempdir().unwrap();
        let store = store(root.path(), false);
        let file = store
            .persist(&UploadedImage::new(None, Bytes::from_static(b"x")))
            .await
            .unwrap();

        std::fs::remove_file(file.path()).unwrap();
        drop(file);
    }
}
