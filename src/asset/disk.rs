/// Disk-based asset storage backend
use crate::{
    asset::{is_content_hash, AssetBackend, AssetKind},
    error::{YggError, YggResult},
};
use async_trait::async_trait;
use std::path::PathBuf;
use tokio::fs;

/// Disk storage backend
///
/// Stores blobs on the local filesystem with directory sharding
/// based on hash prefixes to prevent too many files in one directory.
#[derive(Clone)]
pub struct DiskAssetBackend {
    base_path: PathBuf,
}

impl DiskAssetBackend {
    /// Create a new disk storage backend
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    /// Get the file path for a blob
    ///
    /// Uses directory sharding: {base}/{kind}/{first2chars}/{hash}.png
    fn blob_path(&self, kind: AssetKind, hash: &str) -> YggResult<PathBuf> {
        if !is_content_hash(hash) {
            return Err(YggError::NotFound(format!("No such {}: {}", kind, hash)));
        }

        Ok(self
            .base_path
            .join(kind.as_str())
            .join(&hash[0..2])
            .join(format!("{}.png", hash)))
    }
}

#[async_trait]
impl AssetBackend for DiskAssetBackend {
    async fn put(&self, kind: AssetKind, hash: &str, data: Vec<u8>) -> YggResult<()> {
        let blob_path = self.blob_path(kind, hash)?;
        if fs::try_exists(&blob_path).await.unwrap_or(false) {
            return Ok(());
        }

        if let Some(parent) = blob_path.parent() {
            fs::create_dir_all(parent).await.map_err(|e| {
                YggError::AssetStorage(format!("Failed to create blob directory: {}", e))
            })?;
        }

        // Concurrent writers of the same hash carry identical bytes, so
        // whichever rename lands last is harmless.
        let tmp_path = blob_path.with_extension(format!("{}.tmp", uuid::Uuid::new_v4()));
        fs::write(&tmp_path, data).await.map_err(|e| {
            YggError::AssetStorage(format!("Failed to write {} {}: {}", kind, hash, e))
        })?;
        if let Err(e) = fs::rename(&tmp_path, &blob_path).await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(YggError::AssetStorage(format!(
                "Failed to commit {} {}: {}",
                kind, hash, e
            )));
        }

        Ok(())
    }

    async fn get(&self, kind: AssetKind, hash: &str) -> YggResult<Option<Vec<u8>>> {
        let blob_path = match self.blob_path(kind, hash) {
            Ok(path) => path,
            Err(_) => return Ok(None),
        };

        match fs::read(&blob_path).await {
            Ok(data) => Ok(Some(data)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(YggError::AssetStorage(format!(
                "Failed to read {} {}: {}",
                kind, hash, e
            ))),
        }
    }

    async fn delete(&self, kind: AssetKind, hash: &str) -> YggResult<()> {
        let blob_path = self.blob_path(kind, hash)?;

        match fs::remove_file(&blob_path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(YggError::AssetStorage(format!(
                "Failed to delete {} {}: {}",
                kind, hash, e
            ))),
        }
    }

    async fn exists(&self, kind: AssetKind, hash: &str) -> YggResult<bool> {
        match self.blob_path(kind, hash) {
            Ok(path) => Ok(fs::try_exists(path).await.unwrap_or(false)),
            Err(_) => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn hash(c: char) -> String {
        c.to_string().repeat(64)
    }

    #[tokio::test]
    async fn test_put_and_get_blob() {
        let dir = tempdir().unwrap();
        let backend = DiskAssetBackend::new(dir.path().to_path_buf());

        let data = b"png bytes".to_vec();
        backend.put(AssetKind::Skin, &hash('a'), data.clone()).await.unwrap();

        let retrieved = backend.get(AssetKind::Skin, &hash('a')).await.unwrap();
        assert_eq!(retrieved, Some(data));

        // Skins and capes are separate namespaces
        assert_eq!(backend.get(AssetKind::Cape, &hash('a')).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_put_keeps_existing_blob() {
        let dir = tempdir().unwrap();
        let backend = DiskAssetBackend::new(dir.path().to_path_buf());

        backend.put(AssetKind::Skin, &hash('b'), b"first".to_vec()).await.unwrap();
        backend.put(AssetKind::Skin, &hash('b'), b"second".to_vec()).await.unwrap();

        let retrieved = backend.get(AssetKind::Skin, &hash('b')).await.unwrap();
        assert_eq!(retrieved, Some(b"first".to_vec()));
    }

    #[tokio::test]
    async fn test_delete_blob() {
        let dir = tempdir().unwrap();
        let backend = DiskAssetBackend::new(dir.path().to_path_buf());

        backend.put(AssetKind::Cape, &hash('c'), b"cape".to_vec()).await.unwrap();
        assert!(backend.exists(AssetKind::Cape, &hash('c')).await.unwrap());

        backend.delete(AssetKind::Cape, &hash('c')).await.unwrap();
        assert!(!backend.exists(AssetKind::Cape, &hash('c')).await.unwrap());

        // Deleting again is fine
        backend.delete(AssetKind::Cape, &hash('c')).await.unwrap();
    }

    #[tokio::test]
    async fn test_rejects_non_hash_keys() {
        let dir = tempdir().unwrap();
        let backend = DiskAssetBackend::new(dir.path().to_path_buf());

        assert!(backend.put(AssetKind::Skin, "../escape", vec![1]).await.is_err());
        assert_eq!(backend.get(AssetKind::Skin, "../escape").await.unwrap(), None);
        assert!(!backend.exists(AssetKind::Skin, "../escape").await.unwrap());
    }

    #[tokio::test]
    async fn test_directory_sharding() {
        let dir = tempdir().unwrap();
        let backend = DiskAssetBackend::new(dir.path().to_path_buf());

        let path = backend.blob_path(AssetKind::Skin, &hash('d')).unwrap();
        assert!(path.to_string_lossy().contains("/skin/dd/"));
        assert!(path.to_string_lossy().ends_with(".png"));
    }

    #[tokio::test]
    async fn test_concurrent_identical_puts() {
        let dir = tempdir().unwrap();
        let backend = DiskAssetBackend::new(dir.path().to_path_buf());
        let data = vec![7u8; 4096];

        let mut handles = Vec::new();
        for _ in 0..8 {
            let backend = backend.clone();
            let data = data.clone();
            handles.push(tokio::spawn(async move {
                backend.put(AssetKind::Skin, &hash('e'), data).await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let retrieved = backend.get(AssetKind::Skin, &hash('e')).await.unwrap();
        assert_eq!(retrieved, Some(data));

        // No temp files are left behind
        let shard = dir.path().join("skin").join("ee");
        assert_eq!(std::fs::read_dir(shard).unwrap().count(), 1);
    }
}
