use std::path::{Path, PathBuf};

use tokio::fs::{self, File};
use uuid::Uuid;

use crate::error::StorageError;

/// Owns the per-process temp root that chunk backing files live under.
///
/// File layout follows `<temp_root>/chunk_<download_id>_<index>.tmp`.
#[derive(Debug, Clone)]
pub struct BackingStore {
    temp_root: PathBuf,
}

impl BackingStore {
    /// Creates (if missing) and wraps a temp root directory.
    pub async fn new(temp_root: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let temp_root = temp_root.into();
        fs::create_dir_all(&temp_root).await?;
        Ok(Self { temp_root })
    }

    /// Path of the backing file for one chunk of a download.
    pub fn chunk_path(&self, download_id: Uuid, index: u32) -> PathBuf {
        self.temp_root
            .join(format!("chunk_{download_id}_{index}.tmp"))
    }

    /// Opens (creating and truncating) the backing file for a chunk, ready for sequential writes.
    pub async fn create_chunk_file(&self, download_id: Uuid, index: u32) -> Result<File, StorageError> {
        let path = self.chunk_path(download_id, index);
        let file = File::create(&path).await?;
        Ok(file)
    }

    /// Opens an existing chunk backing file for reading (used by merge).
    pub async fn open_chunk_file(&self, download_id: Uuid, index: u32) -> Result<File, StorageError> {
        let path = self.chunk_path(download_id, index);
        let file = File::open(&path).await?;
        Ok(file)
    }

    /// Removes one chunk's backing file. Missing files are not an error — cleanup is allowed to
    /// run more than once.
    pub async fn remove_chunk(&self, download_id: Uuid, index: u32) -> Result<(), StorageError> {
        let path = self.chunk_path(download_id, index);
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Removes every chunk backing file belonging to a download. Used on every transition into a
    /// terminal state (§4.4 Cleanup invariant).
    pub async fn remove_all(&self, download_id: Uuid, chunk_count: u32) -> Result<(), StorageError> {
        for index in 0..chunk_count {
            self.remove_chunk(download_id, index).await?;
        }
        Ok(())
    }

    /// The directory backing files are created under.
    pub fn root(&self) -> &Path {
        &self.temp_root
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn chunk_path_follows_layout() {
        let dir = tempfile::tempdir().unwrap();
        let store = BackingStore::new(dir.path()).await.unwrap();
        let id = Uuid::nil();
        let path = store.chunk_path(id, 3);
        assert_eq!(
            path.file_name().unwrap().to_str().unwrap(),
            format!("chunk_{id}_3.tmp")
        );
    }

    #[tokio::test]
    async fn remove_chunk_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let store = BackingStore::new(dir.path()).await.unwrap();
        let id = Uuid::new_v4();
        store.remove_chunk(id, 0).await.unwrap();
        store.remove_chunk(id, 0).await.unwrap();
    }

    #[tokio::test]
    async fn create_and_remove_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = BackingStore::new(dir.path()).await.unwrap();
        let id = Uuid::new_v4();
        let _file = store.create_chunk_file(id, 0).await.unwrap();
        assert!(store.chunk_path(id, 0).exists());
        store.remove_all(id, 1).await.unwrap();
        assert!(!store.chunk_path(id, 0).exists());
    }
}
