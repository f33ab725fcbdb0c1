//! File System Access Implementation using Tokio

use async_trait::async_trait;
use bridge_traits::{
    error::{BridgeError, Result},
    storage::{FileMetadata, FileSystemAccess},
};
use bytes::Bytes;
use std::path::Path;
use tokio::fs;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing::debug;

/// Tokio-based file system implementation
///
/// Provides async file I/O operations using `tokio::fs`. Sidecar writes use
/// `create_new` so an existing lyric file is never truncated.
#[derive(Debug, Clone, Default)]
pub struct TokioFileSystem;

impl TokioFileSystem {
    pub fn new() -> Self {
        Self
    }

    /// Convert std::io::Error to BridgeError
    fn map_io_error(e: std::io::Error) -> BridgeError {
        BridgeError::Io(e)
    }
}

fn unix_secs(time: std::io::Result<std::time::SystemTime>) -> Option<i64> {
    time.ok()
        .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
        .map(|d| d.as_secs() as i64)
}

#[async_trait]
impl FileSystemAccess for TokioFileSystem {
    async fn exists(&self, path: &Path) -> Result<bool> {
        fs::try_exists(path).await.map_err(Self::map_io_error)
    }

    async fn metadata(&self, path: &Path) -> Result<FileMetadata> {
        let metadata = fs::metadata(path).await.map_err(Self::map_io_error)?;

        Ok(FileMetadata {
            size: metadata.len(),
            created_at: unix_secs(metadata.created()),
            modified_at: unix_secs(metadata.modified()),
            is_directory: metadata.is_dir(),
            is_file: metadata.is_file(),
        })
    }

    async fn read_file(&self, path: &Path) -> Result<Bytes> {
        let data = fs::read(path).await.map_err(Self::map_io_error)?;
        debug!(path = ?path, size = data.len(), "Read file");
        Ok(Bytes::from(data))
    }

    async fn read_head(&self, path: &Path, limit: usize) -> Result<Bytes> {
        let file = fs::File::open(path).await.map_err(Self::map_io_error)?;
        let mut buffer = Vec::with_capacity(limit);
        file.take(limit as u64)
            .read_to_end(&mut buffer)
            .await
            .map_err(Self::map_io_error)?;
        Ok(Bytes::from(buffer))
    }

    async fn write_new_file(&self, path: &Path, data: Bytes) -> Result<()> {
        let mut file = fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(path)
            .await
            .map_err(Self::map_io_error)?;

        file.write_all(data.as_ref())
            .await
            .map_err(Self::map_io_error)?;
        file.flush().await.map_err(Self::map_io_error)?;

        debug!(path = ?path, size = data.len(), "Wrote file");
        Ok(())
    }

    async fn delete_file(&self, path: &Path) -> Result<()> {
        fs::remove_file(path).await.map_err(Self::map_io_error)?;
        debug!(path = ?path, "Deleted file");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_write_new_and_read() {
        let dir = tempfile::tempdir().unwrap();
        let fs = TokioFileSystem::new();
        let path = dir.path().join("song.lrc");

        let data = Bytes::from("[00:01.00]hello");
        fs.write_new_file(&path, data.clone()).await.unwrap();

        let read_data = fs.read_file(&path).await.unwrap();
        assert_eq!(data, read_data);
        assert!(fs.exists(&path).await.unwrap());
    }

    #[tokio::test]
    async fn test_write_new_refuses_to_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let fs = TokioFileSystem::new();
        let path = dir.path().join("song.txt");

        fs.write_new_file(&path, Bytes::from("original")).await.unwrap();
        let err = fs
            .write_new_file(&path, Bytes::from("replacement"))
            .await
            .unwrap_err();

        assert!(err.is_already_exists());
        assert_eq!(fs.read_file(&path).await.unwrap(), Bytes::from("original"));
    }

    #[tokio::test]
    async fn test_read_head_limits_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let fs = TokioFileSystem::new();
        let path = dir.path().join("blob.bin");
        std::fs::write(&path, vec![7u8; 100]).unwrap();

        assert_eq!(fs.read_head(&path, 16).await.unwrap().len(), 16);
        assert_eq!(fs.read_head(&path, 1000).await.unwrap().len(), 100);
    }

    #[tokio::test]
    async fn test_delete_and_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let fs = TokioFileSystem::new();
        let path = dir.path().join("gone.txt");
        std::fs::write(&path, b"x").unwrap();

        let meta = fs.metadata(&path).await.unwrap();
        assert!(meta.is_file);
        assert_eq!(meta.size, 1);

        fs.delete_file(&path).await.unwrap();
        assert!(!fs.exists(&path).await.unwrap());
        assert!(fs.delete_file(&path).await.unwrap_err().is_not_found());

        let dir_meta = fs.metadata(dir.path()).await.unwrap();
        assert!(dir_meta.is_directory);
    }
}
