//! Storage and File System Abstractions
//!
//! Provides the file I/O surface used by the classifier, the metadata
//! extractor and the lyric sidecar writer.

use async_trait::async_trait;
use bytes::Bytes;
use std::path::Path;

use crate::error::Result;

/// File metadata information
#[derive(Debug, Clone)]
pub struct FileMetadata {
    pub size: u64,
    pub created_at: Option<i64>,
    pub modified_at: Option<i64>,
    pub is_directory: bool,
    pub is_file: bool,
}

/// File system access trait
///
/// Abstracts file I/O so that lyric tasks can be exercised against an
/// in-memory fake.
///
/// # Sidecar writes
///
/// [`write_new_file`](FileSystemAccess::write_new_file) must fail with an
/// `AlreadyExists` I/O error instead of truncating when the target is already
/// present. Lyric sidecars are never overwritten.
///
/// # Example
///
/// ```ignore
/// use bridge_traits::storage::FileSystemAccess;
///
/// async fn save_lyrics(fs: &dyn FileSystemAccess, path: &Path, text: &str) -> Result<()> {
///     match fs.write_new_file(path, Bytes::copy_from_slice(text.as_bytes())).await {
///         Err(e) if e.is_already_exists() => Ok(()),
///         other => other,
///     }
/// }
/// ```
#[async_trait]
pub trait FileSystemAccess: Send + Sync {
    /// Check if a file or directory exists
    async fn exists(&self, path: &Path) -> Result<bool>;

    /// Get metadata for a file or directory
    async fn metadata(&self, path: &Path) -> Result<FileMetadata>;

    /// Read entire file contents into memory
    async fn read_file(&self, path: &Path) -> Result<Bytes>;

    /// Read at most `limit` bytes from the start of a file
    ///
    /// Used for content sniffing. A short file yields fewer bytes.
    async fn read_head(&self, path: &Path, limit: usize) -> Result<Bytes>;

    /// Create a new file with the given contents
    ///
    /// Fails with `AlreadyExists` if the path is taken.
    async fn write_new_file(&self, path: &Path, data: Bytes) -> Result<()>;

    /// Delete a file
    async fn delete_file(&self, path: &Path) -> Result<()>;
}
