//! Per-execution view of an audio file and its lyric sidecars.

use std::path::{Path, PathBuf};

use bridge_traits::storage::FileSystemAccess;
use serde::{Deserialize, Serialize};

use crate::classifier::sidecar_paths;
use crate::error::Result;
use crate::extractor::{AudioTags, TagReader};

/// Tags plus local lyric state for one audio file
///
/// Built fresh for every task execution. The filesystem is the source of
/// truth, so nothing here is cached between runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackMetadata {
    pub path: PathBuf,
    pub title: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
    /// Rounded seconds, 0 when unknown
    pub duration_seconds: i64,
    pub has_plain_lyrics: bool,
    pub plain_lyrics_path: PathBuf,
    pub has_synced_lyrics: bool,
    pub synced_lyrics_path: PathBuf,
}

impl TrackMetadata {
    /// Read tags through `reader` and probe the sidecars through `fs`.
    pub async fn inspect(
        path: &Path,
        reader: &dyn TagReader,
        fs: &dyn FileSystemAccess,
    ) -> Result<Self> {
        let tags = reader.read_tags(path).await?;
        Self::from_tags(path, tags, fs).await
    }

    /// Build from tags that were already extracted.
    pub async fn from_tags(path: &Path, tags: AudioTags, fs: &dyn FileSystemAccess) -> Result<Self> {
        let sidecars = sidecar_paths(path)?;
        let has_plain_lyrics = fs.exists(&sidecars.plain).await?;
        let has_synced_lyrics = fs.exists(&sidecars.synced).await?;

        Ok(Self {
            path: path.to_path_buf(),
            title: tags.title,
            artist: tags.artist,
            album: tags.album,
            duration_seconds: tags.duration.as_secs_f64().round() as i64,
            has_plain_lyrics,
            plain_lyrics_path: sidecars.plain,
            has_synced_lyrics,
            synced_lyrics_path: sidecars.synced,
        })
    }

    pub fn has_both_lyrics(&self) -> bool {
        self.has_plain_lyrics && self.has_synced_lyrics
    }

    /// Title and artist are both known.
    pub fn has_search_signal(&self) -> bool {
        self.title.is_some() && self.artist.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bridge_traits::storage::FileMetadata;
    use bytes::Bytes;
    use std::collections::HashSet;
    use std::time::Duration;

    struct FixedTags(AudioTags);

    #[async_trait]
    impl TagReader for FixedTags {
        async fn read_tags(&self, _path: &Path) -> Result<AudioTags> {
            Ok(self.0.clone())
        }
    }

    struct ExistingPaths(HashSet<PathBuf>);

    #[async_trait]
    impl FileSystemAccess for ExistingPaths {
        async fn exists(&self, path: &Path) -> bridge_traits::error::Result<bool> {
            Ok(self.0.contains(path))
        }
        async fn metadata(&self, _path: &Path) -> bridge_traits::error::Result<FileMetadata> {
            unimplemented!()
        }
        async fn read_file(&self, _path: &Path) -> bridge_traits::error::Result<Bytes> {
            unimplemented!()
        }
        async fn read_head(&self, _path: &Path, _limit: usize) -> bridge_traits::error::Result<Bytes> {
            unimplemented!()
        }
        async fn write_new_file(&self, _path: &Path, _data: Bytes) -> bridge_traits::error::Result<()> {
            unimplemented!()
        }
        async fn delete_file(&self, _path: &Path) -> bridge_traits::error::Result<()> {
            unimplemented!()
        }
    }

    #[tokio::test]
    async fn test_inspect_reports_sidecars() {
        let reader = FixedTags(AudioTags {
            title: Some("X".to_string()),
            artist: Some("Y".to_string()),
            album: None,
            duration: Duration::from_millis(180_600),
            ..AudioTags::default()
        });
        let fs = ExistingPaths(HashSet::from([PathBuf::from("/music/a/song.txt")]));

        let track = TrackMetadata::inspect(Path::new("/music/a/song.flac"), &reader, &fs)
            .await
            .unwrap();

        assert_eq!(track.duration_seconds, 181);
        assert!(track.has_plain_lyrics);
        assert!(!track.has_synced_lyrics);
        assert!(!track.has_both_lyrics());
        assert!(track.has_search_signal());
        assert_eq!(track.synced_lyrics_path, PathBuf::from("/music/a/song.lrc"));
    }

    #[tokio::test]
    async fn test_missing_artist_has_no_search_signal() {
        let reader = FixedTags(AudioTags {
            title: Some("X".to_string()),
            ..AudioTags::default()
        });
        let fs = ExistingPaths(HashSet::from([
            PathBuf::from("/music/b.txt"),
            PathBuf::from("/music/b.lrc"),
        ]));

        let track = TrackMetadata::inspect(Path::new("/music/b.mp3"), &reader, &fs)
            .await
            .unwrap();

        assert!(!track.has_search_signal());
        assert!(track.has_both_lyrics());
        assert_eq!(track.duration_seconds, 0);
    }
}
