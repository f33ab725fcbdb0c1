//! # Lyric Tasks
//!
//! Handlers for the two lyric task types:
//!
//! - [`SyncLyricsTask`] (`lyrics:download`): resolve missing lyrics for an audio
//!   file from the catalog and write them next to it.
//! - [`DeleteLyricsTask`] (`lyrics:delete`): remove the sidecars of an audio
//!   file that disappeared.
//!
//! Both read everything they need from the filesystem at execution time, so a
//! task that waited in the queue acts on the current state of the library.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use bridge_traits::storage::FileSystemAccess;
use bytes::Bytes;
use core_metadata::classifier::{is_audio_file, is_sidecar_path, sidecar_paths};
use core_metadata::{
    AudioTags, LyricsProvider, LyricsQuery, LyricsRecord, LyricsResult, MetadataError,
    SearchParams, TagReader, TrackMetadata,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::task::{Task, TaskContext, TaskHandler, TaskOutcome};

/// Task type for lyric downloads
pub const DOWNLOAD_LYRICS: &str = "lyrics:download";

/// Task type for sidecar removal
pub const DELETE_LYRICS: &str = "lyrics:delete";

/// Payload shared by both lyric task types
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LyricsPayload {
    #[serde(rename = "Filepath")]
    pub filepath: PathBuf,
    /// Tags extracted by the producer; skips re-extraction when present
    #[serde(rename = "Metadata", default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<AudioTags>,
}

impl LyricsPayload {
    pub fn new(filepath: impl Into<PathBuf>) -> Self {
        Self {
            filepath: filepath.into(),
            metadata: None,
        }
    }

    pub fn with_metadata(mut self, tags: AudioTags) -> Self {
        self.metadata = Some(tags);
        self
    }

    /// Task id for this payload: the file path
    pub fn task_id(&self) -> String {
        self.filepath.display().to_string()
    }

    /// Build a task of `task_type` carrying this payload
    pub fn into_task(self, task_type: &str) -> Result<Task> {
        Task::json(task_type, self.task_id(), &self)
    }
}

/// Handler for [`DOWNLOAD_LYRICS`] tasks
///
/// 1. The path must still be an audio file, otherwise the task is skipped.
/// 2. Tags are read (or taken from the payload) and the sidecars probed.
/// 3. Both sidecars present: revoked.
/// 4. The catalog is queried: an exact lookup when title, artist, album and a
///    positive duration are known, a field search on title and artist
///    otherwise. Without title or artist the task is skipped.
/// 5. Instrumental tracks succeed without writing anything.
/// 6. Each non-empty variant that is missing locally is written with
///    create-new semantics; existing sidecars are never touched.
pub struct SyncLyricsTask {
    fs: Arc<dyn FileSystemAccess>,
    tags: Arc<dyn TagReader>,
    provider: Arc<dyn LyricsProvider>,
}

impl SyncLyricsTask {
    pub fn new(
        fs: Arc<dyn FileSystemAccess>,
        tags: Arc<dyn TagReader>,
        provider: Arc<dyn LyricsProvider>,
    ) -> Self {
        Self { fs, tags, provider }
    }

    /// Run the sync decision for one payload.
    pub async fn sync(&self, payload: LyricsPayload) -> TaskOutcome {
        let path = payload.filepath.as_path();

        match is_audio_file(self.fs.as_ref(), path).await {
            Ok(true) => {}
            Ok(false) => return TaskOutcome::skip("not an audio file"),
            Err(e) if e.is_not_found() => return TaskOutcome::skip("file no longer exists"),
            Err(e) => return TaskOutcome::retry(e),
        }

        let track = match self.inspect(path, payload.metadata).await {
            Ok(track) => track,
            Err(e) if e.is_not_found() => return TaskOutcome::skip("file no longer exists"),
            Err(e) => return TaskOutcome::skip(format!("unreadable track: {e}")),
        };

        if track.has_both_lyrics() {
            return TaskOutcome::revoke("lyrics already present");
        }

        let lyrics = match self.resolve(&track).await {
            Ok(lyrics) => lyrics,
            Err(outcome) => return outcome,
        };

        if lyrics.instrumental {
            info!(path = %path.display(), "Instrumental track, nothing to write");
            return TaskOutcome::Success;
        }

        let variants = [
            (
                "plain",
                &lyrics.plain_lyrics,
                track.has_plain_lyrics,
                &track.plain_lyrics_path,
            ),
            (
                "synced",
                &lyrics.synced_lyrics,
                track.has_synced_lyrics,
                &track.synced_lyrics_path,
            ),
        ];

        let mut written = 0;
        for (variant, content, present, sidecar) in variants {
            if content.is_empty() || present {
                continue;
            }

            match self
                .fs
                .write_new_file(sidecar, Bytes::from(content.clone()))
                .await
            {
                Ok(()) => {
                    written += 1;
                    debug!(variant, path = %sidecar.display(), "Wrote lyrics");
                }
                Err(e) if e.is_already_exists() => {
                    debug!(variant, path = %sidecar.display(), "Sidecar appeared meanwhile, left untouched");
                }
                Err(e) => {
                    warn!(variant, path = %sidecar.display(), error = %e, "Failed to write lyrics");
                    return TaskOutcome::retry(format!(
                        "failed to write {}: {e}",
                        sidecar.display()
                    ));
                }
            }
        }

        info!(
            path = %path.display(),
            source_id = %lyrics.source_id,
            written,
            "Lyrics synced"
        );
        TaskOutcome::Success
    }

    async fn inspect(
        &self,
        path: &Path,
        tags: Option<AudioTags>,
    ) -> std::result::Result<TrackMetadata, MetadataError> {
        match tags {
            Some(tags) => TrackMetadata::from_tags(path, tags, self.fs.as_ref()).await,
            None => TrackMetadata::inspect(path, self.tags.as_ref(), self.fs.as_ref()).await,
        }
    }

    /// Query the catalog using the strongest strategy the tags allow.
    async fn resolve(&self, track: &TrackMetadata) -> std::result::Result<LyricsResult, TaskOutcome> {
        let (Some(title), Some(artist)) = (&track.title, &track.artist) else {
            return Err(TaskOutcome::skip("not enough metadata to search"));
        };

        let record = match (&track.album, track.duration_seconds) {
            (Some(album), duration) if duration > 0 => {
                let query = LyricsQuery::new(title.as_str(), artist.as_str())
                    .with_album(album.as_str())
                    .with_duration(duration);
                debug!(path = %track.path.display(), "Looking up lyrics by track, artist, album and duration");
                self.provider.get(&query).await
            }
            _ => {
                let params = SearchParams::fields(title.as_str(), artist.as_str());
                debug!(path = %track.path.display(), "Searching lyrics by track and artist");
                self.provider.search(&params).await.and_then(|records| {
                    LyricsRecord::select_best(&records).cloned().ok_or_else(|| {
                        MetadataError::LyricsNotFound(format!("{artist} - {title}"))
                    })
                })
            }
        };

        match record {
            Ok(record) => Ok(record.into()),
            Err(e) if e.is_invalid_input() => Err(TaskOutcome::skip(e)),
            Err(e) => Err(TaskOutcome::retry(e)),
        }
    }
}

#[async_trait]
impl TaskHandler for SyncLyricsTask {
    async fn handle(&self, _ctx: &TaskContext, payload: &[u8]) -> TaskOutcome {
        match serde_json::from_slice::<LyricsPayload>(payload) {
            Ok(payload) => self.sync(payload).await,
            Err(e) => TaskOutcome::skip(format!("malformed payload: {e}")),
        }
    }
}

/// Handler for [`DELETE_LYRICS`] tasks
///
/// Removes both sidecars of an audio file that no longer exists. Revoked when
/// the audio file is back or when there was nothing to remove.
pub struct DeleteLyricsTask {
    fs: Arc<dyn FileSystemAccess>,
}

impl DeleteLyricsTask {
    pub fn new(fs: Arc<dyn FileSystemAccess>) -> Self {
        Self { fs }
    }

    pub async fn delete(&self, payload: LyricsPayload) -> TaskOutcome {
        let path = payload.filepath.as_path();

        let sidecars = match sidecar_paths(path) {
            Ok(sidecars) => sidecars,
            Err(e) => return TaskOutcome::skip(e),
        };
        if is_sidecar_path(path) {
            return TaskOutcome::skip("path is a lyrics sidecar");
        }

        match self.fs.exists(path).await {
            Ok(true) => return TaskOutcome::revoke("audio file exists"),
            Ok(false) => {}
            Err(e) => return TaskOutcome::retry(e),
        }

        let mut removed = 0;
        for sidecar in [&sidecars.plain, &sidecars.synced] {
            match self.fs.delete_file(sidecar).await {
                Ok(()) => {
                    removed += 1;
                    debug!(path = %sidecar.display(), "Removed lyrics sidecar");
                }
                Err(e) if e.is_not_found() => {}
                Err(e) => {
                    warn!(path = %sidecar.display(), error = %e, "Failed to remove lyrics sidecar");
                    return TaskOutcome::retry(format!(
                        "failed to remove {}: {e}",
                        sidecar.display()
                    ));
                }
            }
        }

        if removed == 0 {
            return TaskOutcome::revoke("no lyrics to remove");
        }

        info!(path = %path.display(), removed, "Removed lyrics of deleted track");
        TaskOutcome::Success
    }
}

#[async_trait]
impl TaskHandler for DeleteLyricsTask {
    async fn handle(&self, _ctx: &TaskContext, payload: &[u8]) -> TaskOutcome {
        match serde_json::from_slice::<LyricsPayload>(payload) {
            Ok(payload) => self.delete(payload).await,
            Err(e) => TaskOutcome::skip(format!("malformed payload: {e}")),
        }
    }
}
