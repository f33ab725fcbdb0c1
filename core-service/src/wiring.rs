//! Watcher events to queue submissions.
//!
//! | Event | Condition | Task |
//! |-------|-----------|------|
//! | `Created`, `Written` | content sniffs as audio | `lyrics:download`, settle delay |
//! | `Renamed`, `Removed` | known audio extension | `lyrics:delete` |
//! | `PermissionChanged` | | none, logged |
//!
//! Files found by the startup walk become download tasks without delay.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use bridge_traits::storage::FileSystemAccess;
use core_metadata::classifier::{has_audio_extension, is_audio_file};
use core_runtime::config::TaskPolicy;
use core_sync::{Backoff, LyricsPayload, Submission, Task, TaskQueue, DELETE_LYRICS, DOWNLOAD_LYRICS};
use core_watcher::{handler_fn, DirectoryWatcher, FileEvent, FileEventKind, HandlerError, RootScan};
use tracing::{debug, info, warn};

use crate::error::Result;

/// Turns file events into lyric tasks
#[derive(Clone)]
pub struct PipelineWiring {
    queue: TaskQueue,
    fs: Arc<dyn FileSystemAccess>,
    policy: TaskPolicy,
}

impl PipelineWiring {
    pub fn new(queue: TaskQueue, fs: Arc<dyn FileSystemAccess>, policy: TaskPolicy) -> Self {
        Self { queue, fs, policy }
    }

    /// Install one handler per event kind on `watcher`.
    pub async fn attach(&self, watcher: &DirectoryWatcher) {
        for kind in FileEventKind::ALL {
            let wiring = self.clone();
            watcher
                .register_handler(
                    kind,
                    handler_fn(move |event| {
                        let wiring = wiring.clone();
                        async move {
                            wiring
                                .on_event(&event)
                                .await
                                .map(|_| ())
                                .map_err(HandlerError::from)
                        }
                    }),
                )
                .await;
        }
    }

    /// Route one event. Returns the submission, if a task was raised.
    pub async fn on_event(&self, event: &FileEvent) -> Result<Option<Submission>> {
        match event.kind {
            FileEventKind::Created | FileEventKind::Written => {
                if !self.is_audio(&event.path).await {
                    return Ok(None);
                }
                let task = self.download_task(&event.path, self.policy.process_delay)?;
                self.submit(task).await.map(Some)
            }
            FileEventKind::Renamed | FileEventKind::Removed => {
                if !has_audio_extension(&event.path) {
                    return Ok(None);
                }
                let task = self.delete_task(&event.path)?;
                self.submit(task).await.map(Some)
            }
            FileEventKind::PermissionChanged => {
                debug!(path = %event.path.display(), "Permissions changed");
                Ok(None)
            }
        }
    }

    /// Submit a download task for every audio file in `scan`.
    ///
    /// Returns the number of accepted tasks.
    pub async fn enqueue_scan(&self, scan: &RootScan) -> Result<usize> {
        let mut accepted = 0;

        for path in &scan.files {
            if !self.is_audio(path).await {
                continue;
            }
            let task = self.download_task(path, Duration::ZERO)?;
            if self.submit(task).await?.is_accepted() {
                accepted += 1;
            }
        }

        info!(files = scan.files.len(), accepted, "Initial scan enqueued");
        Ok(accepted)
    }

    pub fn download_task(&self, path: &Path, delay: Duration) -> Result<Task> {
        Ok(self
            .with_policy(LyricsPayload::new(path).into_task(DOWNLOAD_LYRICS)?)
            .with_delay(delay))
    }

    pub fn delete_task(&self, path: &Path) -> Result<Task> {
        Ok(self.with_policy(LyricsPayload::new(path).into_task(DELETE_LYRICS)?))
    }

    fn with_policy(&self, task: Task) -> Task {
        task.with_max_attempts(self.policy.max_attempts)
            .with_backoff(Backoff::exponential(
                self.policy.retry_backoff,
                self.policy.retry_backoff_max,
            ))
    }

    async fn submit(&self, task: Task) -> Result<Submission> {
        let task_type = task.task_type.clone();
        let submission = self.queue.submit(task).await?;

        match &submission {
            Submission::Accepted(id) => debug!(task_type = %task_type, task_id = %id, "Task enqueued"),
            Submission::Duplicate(id) => {
                debug!(task_type = %task_type, task_id = %id, "Task already queued")
            }
        }
        Ok(submission)
    }

    async fn is_audio(&self, path: &Path) -> bool {
        match is_audio_file(self.fs.as_ref(), path).await {
            Ok(audio) => audio,
            Err(e) if e.is_not_found() => false,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to classify file");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_desktop::TokioFileSystem;
    use core_metadata::fixtures::{tagged_wav, WavTags};
    use core_sync::{task_handler_fn, QueueConfig, TaskOutcome};
    use tempfile::TempDir;

    fn policy() -> TaskPolicy {
        TaskPolicy {
            max_attempts: 4,
            process_delay: Duration::from_secs(10),
            ..TaskPolicy::default()
        }
    }

    async fn wiring() -> (PipelineWiring, TaskQueue) {
        let queue = TaskQueue::new(QueueConfig::default());
        for task_type in [DOWNLOAD_LYRICS, DELETE_LYRICS] {
            queue
                .register_handler(
                    task_type,
                    task_handler_fn(|_, _| async { TaskOutcome::Success }),
                )
                .await;
        }
        let wiring = PipelineWiring::new(queue.clone(), Arc::new(TokioFileSystem::new()), policy());
        (wiring, queue)
    }

    #[tokio::test]
    async fn test_created_audio_raises_delayed_download() {
        let dir = TempDir::new().unwrap();
        let song = dir.path().join("song.flac");
        std::fs::write(&song, tagged_wav(&WavTags::new("X", "Y", "Z"), 1)).unwrap();
        let (wiring, queue) = wiring().await;

        let submission = wiring
            .on_event(&FileEvent::new(FileEventKind::Created, &song))
            .await
            .unwrap()
            .unwrap();
        assert!(submission.is_accepted());

        let task = queue.get(DOWNLOAD_LYRICS, &song.display().to_string()).unwrap();
        assert_eq!(task.max_attempts, 4);
        assert_eq!(
            task.process_after.unwrap(),
            task.created_at + chrono::Duration::seconds(10)
        );

        // A later write is the same logical work
        let again = wiring
            .on_event(&FileEvent::new(FileEventKind::Written, &song))
            .await
            .unwrap()
            .unwrap();
        assert!(matches!(again, Submission::Duplicate(_)));
    }

    #[tokio::test]
    async fn test_non_audio_and_missing_files_are_ignored() {
        let dir = TempDir::new().unwrap();
        let notes = dir.path().join("song.txt");
        std::fs::write(&notes, "L1").unwrap();
        let (wiring, queue) = wiring().await;

        for event in [
            FileEvent::new(FileEventKind::Created, &notes),
            FileEvent::new(FileEventKind::Written, dir.path().join("gone.flac")),
            FileEvent::new(FileEventKind::Removed, &notes),
            FileEvent::new(FileEventKind::PermissionChanged, &notes),
        ] {
            assert!(wiring.on_event(&event).await.unwrap().is_none());
        }
        assert!(queue.stats().is_idle());
    }

    #[tokio::test]
    async fn test_removed_and_renamed_audio_raise_delete() {
        let (wiring, queue) = wiring().await;

        let removed = FileEvent::new(FileEventKind::Removed, "/music/a/song.flac");
        assert!(wiring.on_event(&removed).await.unwrap().unwrap().is_accepted());

        let renamed = FileEvent::new(FileEventKind::Renamed, "/music/a/old.mp3");
        assert!(wiring.on_event(&renamed).await.unwrap().unwrap().is_accepted());

        let task = queue.get(DELETE_LYRICS, "/music/a/song.flac").unwrap();
        assert!(task.process_after.is_none());
        assert_eq!(queue.stats().pending, 2);
    }

    #[tokio::test]
    async fn test_scan_enqueues_audio_without_delay() {
        let dir = TempDir::new().unwrap();
        let song = dir.path().join("song.flac");
        let notes = dir.path().join("song.txt");
        std::fs::write(&song, tagged_wav(&WavTags::new("X", "Y", "Z"), 1)).unwrap();
        std::fs::write(&notes, "L1").unwrap();
        let (wiring, queue) = wiring().await;

        let scan = RootScan {
            directories: 1,
            files: vec![song.clone(), notes],
        };
        assert_eq!(wiring.enqueue_scan(&scan).await.unwrap(), 1);

        let task = queue.get(DOWNLOAD_LYRICS, &song.display().to_string()).unwrap();
        assert!(task.process_after.is_none());
    }
}
