//! Lyric download and removal decisions against real files.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bridge_desktop::TokioFileSystem;
use core_metadata::fixtures::{tagged_wav, WavTags};
use core_metadata::{
    AudioTags, LyricsProvider, LyricsQuery, LyricsRecord, MetadataError, MetadataExtractor,
    SearchParams, TagReader,
};
use core_runtime::events::{CoreEvent, EventBus, TaskEvent};
use core_sync::{
    DeleteLyricsTask, LyricsPayload, QueueConfig, SyncLyricsTask, TaskContext, TaskHandler,
    TaskOutcome, TaskQueue, DELETE_LYRICS, DOWNLOAD_LYRICS,
};
use mockall::mock;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

mock! {
    pub Provider {}

    #[async_trait]
    impl LyricsProvider for Provider {
        async fn get(&self, query: &LyricsQuery) -> core_metadata::Result<LyricsRecord>;
        async fn search(&self, params: &SearchParams) -> core_metadata::Result<Vec<LyricsRecord>>;
        async fn get_by_id(&self, id: &str) -> core_metadata::Result<LyricsRecord>;
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Call {
    Get(LyricsQuery),
    Search(SearchParams),
}

/// Records every call and answers with canned records.
struct RecordingProvider {
    calls: Mutex<Vec<Call>>,
    records: Vec<LyricsRecord>,
}

impl RecordingProvider {
    fn new(records: Vec<LyricsRecord>) -> Arc<Self> {
        Arc::new(Self {
            calls: Mutex::new(Vec::new()),
            records,
        })
    }

    fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl LyricsProvider for RecordingProvider {
    async fn get(&self, query: &LyricsQuery) -> core_metadata::Result<LyricsRecord> {
        self.calls.lock().unwrap().push(Call::Get(query.clone()));
        self.records
            .first()
            .cloned()
            .ok_or_else(|| MetadataError::LyricsNotFound(query.track.clone()))
    }

    async fn search(&self, params: &SearchParams) -> core_metadata::Result<Vec<LyricsRecord>> {
        self.calls.lock().unwrap().push(Call::Search(params.clone()));
        Ok(self.records.clone())
    }

    async fn get_by_id(&self, id: &str) -> core_metadata::Result<LyricsRecord> {
        Err(MetadataError::LyricsNotFound(id.to_string()))
    }
}

fn record(plain: &str, synced: &str) -> LyricsRecord {
    LyricsRecord {
        id: 42,
        track_name: "X".into(),
        artist_name: "Y".into(),
        album_name: "Z".into(),
        duration: 3.0,
        instrumental: false,
        plain_lyrics: plain.into(),
        synced_lyrics: synced.into(),
    }
}

fn sync_task(provider: Arc<dyn LyricsProvider>) -> SyncLyricsTask {
    let fs = Arc::new(TokioFileSystem::new());
    SyncLyricsTask::new(fs.clone(), Arc::new(MetadataExtractor::new(fs)), provider)
}

fn write_track(dir: &Path, name: &str, tags: &WavTags<'_>) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, tagged_wav(tags, 3)).unwrap();
    path
}

fn dir_entries(dir: &Path) -> usize {
    std::fs::read_dir(dir).unwrap().count()
}

#[tokio::test]
async fn test_both_sidecars_present_revokes_without_network_or_writes() {
    let dir = TempDir::new().unwrap();
    let song = write_track(dir.path(), "song.flac", &WavTags::new("X", "Y", "Z"));
    std::fs::write(dir.path().join("song.txt"), "old plain").unwrap();
    std::fs::write(dir.path().join("song.lrc"), "[00:01.00]old").unwrap();

    // No expectations: any provider call fails the test.
    let task = sync_task(Arc::new(MockProvider::new()));
    let outcome = task.sync(LyricsPayload::new(&song)).await;

    assert!(matches!(outcome, TaskOutcome::Revoke(_)));
    assert_eq!(dir_entries(dir.path()), 3);
    assert_eq!(std::fs::read_to_string(dir.path().join("song.txt")).unwrap(), "old plain");
    assert_eq!(
        std::fs::read_to_string(dir.path().join("song.lrc")).unwrap(),
        "[00:01.00]old"
    );
}

#[tokio::test]
async fn test_full_metadata_uses_exact_lookup() {
    let dir = TempDir::new().unwrap();
    let song = write_track(dir.path(), "song.flac", &WavTags::new("X", "Y", "Z"));

    let mut provider = MockProvider::new();
    provider
        .expect_get()
        .withf(|q| {
            q.track == "X" && q.artist == "Y" && q.album.as_deref() == Some("Z") && q.duration_secs == 3
        })
        .times(1)
        .returning(|_| Ok(record("L1", "[00:01.00]L1")));

    let outcome = sync_task(Arc::new(provider)).sync(LyricsPayload::new(&song)).await;

    assert_eq!(outcome, TaskOutcome::Success);
    assert_eq!(std::fs::read_to_string(dir.path().join("song.txt")).unwrap(), "L1");
    assert_eq!(
        std::fs::read_to_string(dir.path().join("song.lrc")).unwrap(),
        "[00:01.00]L1"
    );
}

#[tokio::test]
async fn test_missing_album_falls_back_to_field_search() {
    let dir = TempDir::new().unwrap();
    let tags = WavTags {
        title: Some("X"),
        artist: Some("Y"),
        album: None,
    };
    let song = write_track(dir.path(), "song.flac", &tags);

    let provider = RecordingProvider::new(vec![record("", ""), record("L1", "[00:01.00]L1")]);
    let outcome = sync_task(provider.clone())
        .sync(LyricsPayload::new(&song))
        .await;

    assert_eq!(outcome, TaskOutcome::Success);
    assert_eq!(provider.calls(), vec![Call::Search(SearchParams::fields("X", "Y"))]);
    assert_eq!(
        std::fs::read_to_string(dir.path().join("song.lrc")).unwrap(),
        "[00:01.00]L1"
    );
}

#[tokio::test]
async fn test_payload_metadata_skips_extraction() {
    let dir = TempDir::new().unwrap();
    // The file carries no tags; the payload does.
    let song = write_track(dir.path(), "song.flac", &WavTags::default());
    let tags = AudioTags {
        title: Some("X".into()),
        artist: Some("Y".into()),
        album: Some("Z".into()),
        duration: Duration::from_secs(200),
        ..AudioTags::default()
    };

    let provider = RecordingProvider::new(vec![record("L1", "")]);
    let outcome = sync_task(provider.clone())
        .sync(LyricsPayload::new(&song).with_metadata(tags))
        .await;

    assert_eq!(outcome, TaskOutcome::Success);
    assert_eq!(
        provider.calls(),
        vec![Call::Get(
            LyricsQuery::new("X", "Y").with_album("Z").with_duration(200)
        )]
    );
}

#[tokio::test]
async fn test_missing_title_or_artist_is_skipped_without_lookup() {
    let dir = TempDir::new().unwrap();
    let tags = WavTags {
        title: Some("X"),
        artist: None,
        album: Some("Z"),
    };
    let song = write_track(dir.path(), "song.flac", &tags);

    let provider = RecordingProvider::new(vec![record("L1", "")]);
    let outcome = sync_task(provider.clone())
        .sync(LyricsPayload::new(&song))
        .await;

    assert!(matches!(outcome, TaskOutcome::Skip(reason) if reason.contains("metadata")));
    assert!(provider.calls().is_empty());
    assert_eq!(dir_entries(dir.path()), 1);
}

#[tokio::test]
async fn test_existing_plain_lyrics_are_never_overwritten() {
    let dir = TempDir::new().unwrap();
    let song = write_track(dir.path(), "song.flac", &WavTags::new("X", "Y", "Z"));
    let plain = dir.path().join("song.txt");
    std::fs::write(&plain, b"my own transcription\n").unwrap();

    let provider = RecordingProvider::new(vec![record("L1", "[00:01.00]L1")]);
    let outcome = sync_task(provider).sync(LyricsPayload::new(&song)).await;

    assert_eq!(outcome, TaskOutcome::Success);
    assert_eq!(std::fs::read(&plain).unwrap(), b"my own transcription\n");
    assert_eq!(
        std::fs::read_to_string(dir.path().join("song.lrc")).unwrap(),
        "[00:01.00]L1"
    );
}

#[tokio::test]
async fn test_instrumental_writes_nothing() {
    let dir = TempDir::new().unwrap();
    let song = write_track(dir.path(), "song.flac", &WavTags::new("X", "Y", "Z"));

    let mut instrumental = record("", "");
    instrumental.instrumental = true;
    let provider = RecordingProvider::new(vec![instrumental]);
    let outcome = sync_task(provider).sync(LyricsPayload::new(&song)).await;

    assert_eq!(outcome, TaskOutcome::Success);
    assert_eq!(dir_entries(dir.path()), 1);
}

#[tokio::test]
async fn test_provider_errors_are_classified() {
    let dir = TempDir::new().unwrap();
    let song = write_track(dir.path(), "song.flac", &WavTags::new("X", "Y", "Z"));

    let mut not_found = MockProvider::new();
    not_found
        .expect_get()
        .returning(|q| Err(MetadataError::LyricsNotFound(q.track.clone())));
    let outcome = sync_task(Arc::new(not_found))
        .sync(LyricsPayload::new(&song))
        .await;
    assert!(matches!(outcome, TaskOutcome::Retry(_)));

    let mut rejected = MockProvider::new();
    rejected
        .expect_get()
        .returning(|_| Err(MetadataError::InvalidQuery("artist is empty".into())));
    let outcome = sync_task(Arc::new(rejected))
        .sync(LyricsPayload::new(&song))
        .await;
    assert!(matches!(outcome, TaskOutcome::Skip(_)));

    let mut unavailable = MockProvider::new();
    unavailable.expect_get().returning(|_| {
        Err(MetadataError::LyricsApi {
            status: 503,
            name: "ServiceUnavailable".into(),
            message: "try later".into(),
        })
    });
    let outcome = sync_task(Arc::new(unavailable))
        .sync(LyricsPayload::new(&song))
        .await;
    assert!(matches!(outcome, TaskOutcome::Retry(_)));
    assert_eq!(dir_entries(dir.path()), 1);
}

#[tokio::test]
async fn test_non_audio_and_missing_paths_are_skipped() {
    let dir = TempDir::new().unwrap();
    let text = dir.path().join("notes.flac");
    std::fs::write(&text, "not audio").unwrap();

    let task = sync_task(Arc::new(MockProvider::new()));
    assert!(matches!(
        task.sync(LyricsPayload::new(&text)).await,
        TaskOutcome::Skip(_)
    ));
    assert!(matches!(
        task.sync(LyricsPayload::new(dir.path().join("gone.flac"))).await,
        TaskOutcome::Skip(_)
    ));
}

#[tokio::test]
async fn test_malformed_payload_is_skipped() {
    let task = sync_task(Arc::new(MockProvider::new()));
    let ctx = TaskContext {
        task_type: DOWNLOAD_LYRICS.to_string(),
        task_id: "broken".to_string(),
        attempts: 0,
        cancel: CancellationToken::new(),
    };

    let outcome = task.handle(&ctx, b"{\"Path\": 1}").await;
    assert!(matches!(outcome, TaskOutcome::Skip(reason) if reason.starts_with("malformed payload")));
}

fn download_ctx(id: &str) -> TaskContext {
    TaskContext {
        task_type: DOWNLOAD_LYRICS.to_string(),
        task_id: id.to_string(),
        attempts: 0,
        cancel: CancellationToken::new(),
    }
}

#[tokio::test]
async fn test_out_of_range_duration_is_malformed() {
    let dir = TempDir::new().unwrap();
    let song = write_track(dir.path(), "song.flac", &WavTags::new("X", "Y", "Z"));
    let payload = serde_json::json!({
        "Filepath": song,
        "Metadata": {
            "title": "X",
            "artist": "Y",
            "album": "Z",
            "album_artist": null,
            "duration": 1e300,
            "mime_type": "audio/x-wav",
        },
    });

    let task = sync_task(Arc::new(MockProvider::new()));
    let bytes = serde_json::to_vec(&payload).unwrap();
    let outcome = tokio::spawn(async move { task.handle(&download_ctx("huge"), &bytes).await })
        .await
        .expect("decoding must not panic");

    assert!(matches!(outcome, TaskOutcome::Skip(reason) if reason.starts_with("malformed payload")));
    assert_eq!(dir_entries(dir.path()), 1);
}

/// Fails every read the way an unreadable file does.
struct DeniedReader;

#[async_trait]
impl TagReader for DeniedReader {
    async fn read_tags(&self, _path: &Path) -> core_metadata::Result<AudioTags> {
        Err(MetadataError::Io(std::io::Error::new(
            std::io::ErrorKind::PermissionDenied,
            "denied",
        )))
    }
}

#[tokio::test]
async fn test_extraction_failure_is_skipped_not_retried() {
    let dir = TempDir::new().unwrap();
    let song = write_track(dir.path(), "song.flac", &WavTags::new("X", "Y", "Z"));

    let fs = Arc::new(TokioFileSystem::new());
    let task = SyncLyricsTask::new(fs, Arc::new(DeniedReader), Arc::new(MockProvider::new()));
    let bytes = serde_json::to_vec(&LyricsPayload::new(&song)).unwrap();
    let outcome = task.handle(&download_ctx("denied"), &bytes).await;

    assert!(matches!(outcome, TaskOutcome::Skip(_)), "{outcome:?}");
    assert_eq!(dir_entries(dir.path()), 1);
}

#[tokio::test]
async fn test_delete_removes_sidecars_of_missing_track() {
    let dir = TempDir::new().unwrap();
    let song = dir.path().join("song.flac");
    std::fs::write(dir.path().join("song.txt"), "L1").unwrap();
    std::fs::write(dir.path().join("song.lrc"), "[00:01.00]L1").unwrap();
    std::fs::write(dir.path().join("other.txt"), "keep").unwrap();

    let task = DeleteLyricsTask::new(Arc::new(TokioFileSystem::new()));
    assert_eq!(task.delete(LyricsPayload::new(&song)).await, TaskOutcome::Success);

    assert!(!dir.path().join("song.txt").exists());
    assert!(!dir.path().join("song.lrc").exists());
    assert!(dir.path().join("other.txt").exists());

    // Nothing left to remove
    assert!(matches!(
        task.delete(LyricsPayload::new(&song)).await,
        TaskOutcome::Revoke(_)
    ));
}

#[tokio::test]
async fn test_delete_revokes_when_track_is_back() {
    let dir = TempDir::new().unwrap();
    let song = write_track(dir.path(), "song.flac", &WavTags::new("X", "Y", "Z"));
    std::fs::write(dir.path().join("song.txt"), "L1").unwrap();

    let task = DeleteLyricsTask::new(Arc::new(TokioFileSystem::new()));
    assert!(matches!(
        task.delete(LyricsPayload::new(&song)).await,
        TaskOutcome::Revoke(_)
    ));
    assert!(dir.path().join("song.txt").exists());
}

#[tokio::test]
async fn test_delete_skips_unusable_paths() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("song.txt"), "L1").unwrap();
    let task = DeleteLyricsTask::new(Arc::new(TokioFileSystem::new()));

    assert!(matches!(
        task.delete(LyricsPayload::new(dir.path().join("README"))).await,
        TaskOutcome::Skip(_)
    ));
    assert!(matches!(
        task.delete(LyricsPayload::new(dir.path().join("song.lrc"))).await,
        TaskOutcome::Skip(_)
    ));
    assert!(dir.path().join("song.txt").exists());
}

#[tokio::test]
async fn test_download_through_queue_writes_plain_lyrics_only() {
    let dir = TempDir::new().unwrap();
    let album = dir.path().join("a");
    std::fs::create_dir(&album).unwrap();
    let song = write_track(&album, "song.flac", &WavTags::new("X", "Y", "Z"));

    let mut provider = MockProvider::new();
    provider
        .expect_get()
        .withf(|q| q.track == "X" && q.artist == "Y" && q.album.as_deref() == Some("Z"))
        .times(1)
        .returning(|_| Ok(record("L1", "")));

    let bus = EventBus::new(64);
    let mut rx = bus.subscribe();
    let queue = TaskQueue::builder(QueueConfig {
        poll_interval: Duration::from_millis(10),
        ..QueueConfig::default()
    })
    .event_bus(bus)
    .build();
    queue
        .register_handler(DOWNLOAD_LYRICS, Arc::new(sync_task(Arc::new(provider))))
        .await;
    queue
        .register_handler(
            DELETE_LYRICS,
            Arc::new(DeleteLyricsTask::new(Arc::new(TokioFileSystem::new()))),
        )
        .await;

    let cancel = CancellationToken::new();
    let runner = {
        let queue = queue.clone();
        let cancel = cancel.clone();
        tokio::spawn(async move { queue.run(cancel).await })
    };

    let task = LyricsPayload::new(&song).into_task(DOWNLOAD_LYRICS).unwrap();
    assert!(queue.submit(task).await.unwrap().is_accepted());

    let finished = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            if let Ok(CoreEvent::Task(event)) = rx.recv().await {
                if event.is_terminal() {
                    return event;
                }
            }
        }
    })
    .await
    .unwrap();

    assert!(matches!(finished, TaskEvent::Succeeded { ref task_id, .. } if Path::new(task_id) == song));
    assert_eq!(std::fs::read_to_string(album.join("song.txt")).unwrap(), "L1");
    assert!(!album.join("song.lrc").exists());

    cancel.cancel();
    runner.await.unwrap().unwrap();
}
