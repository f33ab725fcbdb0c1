//! Directory watcher state machine.
//!
//! Every directory is registered with the notification source individually
//! (non-recursive) and tracked in an explicit watched set. Raw notifications
//! are bridged from the `notify` thread into a tokio channel and consumed by a
//! single dispatch loop, so events are handled strictly in arrival order.
//!
//! A `Created` event for a directory is not forwarded to handlers. The new
//! directory is registered first and only then listed, level by level, and a
//! synthetic `Created` event is dispatched for every file already inside it.
//! A file either lands before its directory listing (and is reported by the
//! listing) or after the watch is installed (and is reported by the source).

use std::collections::{HashMap, HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use core_runtime::events::{CoreEvent, EventBus, WatcherEvent};
use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::{mpsc, Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::error::{Result, WatcherError};
use crate::event::{classify, is_ambiguous_rename, FileEvent, FileEventKind};
use crate::handler::FileEventHandler;

type RawMessage = notify::Result<notify::Event>;

/// Outcome of [`DirectoryWatcher::add_root`]
#[derive(Debug, Clone, Default)]
pub struct RootScan {
    /// Directories newly added to the watched set
    pub directories: usize,
    /// Regular files found during the walk, in walk order
    pub files: Vec<PathBuf>,
}

struct WatchState {
    source: Option<RecommendedWatcher>,
    watched: HashSet<PathBuf>,
    handlers: HashMap<FileEventKind, Arc<dyn FileEventHandler>>,
}

struct Shared {
    state: RwLock<WatchState>,
    event_bus: Option<EventBus>,
    cancel: CancellationToken,
}

/// Watches directory trees and dispatches [`FileEvent`]s to registered handlers
///
/// One handler per [`FileEventKind`]; registering again for the same kind
/// replaces the previous handler.
///
/// # Example
///
/// ```ignore
/// let watcher = DirectoryWatcher::new(CancellationToken::new())?;
/// watcher
///     .register_handler(FileEventKind::Created, handler_fn(|event| async move {
///         println!("created {}", event.path.display());
///         Ok(())
///     }))
///     .await;
/// let scan = watcher.add_root(Path::new("/music")).await?;
/// watcher.start().await?;
/// // ...
/// watcher.stop().await?;
/// ```
pub struct DirectoryWatcher {
    shared: Arc<Shared>,
    receiver: Mutex<Option<mpsc::UnboundedReceiver<RawMessage>>>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl DirectoryWatcher {
    /// Create a watcher whose loop exits when `cancel` fires.
    ///
    /// The watcher holds a child of `cancel`: [`stop`](Self::stop) never
    /// cancels the caller's token.
    pub fn new(cancel: CancellationToken) -> Result<Self> {
        Self::build(cancel, None)
    }

    /// Create a watcher that also reports activity on `event_bus`.
    pub fn with_event_bus(cancel: CancellationToken, event_bus: EventBus) -> Result<Self> {
        Self::build(cancel, Some(event_bus))
    }

    fn build(cancel: CancellationToken, event_bus: Option<EventBus>) -> Result<Self> {
        let (tx, rx) = mpsc::unbounded_channel::<RawMessage>();
        let source = RecommendedWatcher::new(
            move |res: RawMessage| {
                // The receiver is gone only after the loop exited.
                let _ = tx.send(res);
            },
            notify::Config::default(),
        )?;

        Ok(Self {
            shared: Arc::new(Shared {
                state: RwLock::new(WatchState {
                    source: Some(source),
                    watched: HashSet::new(),
                    handlers: HashMap::new(),
                }),
                event_bus,
                cancel: cancel.child_token(),
            }),
            receiver: Mutex::new(Some(rx)),
            task: Mutex::new(None),
        })
    }

    /// Register `root` and every directory below it.
    ///
    /// Adding an already-watched directory is a no-op. A subdirectory that
    /// cannot be registered is logged and skipped.
    ///
    /// # Errors
    ///
    /// - [`WatcherError::NotADirectory`] if `root` is not a directory
    /// - [`WatcherError::Io`] if `root` cannot be inspected
    /// - [`WatcherError::Stopped`] after [`stop`](Self::stop)
    pub async fn add_root(&self, root: &Path) -> Result<RootScan> {
        if self.shared.cancel.is_cancelled() {
            return Err(WatcherError::Stopped);
        }

        let metadata = tokio::fs::metadata(root).await?;
        if !metadata.is_dir() {
            return Err(WatcherError::NotADirectory(root.to_path_buf()));
        }

        let scan = self.shared.register_tree(root).await?;
        info!(
            root = %root.display(),
            directories = scan.directories,
            files = scan.files.len(),
            "Watching library root"
        );
        Ok(scan)
    }

    /// Associate `handler` with `kind`, replacing any previous handler.
    pub async fn register_handler(&self, kind: FileEventKind, handler: Arc<dyn FileEventHandler>) {
        let mut state = self.shared.state.write().await;
        if state.handlers.insert(kind, handler).is_some() {
            debug!(kind = %kind, "Replaced file event handler");
        }
    }

    /// Start the dispatch loop.
    ///
    /// # Errors
    ///
    /// [`WatcherError::AlreadyRunning`] if the loop was started before, or
    /// [`WatcherError::Stopped`] if the watcher was cancelled.
    pub async fn start(&self) -> Result<()> {
        if self.shared.cancel.is_cancelled() {
            return Err(WatcherError::Stopped);
        }

        let receiver = self
            .receiver
            .lock()
            .await
            .take()
            .ok_or(WatcherError::AlreadyRunning)?;

        let shared = Arc::clone(&self.shared);
        let handle = tokio::spawn(async move { shared.run(receiver).await });
        *self.task.lock().await = Some(handle);
        Ok(())
    }

    /// Stop the loop and release the notification source.
    ///
    /// Returns once the loop has exited; no handler runs after this returns.
    /// Calling `stop` more than once is harmless.
    pub async fn stop(&self) -> Result<()> {
        self.shared.cancel.cancel();

        if let Some(handle) = self.task.lock().await.take() {
            handle
                .await
                .map_err(|e| WatcherError::Join(e.to_string()))?;
        }

        self.receiver.lock().await.take();
        self.shared.release_source().await;
        Ok(())
    }

    /// True while the dispatch loop is alive.
    pub async fn is_running(&self) -> bool {
        self.task
            .lock()
            .await
            .as_ref()
            .map(|handle| !handle.is_finished())
            .unwrap_or(false)
    }

    /// Snapshot of the watched set, sorted.
    pub async fn watched_directories(&self) -> Vec<PathBuf> {
        let state = self.shared.state.read().await;
        let mut dirs: Vec<PathBuf> = state.watched.iter().cloned().collect();
        dirs.sort();
        dirs
    }

    pub async fn is_watching(&self, path: &Path) -> bool {
        self.shared.state.read().await.watched.contains(path)
    }
}

impl Shared {
    async fn run(&self, mut receiver: mpsc::UnboundedReceiver<RawMessage>) {
        info!("Directory watcher started");

        loop {
            let message = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                message = receiver.recv() => message,
            };

            match message {
                Some(Ok(raw)) => self.process(raw).await,
                Some(Err(err)) => self.source_error(err),
                None => {
                    warn!("Notification source closed");
                    break;
                }
            }
        }

        self.release_source().await;
        info!("Directory watcher stopped");
    }

    async fn process(&self, raw: notify::Event) {
        debug!(kind = ?raw.kind, paths = ?raw.paths, "Raw notification");
        let ambiguous = is_ambiguous_rename(&raw);

        for mut event in classify(&raw) {
            if self.cancel.is_cancelled() {
                return;
            }

            if ambiguous && tokio::fs::symlink_metadata(&event.path).await.is_ok() {
                event.kind = FileEventKind::Created;
            }

            match event.kind {
                FileEventKind::Created => {
                    let is_dir = tokio::fs::metadata(&event.path)
                        .await
                        .map(|m| m.is_dir())
                        .unwrap_or(false);
                    if is_dir {
                        self.watch_new_directory(&event.path).await;
                        continue;
                    }
                }
                FileEventKind::Renamed | FileEventKind::Removed => {
                    if self.forget_directory(&event.path).await {
                        continue;
                    }
                }
                _ => {}
            }

            self.dispatch(event).await;
        }
    }

    async fn watch_new_directory(&self, dir: &Path) {
        match self.register_tree(dir).await {
            Ok(scan) => {
                debug!(
                    path = %dir.display(),
                    directories = scan.directories,
                    files = scan.files.len(),
                    "Watching new directory"
                );
                for file in scan.files {
                    if self.cancel.is_cancelled() {
                        return;
                    }
                    self.dispatch(FileEvent::new(FileEventKind::Created, file))
                        .await;
                }
            }
            Err(e) => warn!(path = %dir.display(), error = %e, "Failed to watch new directory"),
        }
    }

    /// Breadth-first registration: each directory is watched before it is
    /// listed.
    async fn register_tree(&self, root: &Path) -> Result<RootScan> {
        let mut scan = RootScan::default();
        let mut queue = VecDeque::from([root.to_path_buf()]);

        while let Some(dir) = queue.pop_front() {
            if self.register_directory(&dir).await {
                scan.directories += 1;
            }

            let (subdirs, files) = list_directory(dir).await?;
            queue.extend(subdirs);
            scan.files.extend(files);
        }

        Ok(scan)
    }

    async fn register_directory(&self, dir: &Path) -> bool {
        let mut state = self.state.write().await;
        if state.watched.contains(dir) {
            return false;
        }

        let Some(source) = state.source.as_mut() else {
            return false;
        };
        if let Err(e) = source.watch(dir, RecursiveMode::NonRecursive) {
            warn!(path = %dir.display(), error = %e, "Failed to watch directory");
            return false;
        }

        state.watched.insert(dir.to_path_buf());
        drop(state);

        debug!(path = %dir.display(), "Watching directory");
        self.emit(WatcherEvent::DirectoryWatched {
            path: dir.display().to_string(),
        });
        true
    }

    /// Drop `path` and its descendants from the watched set. Returns `false`
    /// when `path` was not a watched directory.
    async fn forget_directory(&self, path: &Path) -> bool {
        let mut state = self.state.write().await;
        if !state.watched.contains(path) {
            return false;
        }

        let gone: Vec<PathBuf> = state
            .watched
            .iter()
            .filter(|p| p.starts_with(path))
            .cloned()
            .collect();
        for dir in &gone {
            state.watched.remove(dir);
            if let Some(source) = state.source.as_mut() {
                // The backend usually dropped the watch already.
                let _ = source.unwatch(dir);
            }
        }

        debug!(path = %path.display(), count = gone.len(), "Stopped watching directory");
        true
    }

    async fn dispatch(&self, event: FileEvent) {
        let handler = self.state.read().await.handlers.get(&event.kind).cloned();

        self.emit(WatcherEvent::FileObserved {
            kind: event.kind.to_string(),
            path: event.path.display().to_string(),
        });

        let Some(handler) = handler else {
            debug!(kind = %event.kind, path = %event.path.display(), "No handler registered");
            return;
        };

        if let Err(e) = handler.handle(&event).await {
            warn!(
                kind = %event.kind,
                path = %event.path.display(),
                error = %e,
                "File event handler failed"
            );
        }
    }

    fn source_error(&self, err: notify::Error) {
        warn!(error = %err, paths = ?err.paths, "Notification source error");
        self.emit(WatcherEvent::SourceError {
            message: err.to_string(),
        });
    }

    async fn release_source(&self) {
        let source = self.state.write().await.source.take();
        drop(source);
    }

    fn emit(&self, event: WatcherEvent) {
        if let Some(bus) = &self.event_bus {
            let _ = bus.emit(CoreEvent::Watcher(event));
        }
    }
}

/// One level of `dir`: subdirectories and regular files.
async fn list_directory(dir: PathBuf) -> Result<(Vec<PathBuf>, Vec<PathBuf>)> {
    tokio::task::spawn_blocking(move || {
        let mut subdirs = Vec::new();
        let mut files = Vec::new();

        for entry in WalkDir::new(&dir)
            .min_depth(1)
            .max_depth(1)
            .sort_by_file_name()
        {
            match entry {
                Ok(entry) if entry.file_type().is_dir() => subdirs.push(entry.into_path()),
                Ok(entry) if entry.file_type().is_file() => files.push(entry.into_path()),
                Ok(_) => {}
                Err(e) => warn!(path = %dir.display(), error = %e, "Error walking directory"),
            }
        }

        (subdirs, files)
    })
    .await
    .map_err(|e| WatcherError::Join(e.to_string()))
}
