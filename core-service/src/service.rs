//! Service façade: builds the pipeline from a [`PipelineConfig`] and owns its
//! lifecycle.
//!
//! Startup order:
//!
//! 1. Restore unfinished tasks from the queue database, if configured.
//! 2. Start the worker pool.
//! 3. Register every library root with the watcher and start its loop.
//! 4. Enqueue the files found under the roots (initial scan).
//!
//! Shutdown stops the watcher first, so no new tasks are raised, then cancels
//! the queue and waits for its drain.

use std::sync::Arc;

use bridge_desktop::{ReqwestHttpClient, TokioFileSystem};
use bridge_traits::storage::FileSystemAccess;
use bridge_traits::time::Clock;
use bridge_traits::HttpClient;
use core_metadata::{LrcLibClient, LyricsProvider, MetadataExtractor};
use core_runtime::config::PipelineConfig;
use core_runtime::events::EventBus;
use core_sync::{
    DeleteLyricsTask, QueueConfig, QueueStats, SqliteTaskRepository, SyncLyricsTask, TaskQueue,
    DELETE_LYRICS, DOWNLOAD_LYRICS,
};
use core_watcher::DirectoryWatcher;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::error::{CoreError, Result};
use crate::wiring::PipelineWiring;

const EVENT_BUS_CAPACITY: usize = 1024;

/// Builder for [`LyricsSyncService`]
pub struct LyricsSyncServiceBuilder {
    config: PipelineConfig,
    provider: Option<Arc<dyn LyricsProvider>>,
    clock: Option<Arc<dyn Clock>>,
    event_bus: Option<EventBus>,
}

impl LyricsSyncServiceBuilder {
    /// Use `provider` instead of an LRCLib client built from the config.
    pub fn lyrics_provider(mut self, provider: Arc<dyn LyricsProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn event_bus(mut self, event_bus: EventBus) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    /// Construct every component. Nothing runs until
    /// [`start`](LyricsSyncService::start).
    pub async fn build(self) -> Result<LyricsSyncService> {
        let config = self.config;
        config.validate()?;

        let fs: Arc<dyn FileSystemAccess> = match &config.file_system {
            Some(fs) => Arc::clone(fs),
            None => Arc::new(TokioFileSystem::new()),
        };

        let provider = match self.provider {
            Some(provider) => provider,
            None => {
                let http: Arc<dyn HttpClient> = match &config.http_client {
                    Some(http) => Arc::clone(http),
                    None => Arc::new(
                        ReqwestHttpClient::builder()
                            .timeout(config.http_timeout)
                            .user_agent(config.user_agent.clone())
                            .build()?,
                    ),
                };
                Arc::new(LrcLibClient::new(
                    http,
                    config.lrclib_base_url.clone(),
                    config.user_agent.clone(),
                ))
            }
        };

        let event_bus = self
            .event_bus
            .unwrap_or_else(|| EventBus::new(EVENT_BUS_CAPACITY));

        let mut queue = TaskQueue::builder(QueueConfig::from(&config)).event_bus(event_bus.clone());
        if let Some(clock) = self.clock {
            queue = queue.clock(clock);
        }
        let durable = match &config.database_path {
            Some(path) => {
                queue = queue.repository(Arc::new(SqliteTaskRepository::open(path).await?));
                true
            }
            None => false,
        };
        let queue = queue.build();

        let tags = Arc::new(MetadataExtractor::new(Arc::clone(&fs)));
        queue
            .register_handler(
                DOWNLOAD_LYRICS,
                Arc::new(SyncLyricsTask::new(Arc::clone(&fs), tags, provider)),
            )
            .await;
        queue
            .register_handler(DELETE_LYRICS, Arc::new(DeleteLyricsTask::new(Arc::clone(&fs))))
            .await;

        let cancel = CancellationToken::new();
        let watcher = DirectoryWatcher::with_event_bus(cancel.child_token(), event_bus.clone())?;
        let wiring = PipelineWiring::new(queue.clone(), fs, config.task_policy);
        wiring.attach(&watcher).await;

        Ok(LyricsSyncService {
            config,
            queue,
            watcher,
            wiring,
            event_bus,
            durable,
            cancel,
            worker: Mutex::new(None),
        })
    }
}

/// The running lyrics pipeline
///
/// # Example
///
/// ```ignore
/// let service = LyricsSyncService::builder(PipelineConfig::from_env()?)
///     .build()
///     .await?;
/// service.start().await?;
/// tokio::signal::ctrl_c().await?;
/// service.shutdown().await?;
/// ```
pub struct LyricsSyncService {
    config: PipelineConfig,
    queue: TaskQueue,
    watcher: DirectoryWatcher,
    wiring: PipelineWiring,
    event_bus: EventBus,
    durable: bool,
    cancel: CancellationToken,
    worker: Mutex<Option<JoinHandle<core_sync::Result<()>>>>,
}

impl LyricsSyncService {
    pub fn builder(config: PipelineConfig) -> LyricsSyncServiceBuilder {
        LyricsSyncServiceBuilder {
            config,
            provider: None,
            clock: None,
            event_bus: None,
        }
    }

    /// Start workers and watcher, then enqueue the initial scan.
    ///
    /// A failed start leaves nothing running: the watcher is stopped and the
    /// worker pool drained before the error is returned.
    ///
    /// # Errors
    ///
    /// [`CoreError::AlreadyStarted`] on a second call or after a failed
    /// start. A library root that cannot be watched fails startup.
    pub async fn start(&self) -> Result<()> {
        let mut worker = self.worker.lock().await;
        if worker.is_some() || self.cancel.is_cancelled() {
            return Err(CoreError::AlreadyStarted);
        }

        if self.durable {
            let restored = self.queue.restore().await?;
            info!(restored, "Restored unfinished tasks");
        }

        let queue = self.queue.clone();
        let token = self.cancel.child_token();
        let handle = tokio::spawn(async move { queue.run(token).await });

        if let Err(e) = self.watch_roots().await {
            error!(error = %e, "Startup failed, stopping workers");
            if let Err(stop) = self.watcher.stop().await {
                warn!(error = %stop, "Watcher did not stop cleanly");
            }
            self.cancel.cancel();
            if let Err(join) = handle.await {
                error!(error = %join, "Worker pool task failed");
            }
            return Err(e);
        }
        *worker = Some(handle);

        info!(
            roots = self.config.library_paths.len(),
            workers = self.config.worker_concurrency,
            "Lyrics sync service started"
        );
        Ok(())
    }

    async fn watch_roots(&self) -> Result<()> {
        let mut scans = Vec::with_capacity(self.config.library_paths.len());
        for root in &self.config.library_paths {
            scans.push(self.watcher.add_root(root).await?);
        }
        self.watcher.start().await?;

        if self.config.features.initial_scan {
            for scan in &scans {
                self.wiring.enqueue_scan(scan).await?;
            }
        }
        Ok(())
    }

    /// Stop the watcher, then drain the queue.
    ///
    /// # Errors
    ///
    /// [`CoreError::NotRunning`] if the service was never started.
    pub async fn shutdown(&self) -> Result<()> {
        let Some(worker) = self.worker.lock().await.take() else {
            return Err(CoreError::NotRunning);
        };

        info!("Shutting down lyrics sync service");
        if let Err(e) = self.watcher.stop().await {
            warn!(error = %e, "Watcher did not stop cleanly");
        }

        self.cancel.cancel();
        match worker.await {
            Ok(result) => result?,
            Err(e) => {
                error!(error = %e, "Worker pool task failed");
                return Err(CoreError::Worker(e.to_string()));
            }
        }

        let stats = self.queue.stats();
        info!(
            pending = stats.pending,
            succeeded = stats.succeeded,
            skipped = stats.skipped,
            revoked = stats.revoked,
            failed = stats.failed,
            "Lyrics sync service stopped"
        );
        Ok(())
    }

    pub fn queue(&self) -> &TaskQueue {
        &self.queue
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.event_bus
    }

    pub fn stats(&self) -> QueueStats {
        self.queue.stats()
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }
}
