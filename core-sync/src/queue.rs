//! # Task Queue
//!
//! Idempotent work queue drained by a bounded pool of concurrent workers.
//!
//! ## Overview
//!
//! - **Duplicate suppression**: a task is identified by its type and id. While
//!   a task with the same key is pending or processing, a new submission is
//!   reported as [`Submission::Duplicate`] and dropped.
//! - **At most one in flight**: the in-memory index holds one entry per key and
//!   only a pending entry can be claimed, so the same key never runs twice at
//!   once.
//! - **Delayed execution**: a task is not claimed before its `process_after`.
//! - **Retry**: a [`TaskOutcome::Retry`] reschedules the task after its backoff
//!   until `max_attempts` executions have completed.
//! - **Isolation**: every handler runs in its own spawned task with a
//!   per-invocation timeout. Panics and timeouts become retryable failures.
//! - **Durability**: with a [`TaskRepository`] every state change is written
//!   through, and [`TaskQueue::restore`] re-indexes unfinished work.
//!
//! ## Usage
//!
//! ```ignore
//! let queue = TaskQueue::builder(QueueConfig::default())
//!     .event_bus(event_bus.clone())
//!     .build();
//! queue.register_handler(DOWNLOAD_LYRICS, Arc::new(sync_task)).await;
//!
//! let cancel = CancellationToken::new();
//! let runner = {
//!     let queue = queue.clone();
//!     let cancel = cancel.clone();
//!     tokio::spawn(async move { queue.run(cancel).await })
//! };
//!
//! queue.submit(Task::new(DOWNLOAD_LYRICS, "/music/a/song.flac", payload)).await?;
//! // ...
//! cancel.cancel();
//! runner.await??;
//! ```

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use bridge_traits::time::{Clock, SystemClock};
use chrono::{DateTime, Utc};
use core_runtime::config::PipelineConfig;
use core_runtime::events::{CoreEvent, EventBus, TaskEvent};
use serde::{Deserialize, Serialize};
use tokio::sync::{Notify, RwLock, Semaphore};
use tokio::task::{JoinError, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::error::{Result, SyncError};
use crate::repository::TaskRepository;
use crate::task::{Task, TaskContext, TaskHandler, TaskKey, TaskOutcome, TaskStatus};

/// Longest an idle dispatcher sleeps before looking for due tasks again.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Worker pool settings
#[derive(Debug, Clone)]
pub struct QueueConfig {
    /// Maximum handlers executing at once
    pub concurrency: usize,
    /// Per-invocation handler timeout
    pub handler_timeout: Duration,
    /// Time in-flight handlers get to finish after cancellation
    pub shutdown_grace: Duration,
    pub poll_interval: Duration,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            concurrency: 10,
            handler_timeout: Duration::from_secs(120),
            shutdown_grace: Duration::from_secs(30),
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

impl From<&PipelineConfig> for QueueConfig {
    fn from(config: &PipelineConfig) -> Self {
        Self {
            concurrency: config.worker_concurrency,
            handler_timeout: config.task_policy.handler_timeout,
            shutdown_grace: config.shutdown_grace,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

/// Result of [`TaskQueue::submit`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Submission {
    Accepted(String),
    /// A task with the same key is already pending or in flight
    Duplicate(String),
}

impl Submission {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Submission::Accepted(_))
    }

    pub fn id(&self) -> &str {
        match self {
            Submission::Accepted(id) | Submission::Duplicate(id) => id,
        }
    }

    /// Turn a duplicate into [`SyncError::DuplicateTask`].
    pub fn into_result(self) -> Result<String> {
        match self {
            Submission::Accepted(id) => Ok(id),
            Submission::Duplicate(task_id) => Err(SyncError::DuplicateTask { task_id }),
        }
    }
}

/// Queue statistics
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueStats {
    pub pending: u64,
    pub processing: u64,
    /// Finished since this queue was created
    pub succeeded: u64,
    pub skipped: u64,
    pub revoked: u64,
    pub failed: u64,
    /// Configured worker concurrency
    pub max_concurrent: usize,
}

impl QueueStats {
    /// Tasks that reached a terminal status
    pub fn finished(&self) -> u64 {
        self.succeeded + self.skipped + self.revoked + self.failed
    }

    /// Nothing pending or processing
    pub fn is_idle(&self) -> bool {
        self.pending == 0 && self.processing == 0
    }
}

#[derive(Default)]
struct QueueState {
    tasks: HashMap<TaskKey, Task>,
    succeeded: u64,
    skipped: u64,
    revoked: u64,
    failed: u64,
}

impl QueueState {
    fn record(&mut self, status: TaskStatus) {
        match status {
            TaskStatus::Succeeded => self.succeeded += 1,
            TaskStatus::Skipped => self.skipped += 1,
            TaskStatus::Revoked => self.revoked += 1,
            TaskStatus::Failed => self.failed += 1,
            TaskStatus::Pending | TaskStatus::Processing => {}
        }
    }
}

enum Claim {
    Task(Task),
    /// Nothing due; earliest delayed task if any
    Idle(Option<DateTime<Utc>>),
}

struct Inner {
    config: QueueConfig,
    state: Mutex<QueueState>,
    handlers: RwLock<HashMap<String, Arc<dyn TaskHandler>>>,
    repository: Option<Arc<dyn TaskRepository>>,
    clock: Arc<dyn Clock>,
    event_bus: Option<EventBus>,
    wake: Notify,
    running: AtomicBool,
    closed: AtomicBool,
}

/// Builder for [`TaskQueue`]
pub struct TaskQueueBuilder {
    config: QueueConfig,
    repository: Option<Arc<dyn TaskRepository>>,
    clock: Arc<dyn Clock>,
    event_bus: Option<EventBus>,
}

impl TaskQueueBuilder {
    /// Write every state change through to `repository`
    pub fn repository(mut self, repository: Arc<dyn TaskRepository>) -> Self {
        self.repository = Some(repository);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Publish [`TaskEvent`]s on `event_bus`
    pub fn event_bus(mut self, event_bus: EventBus) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    pub fn build(self) -> TaskQueue {
        TaskQueue {
            inner: Arc::new(Inner {
                config: self.config,
                state: Mutex::new(QueueState::default()),
                handlers: RwLock::new(HashMap::new()),
                repository: self.repository,
                clock: self.clock,
                event_bus: self.event_bus,
                wake: Notify::new(),
                running: AtomicBool::new(false),
                closed: AtomicBool::new(false),
            }),
        }
    }
}

/// Idempotent task queue with a bounded worker pool
///
/// Cloning is cheap; clones share the same queue.
#[derive(Clone)]
pub struct TaskQueue {
    inner: Arc<Inner>,
}

impl TaskQueue {
    /// In-memory queue on the system clock
    pub fn new(config: QueueConfig) -> Self {
        Self::builder(config).build()
    }

    pub fn builder(config: QueueConfig) -> TaskQueueBuilder {
        TaskQueueBuilder {
            config,
            repository: None,
            clock: Arc::new(SystemClock),
            event_bus: None,
        }
    }

    /// Associate `task_type` with `handler`, replacing any previous handler.
    pub async fn register_handler(
        &self,
        task_type: impl Into<String>,
        handler: Arc<dyn TaskHandler>,
    ) {
        let task_type = task_type.into();
        let mut handlers = self.inner.handlers.write().await;
        if handlers.insert(task_type.clone(), handler).is_some() {
            debug!(task_type = %task_type, "Replaced task handler");
        }
    }

    /// Enqueue `task`.
    ///
    /// The task's status, attempt counter and timestamps are reset. A task
    /// carrying a relative delay gets `process_after = now + delay` unless
    /// `process_after` is already set.
    ///
    /// # Errors
    ///
    /// - [`SyncError::InvalidTask`] for an empty type or id, or zero attempts
    /// - [`SyncError::NoHandler`] if no handler is registered for the type
    /// - [`SyncError::Cancelled`] once the queue has shut down
    pub async fn submit(&self, mut task: Task) -> Result<Submission> {
        if self.inner.closed.load(Ordering::SeqCst) {
            return Err(SyncError::Cancelled);
        }
        task.validate()?;
        if !self.inner.handlers.read().await.contains_key(&task.task_type) {
            return Err(SyncError::NoHandler {
                task_type: task.task_type,
            });
        }

        let now = self.inner.clock.now();
        let key = task.key();
        {
            let mut state = self.inner.state();
            if state
                .tasks
                .get(&key)
                .is_some_and(|existing| existing.status.is_active())
            {
                debug!(
                    task_type = %task.task_type,
                    task_id = %task.id,
                    "Duplicate submission ignored"
                );
                return Ok(Submission::Duplicate(task.id));
            }

            task.status = TaskStatus::Pending;
            task.attempts = 0;
            task.last_error = None;
            task.created_at = now;
            task.updated_at = now;
            if task.process_after.is_none() && !task.delay.is_zero() {
                task.process_after = Some(offset(now, task.delay));
            }
            state.tasks.insert(key, task.clone());
        }

        self.inner.persist(&task).await;

        info!(
            task_type = %task.task_type,
            task_id = %task.id,
            process_after = ?task.process_after,
            "Task submitted"
        );
        self.inner.emit(TaskEvent::Submitted {
            task_type: task.task_type.clone(),
            task_id: task.id.clone(),
        });
        self.inner.wake.notify_one();

        Ok(Submission::Accepted(task.id))
    }

    /// Re-index unfinished tasks from the repository.
    ///
    /// Tasks that were processing when the previous process stopped return to
    /// pending without consuming an attempt. Returns the number of tasks added
    /// to the index.
    pub async fn restore(&self) -> Result<usize> {
        let Some(repository) = &self.inner.repository else {
            return Ok(0);
        };

        let now = self.inner.clock.now();
        let mut restored = 0;
        for mut task in repository.load_active().await? {
            let interrupted = task.status == TaskStatus::Processing;
            if interrupted {
                task.status = TaskStatus::Pending;
                task.updated_at = now;
            }

            let inserted = match self.inner.state().tasks.entry(task.key()) {
                Entry::Vacant(slot) => {
                    slot.insert(task.clone());
                    true
                }
                Entry::Occupied(_) => false,
            };

            if inserted {
                restored += 1;
                if interrupted {
                    debug!(task_id = %task.id, "Interrupted task returned to pending");
                    self.inner.persist(&task).await;
                }
            }
        }

        info!(restored, "Restored unfinished tasks");
        if restored > 0 {
            self.inner.wake.notify_one();
        }
        Ok(restored)
    }

    /// Drain the queue until `cancel` fires.
    ///
    /// On cancellation no new task is claimed. In-flight handlers get
    /// `shutdown_grace` to finish; after that they are aborted and their tasks
    /// return to pending without consuming an attempt. The queue rejects
    /// submissions once this returns.
    ///
    /// # Errors
    ///
    /// [`SyncError::AlreadyRunning`] if another `run` is active, or
    /// [`SyncError::Cancelled`] if the queue already shut down.
    pub async fn run(&self, cancel: CancellationToken) -> Result<()> {
        if self.inner.closed.load(Ordering::SeqCst) {
            return Err(SyncError::Cancelled);
        }
        if self.inner.running.swap(true, Ordering::SeqCst) {
            return Err(SyncError::AlreadyRunning);
        }

        let concurrency = self.inner.config.concurrency.max(1);
        let permits = Arc::new(Semaphore::new(concurrency));
        let abort = CancellationToken::new();
        let mut in_flight = JoinSet::new();
        info!(concurrency, "Task queue started");

        loop {
            while in_flight.try_join_next().is_some() {}

            let permit = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                permit = Arc::clone(&permits).acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => break,
                },
            };

            match self.inner.claim_next() {
                Claim::Task(task) => {
                    let inner = Arc::clone(&self.inner);
                    let abort = abort.clone();
                    in_flight.spawn(async move {
                        inner.execute(task, abort).await;
                        drop(permit);
                    });
                }
                Claim::Idle(next_due) => {
                    drop(permit);
                    let wait = self.inner.idle_wait(next_due);
                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => break,
                        _ = self.inner.wake.notified() => {}
                        _ = tokio::time::sleep(wait) => {}
                    }
                }
            }
        }

        self.inner.closed.store(true, Ordering::SeqCst);
        self.drain(in_flight, abort).await;
        self.inner.running.store(false, Ordering::SeqCst);
        info!("Task queue stopped");
        Ok(())
    }

    /// Snapshot of the queue counters.
    pub fn stats(&self) -> QueueStats {
        let state = self.inner.state();
        let mut stats = QueueStats {
            succeeded: state.succeeded,
            skipped: state.skipped,
            revoked: state.revoked,
            failed: state.failed,
            max_concurrent: self.inner.config.concurrency,
            ..QueueStats::default()
        };

        for task in state.tasks.values() {
            match task.status {
                TaskStatus::Pending => stats.pending += 1,
                TaskStatus::Processing => stats.processing += 1,
                _ => {}
            }
        }
        stats
    }

    /// The pending or processing task with this key, if any.
    pub fn get(&self, task_type: &str, id: &str) -> Option<Task> {
        self.inner
            .state()
            .tasks
            .get(&TaskKey::new(task_type, id))
            .cloned()
    }

    /// Delete persisted terminal tasks older than `older_than`.
    pub async fn cleanup_finished(&self, older_than: Duration) -> Result<u64> {
        let Some(repository) = &self.inner.repository else {
            return Ok(0);
        };

        let cutoff = chrono::Duration::from_std(older_than)
            .ok()
            .and_then(|age| self.inner.clock.now().checked_sub_signed(age))
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        let deleted = repository.delete_finished_before(cutoff).await?;
        info!(deleted, "Cleaned up finished tasks");
        Ok(deleted)
    }

    /// Current time on the queue's clock.
    pub fn now(&self) -> DateTime<Utc> {
        self.inner.clock.now()
    }

    pub fn is_running(&self) -> bool {
        self.inner.running.load(Ordering::SeqCst)
    }

    async fn drain(&self, mut in_flight: JoinSet<()>, abort: CancellationToken) {
        if in_flight.is_empty() {
            return;
        }

        let grace = self.inner.config.shutdown_grace;
        info!(
            in_flight = in_flight.len(),
            grace_ms = grace.as_millis() as u64,
            "Waiting for in-flight tasks"
        );

        let drained = tokio::time::timeout(grace, async {
            while in_flight.join_next().await.is_some() {}
        })
        .await;

        if drained.is_err() {
            warn!(
                remaining = in_flight.len(),
                "Shutdown grace period elapsed, aborting in-flight tasks"
            );
            abort.cancel();
            while in_flight.join_next().await.is_some() {}
        }
    }
}

impl Inner {
    fn state(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Mark the earliest due task as processing.
    fn claim_next(&self) -> Claim {
        let now = self.clock.now();
        let mut state = self.state();

        let next = state
            .tasks
            .values()
            .filter(|task| task.is_due(now))
            .min_by_key(|task| (task.process_after.unwrap_or(task.created_at), task.created_at))
            .map(Task::key);

        if let Some(task) = next.and_then(|key| state.tasks.get_mut(&key)) {
            task.status = TaskStatus::Processing;
            task.updated_at = now;
            return Claim::Task(task.clone());
        }

        Claim::Idle(
            state
                .tasks
                .values()
                .filter(|task| task.status == TaskStatus::Pending)
                .filter_map(|task| task.process_after)
                .min(),
        )
    }

    fn idle_wait(&self, next_due: Option<DateTime<Utc>>) -> Duration {
        let poll = self.config.poll_interval;
        match next_due {
            Some(at) => (at - self.clock.now())
                .to_std()
                .unwrap_or(Duration::ZERO)
                .min(poll),
            None => poll,
        }
    }

    async fn execute(self: Arc<Self>, task: Task, abort: CancellationToken) {
        self.persist(&task).await;

        let handler = self.handlers.read().await.get(&task.task_type).cloned();
        let Some(handler) = handler else {
            let reason = SyncError::NoHandler {
                task_type: task.task_type.clone(),
            };
            self.finish(task, TaskOutcome::skip(reason)).await;
            return;
        };

        debug!(
            task_type = %task.task_type,
            task_id = %task.id,
            attempts = task.attempts,
            "Task started"
        );
        self.emit(TaskEvent::Started {
            task_type: task.task_type.clone(),
            task_id: task.id.clone(),
            attempts: task.attempts,
        });

        let ctx = TaskContext {
            task_type: task.task_type.clone(),
            task_id: task.id.clone(),
            attempts: task.attempts,
            cancel: abort.child_token(),
        };
        let payload = task.payload.clone();
        let mut execution = tokio::spawn(async move { handler.handle(&ctx, &payload).await });

        let timeout = self.config.handler_timeout;
        let outcome = tokio::select! {
            result = tokio::time::timeout(timeout, &mut execution) => match result {
                Ok(Ok(outcome)) => outcome,
                Ok(Err(join_error)) => TaskOutcome::Retry(describe_join_error(join_error)),
                Err(_) => {
                    execution.abort();
                    TaskOutcome::retry(SyncError::Timeout(timeout.as_secs()))
                }
            },
            _ = abort.cancelled() => {
                execution.abort();
                self.release(task).await;
                return;
            }
        };

        self.finish(task, outcome).await;
    }

    /// Record the outcome of one completed execution.
    async fn finish(&self, mut task: Task, outcome: TaskOutcome) {
        let now = self.clock.now();
        task.attempts += 1;
        task.updated_at = now;

        let task_type = task.task_type.clone();
        let task_id = task.id.clone();
        let event = match outcome {
            TaskOutcome::Success => {
                task.status = TaskStatus::Succeeded;
                task.last_error = None;
                info!(task_type = %task_type, task_id = %task_id, "Task succeeded");
                TaskEvent::Succeeded { task_type, task_id }
            }
            TaskOutcome::Skip(reason) => {
                task.status = TaskStatus::Skipped;
                task.last_error = Some(reason.clone());
                warn!(task_type = %task_type, task_id = %task_id, reason = %reason, "Task skipped");
                TaskEvent::Skipped {
                    task_type,
                    task_id,
                    reason,
                }
            }
            TaskOutcome::Revoke(reason) => {
                task.status = TaskStatus::Revoked;
                task.last_error = None;
                info!(task_type = %task_type, task_id = %task_id, reason = %reason, "Task revoked");
                TaskEvent::Revoked {
                    task_type,
                    task_id,
                    reason,
                }
            }
            TaskOutcome::Retry(error) => {
                task.last_error = Some(error.clone());
                if task.attempts >= task.max_attempts {
                    task.status = TaskStatus::Failed;
                    warn!(
                        task_type = %task_type,
                        task_id = %task_id,
                        attempts = task.attempts,
                        error = %error,
                        "Task failed permanently"
                    );
                    TaskEvent::Failed {
                        task_type,
                        task_id,
                        attempts: task.attempts,
                        error,
                    }
                } else {
                    let retry_at = offset(now, task.backoff.delay(task.attempts));
                    task.status = TaskStatus::Pending;
                    task.process_after = Some(retry_at);
                    warn!(
                        task_type = %task_type,
                        task_id = %task_id,
                        attempts = task.attempts,
                        max_attempts = task.max_attempts,
                        retry_at = %retry_at,
                        error = %error,
                        "Task failed, will retry"
                    );
                    TaskEvent::Retrying {
                        task_type,
                        task_id,
                        attempts: task.attempts,
                        retry_at,
                        error,
                    }
                }
            }
        };

        // Persist before the index releases the key so a resubmission's row
        // is never overwritten by this one.
        self.persist(&task).await;
        {
            let mut state = self.state();
            if task.status.is_terminal() {
                state.tasks.remove(&task.key());
                state.record(task.status);
            } else {
                state.tasks.insert(task.key(), task);
            }
        }

        self.emit(event);
        self.wake.notify_one();
    }

    /// Return an aborted task to pending without consuming an attempt.
    async fn release(&self, mut task: Task) {
        task.status = TaskStatus::Pending;
        task.updated_at = self.clock.now();
        warn!(task_type = %task.task_type, task_id = %task.id, "Aborted in-flight task returned to pending");

        self.persist(&task).await;
        self.state().tasks.insert(task.key(), task);
    }

    async fn persist(&self, task: &Task) {
        let Some(repository) = &self.repository else {
            return;
        };
        if let Err(e) = repository.upsert(task).await {
            error!(
                task_type = %task.task_type,
                task_id = %task.id,
                status = %task.status,
                error = %e,
                "Failed to persist task"
            );
        }
    }

    fn emit(&self, event: TaskEvent) {
        if let Some(bus) = &self.event_bus {
            let _ = bus.emit(CoreEvent::Task(event));
        }
    }
}

fn offset(at: DateTime<Utc>, by: Duration) -> DateTime<Utc> {
    chrono::Duration::from_std(by)
        .ok()
        .and_then(|by| at.checked_add_signed(by))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

fn describe_join_error(error: JoinError) -> String {
    if !error.is_panic() {
        return format!("handler was cancelled: {error}");
    }

    let panic = error.into_panic();
    let message = panic
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "non-string panic payload".to_string());
    format!("handler panicked: {message}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::task_handler_fn;

    fn noop_queue() -> TaskQueue {
        TaskQueue::new(QueueConfig::default())
    }

    #[tokio::test]
    async fn test_submit_requires_handler() {
        let queue = noop_queue();
        let err = queue
            .submit(Task::new("lyrics:download", "/m/a.flac", Vec::new()))
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::NoHandler { task_type } if task_type == "lyrics:download"));
    }

    #[tokio::test]
    async fn test_duplicate_submission_while_pending() {
        let queue = noop_queue();
        queue
            .register_handler("t", task_handler_fn(|_, _| async { TaskOutcome::Success }))
            .await;

        let first = queue.submit(Task::new("t", "a", Vec::new())).await.unwrap();
        let second = queue.submit(Task::new("t", "a", Vec::new())).await.unwrap();
        let other_type = queue.submit(Task::new("t2", "a", Vec::new())).await;

        assert_eq!(first, Submission::Accepted("a".into()));
        assert_eq!(second, Submission::Duplicate("a".into()));
        assert!(matches!(
            second.into_result(),
            Err(SyncError::DuplicateTask { task_id }) if task_id == "a"
        ));
        assert!(matches!(other_type, Err(SyncError::NoHandler { .. })));
        assert_eq!(queue.stats().pending, 1);
    }

    #[tokio::test]
    async fn test_delay_sets_process_after() {
        let queue = noop_queue();
        queue
            .register_handler("t", task_handler_fn(|_, _| async { TaskOutcome::Success }))
            .await;

        queue
            .submit(Task::new("t", "a", Vec::new()).with_delay(Duration::from_secs(10)))
            .await
            .unwrap();

        let task = queue.get("t", "a").unwrap();
        let after = task.process_after.unwrap();
        assert_eq!(after - task.created_at, chrono::Duration::seconds(10));
        assert!(!task.is_due(queue.now()));
    }

    #[test]
    fn test_offset_saturates() {
        let now = Utc::now();
        assert_eq!(offset(now, Duration::MAX), DateTime::<Utc>::MAX_UTC);
        assert_eq!(
            offset(now, Duration::from_secs(1)),
            now + chrono::Duration::seconds(1)
        );
    }

    #[test]
    fn test_stats_helpers() {
        let stats = QueueStats {
            succeeded: 2,
            revoked: 1,
            ..QueueStats::default()
        };
        assert_eq!(stats.finished(), 3);
        assert!(stats.is_idle());
    }
}
