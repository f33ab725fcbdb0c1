//! # Task Model
//!
//! A [`Task`] is one unit of queued work, identified by its type and a
//! deterministic id derived from its subject (for lyric tasks, the audio file
//! path). Handlers report an explicit [`TaskOutcome`] instead of overloading
//! the error channel.
//!
//! ## Lifecycle
//!
//! ```text
//!              submit
//!                │
//!                ▼
//!  ┌────────► Pending ──claim──► Processing ──Success──► Succeeded
//!  │                                 │ │ │
//!  │  Retry (attempts < max)         │ │ └──Skip──────► Skipped
//!  └─────────────────────────────────┘ └────Revoke────► Revoked
//!                                    │
//!                                    └─Retry (attempts == max)─► Failed
//! ```

use std::fmt;
use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::error::{Result, SyncError};

/// Default attempt budget for a task.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 10;

/// Task status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TaskStatus {
    /// Waiting for a worker, possibly delay-gated by `process_after`
    Pending,
    /// Claimed by a worker
    Processing,
    /// The handler did its work
    Succeeded,
    /// The input could not be processed; never retried
    Skipped,
    /// The work was already satisfied
    Revoked,
    /// Attempts exhausted
    Failed,
}

impl TaskStatus {
    /// Convert status to database string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Succeeded => "succeeded",
            Self::Skipped => "skipped",
            Self::Revoked => "revoked",
            Self::Failed => "failed",
        }
    }

    /// Check if the task will never run again
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Succeeded | Self::Skipped | Self::Revoked | Self::Failed
        )
    }

    /// Check if status is active (pending or processing)
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Pending | Self::Processing)
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TaskStatus {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "pending" => Ok(Self::Pending),
            "processing" => Ok(Self::Processing),
            "succeeded" => Ok(Self::Succeeded),
            "skipped" => Ok(Self::Skipped),
            "revoked" => Ok(Self::Revoked),
            "failed" => Ok(Self::Failed),
            _ => Err(SyncError::InvalidStatus(s.to_string())),
        }
    }
}

/// Delay before a retryable task becomes eligible again
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Backoff {
    /// Same delay after every failure
    Fixed { delay: Duration },
    /// `base * 2^(attempts - 1)`, capped at `max`
    Exponential { base: Duration, max: Duration },
}

impl Backoff {
    pub fn fixed(delay: Duration) -> Self {
        Backoff::Fixed { delay }
    }

    pub fn exponential(base: Duration, max: Duration) -> Self {
        Backoff::Exponential { base, max }
    }

    /// Delay after `attempts` completed executions.
    pub fn delay(&self, attempts: u32) -> Duration {
        match *self {
            Backoff::Fixed { delay } => delay,
            Backoff::Exponential { base, max } => {
                let exponent = attempts.saturating_sub(1).min(31);
                base.checked_mul(1u32 << exponent)
                    .map(|delay| delay.min(max))
                    .unwrap_or(max)
            }
        }
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Backoff::exponential(Duration::from_secs(60), Duration::from_secs(24 * 60 * 60))
    }
}

/// Identity used for duplicate suppression: task type plus task id
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskKey {
    pub task_type: String,
    pub id: String,
}

impl TaskKey {
    pub fn new(task_type: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            task_type: task_type.into(),
            id: id.into(),
        }
    }
}

impl fmt::Display for TaskKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.task_type, self.id)
    }
}

/// A queued unit of work
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Task {
    pub task_type: String,
    /// Deterministic id derived from the task's subject
    pub id: String,
    pub payload: Vec<u8>,
    pub max_attempts: u32,
    pub backoff: Backoff,
    /// Relative delay applied at submission when `process_after` is unset.
    /// Not persisted.
    pub delay: Duration,
    pub process_after: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub status: TaskStatus,
    /// Completed executions
    pub attempts: u32,
    pub last_error: Option<String>,
}

impl Task {
    /// Create a pending task with the default attempt budget and backoff
    pub fn new(task_type: impl Into<String>, id: impl Into<String>, payload: impl Into<Vec<u8>>) -> Self {
        let now = Utc::now();
        Self {
            task_type: task_type.into(),
            id: id.into(),
            payload: payload.into(),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            backoff: Backoff::default(),
            delay: Duration::ZERO,
            process_after: None,
            created_at: now,
            updated_at: now,
            status: TaskStatus::Pending,
            attempts: 0,
            last_error: None,
        }
    }

    /// Create a task whose payload is `value` encoded as JSON
    pub fn json<T: Serialize>(
        task_type: impl Into<String>,
        id: impl Into<String>,
        value: &T,
    ) -> Result<Self> {
        Ok(Self::new(task_type, id, serde_json::to_vec(value)?))
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub fn with_backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    /// Hold the task back for `delay` after submission
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Hold the task back until `at`
    pub fn with_process_after(mut self, at: DateTime<Utc>) -> Self {
        self.process_after = Some(at);
        self
    }

    pub fn key(&self) -> TaskKey {
        TaskKey::new(self.task_type.clone(), self.id.clone())
    }

    /// Pending and not delay-gated at `now`
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.status == TaskStatus::Pending && self.process_after.map_or(true, |at| at <= now)
    }

    /// Decode a JSON payload
    pub fn decode_payload<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_slice(&self.payload)?)
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.task_type.trim().is_empty() {
            return Err(SyncError::InvalidTask("task type must not be empty".into()));
        }
        if self.id.trim().is_empty() {
            return Err(SyncError::InvalidTask("task id must not be empty".into()));
        }
        if self.max_attempts == 0 {
            return Err(SyncError::InvalidTask(format!(
                "task {} must allow at least one attempt",
                self.id
            )));
        }
        Ok(())
    }
}

/// Result of one handler execution
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome {
    /// The work was done
    Success,
    /// The input is permanently unprocessable
    Skip(String),
    /// The work was already satisfied or no longer applies
    Revoke(String),
    /// Transient failure; retried after backoff while attempts remain
    Retry(String),
}

impl TaskOutcome {
    pub fn skip(reason: impl fmt::Display) -> Self {
        TaskOutcome::Skip(reason.to_string())
    }

    pub fn revoke(reason: impl fmt::Display) -> Self {
        TaskOutcome::Revoke(reason.to_string())
    }

    pub fn retry(error: impl fmt::Display) -> Self {
        TaskOutcome::Retry(error.to_string())
    }
}

/// Execution context handed to a handler
#[derive(Debug, Clone)]
pub struct TaskContext {
    pub task_type: String,
    pub task_id: String,
    /// Executions completed before this one
    pub attempts: u32,
    /// Fires when the queue gives up waiting for in-flight handlers
    pub cancel: CancellationToken,
}

/// Executes tasks of one type
#[async_trait]
pub trait TaskHandler: Send + Sync {
    async fn handle(&self, ctx: &TaskContext, payload: &[u8]) -> TaskOutcome;
}

/// Adapter turning an async closure into a [`TaskHandler`].
pub struct FnTaskHandler<F, Fut> {
    f: F,
    _marker: PhantomData<fn() -> Fut>,
}

#[async_trait]
impl<F, Fut> TaskHandler for FnTaskHandler<F, Fut>
where
    F: Fn(TaskContext, Vec<u8>) -> Fut + Send + Sync,
    Fut: Future<Output = TaskOutcome> + Send,
{
    async fn handle(&self, ctx: &TaskContext, payload: &[u8]) -> TaskOutcome {
        (self.f)(ctx.clone(), payload.to_vec()).await
    }
}

/// Wrap an async closure as a shareable task handler.
pub fn task_handler_fn<F, Fut>(f: F) -> Arc<dyn TaskHandler>
where
    F: Fn(TaskContext, Vec<u8>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = TaskOutcome> + Send + 'static,
{
    Arc::new(FnTaskHandler {
        f,
        _marker: PhantomData,
    })
}
