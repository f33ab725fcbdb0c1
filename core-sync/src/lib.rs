//! # Task Queue & Lyric Tasks
//!
//! Turns observed library changes into lyric work and executes it.
//!
//! ## Overview
//!
//! This module manages:
//! - The task model and its explicit outcome type ([`task`])
//! - An idempotent, delay-aware task queue drained by a bounded worker pool
//!   ([`queue`])
//! - Write-through SQLite persistence of queued tasks ([`repository`])
//! - The lyric download and sidecar removal handlers ([`lyrics_task`])
//!
//! ## Components
//!
//! - **Task** (`task`): type + deterministic id, payload, attempt budget, backoff
//! - **Task Queue** (`queue`): duplicate suppression, retry/backoff, panic and
//!   timeout isolation, graceful shutdown
//! - **Repository** (`repository`): `tasks` table keyed by `(task_type, id)`
//! - **Lyric Tasks** (`lyrics_task`): `lyrics:download` and `lyrics:delete`

pub mod error;
pub mod lyrics_task;
pub mod queue;
pub mod repository;
pub mod task;

pub use error::{Result, SyncError};
pub use lyrics_task::{
    DeleteLyricsTask, LyricsPayload, SyncLyricsTask, DELETE_LYRICS, DOWNLOAD_LYRICS,
};
pub use queue::{QueueConfig, QueueStats, Submission, TaskQueue, TaskQueueBuilder};
pub use repository::{SqliteTaskRepository, TaskRepository};
pub use task::{
    task_handler_fn, Backoff, Task, TaskContext, TaskHandler, TaskKey, TaskOutcome, TaskStatus,
};
