use core_metadata::MetadataError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Task {task_id} is already pending or in flight")]
    DuplicateTask { task_id: String },

    #[error("No handler registered for task type {task_type}")]
    NoHandler { task_type: String },

    #[error("Invalid task: {0}")]
    InvalidTask(String),

    #[error("Invalid task payload: {0}")]
    InvalidPayload(String),

    #[error("Invalid task status: {0}")]
    InvalidStatus(String),

    #[error("Handler timed out after {0} seconds")]
    Timeout(u64),

    #[error("Task queue is shut down")]
    Cancelled,

    #[error("Task queue is already running")]
    AlreadyRunning,

    #[error("Database error: {0}")]
    Database(String),

    #[error(transparent)]
    Metadata(#[from] MetadataError),
}

impl From<serde_json::Error> for SyncError {
    fn from(e: serde_json::Error) -> Self {
        SyncError::InvalidPayload(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, SyncError>;
