use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum WatcherError {
    #[error("Not a directory: {0}")]
    NotADirectory(PathBuf),

    #[error("Watcher is already running")]
    AlreadyRunning,

    #[error("Watcher has been stopped")]
    Stopped,

    #[error("Notification source error: {0}")]
    Notify(#[from] notify::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Background task failed: {0}")]
    Join(String),
}

pub type Result<T> = std::result::Result<T, WatcherError>;
