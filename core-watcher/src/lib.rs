//! # Directory Watcher
//!
//! Observes music library directories and turns raw OS notifications into
//! [`FileEvent`]s dispatched to one handler per [`FileEventKind`].
//!
//! ## Overview
//!
//! - [`DirectoryWatcher::add_root`] registers a directory tree and reports the
//!   regular files found, which the service uses for its initial scan.
//! - [`DirectoryWatcher::start`] spawns a single dispatch loop; events are
//!   handled in arrival order.
//! - New directories are registered as soon as their `Created` event is seen,
//!   and files already inside them are reported as synthetic `Created` events.
//! - Source errors are logged and the loop keeps running. The loop exits on
//!   [`DirectoryWatcher::stop`] or when its cancellation token fires.

pub mod error;
pub mod event;
pub mod handler;
pub mod watcher;

pub use error::{Result, WatcherError};
pub use event::{FileEvent, FileEventKind};
pub use handler::{handler_fn, FileEventHandler, HandlerError};
pub use watcher::{DirectoryWatcher, RootScan};
