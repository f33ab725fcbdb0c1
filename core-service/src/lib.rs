//! # Core Service
//!
//! Pipeline wiring and the service façade for the lyrics sync daemon.
//!
//! ## Overview
//!
//! - [`PipelineWiring`] turns directory watcher events into lyric tasks.
//! - [`LyricsSyncService`] builds the watcher, the task queue and both lyric
//!   handlers from a [`PipelineConfig`](core_runtime::config::PipelineConfig)
//!   and owns their start and shutdown.
//!
//! Bridges missing from the configuration fall back to the `bridge-desktop`
//! implementations.

pub mod error;
pub mod service;
pub mod wiring;

pub use error::{CoreError, Result};
pub use service::{LyricsSyncService, LyricsSyncServiceBuilder};
pub use wiring::PipelineWiring;
