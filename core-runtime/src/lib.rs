//! # Core Runtime Module
//!
//! Provides foundational runtime infrastructure for the lyrics pipeline:
//! - Logging and tracing infrastructure
//! - Configuration management
//! - Event bus system
//!
//! ## Overview
//!
//! This crate contains the runtime utilities that every other crate depends
//! on. It establishes the logging conventions, the configuration surface and
//! the event broadcasting used by the watcher and the task queue.

pub mod config;
pub mod error;
pub mod events;
pub mod logging;

pub use error::{Error, Result};
