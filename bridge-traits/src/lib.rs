//! # Host Bridge Traits
//!
//! Capability traits the lyrics pipeline consumes from its host.
//!
//! ## Overview
//!
//! The core never touches the network or the disk directly. Every side effect
//! goes through one of the traits below so that the pipeline can be exercised
//! against in-memory fakes in tests and against `bridge-desktop` in production.
//!
//! ## Traits
//!
//! ### Networking & I/O
//! - [`HttpClient`](http::HttpClient) - Async HTTP operations with retry support
//! - [`FileSystemAccess`](storage::FileSystemAccess) - File I/O for audio files and lyric sidecars
//!
//! ### Utilities
//! - [`Clock`](time::Clock) - Time source for deterministic scheduling tests
//! - [`LoggerSink`](time::LoggerSink) - Forward structured logs to a host logger
//!
//! ## Error Handling
//!
//! All bridge traits use the [`BridgeError`](error::BridgeError) type. Implementations
//! should keep the original `std::io::Error` when one exists so callers can
//! inspect its [`ErrorKind`](std::io::ErrorKind) (for example `NotFound` or
//! `AlreadyExists` on sidecar files).
//!
//! ## Thread Safety
//!
//! All bridge traits require `Send + Sync` so a single instance can be shared
//! between the watcher loop and the worker pool behind an `Arc`.
//!
//! ## Examples
//!
//! ```ignore
//! use bridge_traits::http::{HttpClient, HttpRequest, HttpResponse};
//! use bridge_traits::error::Result;
//! use async_trait::async_trait;
//!
//! pub struct MyHttpClient {
//!     client: reqwest::Client,
//! }
//!
//! #[async_trait]
//! impl HttpClient for MyHttpClient {
//!     async fn execute(&self, request: HttpRequest) -> Result<HttpResponse> {
//!         todo!()
//!     }
//! }
//! ```

pub mod error;
pub mod http;
pub mod storage;
pub mod time;

pub use error::BridgeError;

// Re-export commonly used types
pub use http::{HttpClient, HttpRequest, HttpResponse, RetryPolicy};
pub use storage::{FileMetadata, FileSystemAccess};
pub use time::{Clock, LogEntry, LogLevel, LoggerSink, ManualClock, SystemClock};
