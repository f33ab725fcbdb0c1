//! # Desktop Bridge Implementations
//!
//! Default implementations of bridge traits for a long-running host process
//! (Linux containers, macOS, Windows).
//!
//! ## Overview
//!
//! This crate provides production implementations of the bridge traits the
//! lyrics pipeline needs:
//! - `HttpClient` using `reqwest`
//! - `FileSystemAccess` using `tokio::fs`
//!
//! ## Usage
//!
//! ```ignore
//! use bridge_desktop::{ReqwestHttpClient, TokioFileSystem};
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let http_client = ReqwestHttpClient::builder()
//!         .timeout(Duration::from_secs(30))
//!         .user_agent("refrain/0.1.0")
//!         .build()?;
//!     let fs = TokioFileSystem::new();
//!     Ok(())
//! }
//! ```

mod filesystem;
mod http;

pub use filesystem::TokioFileSystem;
pub use http::{ReqwestHttpClient, ReqwestHttpClientBuilder};
