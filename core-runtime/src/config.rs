//! # Pipeline Configuration Module
//!
//! Provides configuration management for the lyrics sync pipeline.
//!
//! ## Overview
//!
//! The configuration system uses a builder pattern to construct a
//! `PipelineConfig` instance that holds every setting and optional bridge the
//! pipeline needs. It enforces fail-fast validation so a bad value stops the
//! process at startup instead of surfacing as a stuck queue later.
//!
//! ## Optional Dependencies (with desktop defaults)
//!
//! - `HttpClient` - HTTP operations (desktop default: reqwest)
//! - `FileSystemAccess` - File I/O (desktop default: tokio fs)
//!
//! When a bridge is not injected, `core-service` falls back to the
//! `bridge-desktop` implementation.
//!
//! ## Usage
//!
//! ### Builder
//!
//! ```
//! use core_runtime::config::PipelineConfig;
//! use std::time::Duration;
//!
//! let config = PipelineConfig::builder()
//!     .library_path("/music")
//!     .worker_concurrency(4)
//!     .process_delay(Duration::from_secs(5))
//!     .build()
//!     .expect("valid config");
//!
//! assert_eq!(config.worker_concurrency, 4);
//! ```
//!
//! ### Environment
//!
//! ```ignore
//! use core_runtime::config::PipelineConfig;
//!
//! // MUSIC_LIBRARY_PATH=/music WORKER_CONCURRENCY=4 refrain
//! let config = PipelineConfig::from_env()?;
//! ```
//!
//! ## Error Handling
//!
//! The builder validates every field and returns actionable messages:
//!
//! ```should_panic
//! use core_runtime::config::PipelineConfig;
//!
//! let config = PipelineConfig::builder()
//!     .library_path("/music")
//!     .worker_concurrency(0)
//!     .build()
//!     .expect("Should fail - concurrency must be positive");
//! ```

use crate::error::{Error, Result};
use bridge_traits::{FileSystemAccess, HttpClient};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

pub const DEFAULT_LIBRARY_PATH: &str = "/music";
pub const DEFAULT_LRCLIB_BASE_URL: &str = "https://lrclib.net/api";
pub const DEFAULT_WORKER_CONCURRENCY: usize = 10;
pub const MAX_WORKER_CONCURRENCY: usize = 256;
pub const DEFAULT_MAX_ATTEMPTS: u32 = 10;
pub const DEFAULT_RETRY_BACKOFF: Duration = Duration::from_secs(60);
pub const DEFAULT_RETRY_BACKOFF_MAX: Duration = Duration::from_secs(24 * 60 * 60);
pub const DEFAULT_PROCESS_DELAY: Duration = Duration::from_secs(10);
pub const DEFAULT_HANDLER_TIMEOUT: Duration = Duration::from_secs(120);
pub const DEFAULT_SHUTDOWN_GRACE: Duration = Duration::from_secs(30);
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Default `User-Agent` sent to the lyrics provider.
pub fn default_user_agent() -> String {
    format!("refrain/{}", env!("CARGO_PKG_VERSION"))
}

/// Configuration for the lyrics sync pipeline.
///
/// Use [`PipelineConfigBuilder`] or [`PipelineConfig::from_env`] to construct
/// instances.
#[derive(Clone)]
pub struct PipelineConfig {
    /// Library roots to scan and watch
    pub library_paths: Vec<PathBuf>,

    /// Base URL of the LRCLib-compatible API, without trailing slash
    pub lrclib_base_url: String,

    /// `User-Agent` header for provider requests
    pub user_agent: String,

    /// Timeout applied to each provider request
    pub http_timeout: Duration,

    /// Maximum number of tasks executing at once
    pub worker_concurrency: usize,

    /// Retry and scheduling policy for queued tasks
    pub task_policy: TaskPolicy,

    /// Grace period for in-flight handlers on shutdown
    pub shutdown_grace: Duration,

    /// SQLite file backing the task queue. `None` keeps the queue in memory.
    pub database_path: Option<PathBuf>,

    /// HTTP client for provider requests (optional with desktop default)
    pub http_client: Option<Arc<dyn HttpClient>>,

    /// File system access abstraction (optional with desktop default)
    pub file_system: Option<Arc<dyn FileSystemAccess>>,

    /// Feature flags
    pub features: FeatureFlags,
}

impl std::fmt::Debug for PipelineConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineConfig")
            .field("library_paths", &self.library_paths)
            .field("lrclib_base_url", &self.lrclib_base_url)
            .field("user_agent", &self.user_agent)
            .field("http_timeout", &self.http_timeout)
            .field("worker_concurrency", &self.worker_concurrency)
            .field("task_policy", &self.task_policy)
            .field("shutdown_grace", &self.shutdown_grace)
            .field("database_path", &self.database_path)
            .field(
                "http_client",
                &self.http_client.as_ref().map(|_| "HttpClient { ... }"),
            )
            .field(
                "file_system",
                &self
                    .file_system
                    .as_ref()
                    .map(|_| "FileSystemAccess { ... }"),
            )
            .field("features", &self.features)
            .finish()
    }
}

/// Feature flags control optional behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeatureFlags {
    /// Enqueue every audio file found under the library roots at startup
    pub initial_scan: bool,
}

impl Default for FeatureFlags {
    fn default() -> Self {
        Self { initial_scan: true }
    }
}

/// Retry and scheduling policy for queued tasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskPolicy {
    /// Executions allowed before a task is marked failed
    pub max_attempts: u32,

    /// Delay before the first retry; doubles on each subsequent retry
    pub retry_backoff: Duration,

    /// Upper bound on the retry delay
    pub retry_backoff_max: Duration,

    /// Settle delay applied to download tasks raised by file events
    pub process_delay: Duration,

    /// Per-invocation handler timeout
    pub handler_timeout: Duration,
}

impl Default for TaskPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            retry_backoff: DEFAULT_RETRY_BACKOFF,
            retry_backoff_max: DEFAULT_RETRY_BACKOFF_MAX,
            process_delay: DEFAULT_PROCESS_DELAY,
            handler_timeout: DEFAULT_HANDLER_TIMEOUT,
        }
    }
}

impl TaskPolicy {
    /// Validates the policy
    pub fn validate(&self) -> Result<()> {
        if self.max_attempts == 0 {
            return Err(Error::Config(
                "Task max attempts must be at least 1".to_string(),
            ));
        }

        if self.retry_backoff > self.retry_backoff_max {
            return Err(Error::Config(format!(
                "Retry backoff ({:?}) exceeds the backoff cap ({:?})",
                self.retry_backoff, self.retry_backoff_max
            )));
        }

        if self.handler_timeout.is_zero() {
            return Err(Error::Config(
                "Handler timeout must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

impl PipelineConfig {
    /// Creates a new builder for constructing a `PipelineConfig`.
    pub fn builder() -> PipelineConfigBuilder {
        PipelineConfigBuilder::default()
    }

    /// Builds a configuration from process environment variables.
    ///
    /// | Variable | Field |
    /// |----------|-------|
    /// | `MUSIC_LIBRARY_PATH` | `library_paths` (comma separated, default `/music`) |
    /// | `LRCLIB_BASE_URL` | `lrclib_base_url` |
    /// | `WORKER_CONCURRENCY` | `worker_concurrency` |
    /// | `TASK_MAX_ATTEMPTS` | `task_policy.max_attempts` |
    /// | `TASK_RETRY_BACKOFF_SECS` | `task_policy.retry_backoff` |
    /// | `TASK_PROCESS_DELAY_SECS` | `task_policy.process_delay` |
    /// | `TASK_TIMEOUT_SECS` | `task_policy.handler_timeout` |
    /// | `SHUTDOWN_GRACE_SECS` | `shutdown_grace` |
    /// | `QUEUE_DATABASE_PATH` | `database_path` |
    /// | `INITIAL_SCAN` | `features.initial_scan` |
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) with an injectable variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let mut builder = PipelineConfig::builder();

        let roots = var("MUSIC_LIBRARY_PATH").unwrap_or_else(|| DEFAULT_LIBRARY_PATH.to_string());
        for root in roots.split(',').map(str::trim).filter(|r| !r.is_empty()) {
            builder = builder.library_path(root);
        }

        if let Some(url) = var("LRCLIB_BASE_URL") {
            builder = builder.lrclib_base_url(url);
        }
        if let Some(value) = var("WORKER_CONCURRENCY") {
            builder = builder.worker_concurrency(parse_number("WORKER_CONCURRENCY", &value)?);
        }
        if let Some(value) = var("TASK_MAX_ATTEMPTS") {
            builder = builder.max_attempts(parse_number("TASK_MAX_ATTEMPTS", &value)?);
        }
        if let Some(value) = var("TASK_RETRY_BACKOFF_SECS") {
            builder = builder.retry_backoff(parse_secs("TASK_RETRY_BACKOFF_SECS", &value)?);
        }
        if let Some(value) = var("TASK_PROCESS_DELAY_SECS") {
            builder = builder.process_delay(parse_secs("TASK_PROCESS_DELAY_SECS", &value)?);
        }
        if let Some(value) = var("TASK_TIMEOUT_SECS") {
            builder = builder.handler_timeout(parse_secs("TASK_TIMEOUT_SECS", &value)?);
        }
        if let Some(value) = var("SHUTDOWN_GRACE_SECS") {
            builder = builder.shutdown_grace(parse_secs("SHUTDOWN_GRACE_SECS", &value)?);
        }
        if let Some(path) = var("QUEUE_DATABASE_PATH") {
            builder = builder.database_path(path);
        }
        if let Some(value) = var("INITIAL_SCAN") {
            builder = builder.initial_scan(parse_bool("INITIAL_SCAN", &value)?);
        }

        builder.build()
    }

    /// Validates the configuration and returns an error if invalid.
    ///
    /// This checks:
    /// - At least one library path is configured and none is empty
    /// - The provider base URL is http(s)
    /// - Worker concurrency is within 1..=256
    /// - The task policy is consistent
    pub fn validate(&self) -> Result<()> {
        if self.library_paths.is_empty() {
            return Err(Error::Config(
                "At least one library path is required".to_string(),
            ));
        }

        if self
            .library_paths
            .iter()
            .any(|p| p.as_os_str().is_empty())
        {
            return Err(Error::Config("Library path cannot be empty".to_string()));
        }

        if !(self.lrclib_base_url.starts_with("http://")
            || self.lrclib_base_url.starts_with("https://"))
        {
            return Err(Error::Config(format!(
                "LRCLib base URL must be http(s), got '{}'",
                self.lrclib_base_url
            )));
        }

        if self.worker_concurrency == 0 {
            return Err(Error::Config(
                "Worker concurrency must be greater than 0".to_string(),
            ));
        }

        if self.worker_concurrency > MAX_WORKER_CONCURRENCY {
            return Err(Error::Config(format!(
                "Worker concurrency exceeds maximum of {}",
                MAX_WORKER_CONCURRENCY
            )));
        }

        if self.user_agent.trim().is_empty() {
            return Err(Error::Config("User agent cannot be empty".to_string()));
        }

        self.task_policy.validate()
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .parse::<T>()
        .map_err(|_| Error::Config(format!("{} must be a non-negative integer, got '{}'", key, value)))
}

fn parse_secs(key: &str, value: &str) -> Result<Duration> {
    parse_number::<u64>(key, value).map(Duration::from_secs)
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(Error::Config(format!(
            "{} must be a boolean, got '{}'",
            key, value
        ))),
    }
}

/// Builder for constructing [`PipelineConfig`] instances.
///
/// Use this builder to incrementally set configuration options and then
/// call [`build()`](PipelineConfigBuilder::build) to create the final config.
#[derive(Default)]
pub struct PipelineConfigBuilder {
    library_paths: Vec<PathBuf>,
    lrclib_base_url: Option<String>,
    user_agent: Option<String>,
    http_timeout: Option<Duration>,
    worker_concurrency: Option<usize>,
    task_policy: TaskPolicy,
    shutdown_grace: Option<Duration>,
    database_path: Option<PathBuf>,
    http_client: Option<Arc<dyn HttpClient>>,
    file_system: Option<Arc<dyn FileSystemAccess>>,
    features: FeatureFlags,
}

impl PipelineConfigBuilder {
    /// Adds a library root to scan and watch.
    ///
    /// May be called more than once.
    ///
    /// # Examples
    ///
    /// ```
    /// use core_runtime::config::PipelineConfig;
    ///
    /// let builder = PipelineConfig::builder()
    ///     .library_path("/music")
    ///     .library_path("/podcasts");
    /// ```
    pub fn library_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.library_paths.push(path.into());
        self
    }

    /// Sets the provider base URL. A trailing slash is removed.
    pub fn lrclib_base_url(mut self, url: impl Into<String>) -> Self {
        let url = url.into();
        self.lrclib_base_url = Some(url.trim_end_matches('/').to_string());
        self
    }

    /// Sets the `User-Agent` sent with provider requests.
    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = Some(agent.into());
        self
    }

    /// Sets the per-request HTTP timeout.
    ///
    /// Default: 30 seconds
    pub fn http_timeout(mut self, timeout: Duration) -> Self {
        self.http_timeout = Some(timeout);
        self
    }

    /// Sets the number of concurrent workers.
    ///
    /// Default: 10
    pub fn worker_concurrency(mut self, workers: usize) -> Self {
        self.worker_concurrency = Some(workers);
        self
    }

    /// Sets how many times a task may execute before it is marked failed.
    ///
    /// Default: 10
    pub fn max_attempts(mut self, attempts: u32) -> Self {
        self.task_policy.max_attempts = attempts;
        self
    }

    /// Sets the base retry backoff.
    ///
    /// Default: 60 seconds, doubling per retry up to 24 hours
    pub fn retry_backoff(mut self, backoff: Duration) -> Self {
        self.task_policy.retry_backoff = backoff;
        self
    }

    /// Sets the retry backoff cap.
    pub fn retry_backoff_max(mut self, max: Duration) -> Self {
        self.task_policy.retry_backoff_max = max;
        self
    }

    /// Sets the settle delay for event-driven download tasks.
    ///
    /// Default: 10 seconds
    pub fn process_delay(mut self, delay: Duration) -> Self {
        self.task_policy.process_delay = delay;
        self
    }

    /// Sets the per-invocation handler timeout.
    ///
    /// Default: 120 seconds
    pub fn handler_timeout(mut self, timeout: Duration) -> Self {
        self.task_policy.handler_timeout = timeout;
        self
    }

    /// Sets the shutdown grace period for in-flight handlers.
    ///
    /// Default: 30 seconds
    pub fn shutdown_grace(mut self, grace: Duration) -> Self {
        self.shutdown_grace = Some(grace);
        self
    }

    /// Persists the task queue in the given SQLite file.
    pub fn database_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.database_path = Some(path.into());
        self
    }

    /// Sets the HTTP client implementation.
    ///
    /// If not provided, the reqwest-based desktop client is used.
    pub fn http_client(mut self, client: Arc<dyn HttpClient>) -> Self {
        self.http_client = Some(client);
        self
    }

    /// Sets the file system access implementation.
    ///
    /// If not provided, the tokio-based desktop implementation is used.
    pub fn file_system(mut self, fs: Arc<dyn FileSystemAccess>) -> Self {
        self.file_system = Some(fs);
        self
    }

    /// Enables or disables the startup scan of library roots.
    ///
    /// Default: enabled
    pub fn initial_scan(mut self, enabled: bool) -> Self {
        self.features.initial_scan = enabled;
        self
    }

    /// Builds the final configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any field fails validation.
    ///
    /// # Examples
    ///
    /// ```
    /// use core_runtime::config::PipelineConfig;
    ///
    /// let config = PipelineConfig::builder()
    ///     .library_path("/music")
    ///     .build()?;
    /// # Ok::<(), core_runtime::Error>(())
    /// ```
    pub fn build(self) -> Result<PipelineConfig> {
        let config = PipelineConfig {
            library_paths: self.library_paths,
            lrclib_base_url: self
                .lrclib_base_url
                .unwrap_or_else(|| DEFAULT_LRCLIB_BASE_URL.to_string()),
            user_agent: self.user_agent.unwrap_or_else(default_user_agent),
            http_timeout: self.http_timeout.unwrap_or(DEFAULT_HTTP_TIMEOUT),
            worker_concurrency: self
                .worker_concurrency
                .unwrap_or(DEFAULT_WORKER_CONCURRENCY),
            task_policy: self.task_policy,
            shutdown_grace: self.shutdown_grace.unwrap_or(DEFAULT_SHUTDOWN_GRACE),
            database_path: self.database_path,
            http_client: self.http_client,
            file_system: self.file_system,
            features: self.features,
        };

        config.validate()?;

        Ok(config)
    }
}
