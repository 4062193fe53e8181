//! Crawl configuration snapshot.
//!
//! The core consumes configuration, it does not own it: callers assemble a
//! [`CrawlConfig`] from whatever source they like (file, CLI, defaults) and
//! hand the snapshot to the fetch and driver layers. Derived values such as
//! per-request headers are pure functions of this snapshot.
//!
//! Contradictory settings are caught up front by [`CrawlConfig::validate`]
//! so a bad value fails the batch before the first request, never mid-crawl.

use std::time::Duration;

use thiserror::Error;

/// Default total request timeout (30 seconds).
pub const DEFAULT_DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(30);

/// Default politeness interval between requests to the same origin.
pub const DEFAULT_SLEEP_TIME: Duration = Duration::from_secs(5);

/// Default minimum acceptable payload size in bytes.
pub const DEFAULT_MIN_FILE_SIZE: usize = 10;

/// Default maximum acceptable payload size (20 MB).
pub const DEFAULT_MAX_FILE_SIZE: usize = 20_000_000;

/// Default redirect budget.
pub const DEFAULT_MAX_REDIRECTS: u32 = 2;

/// Default retry attempt ceiling (including the initial attempt).
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Default worker pool size. Conservative on purpose: politeness throttling
/// means more workers rarely help and often just pile up idle tasks.
pub const DEFAULT_CONCURRENCY: usize = 4;

/// Which transfer strategy the fetch layer should use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FetcherKind {
    /// Process-wide pooled connections with a built-in redirect policy.
    #[default]
    Pooled,
    /// A fresh connection per exchange with manual redirect walking.
    OneShot,
}

/// Immutable configuration snapshot for a crawl.
///
/// All fields are plain values; cloning the snapshot is cheap enough to hand
/// one copy to every worker task.
#[derive(Debug, Clone)]
pub struct CrawlConfig {
    /// User-Agent pool for rotation. Empty means the single built-in default.
    pub user_agents: Vec<String>,
    /// Cookie header value sent verbatim when present.
    pub cookie: Option<String>,
    /// Maximum number of redirects to follow. Zero fails closed on any 3xx.
    pub max_redirects: u32,
    /// Total per-request timeout.
    pub download_timeout: Duration,
    /// Minimum wall-clock time between two fetches to the same origin.
    pub sleep_time: Duration,
    /// Minimum acceptable raw payload size in bytes.
    pub min_file_size: usize,
    /// Maximum acceptable raw payload size in bytes.
    pub max_file_size: usize,
    /// Retry attempt ceiling, including the initial attempt.
    pub max_retries: u32,
    /// Base delay for exponential retry backoff.
    pub backoff_base: Duration,
    /// Worker pool size for the fetch stage.
    pub concurrency: usize,
    /// Whether TLS certificates are verified by default.
    pub verify_tls: bool,
    /// Transfer strategy selection.
    pub fetcher: FetcherKind,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            user_agents: Vec::new(),
            cookie: None,
            max_redirects: DEFAULT_MAX_REDIRECTS,
            download_timeout: DEFAULT_DOWNLOAD_TIMEOUT,
            sleep_time: DEFAULT_SLEEP_TIME,
            min_file_size: DEFAULT_MIN_FILE_SIZE,
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            max_retries: DEFAULT_MAX_RETRIES,
            backoff_base: Duration::from_secs(1),
            concurrency: DEFAULT_CONCURRENCY,
            verify_tls: true,
            fetcher: FetcherKind::default(),
        }
    }
}

/// Errors produced by configuration validation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// The download timeout must be positive.
    #[error("download timeout must be positive")]
    ZeroTimeout,

    /// The worker pool needs at least one worker.
    #[error("concurrency must be at least 1")]
    ZeroConcurrency,

    /// The payload size window is empty.
    #[error("minimum payload size {min} exceeds maximum {max}")]
    SizeBounds {
        /// Configured minimum size.
        min: usize,
        /// Configured maximum size.
        max: usize,
    },
}

impl CrawlConfig {
    /// Checks the snapshot for contradictory or unusable settings.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] for a zero timeout, a zero-sized worker
    /// pool, or a size window where `min_file_size > max_file_size`.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.download_timeout.is_zero() {
            return Err(ConfigError::ZeroTimeout);
        }
        if self.concurrency == 0 {
            return Err(ConfigError::ZeroConcurrency);
        }
        if self.min_file_size > self.max_file_size {
            return Err(ConfigError::SizeBounds {
                min: self.min_file_size,
                max: self.max_file_size,
            });
        }
        Ok(())
    }
}
