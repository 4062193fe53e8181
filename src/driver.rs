//! Queue processing driver.
//!
//! [`process_queue`] drains a [`UrlStore`] buffer by buffer: each buffer
//! holds at most one URL per origin, its fetches run concurrently on a
//! semaphore-bounded worker pool, and the driver joins every worker before
//! asking for the next buffer. Joining between buffers is what upholds the
//! politeness guarantee end to end: an origin never has two requests in
//! flight, because its next URL is not even issued until the previous one
//! finished and its cool-down elapsed.
//!
//! Individual fetch failures are counted, logged and otherwise ignored. A
//! crawl of ten thousand URLs must survive the four hundred that are junk.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::Semaphore;
use tracing::{info, instrument, warn};

use crate::config::{ConfigError, CrawlConfig, FetcherKind};
use crate::fetch::{FetchOutput, fetch_response, handle_response};
use crate::store::UrlStore;

/// How long to wait before re-polling when every origin is cooling down.
const BUFFER_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Knobs for one driver run.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessOptions {
    /// Validate and enumerate only; exit before any network traffic.
    pub list_only: bool,
    /// Collect full exchange records instead of plain text.
    pub want_records: bool,
    /// Override the configuration's transfer strategy for this run.
    pub fetcher: Option<FetcherKind>,
}

/// Why a run ended before the queue was drained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EarlyExit {
    /// The run was listing-only; no fetches were attempted.
    ListingOnly,
}

/// Aggregate counters for one driver run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CrawlStats {
    /// URLs that produced usable output.
    pub succeeded: usize,
    /// URLs skipped for any reason (network, status, size, decode).
    pub failed: usize,
}

/// Everything a finished driver run hands back.
#[derive(Debug)]
pub struct DriverOutcome {
    /// Per-URL outputs, in completion order.
    pub results: Vec<(String, FetchOutput)>,
    /// Aggregate counters.
    pub stats: CrawlStats,
    /// Set when the run ended before draining the queue.
    pub early_exit: Option<EarlyExit>,
}

/// Errors that abort a driver run before or during processing.
///
/// Note the asymmetry with per-URL failures, which never abort anything.
#[derive(Debug, Error)]
pub enum DriverError {
    /// The configuration snapshot failed validation.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The worker pool was torn down mid-run.
    #[error("worker pool closed unexpectedly")]
    PoolClosed,
}

/// Processes every URL in the store through fetch and response handling.
///
/// # Errors
///
/// Returns [`DriverError::Config`] when the configuration is contradictory;
/// per-URL failures are absorbed into [`CrawlStats::failed`] instead.
#[instrument(skip(store, config), fields(pending = store.pending_count()))]
pub async fn process_queue(
    store: &UrlStore,
    options: ProcessOptions,
    config: &CrawlConfig,
) -> Result<DriverOutcome, DriverError> {
    config.validate()?;

    if options.list_only {
        info!(pending = store.pending_count(), "listing-only run, skipping fetch");
        return Ok(DriverOutcome {
            results: Vec::new(),
            stats: CrawlStats::default(),
            early_exit: Some(EarlyExit::ListingOnly),
        });
    }

    let mut config = config.clone();
    if let Some(kind) = options.fetcher {
        config.fetcher = kind;
    }

    let semaphore = Arc::new(Semaphore::new(config.concurrency));
    let mut results = Vec::new();
    let mut stats = CrawlStats::default();

    loop {
        let buffer = store.load_buffer(config.sleep_time);
        if buffer.is_empty() {
            if store.is_done() {
                break;
            }
            // Origins are cooling down; check back shortly.
            tokio::time::sleep(poll_interval(config.sleep_time)).await;
            continue;
        }

        let mut handles = Vec::with_capacity(buffer.len());
        for url in buffer {
            let permit = Arc::clone(&semaphore)
                .acquire_owned()
                .await
                .map_err(|_| DriverError::PoolClosed)?;
            let task_config = config.clone();
            let want_records = options.want_records;
            handles.push(tokio::spawn(async move {
                let _permit = permit;
                let response = fetch_response(&url, &task_config, true).await?;
                let output = handle_response(&url, &response, want_records, &task_config)?;
                Some((url, output))
            }));
        }

        // Join the whole buffer before loading the next one: this is what
        // keeps each origin down to one request per cool-down window.
        for handle in handles {
            match handle.await {
                Ok(Some((url, output))) => {
                    stats.succeeded += 1;
                    results.push((url, output));
                }
                Ok(None) => stats.failed += 1,
                Err(error) => {
                    warn!(%error, "fetch task panicked");
                    stats.failed += 1;
                }
            }
        }
    }

    info!(
        succeeded = stats.succeeded,
        failed = stats.failed,
        "queue drained"
    );
    Ok(DriverOutcome {
        results,
        stats,
        early_exit: None,
    })
}

/// Wait between empty buffers: bounded by the cool-down itself, but never
/// zero so the loop cannot spin.
fn poll_interval(sleep_time: Duration) -> Duration {
    if sleep_time.is_zero() {
        BUFFER_POLL_INTERVAL
    } else {
        sleep_time.min(BUFFER_POLL_INTERVAL)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_poll_interval_never_zero() {
        assert_eq!(poll_interval(Duration::ZERO), BUFFER_POLL_INTERVAL);
        assert_eq!(
            poll_interval(Duration::from_millis(10)),
            Duration::from_millis(10)
        );
        assert_eq!(poll_interval(Duration::from_secs(5)), BUFFER_POLL_INTERVAL);
    }

    #[tokio::test]
    async fn test_invalid_config_fails_before_any_work() {
        let store = UrlStore::from_urls(["https://example.org/a"]);
        let config = CrawlConfig {
            concurrency: 0,
            ..CrawlConfig::default()
        };
        let result = process_queue(&store, ProcessOptions::default(), &config).await;
        assert!(matches!(result, Err(DriverError::Config(_))));
        // Nothing was issued from the store.
        assert_eq!(store.pending_count(), 1);
    }

    #[tokio::test]
    async fn test_list_only_exits_before_fetching() {
        let store = UrlStore::from_urls(["https://example.org/a", "https://example.org/b"]);
        let options = ProcessOptions {
            list_only: true,
            ..ProcessOptions::default()
        };
        let outcome = process_queue(&store, options, &CrawlConfig::default())
            .await
            .unwrap();
        assert_eq!(outcome.early_exit, Some(EarlyExit::ListingOnly));
        assert!(outcome.results.is_empty());
        assert_eq!(outcome.stats, CrawlStats::default());
        assert_eq!(store.pending_count(), 2);
    }

    #[tokio::test]
    async fn test_empty_store_drains_immediately() {
        let store = UrlStore::new();
        let outcome = process_queue(&store, ProcessOptions::default(), &CrawlConfig::default())
            .await
            .unwrap();
        assert_eq!(outcome.stats, CrawlStats::default());
        assert!(outcome.early_exit.is_none());
    }
}
