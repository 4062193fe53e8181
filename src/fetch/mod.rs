//! HTTP acquisition: backends, headers, retry policy and response handling.
//!
//! The module-level functions are the everyday entry points: [`fetch_url`]
//! for "give me the decoded text or nothing", [`fetch_response`] when the
//! caller wants the full exchange, and [`is_live_page`] for a cheap
//! reachability probe. The [`Fetcher`] trait underneath lets callers pin a
//! transfer strategy explicitly.

pub mod backend;
pub mod error;
pub mod handler;
pub mod headers;
pub mod pool;
pub mod response;
pub mod retry;

pub use backend::{Fetcher, OneShotFetcher, PooledFetcher};
pub use error::FetchError;
pub use handler::{FetchOutput, handle_response};
pub use headers::{default_user_agent, determine_headers, determine_headers_with_rng};
pub use pool::reset_shared_clients;
pub use response::{Response, ResponseRecord};
pub use retry::{
    FailureType, RetryDecision, RetryPolicy, classify_error, classify_status, parse_retry_after,
};

use crate::config::{CrawlConfig, FetcherKind};

/// Instantiates the transfer strategy selected by the configuration.
#[must_use]
pub fn make_fetcher(kind: FetcherKind) -> Box<dyn Fetcher> {
    match kind {
        FetcherKind::Pooled => Box::new(PooledFetcher::new()),
        FetcherKind::OneShot => Box::new(OneShotFetcher::new()),
    }
}

/// Fetches a URL and returns the full exchange, or `None` on any failure.
///
/// `decode` selects whether the body is decompressed before it is wrapped.
pub async fn fetch_response(url: &str, config: &CrawlConfig, decode: bool) -> Option<Response> {
    make_fetcher(config.fetcher).fetch(url, config, decode).await
}

/// Fetches a URL and returns its decoded text, or `None` on any failure.
///
/// Applies the full pipeline: fetch with retries, payload size window,
/// decompression and charset decoding.
pub async fn fetch_url(url: &str, config: &CrawlConfig) -> Option<String> {
    let response = fetch_response(url, config, true).await?;
    match handle_response(url, &response, false, config)? {
        FetchOutput::Text(text) => Some(text),
        FetchOutput::Record(record) => Some(record.html),
    }
}

/// Probes whether a URL currently answers, without downloading its body.
pub async fn is_live_page(url: &str, config: &CrawlConfig) -> bool {
    make_fetcher(config.fetcher).is_live(url, config).await
}
