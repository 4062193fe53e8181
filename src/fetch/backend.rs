//! HTTP transfer backends.
//!
//! Two interchangeable strategies implement the [`Fetcher`] trait:
//!
//! - [`PooledFetcher`] rides the process-wide shared clients: connections
//!   are reused across every fetch and redirects are followed by the client
//!   itself, up to the configured budget.
//! - [`OneShotFetcher`] builds a fresh client per exchange and walks
//!   redirects manually. No connection state survives between fetches,
//!   which trades throughput for isolation.
//!
//! Both share the retry loop: failures are classified, transient ones are
//! retried with exponential backoff, `Retry-After` overrides the backoff on
//! rate limits, and a TLS handshake failure triggers a single fallback to
//! the certificate-ignoring client without consuming a retry attempt.

use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::redirect::Policy;
use reqwest::{Client, header};
use tracing::{debug, instrument, warn};
use url::Url;

use crate::config::CrawlConfig;
use crate::decode::handle_compressed;

use super::FetchError;
use super::headers::determine_headers;
use super::pool::{CONNECT_TIMEOUT, shared_clients};
use super::response::Response;
use super::retry::{
    RetryDecision, RetryPolicy, classify_error, is_tls_error, parse_retry_after,
};

/// A transfer strategy for fetching single URLs.
///
/// Implementations are stateless apart from connection reuse, so one
/// instance can serve concurrent fetches. Dyn dispatch keeps the driver
/// independent of which strategy the configuration selected.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Fetches one URL, with retries, returning the full error on failure.
    ///
    /// When `decode` is set the body is decompressed before it is wrapped
    /// in the [`Response`]; otherwise the raw transfer bytes are kept.
    ///
    /// # Errors
    ///
    /// Returns the final [`FetchError`] once retries are exhausted or the
    /// failure is classified as permanent.
    async fn try_fetch(
        &self,
        url: &str,
        config: &CrawlConfig,
        decode: bool,
    ) -> Result<Response, FetchError>;

    /// Fetches one URL, mapping any failure to `None` with a logged reason.
    async fn fetch(&self, url: &str, config: &CrawlConfig, decode: bool) -> Option<Response> {
        match self.try_fetch(url, config, decode).await {
            Ok(response) => Some(response),
            Err(error) => {
                debug!(url, %error, "fetch failed");
                None
            }
        }
    }

    /// Probes whether a URL is reachable without transferring its body.
    async fn is_live(&self, url: &str, config: &CrawlConfig) -> bool;
}

/// Whether a probe status counts as reachable: success and redirect
/// statuses do, informational and error statuses do not.
fn probe_status_is_live(status: u16) -> bool {
    (200..400).contains(&status)
}

/// Checks the URL early so unsupported inputs never reach the network.
fn validate_url(url: &str) -> Result<Url, FetchError> {
    let parsed = Url::parse(url).map_err(|_| FetchError::invalid_url(url))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(FetchError::unsupported_scheme(url));
    }
    Ok(parsed)
}

/// Maps a reqwest send error onto the fetch error taxonomy.
fn map_send_error(url: &str, error: reqwest::Error) -> FetchError {
    if error.is_timeout() {
        FetchError::timeout(url)
    } else if error.is_redirect() {
        FetchError::too_many_redirects(url)
    } else {
        FetchError::network(url, error)
    }
}

/// Streams the response body with the configured size cap applied, so an
/// oversized body aborts the transfer instead of filling memory first.
async fn read_body(
    response: reqwest::Response,
    url: &str,
    limit: usize,
) -> Result<Vec<u8>, FetchError> {
    let mut stream = response.bytes_stream();
    let mut data = Vec::new();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| map_send_error(url, e))?;
        if data.len() + chunk.len() > limit {
            return Err(FetchError::body_too_large(url, limit));
        }
        data.extend_from_slice(&chunk);
    }
    Ok(data)
}

/// Turns a non-redirect reqwest response into a [`Response`].
///
/// Error statuses become [`FetchError::HttpStatus`], carrying `Retry-After`
/// when present so the retry loop can honor it.
async fn finalize_response(
    response: reqwest::Response,
    requested_url: &str,
    config: &CrawlConfig,
    decode: bool,
) -> Result<Response, FetchError> {
    let status = response.status();
    if status.is_client_error() || status.is_server_error() {
        let retry_after = response
            .headers()
            .get(header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .map(ToString::to_string);
        return Err(FetchError::http_status_with_retry_after(
            requested_url,
            status.as_u16(),
            retry_after,
        ));
    }

    let final_url = response.url().to_string();
    let headers: Vec<(String, String)> = response
        .headers()
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|v| (name.as_str().to_string(), v.to_string()))
        })
        .collect();

    let mut data = read_body(response, requested_url, config.max_file_size).await?;
    if decode {
        data = handle_compressed(&data).into_owned();
    }

    let mut result = Response::new(data, status.as_u16(), final_url);
    result.store_headers(headers);
    Ok(result)
}

/// The shared retry loop around a single-attempt closure.
///
/// `attempt_fn` receives whether certificate verification should be skipped
/// for this attempt. The TLS fallback flips that flag exactly once, without
/// consuming a retry attempt, because the failure mode changes entirely.
async fn run_with_retries<F, Fut>(
    url: &str,
    policy: &RetryPolicy,
    verify_tls: bool,
    attempt_fn: F,
) -> Result<Response, FetchError>
where
    F: Fn(bool) -> Fut,
    Fut: Future<Output = Result<Response, FetchError>>,
{
    let mut attempt = 1;
    let mut skip_verification = !verify_tls;
    let mut tls_fallback_used = false;

    loop {
        let error = match attempt_fn(skip_verification).await {
            Ok(response) => return Ok(response),
            Err(error) => error,
        };

        if !skip_verification && !tls_fallback_used {
            if let FetchError::Network { source, .. } = &error {
                if is_tls_error(source) {
                    warn!(url, "TLS handshake failed, retrying without certificate verification");
                    skip_verification = true;
                    tls_fallback_used = true;
                    continue;
                }
            }
        }

        match policy.should_retry(classify_error(&error), attempt) {
            RetryDecision::Retry {
                mut delay,
                attempt: next_attempt,
            } => {
                if let FetchError::HttpStatus {
                    retry_after: Some(value),
                    ..
                } = &error
                {
                    if let Some(server_delay) = parse_retry_after(value) {
                        delay = server_delay;
                    }
                }
                debug!(url, attempt, delay_ms = delay.as_millis(), %error, "retrying fetch");
                tokio::time::sleep(delay).await;
                attempt = next_attempt;
            }
            RetryDecision::DoNotRetry { reason } => {
                debug!(url, reason, "giving up");
                return Err(error);
            }
        }
    }
}

/// Fetcher backed by the process-wide shared client pair.
#[derive(Debug, Default, Clone, Copy)]
pub struct PooledFetcher;

impl PooledFetcher {
    /// Creates a pooled fetcher. The underlying clients are built lazily on
    /// the first fetch in the process.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    async fn execute(
        client: &Client,
        url: &str,
        config: &CrawlConfig,
        decode: bool,
    ) -> Result<Response, FetchError> {
        let mut request = client.get(url);
        for (name, value) in determine_headers(config) {
            request = request.header(name.as_str(), value);
        }
        let response = request.send().await.map_err(|e| map_send_error(url, e))?;

        // A redirect surfacing here means the client's policy refused to
        // follow it, so the budget is exhausted (or zero): fail closed.
        if response.status().is_redirection() {
            return Err(FetchError::too_many_redirects(url));
        }

        finalize_response(response, url, config, decode).await
    }
}

#[async_trait]
impl Fetcher for PooledFetcher {
    #[instrument(skip(self, config))]
    async fn try_fetch(
        &self,
        url: &str,
        config: &CrawlConfig,
        decode: bool,
    ) -> Result<Response, FetchError> {
        validate_url(url)?;
        let clients = shared_clients(config)?;

        run_with_retries(url, &clients.retry, config.verify_tls, |skip_verification| {
            let client = if skip_verification {
                &clients.insecure
            } else {
                &clients.verified
            };
            Self::execute(client, url, config, decode)
        })
        .await
    }

    async fn is_live(&self, url: &str, config: &CrawlConfig) -> bool {
        let Ok(clients) = shared_clients(config) else {
            return false;
        };
        let client = if config.verify_tls {
            &clients.verified
        } else {
            &clients.insecure
        };

        let mut request = client.head(url);
        for (name, value) in determine_headers(config) {
            request = request.header(name.as_str(), value);
        }
        match request.send().await {
            Ok(response) => probe_status_is_live(response.status().as_u16()),
            Err(error) => {
                debug!(url, %error, "liveness probe failed");
                false
            }
        }
    }
}

/// Fetcher that opens a fresh connection per exchange.
#[derive(Debug, Default, Clone, Copy)]
pub struct OneShotFetcher;

impl OneShotFetcher {
    /// Creates a one-shot fetcher.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Builds a throwaway client: no idle connections kept, no automatic
    /// redirects. Redirect walking stays in [`OneShotFetcher::execute`] so
    /// the hop count is under this module's control.
    fn build_client(
        config: &CrawlConfig,
        accept_invalid_certs: bool,
    ) -> Result<Client, FetchError> {
        Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(config.download_timeout)
            .redirect(Policy::none())
            .pool_max_idle_per_host(0)
            .danger_accept_invalid_certs(accept_invalid_certs)
            .build()
            .map_err(|source| FetchError::ClientBuild { source })
    }

    async fn execute(
        url: &str,
        config: &CrawlConfig,
        decode: bool,
        accept_invalid_certs: bool,
    ) -> Result<Response, FetchError> {
        let client = Self::build_client(config, accept_invalid_certs)?;
        let mut current = validate_url(url)?;
        let mut redirects = 0u32;

        loop {
            let mut request = client.get(current.clone());
            for (name, value) in determine_headers(config) {
                request = request.header(name.as_str(), value);
            }
            let response = request.send().await.map_err(|e| map_send_error(url, e))?;

            if response.status().is_redirection() {
                if redirects >= config.max_redirects {
                    return Err(FetchError::too_many_redirects(url));
                }
                let location = response
                    .headers()
                    .get(header::LOCATION)
                    .and_then(|v| v.to_str().ok())
                    .ok_or_else(|| FetchError::invalid_url(url))?;
                current = current
                    .join(location)
                    .map_err(|_| FetchError::invalid_url(location))?;
                redirects += 1;
                debug!(url, target = %current, redirects, "following redirect");
                continue;
            }

            return finalize_response(response, url, config, decode).await;
        }
    }
}

#[async_trait]
impl Fetcher for OneShotFetcher {
    #[instrument(skip(self, config))]
    async fn try_fetch(
        &self,
        url: &str,
        config: &CrawlConfig,
        decode: bool,
    ) -> Result<Response, FetchError> {
        validate_url(url)?;
        let policy = RetryPolicy::from_config(config);

        run_with_retries(url, &policy, config.verify_tls, |skip_verification| {
            Self::execute(url, config, decode, skip_verification)
        })
        .await
    }

    async fn is_live(&self, url: &str, config: &CrawlConfig) -> bool {
        let Ok(client) = Self::build_client(config, !config.verify_tls) else {
            return false;
        };

        // A ranged GET instead of HEAD: some servers refuse HEAD outright,
        // and one byte costs nothing.
        let mut request = client.get(url).header(header::RANGE, "bytes=0-0");
        for (name, value) in determine_headers(config) {
            request = request.header(name.as_str(), value);
        }
        match request.send().await {
            Ok(response) => probe_status_is_live(response.status().as_u16()),
            Err(error) => {
                debug!(url, %error, "liveness probe failed");
                false
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    // ==================== URL Validation Tests ====================

    #[test]
    fn test_validate_url_accepts_http_and_https() {
        assert!(validate_url("http://example.org/a").is_ok());
        assert!(validate_url("https://example.org/a").is_ok());
    }

    #[test]
    fn test_validate_url_rejects_other_schemes() {
        assert!(matches!(
            validate_url("ftp://example.org/a"),
            Err(FetchError::UnsupportedScheme { .. })
        ));
        assert!(matches!(
            validate_url("file:///etc/passwd"),
            Err(FetchError::UnsupportedScheme { .. })
        ));
    }

    #[test]
    fn test_validate_url_rejects_malformed_input() {
        assert!(matches!(
            validate_url("not a url"),
            Err(FetchError::InvalidUrl { .. })
        ));
        assert!(matches!(
            validate_url(""),
            Err(FetchError::InvalidUrl { .. })
        ));
    }

    // ==================== Probe Classification Tests ====================

    #[test]
    fn test_probe_status_bounds() {
        assert!(probe_status_is_live(200));
        assert!(probe_status_is_live(204));
        assert!(probe_status_is_live(301));
        assert!(probe_status_is_live(399));
        // Informational statuses are not a reachable page.
        assert!(!probe_status_is_live(100));
        assert!(!probe_status_is_live(199));
        assert!(!probe_status_is_live(400));
        assert!(!probe_status_is_live(404));
        assert!(!probe_status_is_live(503));
    }

    // ==================== Client Construction Tests ====================

    #[test]
    fn test_one_shot_client_builds() {
        let config = CrawlConfig::default();
        assert!(OneShotFetcher::build_client(&config, false).is_ok());
        assert!(OneShotFetcher::build_client(&config, true).is_ok());
    }
}
