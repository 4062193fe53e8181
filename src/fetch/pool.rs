//! Process-wide shared HTTP client state.
//!
//! Pooled fetching reuses connections across the whole process, so the
//! clients live in a lazily built global rather than per-fetcher instances.
//! Two clients are kept: one with normal certificate verification and one
//! that accepts invalid certificates, used as a one-time fallback when a
//! TLS handshake fails. Both carry the same timeout and redirect policy.
//!
//! Timeout and redirect settings are baked into a `reqwest::Client` at build
//! time, so tests that vary them call [`reset_shared_clients`] between runs.

use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use reqwest::Client;
use reqwest::redirect::Policy;
use tracing::debug;

use crate::config::CrawlConfig;

use super::FetchError;
use super::retry::RetryPolicy;

/// Connection establishment timeout, separate from the total request timeout.
pub(crate) const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

static SHARED_CLIENTS: RwLock<Option<Arc<SharedClients>>> = RwLock::new(None);

/// The lazily built client pair plus the retry policy derived from the
/// configuration that first triggered the build.
#[derive(Debug)]
pub(crate) struct SharedClients {
    /// Client with normal certificate verification.
    pub verified: Client,
    /// Fallback client accepting invalid certificates.
    pub insecure: Client,
    /// Retry policy shared by all pooled fetches.
    pub retry: RetryPolicy,
}

/// Returns the shared client pair, building it from `config` on first use.
///
/// Later calls return the already built pair even if their configuration
/// differs; callers needing fresh settings reset first.
///
/// # Errors
///
/// Returns [`FetchError::ClientBuild`] when the underlying TLS or connection
/// stack cannot be initialized.
pub(crate) fn shared_clients(config: &CrawlConfig) -> Result<Arc<SharedClients>, FetchError> {
    {
        let guard = SHARED_CLIENTS
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(clients) = guard.as_ref() {
            return Ok(Arc::clone(clients));
        }
    }

    let mut guard = SHARED_CLIENTS
        .write()
        .unwrap_or_else(PoisonError::into_inner);
    // Double check: another task may have built the pair while this one
    // waited on the write lock.
    if let Some(clients) = guard.as_ref() {
        return Ok(Arc::clone(clients));
    }

    debug!(
        timeout_secs = config.download_timeout.as_secs(),
        max_redirects = config.max_redirects,
        "building shared HTTP client pair"
    );
    let clients = Arc::new(SharedClients {
        verified: build_pooled_client(config, false)?,
        insecure: build_pooled_client(config, true)?,
        retry: RetryPolicy::from_config(config),
    });
    *guard = Some(Arc::clone(&clients));
    Ok(clients)
}

/// Discards the shared client pair so the next fetch rebuilds it.
///
/// Needed whenever timeout or redirect settings change mid-process, since
/// those are frozen into the clients at build time.
pub fn reset_shared_clients() {
    let mut guard = SHARED_CLIENTS
        .write()
        .unwrap_or_else(PoisonError::into_inner);
    *guard = None;
}

/// Builds one pooled client from the configuration snapshot.
///
/// A redirect budget of zero maps to [`Policy::none`], so any 3xx surfaces
/// as the redirect response itself and the fetch fails closed.
pub(crate) fn build_pooled_client(
    config: &CrawlConfig,
    accept_invalid_certs: bool,
) -> Result<Client, FetchError> {
    let redirect_policy = if config.max_redirects == 0 {
        Policy::none()
    } else {
        Policy::limited(config.max_redirects as usize)
    };

    Client::builder()
        .connect_timeout(CONNECT_TIMEOUT)
        .timeout(config.download_timeout)
        .redirect(redirect_policy)
        .danger_accept_invalid_certs(accept_invalid_certs)
        .build()
        .map_err(|source| FetchError::ClientBuild { source })
}
