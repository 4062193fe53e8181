//! Origin-partitioned deduplicating URL queue.
//!
//! The [`UrlStore`] is the politeness mechanism of the crawl: URLs are
//! bucketed by origin (scheme + host + port), each bucket remembers when it
//! was last asked for work, and [`UrlStore::load_buffer`] hands out at most
//! one URL per origin per cool-down window. Malformed entries are dropped
//! silently on insert, and a URL is only ever accepted once per origin.
//!
//! Buckets live in a concurrent map so workers can report back while the
//! driver assembles the next buffer.
//!
//! [`UrlStore::requeue`] is a recovery hook for the code that owns the
//! store, not something the driver calls: per-URL fetch failures are final
//! there (counted and skipped). Callers orchestrating their own loop can
//! put an issued URL back when it failed for reasons outside the URL
//! itself, say a crawl interrupted mid-buffer.

use std::collections::{HashSet, VecDeque};
use std::time::Duration;

use dashmap::DashMap;
use tokio::time::Instant;
use tracing::debug;
use url::Url;

/// Per-origin queue state.
#[derive(Debug, Default)]
struct OriginBucket {
    /// URLs waiting to be issued, in insertion order.
    pending: VecDeque<String>,
    /// Every normalized URL ever accepted for this origin.
    known: HashSet<String>,
    /// When this origin last had a URL issued.
    last_issued: Option<Instant>,
}

/// Thread-safe URL queue with per-origin politeness.
#[derive(Debug, Default)]
pub struct UrlStore {
    origins: DashMap<String, OriginBucket>,
}

/// Parses and normalizes a URL, yielding its origin key and canonical form.
///
/// Only absolute `http`/`https` URLs with a host qualify; everything else
/// is dropped by the caller.
fn normalize(url: &str) -> Option<(String, String)> {
    let parsed = Url::parse(url.trim()).ok()?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return None;
    }
    parsed.host_str()?;
    let origin = parsed.origin().ascii_serialization();
    Some((origin, parsed.to_string()))
}

impl UrlStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store pre-loaded with a batch of URLs.
    #[must_use]
    pub fn from_urls<I, S>(urls: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let store = Self::new();
        store.add(urls);
        store
    }

    /// Inserts URLs, returning how many were accepted.
    ///
    /// Malformed URLs, unsupported schemes and duplicates of already-known
    /// entries are dropped without error: a seed list scraped from the wild
    /// always contains junk, and junk must not poison the batch.
    pub fn add<I, S>(&self, urls: I) -> usize
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut accepted = 0;
        for url in urls {
            let Some((origin, normalized)) = normalize(url.as_ref()) else {
                debug!(url = url.as_ref(), "dropping unusable URL");
                continue;
            };
            let mut bucket = self.origins.entry(origin).or_default();
            if bucket.known.insert(normalized.clone()) {
                bucket.pending.push_back(normalized);
                accepted += 1;
            }
        }
        accepted
    }

    /// Issues the next buffer: at most one URL from every origin whose
    /// cool-down has elapsed.
    ///
    /// Issuing stamps the origin's clock, so two consecutive calls within
    /// `sleep_time` return work from disjoint origins (usually none on the
    /// second call). Origins with nothing pending are left untouched.
    #[must_use]
    pub fn load_buffer(&self, sleep_time: Duration) -> Vec<String> {
        let now = Instant::now();
        let mut buffer = Vec::new();

        for mut entry in self.origins.iter_mut() {
            let bucket = entry.value_mut();
            if bucket.pending.is_empty() {
                continue;
            }
            let ready = bucket
                .last_issued
                .is_none_or(|last| now.duration_since(last) >= sleep_time);
            if !ready {
                continue;
            }
            if let Some(url) = bucket.pending.pop_front() {
                bucket.last_issued = Some(now);
                buffer.push(url);
            }
        }

        debug!(issued = buffer.len(), "buffer loaded");
        buffer
    }

    /// Returns an issued URL to the front of its origin's queue.
    ///
    /// Used when a claimed URL could not be processed for reasons that are
    /// not the URL's fault. Returns `false` for URLs this store never
    /// accepted.
    pub fn requeue(&self, url: &str) -> bool {
        let Some((origin, normalized)) = normalize(url) else {
            return false;
        };
        match self.origins.get_mut(&origin) {
            Some(mut bucket) if bucket.known.contains(&normalized) => {
                bucket.pending.push_front(normalized);
                true
            }
            _ => false,
        }
    }

    /// Whether every origin's queue is exhausted.
    #[must_use]
    pub fn is_done(&self) -> bool {
        self.origins.iter().all(|entry| entry.pending.is_empty())
    }

    /// Total URLs still waiting to be issued.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.origins.iter().map(|entry| entry.pending.len()).sum()
    }

    /// Number of distinct origins seen so far.
    #[must_use]
    pub fn origin_count(&self) -> usize {
        self.origins.len()
    }
}
