//! Webharvest Core Library
//!
//! This library provides the core functionality for polite batch acquisition
//! of web resources: it fetches large URL sets with per-origin politeness,
//! bounded concurrency and retry/backoff, normalizes and decompresses the
//! retrieved payloads, and fingerprints decoded text so near-duplicate
//! documents can be detected across a crawl.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//! - [`config`] - Crawl configuration snapshot and validation
//! - [`decode`] - Payload decompression and charset decoding
//! - [`fetch`] - HTTP backends, headers, retry policy and response handling
//! - [`store`] - Origin-partitioned deduplicating URL queue
//! - [`driver`] - Queue processing over a bounded worker pool
//! - [`dedup`] - Simhash fingerprinting and content-addressed naming

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod decode;
pub mod dedup;
pub mod driver;
pub mod fetch;
pub mod store;

// Re-export commonly used types
pub use config::{ConfigError, CrawlConfig, FetcherKind};
pub use decode::{DecodeError, decode_payload, handle_compressed, supported_encodings};
pub use dedup::{Simhash, content_fingerprint, hash_filename};
pub use driver::{
    CrawlStats, DriverError, DriverOutcome, EarlyExit, ProcessOptions, process_queue,
};
pub use fetch::{
    FetchError, FetchOutput, Fetcher, OneShotFetcher, PooledFetcher, Response, ResponseRecord,
    fetch_response, fetch_url, is_live_page, reset_shared_clients,
};
pub use store::UrlStore;
