//! Post-fetch response vetting and projection.
//!
//! Sits between the wire and the caller: a fetched [`Response`] is checked
//! against the configured payload size window on its *raw* bytes, decoded,
//! and projected into either plain text or a serializable record. Every
//! rejection maps to `None` with a logged reason, so one bad document never
//! disturbs the rest of a batch.

use tracing::{debug, warn};

use crate::config::CrawlConfig;

use super::response::{Response, ResponseRecord};

/// What a successful fetch hands back to the caller.
#[derive(Debug, Clone)]
pub enum FetchOutput {
    /// The decoded document text.
    Text(String),
    /// The full serializable exchange record.
    Record(ResponseRecord),
}

impl FetchOutput {
    /// The decoded document text, whichever form this output took.
    #[must_use]
    pub fn text(&self) -> &str {
        match self {
            Self::Text(text) => text,
            Self::Record(record) => &record.html,
        }
    }
}

/// Vets a response and projects it into caller-facing output.
///
/// Size bounds are checked on the raw payload before any decoding: data
/// outside `min_file_size..=max_file_size` is skipped, as are unusable
/// statuses and bodies that cannot be decoded to text.
#[must_use]
pub fn handle_response(
    url: &str,
    response: &Response,
    want_record: bool,
    config: &CrawlConfig,
) -> Option<FetchOutput> {
    if !response.is_success() {
        debug!(url, status = response.status(), "unusable response");
        return None;
    }

    let len = response.data().len();
    if len < config.min_file_size {
        debug!(url, len, min = config.min_file_size, "payload too small");
        return None;
    }
    if len > config.max_file_size {
        debug!(url, len, max = config.max_file_size, "payload too large");
        return None;
    }

    if want_record {
        match response.as_record() {
            Ok(record) => Some(FetchOutput::Record(record)),
            Err(error) => {
                warn!(url, %error, "skipping undecodable payload");
                None
            }
        }
    } else {
        match response.decode_data() {
            Ok(text) => Some(FetchOutput::Text(text.to_string())),
            Err(error) => {
                warn!(url, %error, "skipping undecodable payload");
                None
            }
        }
    }
}
