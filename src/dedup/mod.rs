//! Content fingerprinting and deduplication primitives.
//!
//! Two complementary hash families live here: the locality-sensitive
//! [`Simhash`] for near-duplicate detection, and a bag-of-words digest for
//! content-addressed storage names where distinct content must yield
//! distinct names.

pub mod simhash;

pub use simhash::{DEFAULT_HASH_BITS, Simhash};

use std::sync::LazyLock;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE;
use regex::Regex;
use sha2::{Digest, Sha256};

/// Digest length backing a generated filename.
const FILENAME_DIGEST_LEN: usize = 12;

// Word-ish tokens of 3+ characters; shorter fragments add noise without
// discriminating power.
#[allow(clippy::expect_used)]
static WORD_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\w-]{3,}").expect("word pattern is valid"));

/// Truncated digest over the bag of words in `content`.
///
/// Tokenization lowercases the text, extracts word-ish tokens of three or
/// more characters and joins them with single spaces, so differences in
/// markup, punctuation and spacing do not change the digest.
#[must_use]
pub fn bow_hash(content: &str, length: usize) -> Vec<u8> {
    let lowered = content.to_lowercase();
    let words: Vec<&str> = WORD_PATTERN
        .find_iter(&lowered)
        .map(|m| m.as_str())
        .collect();
    let digest = Sha256::digest(words.join(" ").as_bytes());
    digest[..length.min(digest.len())].to_vec()
}

/// URL-safe filename derived from the document content (16 characters).
///
/// Stable across whitespace and punctuation changes, so re-fetching an
/// unchanged page maps to the same name on disk.
#[must_use]
pub fn hash_filename(content: &str) -> String {
    URL_SAFE.encode(bow_hash(content, FILENAME_DIGEST_LEN))
}

/// Hex-encoded 64-bit simhash of the document content.
#[must_use]
pub fn content_fingerprint(content: &str) -> String {
    Simhash::new(content).to_hex()
}
