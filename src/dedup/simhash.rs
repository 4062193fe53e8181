//! Locality-sensitive content fingerprints (Charikar simhash).
//!
//! Unlike a cryptographic digest, a simhash of two near-identical documents
//! differs only in a handful of bits, so the Hamming distance between two
//! fingerprints approximates how much the underlying texts differ. The
//! fingerprint is 64 bits wide by default and survives round-tripping
//! through hex storage.

use std::num::NonZeroUsize;
use std::sync::{LazyLock, Mutex, PoisonError};

use lru::LruCache;
use sha2::{Digest, Sha256};

/// Default fingerprint width in bits.
pub const DEFAULT_HASH_BITS: u32 = 64;

/// Token digests are pure functions of the token, so they are memoized
/// across documents. Bounded to keep long crawls from hoarding memory.
const TOKEN_CACHE_SIZE: usize = 65_536;

static TOKEN_HASHES: LazyLock<Mutex<LruCache<String, u64>>> = LazyLock::new(|| {
    let capacity = NonZeroUsize::new(TOKEN_CACHE_SIZE).unwrap_or(NonZeroUsize::MIN);
    Mutex::new(LruCache::new(capacity))
});

/// A locality-sensitive fingerprint of a text document.
///
/// Two fingerprints are comparable only at equal widths; [`Simhash::similarity`]
/// returns 0.0 for mismatched widths rather than a misleading figure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Simhash {
    hash: u64,
    length: u32,
}

impl Simhash {
    /// Fingerprints a document at the default 64-bit width.
    #[must_use]
    pub fn new(content: &str) -> Self {
        Self::with_length(content, DEFAULT_HASH_BITS)
    }

    /// Fingerprints a document at a custom width, clamped to `1..=64`.
    #[must_use]
    pub fn with_length(content: &str, length: u32) -> Self {
        let length = length.clamp(1, 64);
        Self {
            hash: create_hash(content, length),
            length,
        }
    }

    /// Rebuilds a fingerprint from a previously stored value, falling back
    /// to recomputation from `content` when the stored form is unusable.
    ///
    /// Accepted stored forms are a decimal integer string of 18 to 22 digits
    /// (values past `u64::MAX` are rejected) and a hexadecimal string. This
    /// keeps old fingerprint archives readable without trusting them blindly.
    #[must_use]
    pub fn restore(content: &str, stored: Option<&str>) -> Self {
        stored
            .and_then(Self::validate)
            .map(Self::from_existing)
            .unwrap_or_else(|| Self::new(content))
    }

    /// Wraps a raw 64-bit value that is already a fingerprint.
    #[must_use]
    pub const fn from_existing(hash: u64) -> Self {
        Self {
            hash,
            length: DEFAULT_HASH_BITS,
        }
    }

    /// Accepts a numeric value only if it has the canonical 16 decimal
    /// digits of a stored fingerprint.
    #[must_use]
    pub fn from_numeric(value: u64) -> Option<Self> {
        (value.checked_ilog10() == Some(15)).then(|| Self::from_existing(value))
    }

    /// Parses a stored fingerprint string, decimal first, then hex.
    #[must_use]
    pub fn validate(input: &str) -> Option<u64> {
        let len = input.len();
        if (18..=22).contains(&len) && input.bytes().all(|b| b.is_ascii_digit()) {
            // Overflowing decimals cannot index a 64-bit fingerprint.
            return input.parse::<u64>().ok();
        }
        u64::from_str_radix(input, 16).ok()
    }

    /// The raw fingerprint value.
    #[must_use]
    pub const fn value(&self) -> u64 {
        self.hash
    }

    /// The fingerprint width in bits.
    #[must_use]
    pub const fn length(&self) -> u32 {
        self.length
    }

    /// Hex form for storage.
    #[must_use]
    pub fn to_hex(&self) -> String {
        format!("{:x}", self.hash)
    }

    /// Number of differing bits between two fingerprints.
    #[must_use]
    pub const fn hamming_distance(&self, other: &Self) -> u32 {
        (self.hash ^ other.hash).count_ones()
    }

    /// Similarity in `0.0..=1.0`, where identical documents score 1.0.
    ///
    /// Fingerprints of different widths are incomparable and score 0.0.
    #[must_use]
    pub fn similarity(&self, other: &Self) -> f64 {
        if self.length != other.length {
            return 0.0;
        }
        let matching = self.length.saturating_sub(self.hamming_distance(other));
        f64::from(matching) / f64::from(self.length)
    }
}

/// First eight bytes of the SHA-256 digest as a big-endian integer.
fn digest64(token: &str) -> u64 {
    let digest = Sha256::digest(token.as_bytes());
    let mut prefix = [0u8; 8];
    prefix.copy_from_slice(&digest[..8]);
    u64::from_be_bytes(prefix)
}

fn token_hash(token: &str) -> u64 {
    let mut cache = TOKEN_HASHES
        .lock()
        .unwrap_or_else(PoisonError::into_inner);
    if let Some(&hash) = cache.get(token) {
        return hash;
    }
    let hash = digest64(token);
    cache.put(token.to_string(), hash);
    hash
}

/// Splits on whitespace, trims ASCII punctuation off token ends and keeps
/// alphanumeric tokens only; then adaptively relaxes a minimum token length
/// from 5 characters down to 1 until at least half the fingerprint width is
/// covered. Short noise words are preferred over an underfilled sample.
fn sample_tokens(content: &str, length: u32) -> Vec<&str> {
    let tokens: Vec<&str> = content
        .split_whitespace()
        .map(|token| token.trim_matches(|c: char| c.is_ascii_punctuation()))
        .filter(|token| !token.is_empty() && token.chars().all(char::is_alphanumeric))
        .collect();

    let threshold = (length / 2) as usize;
    for min_len in (1..=4u32).rev() {
        let sampled: Vec<&str> = tokens
            .iter()
            .copied()
            .filter(|token| token.chars().count() > min_len as usize)
            .collect();
        if sampled.len() >= threshold {
            return sampled;
        }
    }
    tokens
}

/// Charikar's scheme: each token votes +1 or -1 on every bit position
/// according to its own digest, and the aggregate sign per position becomes
/// the fingerprint bit. Token order does not matter.
fn create_hash(content: &str, length: u32) -> u64 {
    let mut vector = vec![0i64; length as usize];
    for token in sample_tokens(content, length) {
        let hash = token_hash(token);
        for (i, slot) in vector.iter_mut().enumerate() {
            if hash & (1u64 << i) != 0 {
                *slot += 1;
            } else {
                *slot -= 1;
            }
        }
    }

    let mut result = 0u64;
    for (i, &weight) in vector.iter().enumerate() {
        if weight >= 0 {
            result |= 1u64 << i;
        }
    }
    result
}
