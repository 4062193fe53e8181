//! Payload decompression and charset decoding.
//!
//! Servers routinely answer with compressed bodies, mislabeled bodies, or
//! bodies compressed despite an identity request. This module therefore
//! decides by content, not by header: known magic bytes select a decoder,
//! and anything that fails to decompress is passed through unchanged and
//! treated as plain data.
//!
//! The set of encodings advertised in `Accept-Encoding` is derived from
//! [`supported_encodings`], so a request never asks for a codec the decode
//! stage cannot handle.

use std::borrow::Cow;
use std::io::Read;

use flate2::read::{DeflateDecoder, GzDecoder, ZlibDecoder};
use thiserror::Error;
use tracing::debug;

/// Upper bound on decompressed output (100 MiB). A stream that inflates past
/// this is treated as a failed decode and the raw bytes pass through; the
/// payload size pre-filter then rejects them.
pub const MAX_DECOMPRESSED_SIZE: usize = 100 * 1024 * 1024;

/// Share of replacement characters above which a lossy decode is considered
/// binary rather than text (one in four).
const MAX_REPLACEMENT_RATIO: usize = 4;

/// Errors produced by charset decoding.
///
/// Corrupt *compression* never errors (the bytes pass through unchanged);
/// this type covers byte sequences that are not text in any recoverable way.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// The payload is dominated by undecodable bytes.
    #[error("undecodable byte sequence ({ratio_pct}% replacement characters)")]
    Undecodable {
        /// Percentage of replacement characters after lossy decoding.
        ratio_pct: usize,
    },
}

/// Returns the content encodings this build can decode.
///
/// Always contains `gzip` and `deflate`; `br` and `zstd` appear when the
/// corresponding cargo features are compiled in. The header resolver joins
/// this list into the `Accept-Encoding` value verbatim.
#[must_use]
pub fn supported_encodings() -> Vec<&'static str> {
    let mut encodings = vec!["gzip", "deflate"];
    #[cfg(feature = "brotli")]
    encodings.push("br");
    #[cfg(feature = "zstd")]
    encodings.push("zstd");
    encodings
}

/// Decompresses a payload if it looks compressed, otherwise returns it as-is.
///
/// Magic bytes are checked first (gzip, zlib, zstd); brotli carries no magic
/// and is only attempted for data that is not already valid text. Corrupt or
/// unrecognized input is returned unchanged rather than erroring, since a
/// broken "compressed" body is indistinguishable from a plain one.
#[must_use]
pub fn handle_compressed(data: &[u8]) -> Cow<'_, [u8]> {
    if data.len() < 2 {
        return Cow::Borrowed(data);
    }

    if data.starts_with(&[0x1f, 0x8b]) {
        if let Some(out) = read_capped(GzDecoder::new(data)) {
            return Cow::Owned(out);
        }
        debug!("gzip magic present but stream is corrupt, passing through");
    }

    if data[0] == 0x78 {
        if let Some(out) = read_capped(ZlibDecoder::new(data)) {
            return Cow::Owned(out);
        }
    }

    #[cfg(feature = "zstd")]
    if data.starts_with(&[0x28, 0xb5, 0x2f, 0xfd]) {
        if let Ok(decoder) = zstd::stream::read::Decoder::new(data) {
            if let Some(out) = read_capped(decoder) {
                return Cow::Owned(out);
            }
        }
        debug!("zstd magic present but stream is corrupt, passing through");
    }

    // Brotli and bare deflate have no magic bytes. Valid text is never a
    // compressed stream, so blind attempts are limited to non-UTF-8 input.
    if std::str::from_utf8(data).is_err() {
        #[cfg(feature = "brotli")]
        if let Some(out) = read_capped(brotli::Decompressor::new(data, 4096)) {
            return Cow::Owned(out);
        }

        if let Some(out) = read_capped(DeflateDecoder::new(data)) {
            return Cow::Owned(out);
        }
    }

    Cow::Borrowed(data)
}

/// Decompresses (when applicable) and charset-decodes a payload to text.
///
/// Strict UTF-8 is tried first; on failure the bytes are recovered lossily.
/// A payload whose lossy decode is dominated by replacement characters is
/// classified as binary and rejected with a typed error, which callers map
/// to a per-URL skip.
///
/// # Errors
///
/// Returns [`DecodeError::Undecodable`] for byte sequences that are not
/// text in any recoverable way.
pub fn decode_payload(data: &[u8]) -> Result<String, DecodeError> {
    let raw = handle_compressed(data);
    match std::str::from_utf8(&raw) {
        Ok(text) => Ok(text.to_string()),
        Err(_) => {
            let text = String::from_utf8_lossy(&raw);
            let total = text.chars().count().max(1);
            let replacements = text
                .chars()
                .filter(|&c| c == char::REPLACEMENT_CHARACTER)
                .count();
            if replacements * MAX_REPLACEMENT_RATIO > total {
                let ratio_pct = replacements * 100 / total;
                debug!(ratio_pct, "payload classified as binary");
                Err(DecodeError::Undecodable { ratio_pct })
            } else {
                Ok(text.into_owned())
            }
        }
    }
}

/// Runs a decoder to completion with the output size cap applied.
///
/// Returns `None` for a corrupt stream, an empty result, or output past the
/// cap so the caller can fall back to the raw bytes.
fn read_capped<R: Read>(reader: R) -> Option<Vec<u8>> {
    let mut out = Vec::new();
    let mut limited = reader.take(MAX_DECOMPRESSED_SIZE as u64 + 1);
    match limited.read_to_end(&mut out) {
        Ok(_) if !out.is_empty() && out.len() <= MAX_DECOMPRESSED_SIZE => Some(out),
        _ => None,
    }
}
