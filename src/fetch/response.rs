//! Fetched-payload value object.
//!
//! A [`Response`] captures everything the rest of the pipeline needs from one
//! HTTP exchange: the raw body, the final URL after redirects, the status
//! code and an optional lowercase header map. Decoding to text is deferred
//! and cached, so callers that only inspect the status never pay for it.

use std::collections::HashMap;
use std::sync::OnceLock;

use serde::Serialize;

use crate::decode::{DecodeError, decode_payload};

/// Outcome of a single HTTP exchange.
#[derive(Debug, Clone, Default)]
pub struct Response {
    data: Vec<u8>,
    status: u16,
    url: String,
    headers: HashMap<String, String>,
    html: OnceLock<String>,
}

/// Serializable projection of a [`Response`] for record-keeping callers.
#[derive(Debug, Clone, Serialize)]
pub struct ResponseRecord {
    /// Raw body, lossily decoded for serialization.
    pub data: String,
    /// Lowercase response headers.
    pub headers: HashMap<String, String>,
    /// Decoded document text.
    pub html: String,
    /// HTTP status code.
    pub status: u16,
    /// Final URL after redirects.
    pub url: String,
}

impl Response {
    /// Wraps a fetched body with its status and final URL.
    #[must_use]
    pub fn new(data: Vec<u8>, status: u16, url: impl Into<String>) -> Self {
        Self {
            data,
            status,
            url: url.into(),
            headers: HashMap::new(),
            html: OnceLock::new(),
        }
    }

    /// Stores response headers, lowercasing names so lookups are
    /// case-insensitive regardless of what the server sent.
    pub fn store_headers<I, K, V>(&mut self, headers: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        self.headers = headers
            .into_iter()
            .map(|(k, v)| (k.as_ref().to_lowercase(), v.into()))
            .collect();
    }

    /// The raw response body.
    #[must_use]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// The HTTP status code.
    #[must_use]
    pub const fn status(&self) -> u16 {
        self.status
    }

    /// The final URL after any redirects.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// The lowercase header map.
    #[must_use]
    pub const fn headers(&self) -> &HashMap<String, String> {
        &self.headers
    }

    /// Looks up a header by case-insensitive name.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_lowercase()).map(String::as_str)
    }

    /// Whether this response is usable: a 2xx status with a non-empty body.
    ///
    /// A 200 with no payload is as useless downstream as a 404, so it does
    /// not count as success.
    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status) && !self.data.is_empty()
    }

    /// Decodes the body to text, caching the result for later calls.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError`] when the body is not text in any recoverable
    /// form; the failure is not cached and a later call will retry.
    pub fn decode_data(&self) -> Result<&str, DecodeError> {
        if let Some(text) = self.html.get() {
            return Ok(text);
        }
        let text = decode_payload(&self.data)?;
        Ok(self.html.get_or_init(|| text))
    }

    /// The decoded text, if [`Response::decode_data`] has already succeeded.
    #[must_use]
    pub fn html(&self) -> Option<&str> {
        self.html.get().map(String::as_str)
    }

    /// Projects the response into its serializable record form.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError`] when the body cannot be decoded to text.
    pub fn as_record(&self) -> Result<ResponseRecord, DecodeError> {
        let html = self.decode_data()?.to_string();
        Ok(ResponseRecord {
            data: String::from_utf8_lossy(&self.data).into_owned(),
            headers: self.headers.clone(),
            html,
            status: self.status,
            url: self.url.clone(),
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn sample() -> Response {
        Response::new(b"<html>content</html>".to_vec(), 200, "https://example.org/page")
    }

    // ==================== Success Predicate Tests ====================

    #[test]
    fn test_success_requires_2xx_and_body() {
        assert!(sample().is_success());
        assert!(Response::new(b"ok".to_vec(), 204, "https://example.org").is_success());
    }

    #[test]
    fn test_empty_body_is_not_success() {
        let resp = Response::new(Vec::new(), 200, "https://example.org");
        assert!(!resp.is_success());
    }

    #[test]
    fn test_error_status_is_not_success() {
        let resp = Response::new(b"not found".to_vec(), 404, "https://example.org");
        assert!(!resp.is_success());
        let resp = Response::new(b"moved".to_vec(), 301, "https://example.org");
        assert!(!resp.is_success());
    }

    // ==================== Header Tests ====================

    #[test]
    fn test_headers_are_lowercased() {
        let mut resp = sample();
        resp.store_headers([("Content-Type", "text/html"), ("X-Powered-By", "tests")]);
        assert_eq!(resp.header("content-type"), Some("text/html"));
        assert_eq!(resp.header("Content-Type"), Some("text/html"));
        assert!(resp.headers().contains_key("x-powered-by"));
        assert!(resp.header("missing").is_none());
    }

    // ==================== Decode Caching Tests ====================

    #[test]
    fn test_decode_is_cached() {
        let resp = sample();
        assert!(resp.html().is_none());
        let first = resp.decode_data().unwrap().as_ptr();
        let second = resp.decode_data().unwrap().as_ptr();
        assert_eq!(first, second);
        assert_eq!(resp.html(), Some("<html>content</html>"));
    }

    #[test]
    fn test_decode_failure_is_not_cached() {
        let resp = Response::new(vec![0xffu8; 64], 200, "https://example.org/bin");
        assert!(resp.decode_data().is_err());
        assert!(resp.html().is_none());
    }

    // ==================== Record Projection Tests ====================

    #[test]
    fn test_record_carries_all_fields() {
        let mut resp = sample();
        resp.store_headers([("Content-Type", "text/html")]);
        let record = resp.as_record().unwrap();
        assert_eq!(record.status, 200);
        assert_eq!(record.url, "https://example.org/page");
        assert_eq!(record.html, "<html>content</html>");
        assert_eq!(record.headers.get("content-type").unwrap(), "text/html");

        let json = serde_json::to_value(&record).unwrap();
        for key in ["data", "headers", "html", "status", "url"] {
            assert!(json.get(key).is_some(), "missing key {key}");
        }
    }
}
