//! Error types for the fetch module.
//!
//! Failures are structured per URL so the driver can log context-rich skip
//! reasons while the batch keeps going.

use thiserror::Error;

/// Errors that can occur while fetching a single URL.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The provided URL is malformed or missing required parts.
    #[error("invalid URL: {url}")]
    InvalidUrl {
        /// The invalid URL string.
        url: String,
    },

    /// The URL scheme is neither `http` nor `https`.
    #[error("unsupported scheme in {url}")]
    UnsupportedScheme {
        /// The rejected URL string.
        url: String,
    },

    /// Network-level error (DNS resolution, connection refused, TLS errors, etc.)
    #[error("network error fetching {url}: {source}")]
    Network {
        /// The URL that failed.
        url: String,
        /// The underlying network error.
        #[source]
        source: reqwest::Error,
    },

    /// Request timed out before completion.
    #[error("timeout fetching {url}")]
    Timeout {
        /// The URL that timed out.
        url: String,
    },

    /// HTTP error response (4xx client errors, 5xx server errors).
    #[error("HTTP {status} fetching {url}")]
    HttpStatus {
        /// The URL that returned an error status.
        url: String,
        /// The HTTP status code.
        status: u16,
        /// The Retry-After header value, if present (for 429 responses).
        retry_after: Option<String>,
    },

    /// The redirect budget was exhausted, or a redirect arrived with the
    /// budget set to zero.
    #[error("too many redirects fetching {url}")]
    TooManyRedirects {
        /// The URL whose redirect chain exceeded the budget.
        url: String,
    },

    /// The response body exceeded the configured size limit mid-transfer.
    #[error("body exceeds {limit} bytes fetching {url}")]
    BodyTooLarge {
        /// The URL whose body was oversized.
        url: String,
        /// The configured maximum in bytes.
        limit: usize,
    },

    /// The HTTP client itself could not be constructed.
    #[error("failed to build HTTP client: {source}")]
    ClientBuild {
        /// The underlying builder error.
        #[source]
        source: reqwest::Error,
    },
}

impl FetchError {
    /// Creates an invalid-URL error.
    pub fn invalid_url(url: impl Into<String>) -> Self {
        Self::InvalidUrl { url: url.into() }
    }

    /// Creates an unsupported-scheme error.
    pub fn unsupported_scheme(url: impl Into<String>) -> Self {
        Self::UnsupportedScheme { url: url.into() }
    }

    /// Creates a network error from a reqwest error.
    pub fn network(url: impl Into<String>, source: reqwest::Error) -> Self {
        Self::Network {
            url: url.into(),
            source,
        }
    }

    /// Creates a timeout error.
    pub fn timeout(url: impl Into<String>) -> Self {
        Self::Timeout { url: url.into() }
    }

    /// Creates an HTTP status error.
    pub fn http_status(url: impl Into<String>, status: u16) -> Self {
        Self::HttpStatus {
            url: url.into(),
            status,
            retry_after: None,
        }
    }

    /// Creates an HTTP status error carrying a Retry-After header value.
    pub fn http_status_with_retry_after(
        url: impl Into<String>,
        status: u16,
        retry_after: Option<String>,
    ) -> Self {
        Self::HttpStatus {
            url: url.into(),
            status,
            retry_after,
        }
    }

    /// Creates a redirect-budget error.
    pub fn too_many_redirects(url: impl Into<String>) -> Self {
        Self::TooManyRedirects { url: url.into() }
    }

    /// Creates an oversized-body error.
    pub fn body_too_large(url: impl Into<String>, limit: usize) -> Self {
        Self::BodyTooLarge {
            url: url.into(),
            limit,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages_carry_url_context() {
        let err = FetchError::http_status("http://example.com/a", 503);
        assert_eq!(err.to_string(), "HTTP 503 fetching http://example.com/a");

        let err = FetchError::timeout("http://example.com/b");
        assert!(err.to_string().contains("http://example.com/b"));

        let err = FetchError::body_too_large("http://example.com/c", 1024);
        assert!(err.to_string().contains("1024"));
    }

    #[test]
    fn test_retry_after_is_preserved() {
        let err = FetchError::http_status_with_retry_after(
            "http://example.com",
            429,
            Some("120".to_string()),
        );
        if let FetchError::HttpStatus { retry_after, .. } = err {
            assert_eq!(retry_after.as_deref(), Some("120"));
        } else {
            panic!("expected HttpStatus variant");
        }
    }
}
