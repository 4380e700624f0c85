//! Error handling for the search pipeline.
//!
//! Most failures never reach the caller: the pricing fetcher and the
//! availability checker absorb them into `None` pricing or an `unknown`
//! availability status. This type is what flows *inside* those boundaries,
//! and what configuration loading returns.

use std::time::Duration;

/// Main error type for pipeline operations.
///
/// `Clone` is required because a single in-flight request result is shared
/// by every caller that joined it.
#[derive(Debug, Clone, thiserror::Error)]
pub enum DomainSearchError {
    /// Query could not be turned into a searchable label
    #[error("Invalid query '{query}': {reason}")]
    InvalidQuery { query: String, reason: String },

    /// Connection-level failure (DNS, refused, reset, TLS)
    #[error("Network error: {message}")]
    Network {
        message: String,
        source_message: Option<String>,
    },

    /// Registrar API answered with a non-success HTTP status
    #[error("{endpoint} returned HTTP {status}")]
    Http { endpoint: String, status: u16 },

    /// Registrar API answered 2xx but reported `success: false`
    #[error("{endpoint} reported failure: {message}")]
    Api { endpoint: String, message: String },

    /// Response body did not have the expected shape
    #[error("Parse error: {message}")]
    Parse { message: String },

    /// The fixed per-request timeout elapsed
    #[error("Timeout after {duration:?} during: {operation}")]
    Timeout {
        operation: String,
        duration: Duration,
    },

    /// Invalid configuration values
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Configuration file could not be read
    #[error("File error at '{path}': {message}")]
    File { path: String, message: String },

    /// Anything else
    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl DomainSearchError {
    /// Create a new invalid query error.
    pub fn invalid_query<Q: Into<String>, R: Into<String>>(query: Q, reason: R) -> Self {
        Self::InvalidQuery {
            query: query.into(),
            reason: reason.into(),
        }
    }

    /// Create a new network error.
    pub fn network<M: Into<String>>(message: M) -> Self {
        Self::Network {
            message: message.into(),
            source_message: None,
        }
    }

    /// Create a new network error with source information.
    pub fn network_with_source<M: Into<String>, S: Into<String>>(message: M, source: S) -> Self {
        Self::Network {
            message: message.into(),
            source_message: Some(source.into()),
        }
    }

    /// Create a new HTTP status error.
    pub fn http<E: Into<String>>(endpoint: E, status: u16) -> Self {
        Self::Http {
            endpoint: endpoint.into(),
            status,
        }
    }

    /// Create a new API-reported failure.
    pub fn api<E: Into<String>, M: Into<String>>(endpoint: E, message: M) -> Self {
        Self::Api {
            endpoint: endpoint.into(),
            message: message.into(),
        }
    }

    /// Create a new parse error.
    pub fn parse<M: Into<String>>(message: M) -> Self {
        Self::Parse {
            message: message.into(),
        }
    }

    /// Create a new timeout error.
    pub fn timeout<O: Into<String>>(operation: O, duration: Duration) -> Self {
        Self::Timeout {
            operation: operation.into(),
            duration,
        }
    }

    /// Create a new configuration error.
    pub fn config<M: Into<String>>(message: M) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a new file error.
    pub fn file_error<P: Into<String>, M: Into<String>>(path: P, message: M) -> Self {
        Self::File {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a new internal error.
    pub fn internal<M: Into<String>>(message: M) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Transport failures: the request may not have reached the registrar.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            Self::Network { .. } | Self::Timeout { .. } | Self::Http { .. }
        )
    }

    /// Structural failures: the registrar answered but not usefully.
    pub fn is_structural(&self) -> bool {
        matches!(self, Self::Parse { .. } | Self::Api { .. })
    }

    /// Check if this error suggests a later attempt could succeed.
    ///
    /// The pipeline itself never retries; this is for front ends that want
    /// to offer a "try again" affordance.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Network { .. }
                | Self::Timeout { .. }
                | Self::Http {
                    status: 429 | 500..=599,
                    ..
                }
        )
    }
}

impl From<reqwest::Error> for DomainSearchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::timeout("HTTP request", Duration::ZERO)
        } else if err.is_connect() {
            Self::network_with_source("Connection failed", err.to_string())
        } else if err.is_decode() {
            Self::parse(format!("Response body could not be decoded: {err}"))
        } else if let Some(status) = err.status() {
            let endpoint = err
                .url()
                .map(|u| u.path().to_string())
                .unwrap_or_else(|| "registrar API".to_string());
            Self::http(endpoint, status.as_u16())
        } else {
            Self::network_with_source("HTTP request failed", err.to_string())
        }
    }
}

impl From<serde_json::Error> for DomainSearchError {
    fn from(err: serde_json::Error) -> Self {
        Self::parse(format!("JSON parsing failed: {err}"))
    }
}

impl From<std::io::Error> for DomainSearchError {
    fn from(err: std::io::Error) -> Self {
        Self::internal(format!("I/O error: {err}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_messages() {
        let err = DomainSearchError::http("/pricing/co.ke", 503);
        assert_eq!(err.to_string(), "/pricing/co.ke returned HTTP 503");

        let err = DomainSearchError::timeout("batch availability", Duration::from_secs(15));
        assert!(err.to_string().contains("batch availability"));
    }

    #[test]
    fn test_classification() {
        assert!(DomainSearchError::network("refused").is_transport());
        assert!(DomainSearchError::http("/x", 404).is_transport());
        assert!(DomainSearchError::parse("bad json").is_structural());
        assert!(DomainSearchError::api("/x", "nope").is_structural());
        assert!(!DomainSearchError::config("bad").is_transport());
    }

    #[test]
    fn test_is_retryable() {
        assert!(DomainSearchError::network("reset").is_retryable());
        assert!(DomainSearchError::http("/x", 502).is_retryable());
        assert!(DomainSearchError::http("/x", 429).is_retryable());
        assert!(!DomainSearchError::http("/x", 404).is_retryable());
        assert!(!DomainSearchError::parse("bad").is_retryable());
    }
}
