//! Transport abstraction for testability.

use std::future::Future;
use std::sync::Arc;
use thiserror::Error;

/// Failure of a single CDN request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// Request timed out
    #[error("request timed out")]
    Timeout,

    /// Connection could not be established or was reset
    #[error("connection failed: {0}")]
    Connection(String),

    /// Server answered with a non-success status
    #[error("HTTP {0}")]
    Status(u16),

    /// Response exceeded the size cap
    #[error("response exceeds {limit} bytes")]
    TooLarge { limit: u64 },

    /// Body could not be read to completion
    #[error("failed to read response body: {0}")]
    Body(String),

    /// Path or base URL could not form a request URL
    #[error("invalid request URL: {0}")]
    InvalidUrl(String),
}

impl TransportError {
    /// Network-class failures worth another attempt: timeouts, connection
    /// failures, interrupted bodies and HTTP 5xx. Size violations and 4xx
    /// are permanent.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Timeout | Self::Connection(_) | Self::Body(_) => true,
            Self::Status(code) => (500..600).contains(code),
            Self::TooLarge { .. } | Self::InvalidUrl(_) => false,
        }
    }

    /// Whether the server says the resource will never exist (404, 410).
    pub fn is_permanently_absent(&self) -> bool {
        matches!(self, Self::Status(404) | Self::Status(410))
    }
}

/// Issues GET requests for CDN resource paths.
pub trait CdnTransport: Send + Sync + 'static {
    /// Fetches `path` relative to the CDN base.
    ///
    /// Bodies larger than `size_limit` bytes fail with
    /// [`TransportError::TooLarge`].
    fn get(
        &self,
        path: &str,
        size_limit: u64,
    ) -> impl Future<Output = Result<Vec<u8>, TransportError>> + Send;
}

impl<T: CdnTransport> CdnTransport for Arc<T> {
    fn get(
        &self,
        path: &str,
        size_limit: u64,
    ) -> impl Future<Output = Result<Vec<u8>, TransportError>> + Send {
        (**self).get(path, size_limit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_classification() {
        assert!(TransportError::Timeout.is_retryable());
        assert!(TransportError::Connection("reset".into()).is_retryable());
        assert!(TransportError::Body("eof".into()).is_retryable());
        assert!(TransportError::Status(500).is_retryable());
        assert!(TransportError::Status(503).is_retryable());
        assert!(!TransportError::Status(404).is_retryable());
        assert!(!TransportError::Status(403).is_retryable());
        assert!(!TransportError::TooLarge { limit: 1 }.is_retryable());
        assert!(!TransportError::InvalidUrl("x".into()).is_retryable());
    }

    #[test]
    fn test_permanent_absence() {
        assert!(TransportError::Status(404).is_permanently_absent());
        assert!(TransportError::Status(410).is_permanently_absent());
        assert!(!TransportError::Status(403).is_permanently_absent());
        assert!(!TransportError::Timeout.is_permanently_absent());
    }
}
