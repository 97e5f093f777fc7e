//! CDN transport on top of reqwest.

use futures::StreamExt;
use std::time::Duration;
use tracing::{debug, trace, warn};
use url::Url;

use super::transport::{CdnTransport, TransportError};

const USER_AGENT: &str = concat!("stickerdepot/", env!("CARGO_PKG_VERSION"));

/// Async HTTP transport resolving paths against a base URL.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
    base_url: Url,
}

impl ReqwestTransport {
    /// Creates a transport for `base_url` with a per-request timeout.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, TransportError> {
        let mut base_url =
            Url::parse(base_url).map_err(|e| TransportError::InvalidUrl(e.to_string()))?;
        // Url::join replaces the last segment unless the base ends in '/'.
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .pool_idle_timeout(Duration::from_secs(90))
            .tcp_nodelay(true)
            .build()
            .map_err(|e| TransportError::Connection(format!("failed to build client: {e}")))?;

        Ok(Self { client, base_url })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn classify(error: &reqwest::Error) -> TransportError {
        if error.is_timeout() {
            TransportError::Timeout
        } else if error.is_body() || error.is_decode() {
            TransportError::Body(error.to_string())
        } else {
            TransportError::Connection(error.to_string())
        }
    }
}

impl CdnTransport for ReqwestTransport {
    async fn get(&self, path: &str, size_limit: u64) -> Result<Vec<u8>, TransportError> {
        let url = self
            .base_url
            .join(path)
            .map_err(|e| TransportError::InvalidUrl(e.to_string()))?;
        trace!(url = %url, "CDN GET starting");

        let response = self.client.get(url.clone()).send().await.map_err(|e| {
            warn!(
                url = %url,
                error = %e,
                is_connect = e.is_connect(),
                is_timeout = e.is_timeout(),
                "CDN request failed"
            );
            Self::classify(&e)
        })?;

        let status = response.status();
        if !status.is_success() {
            debug!(url = %url, status = status.as_u16(), "CDN error status");
            return Err(TransportError::Status(status.as_u16()));
        }

        if response.content_length().is_some_and(|len| len > size_limit) {
            return Err(TransportError::TooLarge { limit: size_limit });
        }

        let mut body = Vec::new();
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| Self::classify(&e))?;
            if body.len() as u64 + chunk.len() as u64 > size_limit {
                return Err(TransportError::TooLarge { limit: size_limit });
            }
            body.extend_from_slice(&chunk);
        }

        trace!(url = %url, bytes = body.len(), "CDN response body read");
        Ok(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_gains_trailing_slash() {
        let transport =
            ReqwestTransport::new("https://cdn.example.org/assets", Duration::from_secs(5))
                .unwrap();
        assert_eq!(transport.base_url().as_str(), "https://cdn.example.org/assets/");
        assert_eq!(
            transport
                .base_url()
                .join("stickers/ab/manifest.proto")
                .unwrap()
                .as_str(),
            "https://cdn.example.org/assets/stickers/ab/manifest.proto"
        );
    }

    #[test]
    fn test_invalid_base_url() {
        assert!(matches!(
            ReqwestTransport::new("not a url", Duration::from_secs(5)),
            Err(TransportError::InvalidUrl(_))
        ));
    }
}
