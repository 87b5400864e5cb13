//! Outbound client for the asset-list API.
//!
//! [`Upstream`] is the seam the gateway is generic over; [`HttpUpstream`] is
//! the real implementation on top of `reqwest`. One call is one GET, no
//! retries.

use std::future::Future;
use std::time::Duration;

use bytes::Bytes;
use reqwest::Client;
use serde::de::IgnoredAny;
use thiserror::Error;
use tracing::debug;

/// Default request timeout when none is configured.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Path appended to the configured base URL.
const ASSETS_PATH: &str = "/assets";

/// Ways an upstream call can fail to produce a response.
///
/// A response with a non-2xx status is *not* an error at this layer; it comes
/// back as an [`UpstreamResponse`] and the caller decides what it means.
#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("upstream did not respond within {0:?}")]
    Timeout(Duration),

    #[error("upstream request failed: {0}")]
    Request(#[source] reqwest::Error),

    #[error("upstream returned a body that is not valid JSON: {0}")]
    InvalidBody(#[from] serde_json::Error),
}

/// Status code and body of a completed upstream call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamResponse {
    pub status: u16,
    pub body: Bytes,
}

impl UpstreamResponse {
    /// Builds a response, checking that a successful body parses as JSON.
    ///
    /// Error bodies are never forwarded, so they are left unchecked.
    pub fn new(status: u16, body: Bytes) -> Result<Self, UpstreamError> {
        let response = Self { status, body };
        if response.is_success() {
            serde_json::from_slice::<IgnoredAny>(&response.body)?;
        }
        Ok(response)
    }

    /// `true` for any 2xx status.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Source of the asset list.
pub trait Upstream: Send + Sync {
    /// Performs one GET against the assets resource.
    fn fetch_assets(&self) -> impl Future<Output = Result<UpstreamResponse, UpstreamError>> + Send;
}

/// [`Upstream`] over HTTP.
#[derive(Debug, Clone)]
pub struct HttpUpstream {
    client: Client,
    url: String,
    timeout: Duration,
}

impl HttpUpstream {
    /// Creates a client for `{base_url}/assets`.
    ///
    /// A trailing `/` on `base_url` is dropped so the join never produces `//`.
    ///
    /// # Errors
    ///
    /// Returns [`UpstreamError::Request`] if the TLS backend cannot be
    /// initialised.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, UpstreamError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(UpstreamError::Request)?;
        Ok(Self {
            client,
            url: assets_url(base_url),
            timeout,
        })
    }

    /// The full URL this client fetches.
    pub fn url(&self) -> &str {
        &self.url
    }

    fn classify(&self, err: reqwest::Error) -> UpstreamError {
        if err.is_timeout() {
            UpstreamError::Timeout(self.timeout)
        } else {
            UpstreamError::Request(err)
        }
    }
}

impl Upstream for HttpUpstream {
    async fn fetch_assets(&self) -> Result<UpstreamResponse, UpstreamError> {
        debug!(url = %self.url, "fetching assets from upstream");

        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| self.classify(e))?;
        let status = response.status().as_u16();
        let body = response.bytes().await.map_err(|e| self.classify(e))?;

        debug!(status, bytes = body.len(), "upstream responded");
        UpstreamResponse::new(status, body)
    }
}

fn assets_url(base_url: &str) -> String {
    format!("{}{ASSETS_PATH}", base_url.trim_end_matches('/'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_joins_without_double_slash() {
        assert_eq!(assets_url("https://api.coincap.io/v2"), "https://api.coincap.io/v2/assets");
        assert_eq!(assets_url("https://api.coincap.io/v2/"), "https://api.coincap.io/v2/assets");
    }

    #[test]
    fn success_body_must_be_json() {
        let ok = UpstreamResponse::new(200, Bytes::from_static(br#"{"data":[{"id":"bitcoin"}]}"#));
        assert!(ok.unwrap().is_success());

        let bad = UpstreamResponse::new(200, Bytes::from_static(b"<html>oops</html>"));
        assert!(matches!(bad, Err(UpstreamError::InvalidBody(_))));
    }

    #[test]
    fn error_body_is_not_validated() {
        let res = UpstreamResponse::new(500, Bytes::from_static(b"Internal Server Error")).unwrap();
        assert!(!res.is_success());
        assert_eq!(res.status, 500);
    }

    #[test]
    fn success_range_is_2xx() {
        let json = Bytes::from_static(b"{}");
        assert!(UpstreamResponse::new(204, json.clone()).unwrap().is_success());
        assert!(!UpstreamResponse::new(301, json.clone()).unwrap().is_success());
        assert!(!UpstreamResponse::new(199, json).unwrap().is_success());
    }

    #[test]
    fn client_keeps_configured_url() {
        let upstream = HttpUpstream::new("http://127.0.0.1:9/", DEFAULT_TIMEOUT).unwrap();
        assert_eq!(upstream.url(), "http://127.0.0.1:9/assets");
    }

    #[tokio::test]
    async fn silent_upstream_times_out() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        // Accept and hold the connection without ever answering.
        let held = tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(10)).await;
            drop(socket);
        });

        let upstream = HttpUpstream::new(&format!("http://{addr}"), Duration::from_secs(1)).unwrap();
        let err = upstream.fetch_assets().await.unwrap_err();
        assert!(
            matches!(err, UpstreamError::Timeout(t) if t == Duration::from_secs(1)),
            "got {err:?}"
        );
        held.abort();
    }

    #[tokio::test]
    async fn connection_refused_is_request_error() {
        // Port 9 (discard) is not listening in test environments.
        let upstream = HttpUpstream::new("http://127.0.0.1:9", Duration::from_secs(2)).unwrap();
        let err = upstream.fetch_assets().await.unwrap_err();
        assert!(matches!(err, UpstreamError::Request(_) | UpstreamError::Timeout(_)));
    }
}
