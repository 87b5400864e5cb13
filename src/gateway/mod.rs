//! The cached asset-list gateway.
//!
//! [`CachedFetchGateway`] answers every request from the cache while the
//! entry under [`ASSETS_CACHE_KEY`] is fresh, and otherwise makes exactly one
//! upstream call. Only successful payloads are cached; both failure kinds map
//! to a `503` with a fixed message and leave the cache untouched.

use std::sync::Arc;

use bytes::Bytes;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::cache::{ASSETS_CACHE_KEY, ASSETS_TTL, Cache};
use crate::http::{Request, Response, StatusCode};
use crate::router::Router;
use crate::upstream::{Upstream, UpstreamError};

/// Why the gateway could not produce the asset list.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// The upstream answered with a non-2xx status.
    #[error("upstream answered with status {status}")]
    UpstreamStatus { status: u16 },

    /// The upstream call did not complete.
    #[error("upstream unavailable: {0}")]
    Unavailable(#[from] UpstreamError),
}

impl GatewayError {
    /// The fixed message shown to clients. Upstream details never leak.
    pub fn client_message(&self) -> &'static str {
        match self {
            Self::UpstreamStatus { .. } => "External API error",
            Self::Unavailable(_) => "Service temporarily unavailable",
        }
    }
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
}

/// The `(status, body)` pair returned to the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayReply {
    pub status: StatusCode,
    pub body: Bytes,
}

impl GatewayReply {
    fn ok(body: Bytes) -> Self {
        Self {
            status: StatusCode::Ok,
            body,
        }
    }

    fn error(err: &GatewayError) -> Self {
        let body = serde_json::to_vec(&ErrorBody {
            error: err.client_message(),
        })
        .map(Bytes::from)
        .unwrap_or_else(|_| Bytes::from_static(br#"{"error":"Service temporarily unavailable"}"#));

        Self {
            status: StatusCode::ServiceUnavailable,
            body,
        }
    }
}

impl From<GatewayReply> for Response {
    fn from(reply: GatewayReply) -> Self {
        Response::new(reply.status).json(reply.body)
    }
}

/// Serves the asset list through a time-bounded cache.
///
/// Generic over the cache store and the upstream so both can be injected.
/// With single-flight enabled, concurrent misses queue on a refresh lock and
/// re-check the cache once they hold it, so one upstream call serves them
/// all. Without it, each miss fetches independently.
pub struct CachedFetchGateway<C, U> {
    cache: C,
    upstream: U,
    refresh: Option<Mutex<()>>,
}

impl<C: Cache, U: Upstream> CachedFetchGateway<C, U> {
    pub fn new(cache: C, upstream: U) -> Self {
        Self {
            cache,
            upstream,
            refresh: None,
        }
    }

    /// Collapse concurrent cache misses into a single upstream call.
    #[must_use]
    pub fn single_flight(mut self, enabled: bool) -> Self {
        self.refresh = enabled.then(|| Mutex::new(()));
        self
    }

    pub fn cache(&self) -> &C {
        &self.cache
    }

    /// Returns the asset list, from cache or upstream.
    ///
    /// # Errors
    ///
    /// - [`GatewayError::UpstreamStatus`] — upstream responded with a non-2xx status.
    /// - [`GatewayError::Unavailable`] — the upstream call failed to complete.
    pub async fn fetch_assets(&self) -> Result<Bytes, GatewayError> {
        if let Some(body) = self.cache.get(ASSETS_CACHE_KEY).await {
            debug!(key = ASSETS_CACHE_KEY, "cache hit");
            return Ok(body);
        }

        let _guard = match &self.refresh {
            Some(lock) => {
                let guard = lock.lock().await;
                // Another request may have refreshed while we waited.
                if let Some(body) = self.cache.get(ASSETS_CACHE_KEY).await {
                    debug!(key = ASSETS_CACHE_KEY, "cache filled while waiting");
                    return Ok(body);
                }
                Some(guard)
            }
            None => None,
        };

        debug!(key = ASSETS_CACHE_KEY, "cache miss, fetching upstream");
        let response = self.upstream.fetch_assets().await?;

        if !response.is_success() {
            return Err(GatewayError::UpstreamStatus {
                status: response.status,
            });
        }

        self.cache
            .put(ASSETS_CACHE_KEY, response.body.clone(), ASSETS_TTL)
            .await;
        info!(
            key = ASSETS_CACHE_KEY,
            bytes = response.body.len(),
            ttl_secs = ASSETS_TTL.as_secs(),
            "asset list cached"
        );
        Ok(response.body)
    }

    /// Serves one client request. Never fails: every error becomes a `503`.
    pub async fn handle_request(&self) -> GatewayReply {
        match self.fetch_assets().await {
            Ok(body) => GatewayReply::ok(body),
            Err(err) => {
                warn!(error = %err, "asset list unavailable");
                GatewayReply::error(&err)
            }
        }
    }
}

impl<C, U> CachedFetchGateway<C, U>
where
    C: Cache + 'static,
    U: Upstream + 'static,
{
    /// A router serving this gateway on `GET path`.
    pub fn router(gateway: Arc<Self>, path: &str) -> Router {
        let mut router = Router::new();
        router.get(path, move |_req: Request| {
            let gateway = Arc::clone(&gateway);
            async move { Response::from(gateway.handle_request().await) }
        });
        router
    }
}
