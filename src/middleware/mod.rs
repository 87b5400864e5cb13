//! Middleware pipeline — composable before/after request handler logic.
//!
//! ## Core types
//!
//! - [`Middleware`] — trait implemented by all middleware.
//! - [`Next`] — cursor into the remaining chain; call [`Next::run`] to advance.
//! - [`Pipeline`] — an ordered middleware stack terminated by an endpoint
//!   [`Handler`](crate::router::Handler), usually a router.
//! - [`LoggerMiddleware`] — one access-log line per request.

use std::{future::Future, pin::Pin, sync::Arc};
use tokio::time::Instant;

use crate::{Request, Response, router::Handler};

/// A type-erased, reference-counted middleware function.
pub type MiddlewareHandler = Arc<
    dyn Fn(Request, Next) -> Pin<Box<dyn Future<Output = Response> + Send>> + Send + Sync + 'static,
>;

/// Converts a [`Middleware`] implementation into a [`MiddlewareHandler`].
pub fn from_middleware<M>(middleware: Arc<M>) -> MiddlewareHandler
where
    M: Middleware + 'static,
{
    Arc::new(move |req: Request, next: Next| middleware.handle(req, next))
}

/// A cursor into the remaining middleware chain for a single request.
///
/// `Next` is consumed by [`run`](Self::run), so each middleware can forward
/// at most once. When the middlewares are exhausted the endpoint runs.
pub struct Next {
    middlewares: Arc<[MiddlewareHandler]>,
    endpoint: Handler,
    // Tracks which middleware to invoke on the next `run` call.
    index: usize,
}

impl Next {
    /// Invokes the next middleware, or the endpoint when none remain.
    pub async fn run(mut self, req: Request) -> Response {
        if self.index < self.middlewares.len() {
            let handler = Arc::clone(&self.middlewares[self.index]);
            self.index += 1;
            handler(req, self).await
        } else {
            (self.endpoint)(req).await
        }
    }
}

/// The core trait for all middleware.
///
/// Implementors may pass through (`next.run(req).await`), short-circuit by
/// returning a [`Response`] directly, or decorate the downstream response.
/// Implementations are shared across Tokio tasks and must not hold `&mut`
/// state across an `.await`.
pub trait Middleware: Send + Sync {
    /// Handle the request and optionally delegate to the next layer.
    fn handle(&self, req: Request, next: Next) -> Pin<Box<dyn Future<Output = Response> + Send>>;
}

/// An ordered middleware stack in front of an endpoint.
///
/// # Examples
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use coingate::{Request, Router, Response, StatusCode};
/// use coingate::middleware::{LoggerMiddleware, Pipeline};
///
/// let mut router = Router::new();
/// router.get("/health", |_req: Request| async { Response::new(StatusCode::Ok) });
///
/// let router = Arc::new(router);
/// let pipeline = Pipeline::new(move |req: Request| {
///     let router = Arc::clone(&router);
///     async move { router.route(req).await }
/// })
/// .with(LoggerMiddleware);
/// ```
#[derive(Clone)]
pub struct Pipeline {
    middlewares: Arc<[MiddlewareHandler]>,
    endpoint: Handler,
}

impl Pipeline {
    /// Create a pipeline with no middleware in front of `endpoint`.
    pub fn new(endpoint: impl crate::router::IntoHandler) -> Self {
        Self {
            middlewares: Arc::new([]),
            endpoint: Arc::new(move |req| endpoint.call(req)),
        }
    }

    /// Append a middleware. The first one added runs outermost.
    #[must_use]
    pub fn with(mut self, middleware: impl Middleware + 'static) -> Self {
        let mut middlewares = self.middlewares.to_vec();
        middlewares.push(from_middleware(Arc::new(middleware)));
        self.middlewares = middlewares.into();
        self
    }

    /// Run `req` through every middleware and then the endpoint.
    pub async fn handle(&self, req: Request) -> Response {
        let next = Next {
            middlewares: Arc::clone(&self.middlewares),
            endpoint: Arc::clone(&self.endpoint),
            index: 0,
        };
        next.run(req).await
    }
}

/// Logs method, path, status and duration once the downstream handler returns.
///
/// ```text
/// GET /api/crypto - 200 (1.42ms)
/// ```
pub struct LoggerMiddleware;

impl Middleware for LoggerMiddleware {
    fn handle(&self, req: Request, next: Next) -> Pin<Box<dyn Future<Output = Response> + Send>> {
        Box::pin(async move {
            let start = Instant::now();
            let method = req.method().as_str().to_string();
            let path = req.path().to_string();

            let response = next.run(req).await;

            let duration = start.elapsed();
            let status = response.status().as_u16();

            tracing::info!(
                %method,
                %path,
                status,
                elapsed = ?duration,
                "{} {} - {} ({:?})",
                method,
                path,
                status,
                duration
            );

            response
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::StatusCode;

    fn make_request(path: &str) -> Request {
        let raw = format!("GET {path} HTTP/1.1\r\nHost: localhost\r\n\r\n");
        Request::parse(raw.as_bytes()).unwrap().0
    }

    struct Tag(&'static str);

    impl Middleware for Tag {
        fn handle(
            &self,
            req: Request,
            next: Next,
        ) -> Pin<Box<dyn Future<Output = Response> + Send>> {
            let tag = self.0;
            Box::pin(async move {
                let mut trail = next.run(req).await.body_ref().to_vec();
                trail.extend_from_slice(tag.as_bytes());
                Response::new(StatusCode::Ok).body_bytes(trail)
            })
        }
    }

    struct Deny;

    impl Middleware for Deny {
        fn handle(
            &self,
            _req: Request,
            _next: Next,
        ) -> Pin<Box<dyn Future<Output = Response> + Send>> {
            Box::pin(async { Response::new(StatusCode::NotFound) })
        }
    }

    #[tokio::test]
    async fn empty_pipeline_runs_endpoint() {
        let pipeline = Pipeline::new(|_req: Request| async { Response::new(StatusCode::Ok).body("e") });
        let res = pipeline.handle(make_request("/")).await;
        assert_eq!(res.body_ref().as_ref(), b"e");
    }

    #[tokio::test]
    async fn middlewares_wrap_in_registration_order() {
        let pipeline = Pipeline::new(|_req: Request| async { Response::new(StatusCode::Ok).body("e") })
            .with(Tag("1"))
            .with(Tag("2"));
        let res = pipeline.handle(make_request("/")).await;
        // innermost appends first
        assert_eq!(res.body_ref().as_ref(), b"e21");
    }

    #[tokio::test]
    async fn middleware_can_short_circuit() {
        let pipeline = Pipeline::new(|_req: Request| async { Response::new(StatusCode::Ok) })
            .with(Deny);
        let res = pipeline.handle(make_request("/")).await;
        assert_eq!(res.status(), StatusCode::NotFound);
    }

    #[tokio::test]
    async fn logger_passes_response_through() {
        let pipeline = Pipeline::new(|_req: Request| async {
            Response::new(StatusCode::ServiceUnavailable)
        })
        .with(LoggerMiddleware);
        let res = pipeline.handle(make_request("/api/crypto")).await;
        assert_eq!(res.status(), StatusCode::ServiceUnavailable);
    }
}
