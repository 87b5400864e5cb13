//! Request routing — map exact URL paths and HTTP methods to handlers.
//!
//! Trailing slashes are normalized on both registered paths and incoming
//! paths, so `/api/crypto/` and `/api/crypto` are treated as equivalent.
//! Routes are matched in registration order; the first route whose method and
//! path both match wins. A path that is registered under a different method
//! yields `405 Method Not Allowed` with an `Allow` header instead of `404`.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::{Method, Request, Response, StatusCode};

/// Type-erased, heap-allocated async handler.
///
/// Stored behind `Arc<dyn Fn(…)>` so it can be shared across connection
/// tasks. Use [`Router::get`] rather than building one by hand.
pub type Handler =
    Arc<dyn Fn(Request) -> Pin<Box<dyn Future<Output = Response> + Send>> + Send + Sync + 'static>;

/// Conversion trait for async handler functions.
///
/// Any `Fn(Request) -> impl Future<Output = Response> + Send` that is also
/// `Send + Sync + 'static` gets this via the blanket impl below.
pub trait IntoHandler: Send + Sync + 'static {
    /// Call the handler, boxing the returned future.
    fn call(&self, request: Request) -> Pin<Box<dyn Future<Output = Response> + Send>>;
}

impl<T, F> IntoHandler for T
where
    T: Fn(Request) -> F + Send + Sync + 'static,
    F: Future<Output = Response> + Send + 'static,
{
    fn call(&self, request: Request) -> Pin<Box<dyn Future<Output = Response> + Send>> {
        Box::pin((self)(request))
    }
}

fn normalize(path: &str) -> &str {
    if path != "/" && path.ends_with('/') {
        &path[..path.len() - 1]
    } else {
        path
    }
}

// A single registered route binding a method + path to a handler.
struct Route {
    method: Method,
    path: String,
    handler: Handler,
}

/// HTTP request router.
///
/// # Examples
///
/// ```rust,no_run
/// use coingate::{Request, Router, Response, StatusCode};
///
/// let mut router = Router::new();
/// router.get("/health", |_req: Request| async { Response::new(StatusCode::Ok) });
/// ```
#[derive(Default)]
pub struct Router {
    routes: Vec<Route>,
}

impl Router {
    /// Create an empty router.
    ///
    /// ```rust
    /// use coingate::Router;
    ///
    /// assert!(Router::new().is_empty());
    /// ```
    pub fn new() -> Self {
        Self { routes: Vec::new() }
    }

    /// Register a handler for `GET` requests on `path`.
    pub fn get(&mut self, path: &str, handler: impl IntoHandler) {
        self.add_route(Method::Get, path, handler);
    }

    fn add_route(&mut self, method: Method, path: &str, handler: impl IntoHandler) {
        let handler: Handler = Arc::new(move |req| handler.call(req));
        self.routes.push(Route {
            method,
            path: normalize(path).to_owned(),
            handler,
        });
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Dispatch `request` to the first matching route.
    ///
    /// Returns `404` when no route has the path, and `405` with an `Allow`
    /// header listing the registered methods when the path exists under other
    /// methods only.
    pub async fn route(&self, request: Request) -> Response {
        let path = normalize(request.path());

        let mut allowed: Vec<&str> = Vec::new();
        for route in &self.routes {
            if route.path != path {
                continue;
            }
            if &route.method == request.method() {
                return (route.handler)(request).await;
            }
            if !allowed.contains(&route.method.as_str()) {
                allowed.push(route.method.as_str());
            }
        }

        if allowed.is_empty() {
            Response::new(StatusCode::NotFound)
        } else {
            Response::new(StatusCode::MethodNotAllowed).header("Allow", allowed.join(", "))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_request(method: &str, path: &str) -> Request {
        let raw = format!("{method} {path} HTTP/1.1\r\nHost: localhost\r\n\r\n");
        let (req, _) = Request::parse(raw.as_bytes()).unwrap();
        req
    }

    #[test]
    fn normalize_strips_trailing_slash_except_root() {
        assert_eq!(normalize("/api/crypto/"), "/api/crypto");
        assert_eq!(normalize("/api/crypto"), "/api/crypto");
        assert_eq!(normalize("/"), "/");
    }

    #[test]
    fn len_tracks_registrations() {
        let mut router = Router::default();
        assert!(router.is_empty());
        router.get("/a", |_req: Request| async { Response::new(StatusCode::Ok) });
        router.get("/b", |_req: Request| async { Response::new(StatusCode::Ok) });
        assert_eq!(router.len(), 2);
    }

    #[tokio::test]
    async fn empty_router_returns_404() {
        let res = Router::new().route(make_request("GET", "/")).await;
        assert_eq!(res.status(), StatusCode::NotFound);
    }

    #[tokio::test]
    async fn get_matches_with_or_without_trailing_slash() {
        let mut router = Router::new();
        router.get("/api/crypto", |_req: Request| async { Response::new(StatusCode::Ok) });

        for path in ["/api/crypto", "/api/crypto/", "/api/crypto?x=1"] {
            let res = router.route(make_request("GET", path)).await;
            assert_eq!(res.status(), StatusCode::Ok, "path {path}");
        }
    }

    #[tokio::test]
    async fn unknown_path_returns_404() {
        let mut router = Router::new();
        router.get("/api/crypto", |_req: Request| async { Response::new(StatusCode::Ok) });
        let res = router.route(make_request("GET", "/api/other")).await;
        assert_eq!(res.status(), StatusCode::NotFound);
    }

    #[tokio::test]
    async fn wrong_method_returns_405_with_allow() {
        let mut router = Router::new();
        router.get("/api/crypto", |_req: Request| async { Response::new(StatusCode::Ok) });
        let res = router.route(make_request("POST", "/api/crypto")).await;
        assert_eq!(res.status(), StatusCode::MethodNotAllowed);
        assert_eq!(res.headers().get("allow"), Some("GET"));
    }

    #[tokio::test]
    async fn first_matching_route_wins() {
        let mut router = Router::new();
        router.get("/path", |_req: Request| async { Response::new(StatusCode::Ok) });
        router.get("/path", |_req: Request| async {
            Response::new(StatusCode::InternalServerError)
        });
        let res = router.route(make_request("GET", "/path")).await;
        assert_eq!(res.status(), StatusCode::Ok);
    }
}
