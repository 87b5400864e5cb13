//! # coingate
//!
//! A small async HTTP gateway that serves a crypto asset list from a
//! 60-second in-memory cache, falling through to the upstream API on a miss.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use coingate::cache::MemoryCache;
//! use coingate::gateway::CachedFetchGateway;
//! use coingate::server::Server;
//! use coingate::upstream::HttpUpstream;
//! use coingate::{Request, Response};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let upstream = HttpUpstream::new("https://api.coincap.io/v2", Duration::from_secs(30))?;
//!     let gateway = Arc::new(CachedFetchGateway::new(MemoryCache::new(), upstream));
//!
//!     let server = Server::bind("127.0.0.1:8080").await?;
//!     server
//!         .run(move |_req: Request| {
//!             let gateway = Arc::clone(&gateway);
//!             async move { Response::from(gateway.handle_request().await) }
//!         })
//!         .await?;
//!     Ok(())
//! }
//! ```

pub mod cache;
pub mod config;
pub mod gateway;
pub mod http;
pub mod middleware;
pub mod router;
pub mod server;
pub mod upstream;

// ── Convenience re-exports ────────────────────────────────────────────────────
pub use http::{Headers, Method, Request, Response, StatusCode};
pub use router::Router;
pub use server::{Server, ServerError};
