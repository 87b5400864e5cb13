//! coingate binary: wires configuration, logging, the gateway and the server.

use std::sync::Arc;

use tracing::info;
use tracing_subscriber::EnvFilter;

use coingate::cache::MemoryCache;
use coingate::config::Config;
use coingate::gateway::CachedFetchGateway;
use coingate::middleware::{LoggerMiddleware, Pipeline};
use coingate::server::Server;
use coingate::upstream::HttpUpstream;
use coingate::Request;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_new(&config.log_level)?)
        .init();

    config.validate()?;

    let upstream = HttpUpstream::new(&config.upstream_url, config.upstream_timeout())?;
    info!(
        upstream = upstream.url(),
        timeout_secs = config.upstream_timeout,
        single_flight = config.single_flight,
        "gateway configured"
    );

    let gateway = Arc::new(
        CachedFetchGateway::new(MemoryCache::new(), upstream).single_flight(config.single_flight),
    );
    let router = Arc::new(CachedFetchGateway::router(gateway, &config.route));

    let pipeline = Pipeline::new(move |req: Request| {
        let router = Arc::clone(&router);
        async move { router.route(req).await }
    })
    .with(LoggerMiddleware);

    let server = Server::bind(&config.listen).await?;
    info!(address = %server.local_addr(), route = %config.route, "serving asset list");

    server
        .run_until(
            move |req: Request| {
                let pipeline = pipeline.clone();
                async move { pipeline.handle(req).await }
            },
            async {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    tracing::error!(error = %e, "failed to listen for shutdown signal");
                    std::future::pending::<()>().await;
                }
            },
        )
        .await?;

    info!("gateway stopped");
    Ok(())
}
