use assetcache::{config::AssetCacheConfig, router, service::CacheService};
use std::net::SocketAddr;

/// Asset cache server entry point.
///
/// Initializes tracing, loads and validates configuration from the
/// environment, and serves every GET path from the local mirror, filling it
/// from the origin on a miss.
///
/// # Configuration
/// Environment variables:
/// - `ASSETCACHE_ORIGIN`: origin base URL (default: http://localhost:8081/)
/// - `ASSETCACHE_ROOT`: local storage root (default: ./public)
/// - `ASSETCACHE_NAMESPACE`: directory under the root holding the mirror (default: mirror)
/// - `ASSETCACHE_DEFAULT_DOCUMENT`: file served for `/` (default: index.html)
/// - `ASSETCACHE_ERROR_LOG`: error log path (default: error.log under the root)
/// - `ASSETCACHE_TIMEOUT_SECS`: whole-request upstream timeout (default: 30)
/// - `ASSETCACHE_MAX_BODY_BYTES`: largest upstream body accepted (default: 33554432)
/// - `ASSETCACHE_MIME`: extra MIME entries, `ext=type` pairs separated by commas
/// - `HTTP_PROXY` / `HTTPS_PROXY`, `PROXY_USERNAME` / `PROXY_PASSWORD`: forward proxy
/// - `PROXY_FULL_URI`: absolute-form requests through the proxy (default: true)
/// - `PORT`: HTTP listen port (default: 8080)
/// - `RUST_LOG`: logging verbosity (default: "assetcache=debug,tower_http=debug")
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "assetcache=debug,tower_http=debug".into())
        )
        .init();

    tracing::info!("Starting asset cache");

    let cfg = AssetCacheConfig::from_env()?;
    tracing::info!(
        "Mirroring {} into {} (error log: {})",
        cfg.origin,
        cfg.storage_root.join(&cfg.namespace).display(),
        cfg.error_log.display()
    );
    if cfg.fetch.proxy.is_some() {
        tracing::info!("Outbound requests go through the configured forward proxy");
    }

    let app = router(CacheService::from_config(&cfg)?);

    let port = std::env::var("PORT")
        .unwrap_or_else(|_| "8080".to_string())
        .parse::<u16>()
        .unwrap_or(8080);

    // Bind to 0.0.0.0 for external access (required for containerized deployment)
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("Server listening on {}", addr);

    axum::serve(tokio::net::TcpListener::bind(addr).await?, app).await?;
    Ok(())
}
