use std::sync::Arc;
use std::time::Duration;

use cfcontrol::guess_local_ip;
use cfsession::{CastConnector, HttpFetcher, Mp3Parsers, SessionContext, session_router};
use tracing::info;
use tracing_subscriber::EnvFilter;

mod catalog_http;
mod config;

use catalog_http::HttpCatalog;
use config::Config;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // ========== PHASE 1 : Infrastructure ==========

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::load()?;
    info!("📡 CastFollow starting");

    // ========== PHASE 2 : Configuration métier ==========

    let stream_base_url = config.stream_base_url.clone().unwrap_or_else(|| {
        let ip = guess_local_ip();
        format!("http://{}:{}", ip, config.http.port)
    });
    info!("🎵 Stream sink reachable at {}", stream_base_url);

    let context = SessionContext::new(
        Arc::new(HttpCatalog::new(&config.catalog.base_url)),
        Arc::new(CastConnector {
            discovery_timeout: Duration::from_secs(config.discovery_timeout_secs),
        }),
        Arc::new(HttpFetcher::default()),
        Arc::new(Mp3Parsers),
        stream_base_url,
        Duration::from_millis(config.poll_interval_ms),
    );

    let router = session_router(context);

    // ========== PHASE 3 : Démarrage du serveur ==========

    let addr = format!("{}:{}", config.http.bind, config.http.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("🌐 Listening on http://{}", addr);
    info!("✅ CastFollow is ready! Press Ctrl+C to stop...");

    axum::serve(listener, router.into_make_service())
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Ctrl+C reçu, arrêt gracieux");
        })
        .await?;

    Ok(())
}
