use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

use tinylink::app::create_app;
use tinylink::config::Config;
use tinylink::storage;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("tinylink=info,tower_http=info")),
        )
        .init();

    let config = Arc::new(Config::from_env()?);
    info!("Loaded configuration");

    info!(
        "Using {:?} storage: {}",
        config.database.backend, config.database.url
    );
    let storage = storage::connect(&config.database).await?;
    info!("Database initialized successfully");

    if let Some(base_url) = &config.base_url {
        info!("Short links will use base URL {}", base_url);
    }
    if !config.clicks.enabled {
        info!("Click event logging is disabled; only counters are kept");
    }

    let app = create_app(storage, Arc::clone(&config));

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("🚀 Listening on http://{}", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::warn!("failed to listen for shutdown signal: {}", err);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
