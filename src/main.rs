use anyhow::Result;
use axum::Router;
use reqwest::Client;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod anime;
mod api;
mod cache;
mod config;
mod error;
mod models;
mod pool;
mod services;

use config::AppConfig;
use pool::AddonPool;
use services::metadata::{MetadataService, MetadataServiceConfig};

pub struct AppState {
    pub config: AppConfig,
    pub client: Client,
    pub metadata: MetadataService,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "meta_translator=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load .env file if present
    dotenvy::dotenv().ok();

    let config = AppConfig::load();
    config.log_config();

    let client = Client::builder()
        .timeout(config.request_timeout)
        .build()?;

    let addon_pool = if config.use_addon {
        AddonPool::new(config.addon_mirrors.clone()).map(Arc::new)
    } else {
        None
    };

    let metadata = MetadataService::new(
        client.clone(),
        MetadataServiceConfig {
            tmdb_api_key: config.tmdb_api_key.clone().unwrap_or_default(),
            tvdb_api_key: config.tvdb_api_key.clone().unwrap_or_default(),
            tvdb_user: config.tvdb_user.clone(),
            fanart_api_key: config.fanart_api_key.clone().unwrap_or_default(),
            languages: config.languages.clone(),
            meta_ttl: config.meta_ttl,
            translation_ttl: config.translation_ttl,
            addon_pool,
        },
    );

    // Alias resolution degrades to pass-through until the maps load, so a
    // failed download is not fatal.
    match metadata.reload_anime_maps().await {
        Ok(aliases) => tracing::info!(aliases, "anime mapping tables ready"),
        Err(e) => tracing::warn!(error = %e, "failed to load anime mapping tables"),
    }

    let state = Arc::new(AppState {
        config: config.clone(),
        client,
        metadata,
    });

    let app = Router::new()
        .merge(api::routes())
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr: SocketAddr = format!("{}:{}", config.bind_address, config.port).parse()?;
    tracing::info!("Starting server on {}", addr);

    // Create shutdown signal listener
    let shutdown_signal = async {
        let ctrl_c = async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("Failed to install Ctrl+C handler: {}", e);
            }
        };

        #[cfg(unix)]
        let terminate = async {
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(mut signal) => {
                    signal.recv().await;
                }
                Err(e) => tracing::error!("Failed to install SIGTERM handler: {}", e),
            }
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => tracing::info!("Received Ctrl+C, shutting down..."),
            _ = terminate => tracing::info!("Received SIGTERM, shutting down..."),
        }
    };

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal)
        .await?;

    tracing::info!("Server shutdown complete");
    Ok(())
}
