mod app;
mod config;
mod domain;
mod errors;
mod external;
mod jobs;
mod logging;
mod models;
mod routes;
mod services;
mod state;
mod store;

use std::sync::Arc;

use axum::http::HeaderValue;
use tokio::net::TcpListener;

use crate::config::AppConfig;
use crate::external::youtube::YouTubeProvider;
use crate::logging::{init_logging, LoggingConfig};
use crate::services::auth_service::TokenService;
use crate::services::job_registry::JobRegistry;
use crate::services::result_cache::ResultCache;
use crate::services::user_service::UserService;
use crate::services::worker_pool::WorkerPool;
use crate::state::AppState;
use crate::store::UserStore;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    // Initialize logging FIRST
    init_logging(LoggingConfig::from_env())?;

    let config = AppConfig::from_env()?;

    let provider = Arc::new(YouTubeProvider::new(
        &config.youtube_api_url,
        &config.youtube_api_key,
        config.fetch_timeout,
    )?);
    let cache = ResultCache::new();
    let pool = WorkerPool::new(config.worker_pool_size);
    let registry = Arc::new(JobRegistry::new(provider, cache.clone(), pool));

    let store = Arc::new(UserStore::open(&config.db_dir).await?);
    let tokens = match &config.jwt_secret {
        Some(secret) => TokenService::new(secret.as_bytes(), config.token_ttl),
        None => {
            tracing::warn!("JWT_SECRET not set; tokens will not survive a restart");
            TokenService::with_random_secret(config.token_ttl)
        }
    };

    let users = UserService::new(store, registry.clone(), cache, tokens);
    let app = app::create_app(
        AppState::new(users, registry.clone()),
        config.cors_origin.parse::<HeaderValue>()?,
    );

    let listener = TcpListener::bind(config.bind_addr).await?;
    tracing::info!(
        pool_size = config.worker_pool_size,
        "🚀 popvid backend running at http://{}/",
        config.bind_addr
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    registry.shutdown(config.shutdown_grace).await;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
