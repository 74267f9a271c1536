mod api;
mod config;
mod gateway;
mod review;
mod storage;

use crate::api::AppState;
use crate::config::AppConfig;
use crate::gateway::{GeminiGateway, ModelGateway};
use crate::storage::ReviewStore;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .with_thread_ids(false)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    info!("🚀 Starting Code Review Assistant API");

    // Load configuration
    let config = AppConfig::load()?;
    info!("📋 Configuration loaded");
    info!("   - Database: {:?}", config.storage.database_path);
    info!("   - Server: {}", config.bind_addr());
    info!("   - CORS origins: {:?}", config.server.allowed_origins);

    // Select model
    info!("🧠 Selecting model...");
    let gateway: Arc<dyn ModelGateway> = Arc::new(GeminiGateway::connect(&config.gemini).await?);
    info!("✅ Using model: {}", gateway.model_name());

    // Initialize review storage
    info!("💾 Initializing review storage...");
    let store = Arc::new(ReviewStore::open(&config.storage.database_path)?);
    info!("✅ Review storage ready ({} reviews)", store.count()?);

    let state = AppState::new(gateway, store);
    let app = api::router(state, &config.server)?;

    let addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    info!("🌐 Server listening on http://{}", addr);
    info!("");
    info!("📡 Available endpoints:");
    info!("   GET  /          - Service status");
    info!("   GET  /health    - Health check");
    info!("   GET  /test      - Model connectivity test");
    info!("   GET  /models    - List available models");
    info!("   POST /review    - Review uploaded files");
    info!("   GET  /reviews   - Recent reviews");
    info!("");
    info!("✨ Server is ready to accept requests!");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("👋 Server shutting down gracefully");

    Ok(())
}

/// Graceful shutdown handler
async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("🛑 Shutdown signal received");
}
