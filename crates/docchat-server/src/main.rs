use anyhow::Result;
use std::net::SocketAddr;
use std::time::Duration;
use tracing::info;

use docchat_server::config::Settings;
use docchat_server::services::conversation::spawn_idle_sweeper;
use docchat_server::utils::logger::init_logger;
use docchat_server::{build_router, build_state, prepare_storage};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let settings = Settings::load()?;
    prepare_storage(&settings.storage)?;

    // Initialize logging (guard flushes the file writer on exit)
    let _log_guard = init_logger(&settings.storage.log_dir)?;
    info!("🚀 Starting docchat server...");
    info!("✅ Configuration loaded (model={}, major={})", settings.llm.model, settings.dialog.major);

    let addr = SocketAddr::from((
        settings.server.host.parse::<std::net::IpAddr>()?,
        settings.server.port,
    ));
    let sweep_interval = Duration::from_secs(settings.dialog.sweep_interval_seconds.max(1));
    let idle_ttl = Duration::from_secs(settings.dialog.idle_ttl_seconds);

    let state = build_state(settings)?;

    let sweeper = spawn_idle_sweeper(
        state.conversation_manager.registry().clone(),
        sweep_interval,
        idle_ttl,
    );
    info!("✅ Idle conversation sweeper started (ttl={:?})", idle_ttl);

    let app = build_router(state);

    info!("🎯 Server listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    sweeper.abort();
    info!("👋 Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
}
