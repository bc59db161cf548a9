use std::sync::Arc;

use anyhow::Context;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use campus_dues::config;
use campus_dues::database::{DatabaseManager, DocumentStore, PgStore};
use campus_dues::handlers::{self, AppState};
use campus_dues::jobs::build_scheduler;
use campus_dues::notify::Notifier;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present so DATABASE_URL and friends are picked up
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = config::config();
    info!("Starting campus-dues in {:?} mode", config.environment);

    let manager = DatabaseManager::new(config.database.clone());
    let pool = manager.main_pool().await.context("connecting to the database")?;
    let store: Arc<dyn DocumentStore> = Arc::new(PgStore::new(pool, config.database.enable_transactions));
    store.migrate().await.context("preparing collections")?;

    let notifier = Arc::new(Notifier::from_config(&config.notify, Arc::clone(&store)));
    let scheduler = Arc::new(build_scheduler(Arc::clone(&store), notifier, config));

    let loops = if config.scheduler.enabled {
        scheduler.spawn()
    } else {
        info!("Scheduler disabled; jobs run only when triggered manually");
        Vec::new()
    };

    let app = handlers::app(AppState {
        store,
        scheduler: Arc::clone(&scheduler),
        manual_triggers: config.api.enable_manual_triggers,
    });

    let bind_addr = format!("0.0.0.0:{}", config.api.port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", bind_addr))?;
    info!("campus-dues listening on http://{}", bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server")?;

    scheduler.shutdown();
    for handle in loops {
        if let Err(e) = handle.await {
            error!("Job loop ended abnormally: {}", e);
        }
    }
    manager.close().await;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for Ctrl-C: {}", e);
        return;
    }
    info!("Shutdown requested");
}
