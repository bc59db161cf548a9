pub mod jobs;
pub mod migrate;

use std::sync::Arc;

use anyhow::Context;

use crate::config::AppConfig;
use crate::database::{DatabaseManager, DocumentStore, PgStore};

/// Connect the PostgreSQL store named by the configuration
pub async fn connect_store(config: &AppConfig) -> anyhow::Result<(DatabaseManager, Arc<dyn DocumentStore>)> {
    let manager = DatabaseManager::new(config.database.clone());
    let pool = manager.main_pool().await.context("connecting to the database")?;
    let store: Arc<dyn DocumentStore> = Arc::new(PgStore::new(pool, config.database.enable_transactions));
    Ok((manager, store))
}
