use sqlx::{postgres::PgPoolOptions, PgPool};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::OnceCell;
use tracing::info;

use crate::config::DatabaseConfig;
use crate::filter::FilterError;

/// Errors from the document store and DatabaseManager
#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("Missing configuration: {0}")]
    ConfigMissing(&'static str),

    #[error("Invalid database URL")]
    InvalidDatabaseUrl,

    #[error("Invalid database name: {0}")]
    InvalidDatabaseName(String),

    #[error("Unique key conflict in {0}")]
    Conflict(String),

    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Query error: {0}")]
    QueryError(String),

    #[error("Document serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

impl DatabaseError {
    /// Failures worth retrying: connectivity, pool exhaustion, injected outages
    pub fn is_transient(&self) -> bool {
        match self {
            DatabaseError::Unavailable(_) => true,
            DatabaseError::Sqlx(e) => matches!(
                e,
                sqlx::Error::Io(_) | sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::WorkerCrashed
            ),
            _ => false,
        }
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, DatabaseError::Conflict(_))
    }

    /// Map a sqlx error raised while writing to `collection`, surfacing
    /// unique-index violations as `Conflict`
    pub fn from_write(err: sqlx::Error, collection: &str) -> Self {
        match &err {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                DatabaseError::Conflict(collection.to_string())
            }
            _ => DatabaseError::Sqlx(err),
        }
    }
}

impl From<FilterError> for DatabaseError {
    fn from(err: FilterError) -> Self {
        DatabaseError::QueryError(err.to_string())
    }
}

/// Owns the connection pool for the configured database, created on first use
pub struct DatabaseManager {
    pool: OnceCell<PgPool>,
    config: DatabaseConfig,
}

impl DatabaseManager {
    pub fn new(config: DatabaseConfig) -> Self {
        Self { pool: OnceCell::new(), config }
    }

    /// Pool for the configured application database
    pub async fn main_pool(&self) -> Result<PgPool, DatabaseError> {
        let pool = self.pool.get_or_try_init(|| self.connect()).await?;
        Ok(pool.clone())
    }

    async fn connect(&self) -> Result<PgPool, DatabaseError> {
        let name = &self.config.name;
        if !Self::is_valid_db_name(name) {
            return Err(DatabaseError::InvalidDatabaseName(name.clone()));
        }
        let connection_string = Self::build_connection_string(name)?;

        let pool = PgPoolOptions::new()
            .max_connections(self.config.max_connections)
            .acquire_timeout(Duration::from_secs(self.config.connection_timeout))
            .connect(&connection_string)
            .await?;
        info!("Created database pool for: {}", name);
        Ok(pool)
    }

    fn build_connection_string(database_name: &str) -> Result<String, DatabaseError> {
        let base = std::env::var("DATABASE_URL")
            .map_err(|_| DatabaseError::ConfigMissing("DATABASE_URL"))?;

        let mut url = url::Url::parse(&base).map_err(|_| DatabaseError::InvalidDatabaseUrl)?;
        // DATABASE_URL names the server; the database comes from config
        url.set_path(&format!("/{}", database_name));
        Ok(url.into())
    }

    /// Close the pool if one was opened
    pub async fn close(&self) {
        if let Some(pool) = self.pool.get() {
            pool.close().await;
            info!("Closed database pool: {}", self.config.name);
        }
    }

    /// Database names are interpolated into connection strings only, but
    /// keep them to PostgreSQL's unquoted identifier shape anyway
    fn is_valid_db_name(name: &str) -> bool {
        !name.is_empty()
            && name.len() <= 63
            && name.starts_with(|c: char| c.is_ascii_lowercase() || c == '_')
            && name.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
    }
}
