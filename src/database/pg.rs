use async_trait::async_trait;
use serde_json::Value;
use sqlx::{types::Json, PgPool, Postgres, Transaction};
use tracing::{info, warn};
use uuid::Uuid;

use crate::database::manager::DatabaseError;
use crate::database::store::{document_id, DocumentStore, Session};
use crate::filter::{Filter, FilterData, SqlQuery};
use crate::types::Collection;

/// PostgreSQL-backed document store: one table per collection holding the
/// document in a jsonb `data` column
pub struct PgStore {
    pool: PgPool,
    transactions_enabled: bool,
}

impl PgStore {
    pub fn new(pool: PgPool, transactions_enabled: bool) -> Self {
        Self { pool, transactions_enabled }
    }

    fn create_table_sql(collection: Collection) -> String {
        format!(
            "CREATE TABLE IF NOT EXISTS \"{}\" (
                id UUID PRIMARY KEY,
                data JSONB NOT NULL,
                created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
                updated_at TIMESTAMPTZ NOT NULL DEFAULT now(),
                deleted_at TIMESTAMPTZ
            )",
            collection.as_str()
        )
    }

    fn unique_index_sql(collection: Collection) -> Option<String> {
        collection.unique_key().map(|fields| {
            let columns = fields
                .iter()
                .map(|f| format!("(data ->> '{}')", f))
                .collect::<Vec<_>>()
                .join(", ");
            format!(
                "CREATE UNIQUE INDEX IF NOT EXISTS \"{0}_unique_key\" ON \"{0}\" ({1}) WHERE deleted_at IS NULL",
                collection.as_str(),
                columns
            )
        })
    }
}

#[async_trait]
impl DocumentStore for PgStore {
    fn name(&self) -> &'static str {
        "postgres"
    }

    async fn supports_transactions(&self) -> bool {
        if !self.transactions_enabled {
            return false;
        }
        match self.pool.begin().await {
            Ok(tx) => {
                if let Err(e) = tx.rollback().await {
                    warn!("transaction probe rollback failed: {}", e);
                }
                true
            }
            Err(e) => {
                warn!("transaction probe failed, continuing without transactions: {}", e);
                false
            }
        }
    }

    async fn session(&self, transactional: bool) -> Result<Box<dyn Session>, DatabaseError> {
        if transactional {
            let tx = self.pool.begin().await?;
            Ok(Box::new(PgSession::Transaction(tx)))
        } else {
            Ok(Box::new(PgSession::Direct(self.pool.clone())))
        }
    }

    async fn health_check(&self) -> Result<(), DatabaseError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn migrate(&self) -> Result<(), DatabaseError> {
        for collection in Collection::ALL {
            sqlx::query(&Self::create_table_sql(collection)).execute(&self.pool).await?;
            if let Some(index_sql) = Self::unique_index_sql(collection) {
                sqlx::query(&index_sql).execute(&self.pool).await?;
            }
            info!("Collection ready: {}", collection);
        }
        Ok(())
    }
}

enum PgSession {
    Transaction(Transaction<'static, Postgres>),
    Direct(PgPool),
}

impl PgSession {
    async fn fetch_data(&mut self, sql: SqlQuery, collection: Collection) -> Result<Vec<Value>, DatabaseError> {
        let mut q = sqlx::query_scalar::<_, Json<Value>>(&sql.query);
        for p in sql.params.iter() {
            q = q.bind(Json(p.clone()));
        }
        let rows = match self {
            PgSession::Transaction(tx) => q.fetch_all(&mut **tx).await,
            PgSession::Direct(pool) => q.fetch_all(&*pool).await,
        }
        .map_err(|e| DatabaseError::from_write(e, collection.as_str()))?;
        Ok(rows.into_iter().map(|Json(v)| v).collect())
    }
}

#[async_trait]
impl Session for PgSession {
    fn is_transactional(&self) -> bool {
        matches!(self, PgSession::Transaction(_))
    }

    async fn find(&mut self, collection: Collection, filter: FilterData) -> Result<Vec<Value>, DatabaseError> {
        let sql = Filter::build(collection.as_str(), filter)?.to_sql()?;
        self.fetch_data(sql, collection).await
    }

    async fn count(&mut self, collection: Collection, filter: FilterData) -> Result<i64, DatabaseError> {
        let sql = Filter::build(collection.as_str(), filter)?.to_count_sql()?;
        let mut q = sqlx::query_scalar::<_, i64>(&sql.query);
        for p in sql.params.iter() {
            q = q.bind(Json(p.clone()));
        }
        let count = match self {
            PgSession::Transaction(tx) => q.fetch_one(&mut **tx).await?,
            PgSession::Direct(pool) => q.fetch_one(&*pool).await?,
        };
        Ok(count)
    }

    async fn insert_one(&mut self, collection: Collection, doc: Value) -> Result<Value, DatabaseError> {
        let mut inserted = self.insert_many(collection, vec![doc]).await?;
        inserted
            .pop()
            .ok_or_else(|| DatabaseError::QueryError(format!("insert into {} returned no row", collection)))
    }

    async fn insert_many(&mut self, collection: Collection, docs: Vec<Value>) -> Result<Vec<Value>, DatabaseError> {
        if docs.is_empty() {
            return Ok(vec![]);
        }

        let mut placeholders = Vec::with_capacity(docs.len());
        let mut params = Vec::with_capacity(docs.len() * 2);
        for (i, doc) in docs.into_iter().enumerate() {
            let id = document_id(&doc)?;
            placeholders.push(format!("(${}::uuid, ${})", i * 2 + 1, i * 2 + 2));
            params.push((id, doc));
        }
        let query = format!(
            "INSERT INTO \"{}\" (id, data) VALUES {} RETURNING data",
            collection.as_str(),
            placeholders.join(", ")
        );

        let mut q = sqlx::query_scalar::<_, Json<Value>>(&query);
        for (id, doc) in params {
            q = q.bind(id).bind(Json(doc));
        }
        let rows = match self {
            PgSession::Transaction(tx) => q.fetch_all(&mut **tx).await,
            PgSession::Direct(pool) => q.fetch_all(&*pool).await,
        }
        .map_err(|e| DatabaseError::from_write(e, collection.as_str()))?;
        Ok(rows.into_iter().map(|Json(v)| v).collect())
    }

    async fn soft_delete(&mut self, collection: Collection, id: Uuid) -> Result<bool, DatabaseError> {
        let query = format!(
            "UPDATE \"{}\" SET deleted_at = now(), updated_at = now() WHERE id = $1 AND deleted_at IS NULL",
            collection.as_str()
        );
        let q = sqlx::query(&query).bind(id);
        let result = match self {
            PgSession::Transaction(tx) => q.execute(&mut **tx).await?,
            PgSession::Direct(pool) => q.execute(&*pool).await?,
        };
        Ok(result.rows_affected() > 0)
    }

    async fn commit(self: Box<Self>) -> Result<(), DatabaseError> {
        match *self {
            PgSession::Transaction(tx) => tx.commit().await?,
            PgSession::Direct(_) => {}
        }
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), DatabaseError> {
        match *self {
            PgSession::Transaction(tx) => tx.rollback().await?,
            PgSession::Direct(_) => {}
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unique_index_covers_cycle_key() {
        let sql = PgStore::unique_index_sql(Collection::PaymentDues).unwrap();
        assert_eq!(
            sql,
            "CREATE UNIQUE INDEX IF NOT EXISTS \"payment_dues_unique_key\" ON \"payment_dues\" \
             ((data ->> 'feeStructureId'), (data ->> 'studentId'), (data ->> 'dueDate')) WHERE deleted_at IS NULL"
        );
        assert!(PgStore::unique_index_sql(Collection::Schools).is_none());
    }

    #[test]
    fn creates_document_tables() {
        let sql = PgStore::create_table_sql(Collection::FeeStructures);
        assert!(sql.starts_with("CREATE TABLE IF NOT EXISTS \"fee_structures\""));
        assert!(sql.contains("data JSONB NOT NULL"));
        assert!(sql.contains("deleted_at TIMESTAMPTZ"));
    }
}
