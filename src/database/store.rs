use async_trait::async_trait;
use futures::future::BoxFuture;
use serde_json::Value;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::database::manager::DatabaseError;
use crate::filter::FilterData;
use crate::types::Collection;

/// One unit of access to the store. Transactional sessions buffer their
/// writes until `commit`; direct sessions write through and treat
/// `commit`/`rollback` as no-ops.
#[async_trait]
pub trait Session: Send {
    fn is_transactional(&self) -> bool;

    async fn find(&mut self, collection: Collection, filter: FilterData) -> Result<Vec<Value>, DatabaseError>;

    async fn count(&mut self, collection: Collection, filter: FilterData) -> Result<i64, DatabaseError>;

    /// Insert one document; its `id` field must hold a UUID string
    async fn insert_one(&mut self, collection: Collection, doc: Value) -> Result<Value, DatabaseError>;

    /// Insert a batch as one statement: either every document lands or none
    async fn insert_many(&mut self, collection: Collection, docs: Vec<Value>) -> Result<Vec<Value>, DatabaseError>;

    /// Mark a document deleted without removing it; returns whether it existed
    async fn soft_delete(&mut self, collection: Collection, id: Uuid) -> Result<bool, DatabaseError>;

    async fn commit(self: Box<Self>) -> Result<(), DatabaseError>;

    async fn rollback(self: Box<Self>) -> Result<(), DatabaseError>;
}

/// Generic transactional document store over named collections
#[async_trait]
pub trait DocumentStore: Send + Sync {
    fn name(&self) -> &'static str;

    /// Runtime capability probe. Any failure means "unsupported", never an error.
    async fn supports_transactions(&self) -> bool;

    async fn session(&self, transactional: bool) -> Result<Box<dyn Session>, DatabaseError>;

    async fn health_check(&self) -> Result<(), DatabaseError>;

    /// Create collections and their unique indexes if missing
    async fn migrate(&self) -> Result<(), DatabaseError>;
}

/// Extract and parse the `id` field every stored document carries
pub fn document_id(doc: &Value) -> Result<Uuid, DatabaseError> {
    doc.get("id")
        .and_then(Value::as_str)
        .and_then(|s| Uuid::parse_str(s).ok())
        .ok_or_else(|| DatabaseError::QueryError("document is missing a UUID `id`".to_string()))
}

/// Values of the collection's unique key for `doc`, if the collection has one
pub fn unique_key_values(collection: Collection, doc: &Value) -> Option<Vec<Value>> {
    collection.unique_key().map(|fields| {
        fields
            .iter()
            .map(|f| doc.get(*f).cloned().unwrap_or(Value::Null))
            .collect()
    })
}

/// Run `work` inside a transaction when the store supports one, otherwise
/// against a direct session. Commits on success; rolls back on error and
/// returns the original error.
pub async fn with_optional_transaction<T, F>(store: &dyn DocumentStore, work: F) -> Result<T, DatabaseError>
where
    T: Send,
    F: for<'s> FnOnce(&'s mut dyn Session) -> BoxFuture<'s, Result<T, DatabaseError>> + Send,
{
    let transactional = store.supports_transactions().await;
    if !transactional {
        debug!("{} store without transaction support; writing directly", store.name());
    }

    let mut session = store.session(transactional).await?;
    let outcome = work(session.as_mut()).await;
    match outcome {
        Ok(value) => {
            session.commit().await?;
            Ok(value)
        }
        Err(err) => {
            if let Err(rollback_err) = session.rollback().await {
                warn!("rollback failed after '{}': {}", err, rollback_err);
            }
            Err(err)
        }
    }
}
