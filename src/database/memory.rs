use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::database::manager::DatabaseError;
use crate::database::store::{document_id, unique_key_values, DocumentStore, Session};
use crate::filter::{values_equal, Filter, FilterData};
use crate::types::Collection;

#[derive(Debug, Clone)]
struct StoredDocument {
    data: Value,
    deleted: bool,
}

#[derive(Debug, Default)]
struct MemoryState {
    collections: HashMap<Collection, Vec<StoredDocument>>,
    /// Remaining injected write failures per collection
    failures: HashMap<Collection, usize>,
}

impl MemoryState {
    fn docs(&self, collection: Collection) -> &[StoredDocument] {
        self.collections.get(&collection).map(Vec::as_slice).unwrap_or(&[])
    }

    fn take_failure(&mut self, collection: Collection) -> Result<(), DatabaseError> {
        match self.failures.get_mut(&collection) {
            Some(remaining) if *remaining > 0 => {
                *remaining -= 1;
                Err(DatabaseError::Unavailable(format!("injected write failure on {}", collection)))
            }
            _ => Ok(()),
        }
    }
}

/// In-process document store with the same observable semantics as the
/// PostgreSQL store: unique keys, soft delete, all-or-nothing transactions.
#[derive(Clone)]
pub struct MemoryStore {
    state: Arc<RwLock<MemoryState>>,
    transactions: bool,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            state: Arc::new(RwLock::new(MemoryState::default())),
            transactions: true,
        }
    }

    /// A store whose transaction probe reports "unsupported"
    pub fn without_transactions() -> Self {
        Self {
            transactions: false,
            ..Self::new()
        }
    }

    /// Insert typed documents directly, bypassing injected failures
    pub async fn seed<T: Serialize>(&self, collection: Collection, items: &[T]) -> Result<(), DatabaseError> {
        let docs = items
            .iter()
            .map(serde_json::to_value)
            .collect::<Result<Vec<_>, _>>()?;
        let mut state = self.state.write().await;
        let existing = visible(state.docs(collection), false);
        check_unique(collection, &existing, &docs)?;
        state
            .collections
            .entry(collection)
            .or_default()
            .extend(docs.into_iter().map(|data| StoredDocument { data, deleted: false }));
        Ok(())
    }

    /// Every live document in a collection, in insertion order
    pub async fn all(&self, collection: Collection) -> Vec<Value> {
        let state = self.state.read().await;
        visible(state.docs(collection), false)
    }

    /// Make the next `count` writes to `collection` fail with a transient error
    pub async fn fail_next_writes(&self, collection: Collection, count: usize) {
        let mut state = self.state.write().await;
        state.failures.insert(collection, count);
    }
}

fn visible(docs: &[StoredDocument], include_deleted: bool) -> Vec<Value> {
    docs.iter()
        .filter(|d| include_deleted || !d.deleted)
        .map(|d| d.data.clone())
        .collect()
}

fn check_unique(collection: Collection, existing: &[Value], new_docs: &[Value]) -> Result<(), DatabaseError> {
    let mut ids = Vec::with_capacity(existing.len() + new_docs.len());
    for doc in existing {
        ids.push(document_id(doc)?);
    }
    let mut keys: Vec<Vec<Value>> = existing
        .iter()
        .filter_map(|d| unique_key_values(collection, d))
        .collect();

    for doc in new_docs {
        let id = document_id(doc)?;
        if ids.contains(&id) {
            return Err(DatabaseError::Conflict(collection.to_string()));
        }
        ids.push(id);

        if let Some(key) = unique_key_values(collection, doc) {
            let duplicate = keys
                .iter()
                .any(|k| k.iter().zip(&key).all(|(a, b)| values_equal(a, b)));
            if duplicate {
                return Err(DatabaseError::Conflict(collection.to_string()));
            }
            keys.push(key);
        }
    }
    Ok(())
}

enum StagedWrite {
    Insert(Collection, Vec<Value>),
    SoftDelete(Collection, Uuid),
}

struct MemorySession {
    state: Arc<RwLock<MemoryState>>,
    /// `Some` for transactional sessions
    staged: Option<Vec<StagedWrite>>,
}

impl MemorySession {
    /// Committed documents overlaid with this session's staged writes
    async fn view(&self, collection: Collection, include_deleted: bool) -> Vec<Value> {
        let state = self.state.read().await;
        let mut docs: Vec<StoredDocument> = state.docs(collection).to_vec();
        for write in self.staged.iter().flatten() {
            match write {
                StagedWrite::Insert(c, inserted) if *c == collection => {
                    docs.extend(inserted.iter().cloned().map(|data| StoredDocument { data, deleted: false }));
                }
                StagedWrite::SoftDelete(c, id) if *c == collection => {
                    for doc in docs.iter_mut() {
                        if document_id(&doc.data).ok() == Some(*id) {
                            doc.deleted = true;
                        }
                    }
                }
                _ => {}
            }
        }
        visible(&docs, include_deleted)
    }
}

#[async_trait]
impl Session for MemorySession {
    fn is_transactional(&self) -> bool {
        self.staged.is_some()
    }

    async fn find(&mut self, collection: Collection, filter: FilterData) -> Result<Vec<Value>, DatabaseError> {
        let filter = Filter::build(collection.as_str(), filter)?;
        let docs = self.view(collection, filter.include_deleted()).await;
        Ok(filter.apply(docs))
    }

    async fn count(&mut self, collection: Collection, filter: FilterData) -> Result<i64, DatabaseError> {
        let filter = Filter::build(collection.as_str(), filter)?;
        let docs = self.view(collection, filter.include_deleted()).await;
        Ok(docs.iter().filter(|d| filter.matches(d)).count() as i64)
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
        self.state.write().await.take_failure(collection)?;

        let existing = self.view(collection, false).await;
        check_unique(collection, &existing, &docs)?;

        match self.staged.as_mut() {
            Some(staged) => staged.push(StagedWrite::Insert(collection, docs.clone())),
            None => {
                let mut state = self.state.write().await;
                // Re-check under the write lock; another session may have landed first
                let committed = visible(state.docs(collection), false);
                check_unique(collection, &committed, &docs)?;
                state
                    .collections
                    .entry(collection)
                    .or_default()
                    .extend(docs.iter().cloned().map(|data| StoredDocument { data, deleted: false }));
            }
        }
        Ok(docs)
    }

    async fn soft_delete(&mut self, collection: Collection, id: Uuid) -> Result<bool, DatabaseError> {
        let exists = self
            .view(collection, false)
            .await
            .iter()
            .any(|d| document_id(d).ok() == Some(id));
        if !exists {
            return Ok(false);
        }
        match self.staged.as_mut() {
            Some(staged) => staged.push(StagedWrite::SoftDelete(collection, id)),
            None => {
                let mut state = self.state.write().await;
                if let Some(docs) = state.collections.get_mut(&collection) {
                    for doc in docs.iter_mut().filter(|d| document_id(&d.data).ok() == Some(id)) {
                        doc.deleted = true;
                    }
                }
            }
        }
        Ok(true)
    }

    async fn commit(self: Box<Self>) -> Result<(), DatabaseError> {
        let Some(staged) = self.staged else {
            return Ok(());
        };
        let mut state = self.state.write().await;

        // Validate everything before applying anything
        let mut pending: HashMap<Collection, Vec<Value>> = HashMap::new();
        for write in &staged {
            if let StagedWrite::Insert(collection, docs) = write {
                let committed = visible(state.docs(*collection), false);
                let batch = pending.entry(*collection).or_default();
                let mut combined = committed;
                combined.extend(batch.iter().cloned());
                check_unique(*collection, &combined, docs)?;
                batch.extend(docs.iter().cloned());
            }
        }

        for write in staged {
            match write {
                StagedWrite::Insert(collection, docs) => {
                    state
                        .collections
                        .entry(collection)
                        .or_default()
                        .extend(docs.into_iter().map(|data| StoredDocument { data, deleted: false }));
                }
                StagedWrite::SoftDelete(collection, id) => {
                    if let Some(docs) = state.collections.get_mut(&collection) {
                        for doc in docs.iter_mut().filter(|d| document_id(&d.data).ok() == Some(id)) {
                            doc.deleted = true;
                        }
                    }
                }
            }
        }
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), DatabaseError> {
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn supports_transactions(&self) -> bool {
        self.transactions
    }

    async fn session(&self, transactional: bool) -> Result<Box<dyn Session>, DatabaseError> {
        Ok(Box::new(MemorySession {
            state: Arc::clone(&self.state),
            staged: if transactional && self.transactions { Some(Vec::new()) } else { None },
        }))
    }

    async fn health_check(&self) -> Result<(), DatabaseError> {
        Ok(())
    }

    async fn migrate(&self) -> Result<(), DatabaseError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn due(structure: &str, student: &str, date: &str) -> Value {
        json!({
            "id": Uuid::new_v4().to_string(),
            "feeStructureId": structure,
            "studentId": student,
            "dueDate": date,
        })
    }

    #[tokio::test]
    async fn enforces_unique_keys() {
        let store = MemoryStore::new();
        let mut session = store.session(false).await.unwrap();
        session.insert_one(Collection::PaymentDues, due("f", "s", "2026-10-05")).await.unwrap();
        let err = session
            .insert_one(Collection::PaymentDues, due("f", "s", "2026-10-05"))
            .await
            .unwrap_err();
        assert!(err.is_conflict());
        session.insert_one(Collection::PaymentDues, due("f", "s", "2026-11-05")).await.unwrap();
        assert_eq!(store.all(Collection::PaymentDues).await.len(), 2);
    }

    #[tokio::test]
    async fn rollback_discards_staged_writes() {
        let store = MemoryStore::new();
        let mut session = store.session(true).await.unwrap();
        session.insert_one(Collection::PaymentDues, due("f", "s", "2026-10-05")).await.unwrap();
        let seen = session.count(Collection::PaymentDues, FilterData::default()).await.unwrap();
        assert_eq!(seen, 1, "session sees its own staged write");
        assert!(store.all(Collection::PaymentDues).await.is_empty());
        session.rollback().await.unwrap();
        assert!(store.all(Collection::PaymentDues).await.is_empty());
    }

    #[tokio::test]
    async fn commit_rejects_late_conflicts() {
        let store = MemoryStore::new();
        let mut first = store.session(true).await.unwrap();
        let mut second = store.session(true).await.unwrap();
        first.insert_one(Collection::PaymentDues, due("f", "s", "2026-10-05")).await.unwrap();
        second.insert_one(Collection::PaymentDues, due("f", "s", "2026-10-05")).await.unwrap();
        first.commit().await.unwrap();
        assert!(second.commit().await.unwrap_err().is_conflict());
        assert_eq!(store.all(Collection::PaymentDues).await.len(), 1);
    }

    #[tokio::test]
    async fn soft_deleted_documents_are_hidden() {
        let store = MemoryStore::new();
        let id = Uuid::new_v4();
        store
            .seed(Collection::Schools, &[json!({ "id": id.to_string(), "name": "North" })])
            .await
            .unwrap();
        let mut session = store.session(false).await.unwrap();
        assert!(session.soft_delete(Collection::Schools, id).await.unwrap());
        assert!(!session.soft_delete(Collection::Schools, id).await.unwrap());
        assert!(session.find(Collection::Schools, FilterData::default()).await.unwrap().is_empty());
        let with_deleted = FilterData { include_deleted: true, ..Default::default() };
        assert_eq!(session.find(Collection::Schools, with_deleted).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn injected_failures_are_transient_and_consumed() {
        let store = MemoryStore::without_transactions();
        assert!(!store.supports_transactions().await);
        store.fail_next_writes(Collection::Holidays, 1).await;
        let mut session = store.session(true).await.unwrap();
        assert!(!session.is_transactional());
        let doc = json!({ "id": Uuid::new_v4().to_string(), "schoolId": "a", "name": "x", "startDate": "d" });
        let err = session.insert_one(Collection::Holidays, doc.clone()).await.unwrap_err();
        assert!(err.is_transient());
        session.insert_one(Collection::Holidays, doc).await.unwrap();
    }
}
