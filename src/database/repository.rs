use std::marker::PhantomData;

use serde::{de::DeserializeOwned, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::database::manager::DatabaseError;
use crate::database::store::{document_id, Session};
use crate::filter::FilterData;
use crate::types::Collection;

/// A typed document living in one collection
pub trait Model: Serialize + DeserializeOwned + Send + Sync {
    const COLLECTION: Collection;
}

/// A matched document that does not decode as the repository's type
#[derive(Debug)]
pub struct Undecodable {
    pub id: Option<Uuid>,
    pub error: serde_json::Error,
}

/// Typed access to one collection through a session
pub struct Repository<T> {
    collection: Collection,
    _phantom: PhantomData<fn() -> T>,
}

impl<T: Model> Default for Repository<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Model> Repository<T> {
    pub fn new() -> Self {
        Self {
            collection: T::COLLECTION,
            _phantom: PhantomData,
        }
    }

    pub fn collection(&self) -> Collection {
        self.collection
    }

    pub async fn select_any(&self, session: &mut dyn Session, filter_data: FilterData) -> Result<Vec<T>, DatabaseError> {
        session
            .find(self.collection, filter_data)
            .await?
            .into_iter()
            .map(|doc| serde_json::from_value(doc).map_err(DatabaseError::from))
            .collect()
    }

    /// Like `select_any`, but decodes each document on its own so one bad
    /// document does not hide the rest of the result
    pub async fn select_partitioned(
        &self,
        session: &mut dyn Session,
        filter_data: FilterData,
    ) -> Result<(Vec<T>, Vec<Undecodable>), DatabaseError> {
        let mut records = Vec::new();
        let mut undecodable = Vec::new();
        for doc in session.find(self.collection, filter_data).await? {
            let id = document_id(&doc).ok();
            match serde_json::from_value(doc) {
                Ok(record) => records.push(record),
                Err(error) => undecodable.push(Undecodable { id, error }),
            }
        }
        Ok((records, undecodable))
    }

    pub async fn count(&self, session: &mut dyn Session, filter_data: FilterData) -> Result<i64, DatabaseError> {
        session.count(self.collection, filter_data).await
    }

    pub async fn select_ids(&self, session: &mut dyn Session, ids: Vec<Uuid>) -> Result<Vec<T>, DatabaseError> {
        if ids.is_empty() {
            return Ok(vec![]);
        }
        let filter = FilterData::where_(json!({ "id": { "$in": ids } }));
        self.select_any(session, filter).await
    }

    pub async fn insert_one(&self, session: &mut dyn Session, record: &T) -> Result<T, DatabaseError> {
        let doc = session.insert_one(self.collection, serde_json::to_value(record)?).await?;
        Ok(serde_json::from_value(doc)?)
    }

    pub async fn insert_many(&self, session: &mut dyn Session, records: &[T]) -> Result<Vec<T>, DatabaseError> {
        let docs = records
            .iter()
            .map(serde_json::to_value)
            .collect::<Result<Vec<Value>, _>>()?;
        session
            .insert_many(self.collection, docs)
            .await?
            .into_iter()
            .map(|doc| serde_json::from_value(doc).map_err(DatabaseError::from))
            .collect()
    }
}
