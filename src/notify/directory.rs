use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use uuid::Uuid;

use super::NotifyError;
use crate::database::models::User;
use crate::database::{DocumentStore, Repository};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectContact {
    pub subject_id: Uuid,
    pub school_id: Uuid,
    pub tokens: Vec<String>,
}

/// Resolves a student or employee to the devices that should hear about it
#[async_trait]
pub trait SubjectDirectory: Send + Sync {
    async fn lookup(&self, subject_id: Uuid) -> Result<Option<SubjectContact>, NotifyError>;
}

/// Directory backed by the `users` collection
pub struct StoreDirectory {
    store: Arc<dyn DocumentStore>,
}

impl StoreDirectory {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl SubjectDirectory for StoreDirectory {
    async fn lookup(&self, subject_id: Uuid) -> Result<Option<SubjectContact>, NotifyError> {
        let mut session = self.store.session(false).await?;
        let users = Repository::<User>::new()
            .select_ids(session.as_mut(), vec![subject_id])
            .await?;

        Ok(users.into_iter().next().map(|user| SubjectContact {
            subject_id: user.id,
            school_id: user.school_id,
            tokens: user
                .push_tokens
                .into_iter()
                .filter(|t| !t.trim().is_empty())
                .collect(),
        }))
    }
}
