use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::database::repository::Model;
use crate::types::Collection;

/// Any account holder: students and employees alike
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub school_id: Uuid,
    pub name: String,
    #[serde(default)]
    pub is_active: bool,
    #[serde(default)]
    pub push_tokens: Vec<String>,
}

impl Model for User {
    const COLLECTION: Collection = Collection::Users;
}
