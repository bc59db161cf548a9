use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::database::repository::Model;
use crate::types::Collection;

/// Standing base salary of one employee
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Salary {
    pub id: Uuid,
    pub employee_id: Uuid,
    pub school_id: Uuid,
    pub base_salary: Decimal,
}

impl Model for Salary {
    const COLLECTION: Collection = Collection::Salaries;
}
