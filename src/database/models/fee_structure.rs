use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::database::repository::Model;
use crate::types::Collection;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("dueDateOfMonth must be between 1 and 30, got {0}")]
    DueDayOutOfRange(u32),

    #[error("fee structure has no fee types")]
    NoFeeTypes,

    #[error("fee structure applies to no students")]
    NoStudents,

    #[error("fee type '{0}' has a negative amount")]
    NegativeAmount(String),

    #[error("amount due for '{0}' exceeds the representable range")]
    AmountOverflow(String),
}

/// One fee line of a structure: unit amount times count
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeeTypeLine {
    pub fee_type_id: Uuid,
    pub name: String,
    pub amount: Decimal,
    pub count: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl FeeTypeLine {
    pub fn amount_due(&self) -> Result<Decimal, ValidationError> {
        self.amount
            .checked_mul(Decimal::from(self.count))
            .ok_or_else(|| ValidationError::AmountOverflow(self.name.clone()))
    }
}

/// Standing definition of a recurring charge applied to a set of students
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeeStructure {
    pub id: Uuid,
    pub school_id: Uuid,
    pub name: String,
    /// monthly, bimonthly, quarterly or semiannually; anything else never fires
    pub frequency: String,
    pub due_date_of_month: u32,
    pub fee_types: Vec<FeeTypeLine>,
    pub student_ids: Vec<Uuid>,
    #[serde(default)]
    pub created_by: Option<Uuid>,
    #[serde(default)]
    pub updated_by: Option<Uuid>,
}

impl FeeStructure {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if !(1..=30).contains(&self.due_date_of_month) {
            return Err(ValidationError::DueDayOutOfRange(self.due_date_of_month));
        }
        if self.fee_types.is_empty() {
            return Err(ValidationError::NoFeeTypes);
        }
        if self.student_ids.is_empty() {
            return Err(ValidationError::NoStudents);
        }
        if let Some(line) = self.fee_types.iter().find(|l| l.amount.is_sign_negative()) {
            return Err(ValidationError::NegativeAmount(line.name.clone()));
        }
        self.total_due().map(|_| ())
    }

    /// Sum of every line's amount due
    pub fn total_due(&self) -> Result<Decimal, ValidationError> {
        self.fee_types.iter().try_fold(Decimal::ZERO, |total, line| {
            total
                .checked_add(line.amount_due()?)
                .ok_or_else(|| ValidationError::AmountOverflow(self.name.clone()))
        })
    }
}

impl Model for FeeStructure {
    const COLLECTION: Collection = Collection::FeeStructures;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn structure() -> FeeStructure {
        FeeStructure {
            id: Uuid::new_v4(),
            school_id: Uuid::new_v4(),
            name: "Term fees".into(),
            frequency: "monthly".into(),
            due_date_of_month: 5,
            fee_types: vec![FeeTypeLine {
                fee_type_id: Uuid::new_v4(),
                name: "Tuition".into(),
                amount: Decimal::new(100, 0),
                count: 1,
                description: None,
            }],
            student_ids: vec![Uuid::new_v4()],
            created_by: None,
            updated_by: None,
        }
    }

    #[test]
    fn validates_invariants() {
        assert!(structure().validate().is_ok());

        let mut s = structure();
        s.due_date_of_month = 31;
        assert_eq!(s.validate(), Err(ValidationError::DueDayOutOfRange(31)));
        s.due_date_of_month = 0;
        assert_eq!(s.validate(), Err(ValidationError::DueDayOutOfRange(0)));

        let mut s = structure();
        s.fee_types.clear();
        assert_eq!(s.validate(), Err(ValidationError::NoFeeTypes));

        let mut s = structure();
        s.student_ids.clear();
        assert_eq!(s.validate(), Err(ValidationError::NoStudents));

        let mut s = structure();
        s.fee_types[0].amount = Decimal::new(-1, 0);
        assert_eq!(s.validate(), Err(ValidationError::NegativeAmount("Tuition".into())));
    }

    #[test]
    fn rejects_amounts_that_overflow() {
        let mut s = structure();
        s.fee_types[0].amount = Decimal::MAX;
        s.fee_types[0].count = 2;
        assert_eq!(s.validate(), Err(ValidationError::AmountOverflow("Tuition".into())));

        let mut s = structure();
        s.fee_types[0].amount = Decimal::MAX;
        let mut second = s.fee_types[0].clone();
        second.name = "Transport".into();
        s.fee_types.push(second);
        assert_eq!(s.validate(), Err(ValidationError::AmountOverflow("Term fees".into())));
    }

    #[test]
    fn serializes_camel_case() {
        let value = serde_json::to_value(structure()).unwrap();
        assert_eq!(value["dueDateOfMonth"], json!(5));
        assert!(value["feeTypes"][0].get("feeTypeId").is_some());
        assert!(value["feeTypes"][0].get("description").is_none());
    }
}
