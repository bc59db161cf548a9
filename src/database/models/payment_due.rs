use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use super::fee_structure::{FeeStructure, FeeTypeLine, ValidationError};
use crate::database::repository::Model;
use crate::filter::FilterData;
use crate::types::Collection;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeeDetail {
    pub fee_type_id: Uuid,
    pub name: String,
    pub amount: Decimal,
    pub count: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub amount_due: Decimal,
}

impl TryFrom<&FeeTypeLine> for FeeDetail {
    type Error = ValidationError;

    fn try_from(line: &FeeTypeLine) -> Result<Self, Self::Error> {
        Ok(Self {
            fee_type_id: line.fee_type_id,
            name: line.name.clone(),
            amount: line.amount,
            count: line.count,
            description: line.description.clone(),
            amount_due: line.amount_due()?,
        })
    }
}

/// One student's bill for one cycle of a fee structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentDue {
    pub id: Uuid,
    pub fee_structure_id: Uuid,
    pub student_id: Uuid,
    pub school_id: Uuid,
    pub name: String,
    pub fee_details: Vec<FeeDetail>,
    pub total_amount_due: Decimal,
    pub due_date: NaiveDate,
    #[serde(default)]
    pub is_paid: bool,
    #[serde(default)]
    pub created_by: Option<Uuid>,
    #[serde(default)]
    pub updated_by: Option<Uuid>,
}

impl PaymentDue {
    pub fn materialize(structure: &FeeStructure, student_id: Uuid, due_date: NaiveDate) -> Result<Self, ValidationError> {
        let fee_details = structure
            .fee_types
            .iter()
            .map(FeeDetail::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        let total_amount_due = structure.total_due()?;
        Ok(Self {
            id: Uuid::new_v4(),
            fee_structure_id: structure.id,
            student_id,
            school_id: structure.school_id,
            name: structure.name.clone(),
            fee_details,
            total_amount_due,
            due_date,
            is_paid: false,
            created_by: structure.created_by,
            updated_by: structure.updated_by,
        })
    }

    /// Matches any live due for the same structure, student and cycle
    pub fn cycle_filter(&self) -> FilterData {
        FilterData::where_(json!({
            "feeStructureId": self.fee_structure_id,
            "studentId": self.student_id,
            "dueDate": self.due_date,
        }))
    }
}

impl Model for PaymentDue {
    const COLLECTION: Collection = Collection::PaymentDues;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(amount: i64, count: u32) -> FeeTypeLine {
        FeeTypeLine {
            fee_type_id: Uuid::new_v4(),
            name: format!("fee-{}", amount),
            amount: Decimal::new(amount, 0),
            count,
            description: None,
        }
    }

    #[test]
    fn computes_line_and_total_amounts() {
        let structure = FeeStructure {
            id: Uuid::new_v4(),
            school_id: Uuid::new_v4(),
            name: "Monthly".into(),
            frequency: "monthly".into(),
            due_date_of_month: 10,
            fee_types: vec![line(100, 2), line(50, 1)],
            student_ids: vec![],
            created_by: Some(Uuid::new_v4()),
            updated_by: None,
        };
        let student = Uuid::new_v4();
        let date = NaiveDate::from_ymd_opt(2026, 3, 10).unwrap();
        let due = PaymentDue::materialize(&structure, student, date).unwrap();

        assert_eq!(due.fee_details[0].amount_due, Decimal::new(200, 0));
        assert_eq!(due.fee_details[1].amount_due, Decimal::new(50, 0));
        assert_eq!(due.total_amount_due, Decimal::new(250, 0));
        assert!(!due.is_paid);
        assert_eq!(due.created_by, structure.created_by);
        assert_eq!(due.school_id, structure.school_id);
    }

    #[test]
    fn overflowing_lines_are_rejected() {
        let structure = FeeStructure {
            id: Uuid::new_v4(),
            school_id: Uuid::new_v4(),
            name: "Overflow".into(),
            frequency: "monthly".into(),
            due_date_of_month: 10,
            fee_types: vec![FeeTypeLine { amount: Decimal::MAX, ..line(1, 2) }],
            student_ids: vec![],
            created_by: None,
            updated_by: None,
        };
        let date = NaiveDate::from_ymd_opt(2026, 3, 10).unwrap();
        assert!(matches!(
            PaymentDue::materialize(&structure, Uuid::new_v4(), date),
            Err(ValidationError::AmountOverflow(_))
        ));
    }

    #[test]
    fn cycle_filter_targets_the_unique_key() {
        let structure_id = Uuid::new_v4();
        let due = PaymentDue {
            id: Uuid::new_v4(),
            fee_structure_id: structure_id,
            student_id: Uuid::nil(),
            school_id: Uuid::nil(),
            name: "x".into(),
            fee_details: vec![],
            total_amount_due: Decimal::ZERO,
            due_date: NaiveDate::from_ymd_opt(2026, 1, 5).unwrap(),
            is_paid: false,
            created_by: None,
            updated_by: None,
        };
        let filter = due.cycle_filter();
        assert_eq!(
            filter.where_clause,
            Some(json!({
                "feeStructureId": structure_id.to_string(),
                "studentId": Uuid::nil().to_string(),
                "dueDate": "2026-01-05",
            }))
        );
    }
}
