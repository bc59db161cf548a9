use chrono::{DateTime, FixedOffset, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{Salary, User};
use crate::database::repository::Model;
use crate::types::Collection;

/// One employee's pay record for one monthly period
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Payroll {
    pub id: Uuid,
    pub employee_id: Uuid,
    pub school_id: Uuid,
    pub date: DateTime<Utc>,
    /// `YYYY-MM` in the scheduler's local offset
    pub period: String,
    pub paid: Decimal,
    pub base_salary: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remarks: Option<String>,
}

impl Payroll {
    pub fn period_of(now: DateTime<FixedOffset>) -> String {
        now.format("%Y-%m").to_string()
    }

    pub fn for_employee(user: &User, salary: &Salary, now: DateTime<FixedOffset>) -> Self {
        Self {
            id: Uuid::new_v4(),
            employee_id: user.id,
            school_id: user.school_id,
            date: now.with_timezone(&Utc),
            period: Self::period_of(now),
            paid: Decimal::ZERO,
            base_salary: salary.base_salary,
            remarks: None,
        }
    }
}

impl Model for Payroll {
    const COLLECTION: Collection = Collection::Payrolls;
}
