/// Shared types used across the codebase

use serde::{Deserialize, Serialize};

/// Named document collections the scheduler reads from and writes to.
/// Storage names double as PostgreSQL table names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Collection {
    FeeStructures,
    Salaries,
    PaymentDues,
    Payrolls,
    Holidays,
    Schools,
    Users,
}

impl Collection {
    pub const ALL: [Collection; 7] = [
        Collection::FeeStructures,
        Collection::Salaries,
        Collection::PaymentDues,
        Collection::Payrolls,
        Collection::Holidays,
        Collection::Schools,
        Collection::Users,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Collection::FeeStructures => "fee_structures",
            Collection::Salaries => "salaries",
            Collection::PaymentDues => "payment_dues",
            Collection::Payrolls => "payrolls",
            Collection::Holidays => "holidays",
            Collection::Schools => "schools",
            Collection::Users => "users",
        }
    }

    /// Document fields that together must be unique within the collection.
    /// One obligation per (source, subject, period) is enforced here at the
    /// storage layer, independently of the guard queries the jobs run.
    pub fn unique_key(&self) -> Option<&'static [&'static str]> {
        match self {
            Collection::PaymentDues => Some(&["feeStructureId", "studentId", "dueDate"]),
            Collection::Payrolls => Some(&["employeeId", "period"]),
            Collection::Holidays => Some(&["schoolId", "name", "startDate"]),
            _ => None,
        }
    }
}

impl std::fmt::Display for Collection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_names_are_valid_identifiers() {
        for c in Collection::ALL {
            let name = c.as_str();
            assert!(name.chars().all(|ch| ch.is_ascii_lowercase() || ch == '_'), "{}", name);
        }
    }

    #[test]
    fn obligations_carry_unique_keys() {
        assert!(Collection::PaymentDues.unique_key().is_some());
        assert!(Collection::Payrolls.unique_key().is_some());
        assert!(Collection::Holidays.unique_key().is_some());
        assert!(Collection::FeeStructures.unique_key().is_none());
    }
}
