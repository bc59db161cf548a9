pub mod fee_structure;
pub mod holiday;
pub mod payment_due;
pub mod payroll;
pub mod salary;
pub mod school;
pub mod user;

pub use fee_structure::{FeeStructure, FeeTypeLine, ValidationError};
pub use holiday::Holiday;
pub use payment_due::{FeeDetail, PaymentDue};
pub use payroll::Payroll;
pub use salary::Salary;
pub use school::School;
pub use user::User;
