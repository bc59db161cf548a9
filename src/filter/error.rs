use thiserror::Error;

/// Rejected query input; surfaces as a database query error
#[derive(Error, Debug)]
pub enum FilterError {
    #[error("Unknown collection: {0}")]
    UnknownCollection(String),

    #[error("Invalid field path: {0}")]
    InvalidPath(String),

    #[error("Invalid where clause: {0}")]
    InvalidWhere(String),

    #[error("Unsupported operator: {0}")]
    UnsupportedOperator(String),

    #[error("Invalid operand: {0}")]
    InvalidOperand(String),
}
