use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::error::FilterError;

/// Field operators understood in a where clause
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOp {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
    In,
    NIn,
    /// Array field shares at least one element with the operand
    Any,
    /// Array field contains every element of the operand
    All,
    Size,
    Between,
    Exists,
}

impl FilterOp {
    pub fn parse(key: &str) -> Result<Self, FilterError> {
        Ok(match key {
            "$eq" => FilterOp::Eq,
            "$ne" | "$neq" => FilterOp::Ne,
            "$gt" => FilterOp::Gt,
            "$gte" => FilterOp::Gte,
            "$lt" => FilterOp::Lt,
            "$lte" => FilterOp::Lte,
            "$in" => FilterOp::In,
            "$nin" => FilterOp::NIn,
            "$any" => FilterOp::Any,
            "$all" => FilterOp::All,
            "$size" => FilterOp::Size,
            "$between" => FilterOp::Between,
            "$exists" => FilterOp::Exists,
            other => return Err(FilterError::UnsupportedOperator(other.to_string())),
        })
    }

    pub fn key(self) -> &'static str {
        match self {
            FilterOp::Eq => "$eq",
            FilterOp::Ne => "$ne",
            FilterOp::Gt => "$gt",
            FilterOp::Gte => "$gte",
            FilterOp::Lt => "$lt",
            FilterOp::Lte => "$lte",
            FilterOp::In => "$in",
            FilterOp::NIn => "$nin",
            FilterOp::Any => "$any",
            FilterOp::All => "$all",
            FilterOp::Size => "$size",
            FilterOp::Between => "$between",
            FilterOp::Exists => "$exists",
        }
    }
}

/// Query over one collection; `where_clause` uses the Mongo-style operator
/// vocabulary
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FilterData {
    pub where_clause: Option<Value>,
    #[serde(default)]
    pub include_deleted: bool,
}

impl FilterData {
    pub fn where_(where_clause: Value) -> Self {
        Self {
            where_clause: Some(where_clause),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone)]
pub struct Condition {
    /// Dotted document path, already validated
    pub path: Vec<String>,
    pub operator: FilterOp,
    pub data: Value,
}

/// Parsed where tree shared by the SQL and in-memory renderers
#[derive(Debug, Clone)]
pub enum FilterNode {
    Field(Condition),
    And(Vec<FilterNode>),
    Or(Vec<FilterNode>),
    Not(Box<FilterNode>),
}

/// Rows visible to a query
#[derive(Debug, Clone, Copy, Default)]
pub struct Scope {
    pub include_deleted: bool,
}

/// Rendered statement with positional `$n` parameters
#[derive(Debug, Clone)]
pub struct SqlQuery {
    pub query: String,
    pub params: Vec<Value>,
}
