use serde_json::Value;

use super::error::FilterError;
use super::filter_where::FilterWhere;
use super::types::{FilterData, FilterNode, Scope, SqlQuery};

/// Validated query over one collection, renderable to SQL or evaluated in memory
pub struct Filter {
    table_name: String,
    where_nodes: Vec<FilterNode>,
    scope: Scope,
}

impl Filter {
    pub fn new(table_name: impl Into<String>) -> Result<Self, FilterError> {
        let table_name = table_name.into();
        Self::validate_table_name(&table_name)?;
        Ok(Self {
            table_name,
            where_nodes: vec![],
            scope: Scope::default(),
        })
    }

    /// Shorthand for `new` + `assign`
    pub fn build(table_name: impl Into<String>, data: FilterData) -> Result<Self, FilterError> {
        let mut filter = Self::new(table_name)?;
        filter.assign(data)?;
        Ok(filter)
    }

    pub fn assign(&mut self, data: FilterData) -> Result<&mut Self, FilterError> {
        if let Some(where_clause) = data.where_clause { self.where_clause(where_clause)?; }
        self.scope.include_deleted = data.include_deleted;
        Ok(self)
    }

    pub fn where_clause(&mut self, conditions: Value) -> Result<&mut Self, FilterError> {
        FilterWhere::validate(&conditions)?;
        self.where_nodes = FilterWhere::parse(&conditions)?;
        Ok(self)
    }

    pub fn include_deleted(&self) -> bool {
        self.scope.include_deleted
    }

    pub fn to_sql(&self) -> Result<SqlQuery, FilterError> {
        let (where_clause, params) = FilterWhere::generate(&self.where_nodes, 0, &self.scope)?;
        let query = format!("SELECT \"data\" FROM \"{}\" WHERE {}", self.table_name, where_clause);
        Ok(SqlQuery { query, params })
    }

    pub fn to_count_sql(&self) -> Result<SqlQuery, FilterError> {
        let (where_clause, params) = FilterWhere::generate(&self.where_nodes, 0, &self.scope)?;
        let query = format!("SELECT COUNT(*) as count FROM \"{}\" WHERE {}", self.table_name, where_clause);
        Ok(SqlQuery { query, params })
    }

    /// Whether a single document satisfies the WHERE clause
    pub fn matches(&self, doc: &Value) -> bool {
        FilterWhere::matches_all(&self.where_nodes, doc)
    }

    /// In-memory equivalent of `to_sql`
    pub fn apply(&self, docs: impl IntoIterator<Item = Value>) -> Vec<Value> {
        docs.into_iter().filter(|d| self.matches(d)).collect()
    }

    fn validate_table_name(name: &str) -> Result<(), FilterError> {
        let mut chars = name.chars();
        match chars.next() {
            None => Err(FilterError::UnknownCollection("Table name cannot be empty".to_string())),
            Some(first) if (first.is_ascii_alphabetic() || first == '_')
                && chars.all(|c| c.is_ascii_alphanumeric() || c == '_') => Ok(()),
            Some(_) => Err(FilterError::UnknownCollection(format!("Invalid table name format: {}", name))),
        }
    }
}
