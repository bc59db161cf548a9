use serde_json::Value;

use super::error::FilterError;
use super::types::{FilterNode, FilterOp, Condition, Scope};
use super::{compare_values, lookup, sql_path, validate_path, values_equal};

pub struct FilterWhere {
    param_values: Vec<Value>,
    param_index: usize,
}

impl FilterWhere {
    pub fn new(starting_param_index: usize) -> Self {
        Self {
            param_values: vec![],
            param_index: starting_param_index,
        }
    }

    pub fn validate(where_data: &Value) -> Result<(), FilterError> {
        match where_data {
            Value::Null => Ok(()),
            Value::Object(_) => Self::parse(where_data).map(|_| ()),
            Value::String(_) => Err(FilterError::InvalidWhere(
                "Raw predicates are not supported on document collections".to_string(),
            )),
            _ => Err(FilterError::InvalidWhere("WHERE must be an object".to_string())),
        }
    }

    /// Parse a WHERE object into a list of implicitly AND-ed nodes
    pub fn parse(where_data: &Value) -> Result<Vec<FilterNode>, FilterError> {
        let obj = match where_data {
            Value::Null => return Ok(vec![]),
            Value::Object(obj) => obj,
            _ => return Err(FilterError::InvalidWhere("Unsupported WHERE format".to_string())),
        };

        let mut nodes = Vec::new();
        for (key, value) in obj {
            if key.starts_with('$') {
                nodes.push(Self::parse_logical_operator(key, value)?);
            } else {
                nodes.extend(Self::parse_field_condition(key, value)?);
            }
        }
        Ok(nodes)
    }

    fn parse_logical_operator(op: &str, value: &Value) -> Result<FilterNode, FilterError> {
        match op {
            "$and" | "$or" => {
                let arr = value
                    .as_array()
                    .ok_or_else(|| FilterError::InvalidOperand(format!("{} requires array", op)))?;
                let mut children = Vec::with_capacity(arr.len());
                for v in arr {
                    children.push(FilterNode::And(Self::parse(v)?));
                }
                Ok(if op == "$and" { FilterNode::And(children) } else { FilterNode::Or(children) })
            }
            "$not" => Ok(FilterNode::Not(Box::new(FilterNode::And(Self::parse(value)?)))),
            _ => Err(FilterError::UnsupportedOperator(op.to_string())),
        }
    }

    fn parse_field_condition(field: &str, value: &Value) -> Result<Vec<FilterNode>, FilterError> {
        let path = validate_path(field)?;
        let mut out = Vec::new();
        match value {
            Value::Object(obj) if obj.keys().all(|k| k.starts_with('$')) && !obj.is_empty() => {
                for (op_key, op_val) in obj {
                    let operator = FilterOp::parse(op_key)?;
                    Self::validate_operand(operator, op_val)?;
                    out.push(FilterNode::Field(Condition {
                        path: path.clone(),
                        operator,
                        data: op_val.clone(),
                    }));
                }
            }
            // Implicit equality: { field: value }
            _ => out.push(FilterNode::Field(Condition {
                path,
                operator: FilterOp::Eq,
                data: value.clone(),
            })),
        }
        Ok(out)
    }

    fn validate_operand(op: FilterOp, data: &Value) -> Result<(), FilterError> {
        match op {
            FilterOp::In | FilterOp::NIn | FilterOp::Any | FilterOp::All if !data.is_array() => {
                Err(FilterError::InvalidOperand(format!("{} requires an array", op.key())))
            }
            FilterOp::Between => match data.as_array() {
                Some(values) if values.len() == 2 => Ok(()),
                _ => Err(FilterError::InvalidOperand("$between requires exactly 2 values".to_string())),
            },
            FilterOp::Size if !data.is_u64() => {
                Err(FilterError::InvalidOperand("$size requires a non-negative integer".to_string()))
            }
            FilterOp::Exists if !data.is_boolean() => {
                Err(FilterError::InvalidOperand("$exists requires a boolean".to_string()))
            }
            _ => Ok(()),
        }
    }

    // ========================================
    // SQL rendering (jsonb `data` column)
    // ========================================

    pub fn generate(
        nodes: &[FilterNode],
        starting_param_index: usize,
        scope: &Scope,
    ) -> Result<(String, Vec<Value>), FilterError> {
        let mut filter_where = Self::new(starting_param_index);

        let mut sql_conditions = vec![];
        if !scope.include_deleted {
            sql_conditions.push("\"deleted_at\" IS NULL".to_string());
        }
        for node in nodes {
            sql_conditions.push(filter_where.build_node(node)?);
        }
        let where_clause = if sql_conditions.is_empty() { "1=1".to_string() } else { sql_conditions.join(" AND ") };
        Ok((where_clause, filter_where.param_values))
    }

    fn build_node(&mut self, node: &FilterNode) -> Result<String, FilterError> {
        match node {
            FilterNode::Field(info) => self.build_sql_condition(info),
            FilterNode::And(children) | FilterNode::Or(children) => {
                if children.is_empty() {
                    return Ok(if matches!(node, FilterNode::And(_)) { "1=1" } else { "1=0" }.to_string());
                }
                let joiner = if matches!(node, FilterNode::And(_)) { " AND " } else { " OR " };
                let parts = children
                    .iter()
                    .map(|c| self.build_node(c).map(|sql| format!("({})", sql)))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(parts.join(joiner))
            }
            FilterNode::Not(inner) => Ok(format!("NOT ({})", self.build_node(inner)?)),
        }
    }

    fn build_sql_condition(&mut self, condition: &Condition) -> Result<String, FilterError> {
        let column = sql_path(&condition.path);
        let data = &condition.data;
        Ok(match condition.operator {
            FilterOp::Eq => {
                if data.is_null() { format!("({0} IS NULL OR {0} = 'null'::jsonb)", column) }
                else { format!("{} = {}", column, self.param(data.clone())) }
            }
            FilterOp::Ne => {
                if data.is_null() { format!("({0} IS NOT NULL AND {0} <> 'null'::jsonb)", column) }
                else { format!("({0} IS NULL OR {0} <> {1})", column, self.param(data.clone())) }
            }
            FilterOp::Gt => format!("{} > {}", column, self.param(data.clone())),
            FilterOp::Gte => format!("{} >= {}", column, self.param(data.clone())),
            FilterOp::Lt => format!("{} < {}", column, self.param(data.clone())),
            FilterOp::Lte => format!("{} <= {}", column, self.param(data.clone())),
            FilterOp::In | FilterOp::NIn => {
                let values = Self::array(data)?;
                let negate = condition.operator == FilterOp::NIn;
                if values.is_empty() {
                    return Ok(if negate { "1=1" } else { "1=0" }.to_string());
                }
                let params: Vec<String> = values.iter().map(|v| self.param(v.clone())).collect();
                if negate {
                    format!("({0} IS NULL OR {0} NOT IN ({1}))", column, params.join(", "))
                } else {
                    format!("{} IN ({})", column, params.join(", "))
                }
            }
            FilterOp::Between => {
                let values = Self::array(data)?;
                let low = self.param(values[0].clone());
                let high = self.param(values[1].clone());
                format!("({0} >= {1} AND {0} <= {2})", column, low, high)
            }
            FilterOp::Any => {
                let values = Self::array(data)?;
                if values.is_empty() { return Ok("1=0".to_string()); }
                let parts: Vec<String> = values
                    .iter()
                    .map(|v| format!("{} @> {}", column, self.param(Value::Array(vec![v.clone()]))))
                    .collect();
                format!("({})", parts.join(" OR "))
            }
            FilterOp::All => format!("{} @> {}", column, self.param(data.clone())),
            FilterOp::Size => format!(
                "(jsonb_typeof({0}) = 'array' AND jsonb_array_length({0}) = ({1})::int)",
                column,
                self.param(data.clone())
            ),
            FilterOp::Exists => {
                if data.as_bool().unwrap_or(true) { format!("{} IS NOT NULL", column) }
                else { format!("{} IS NULL", column) }
            }
        })
    }

    fn array(data: &Value) -> Result<&Vec<Value>, FilterError> {
        data.as_array()
            .ok_or_else(|| FilterError::InvalidOperand("operator requires an array".to_string()))
    }

    fn param(&mut self, value: Value) -> String {
        self.param_values.push(value);
        self.param_index += 1;
        format!("${}", self.param_index)
    }

    // ========================================
    // In-memory evaluation
    // ========================================

    pub fn matches_all(nodes: &[FilterNode], doc: &Value) -> bool {
        nodes.iter().all(|node| Self::matches(node, doc))
    }

    pub fn matches(node: &FilterNode, doc: &Value) -> bool {
        match node {
            FilterNode::Field(info) => Self::matches_condition(info, doc),
            FilterNode::And(children) => children.iter().all(|c| Self::matches(c, doc)),
            FilterNode::Or(children) => children.iter().any(|c| Self::matches(c, doc)),
            FilterNode::Not(inner) => !Self::matches(inner, doc),
        }
    }

    fn matches_condition(condition: &Condition, doc: &Value) -> bool {
        let field = lookup(doc, &condition.path);
        let data = &condition.data;
        let cmp = |pred: fn(std::cmp::Ordering) -> bool| {
            field
                .and_then(|v| compare_values(v, data))
                .map(pred)
                .unwrap_or(false)
        };

        match condition.operator {
            FilterOp::Eq => match field {
                None | Some(Value::Null) => data.is_null(),
                Some(v) => values_equal(v, data),
            },
            FilterOp::Ne => match field {
                None | Some(Value::Null) => !data.is_null(),
                Some(v) => !values_equal(v, data),
            },
            FilterOp::Gt => cmp(|o| o.is_gt()),
            FilterOp::Gte => cmp(|o| o.is_ge()),
            FilterOp::Lt => cmp(|o| o.is_lt()),
            FilterOp::Lte => cmp(|o| o.is_le()),
            FilterOp::In => match (field, data.as_array()) {
                (Some(v), Some(values)) => values.iter().any(|candidate| values_equal(v, candidate)),
                _ => false,
            },
            FilterOp::NIn => match (field, data.as_array()) {
                (Some(v), Some(values)) => !values.iter().any(|candidate| values_equal(v, candidate)),
                (None, _) => true,
                _ => false,
            },
            FilterOp::Between => match (field, data.as_array()) {
                (Some(v), Some(bounds)) if bounds.len() == 2 => {
                    compare_values(v, &bounds[0]).map(|o| o.is_ge()).unwrap_or(false)
                        && compare_values(v, &bounds[1]).map(|o| o.is_le()).unwrap_or(false)
                }
                _ => false,
            },
            FilterOp::Any => match (field.and_then(Value::as_array), data.as_array()) {
                (Some(items), Some(wanted)) => wanted.iter().any(|w| items.iter().any(|i| values_equal(i, w))),
                _ => false,
            },
            FilterOp::All => match (field.and_then(Value::as_array), data.as_array()) {
                (Some(items), Some(wanted)) => wanted.iter().all(|w| items.iter().any(|i| values_equal(i, w))),
                _ => false,
            },
            FilterOp::Size => match (field.and_then(Value::as_array), data.as_u64()) {
                (Some(items), Some(n)) => items.len() as u64 == n,
                _ => false,
            },
            FilterOp::Exists => field.is_some() == data.as_bool().unwrap_or(true),
        }
    }
}
