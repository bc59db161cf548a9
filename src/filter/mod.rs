pub mod types;
pub mod filter;
pub mod filter_where;
pub mod error;

pub use types::*;
pub use filter::Filter;
pub use error::FilterError;

use std::cmp::Ordering;
use serde_json::Value;

/// Resolve a dotted path inside a JSON document
pub(crate) fn lookup<'a>(doc: &'a Value, path: &[String]) -> Option<&'a Value> {
    let mut current = doc;
    for segment in path {
        current = current.as_object()?.get(segment)?;
    }
    Some(current)
}

/// JSON equality where numbers compare by value (1 == 1.0), matching jsonb
pub(crate) fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        (Value::Array(x), Value::Array(y)) => {
            x.len() == y.len() && x.iter().zip(y).all(|(l, r)| values_equal(l, r))
        }
        _ => a == b,
    }
}

/// Ordering for comparable scalars of the same JSON type
pub(crate) fn compare_values(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

pub(crate) fn validate_path(field: &str) -> Result<Vec<String>, FilterError> {
    if field.is_empty() {
        return Err(FilterError::InvalidPath("Field name cannot be empty".to_string()));
    }
    field
        .split('.')
        .map(|segment| {
            let mut chars = segment.chars();
            let valid_start = matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_');
            if valid_start && chars.all(|c| c.is_ascii_alphanumeric() || c == '_') {
                Ok(segment.to_string())
            } else {
                Err(FilterError::InvalidPath(format!("Invalid field name format: {}", field)))
            }
        })
        .collect()
}

/// `"data" -> 'a' -> 'b'`; segments are validated identifiers so inlining is safe
pub(crate) fn sql_path(path: &[String]) -> String {
    let mut out = String::from("\"data\"");
    for segment in path {
        out.push_str(&format!(" -> '{}'", segment));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn validates_paths() {
        assert_eq!(validate_path("feeTypes.amount").unwrap(), vec!["feeTypes", "amount"]);
        assert!(validate_path("").is_err());
        assert!(validate_path("a..b").is_err());
        assert!(validate_path("name'; DROP").is_err());
        assert!(validate_path("1abc").is_err());
    }

    #[test]
    fn numbers_compare_by_value() {
        assert!(values_equal(&json!(1), &json!(1.0)));
        assert!(!values_equal(&json!(1), &json!("1")));
        assert_eq!(compare_values(&json!(2), &json!(10)), Some(Ordering::Less));
        assert_eq!(compare_values(&json!("b"), &json!("a")), Some(Ordering::Greater));
        assert_eq!(compare_values(&json!("b"), &json!(1)), None);
    }

    #[test]
    fn looks_up_nested_fields() {
        let doc = json!({ "a": { "b": 3 } });
        let path = validate_path("a.b").unwrap();
        assert_eq!(lookup(&doc, &path), Some(&json!(3)));
        assert_eq!(sql_path(&path), "\"data\" -> 'a' -> 'b'");
    }
}
