//! Record and value representations shared across the workspace.
//!
//! Values are plain [`serde_json::Value`]s: the remote API speaks JSON, and
//! CSV cells enter the pipeline as `Value::String`.

use indexmap::IndexMap;
use serde_json::Value;

/// A record as read from a source (CSV row or remote API object).
///
/// Keys are source field names in source order.
pub type RawRecord = IndexMap<String, Value>;

/// A record produced by a [`crate::Model`], keyed by output field name in
/// model order.
pub type Row = IndexMap<String, Value>;

/// Check whether a value counts as empty: null or an empty string.
pub fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        _ => false,
    }
}

/// Render a value the way it is written to a flat file.
///
/// Null becomes an empty string and strings are written without quotes.
/// Arrays and objects are written as compact JSON.
pub fn value_to_string(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_is_empty_value() {
        assert!(is_empty_value(&Value::Null));
        assert!(is_empty_value(&json!("")));
        assert!(!is_empty_value(&json!(" ")));
        assert!(!is_empty_value(&json!(0)));
        assert!(!is_empty_value(&json!(false)));
    }

    #[test]
    fn test_value_to_string() {
        assert_eq!(value_to_string(&Value::Null), "");
        assert_eq!(value_to_string(&json!("Jo")), "Jo");
        assert_eq!(value_to_string(&json!(42)), "42");
        assert_eq!(value_to_string(&json!(1.5)), "1.5");
        assert_eq!(value_to_string(&json!(true)), "true");
        assert_eq!(value_to_string(&json!([1, 2])), "[1,2]");
    }
}
