//! Remote object structure as reported by `structure=1`.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Field name to type descriptor map of a remote object.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Structure {
    fields: IndexMap<String, String>,
}

impl Structure {
    pub fn new<I, K, V>(fields: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            fields: fields
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Build from the `data` member of a structure response.
    ///
    /// Type descriptors are either plain strings or objects with a `type`
    /// member; anything else is kept as its JSON text.
    pub fn from_value(data: &Value) -> Option<Self> {
        let map = data.as_object()?;
        let fields = map
            .iter()
            .map(|(name, descriptor)| {
                let type_name = match descriptor {
                    Value::String(s) => s.clone(),
                    Value::Object(o) => o
                        .get("type")
                        .and_then(Value::as_str)
                        .map(str::to_string)
                        .unwrap_or_else(|| descriptor.to_string()),
                    other => other.to_string(),
                };
                (name.clone(), type_name)
            })
            .collect();
        Some(Self { fields })
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn has_field(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    pub fn field_type(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    /// Whether the field holds a time value (its type mentions "timestamp").
    pub fn is_timestamp(&self, name: &str) -> bool {
        self.field_type(name)
            .map(|t| t.to_ascii_lowercase().contains("timestamp"))
            .unwrap_or(false)
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_value() {
        let data = json!({
            "id": "int",
            "created": "unix_timestamp",
            "modified": { "type": "TIMESTAMP", "nullable": true },
        });
        let structure = Structure::from_value(&data).unwrap();
        assert!(structure.has_field("id"));
        assert!(!structure.is_timestamp("id"));
        assert!(structure.is_timestamp("created"));
        assert!(structure.is_timestamp("modified"));
        assert!(!structure.is_timestamp("unknown"));
        assert!(Structure::from_value(&json!([1])).is_none());
    }
}
