//! Field aliases: how one output value is resolved from a raw record.
//!
//! Every alias can report the raw field names it reads, which lets engines
//! check up front that an input source provides them.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use crate::error::MappingError;
use crate::values::{is_empty_value, value_to_string, RawRecord};

/// Injected record function used by [`Alias::Computed`].
#[derive(Clone)]
pub struct RecordFn(Arc<dyn Fn(&RawRecord) -> Value + Send + Sync>);

impl RecordFn {
    pub fn new(f: impl Fn(&RawRecord) -> Value + Send + Sync + 'static) -> Self {
        Self(Arc::new(f))
    }

    pub fn call(&self, record: &RawRecord) -> Value {
        (self.0)(record)
    }
}

impl fmt::Debug for RecordFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("RecordFn(..)")
    }
}

/// How a field's value is obtained from a raw record.
///
/// # YAML Format
///
/// ```yaml
/// alias: { type: simple, field: Email }
/// alias: { type: constant, value: 1 }
/// alias: { type: formatted, template: "%first% %last%" }
/// alias:
///   type: conditional
///   primary: { type: simple, field: nickname }
///   fallback: { type: simple, field: first }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Alias {
    /// Read one named field
    Simple { field: String },

    /// Always the same value
    Constant { value: Value },

    /// Template with `%field%` placeholders
    Formatted { template: String },

    /// Use `primary` unless it is empty, otherwise `fallback`
    Conditional {
        primary: Box<Alias>,
        fallback: Box<Alias>,
    },

    /// Injected function; `fields` is only used for input validation
    #[serde(skip)]
    Computed { function: RecordFn, fields: Vec<String> },
}

impl Alias {
    pub fn simple(field: impl Into<String>) -> Self {
        Self::Simple {
            field: field.into(),
        }
    }

    pub fn constant(value: impl Into<Value>) -> Self {
        Self::Constant {
            value: value.into(),
        }
    }

    pub fn formatted(template: impl Into<String>) -> Self {
        Self::Formatted {
            template: template.into(),
        }
    }

    pub fn if_else(primary: Alias, fallback: Alias) -> Self {
        Self::Conditional {
            primary: Box::new(primary),
            fallback: Box::new(fallback),
        }
    }

    pub fn computed<I, S>(
        fields: I,
        f: impl Fn(&RawRecord) -> Value + Send + Sync + 'static,
    ) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Computed {
            function: RecordFn::new(f),
            fields: fields.into_iter().map(Into::into).collect(),
        }
    }

    /// Resolve the value for a raw record.
    pub fn value(&self, record: &RawRecord) -> Result<Value, MappingError> {
        match self {
            Self::Simple { field } => record
                .get(field)
                .cloned()
                .ok_or_else(|| MappingError::MissingField(field.clone())),
            Self::Constant { value } => Ok(value.clone()),
            Self::Formatted { template } => Ok(Value::String(render_template(template, record))),
            Self::Conditional { primary, fallback } => match primary.value(record) {
                Ok(value) if !is_empty_value(&value) => Ok(value),
                // A missing primary field is treated as empty
                Ok(_) | Err(MappingError::MissingField(_)) => fallback.value(record),
                Err(e) => Err(e),
            },
            Self::Computed { function, .. } => Ok(function.call(record)),
        }
    }

    /// Names of the raw record fields this alias reads.
    pub fn referenced_fields(&self) -> BTreeSet<String> {
        match self {
            Self::Simple { field } => BTreeSet::from([field.clone()]),
            Self::Constant { .. } => BTreeSet::new(),
            Self::Formatted { template } => placeholders(template)
                .into_iter()
                .map(str::to_string)
                .collect(),
            Self::Conditional { primary, fallback } => {
                let mut fields = primary.referenced_fields();
                fields.extend(fallback.referenced_fields());
                fields
            }
            Self::Computed { fields, .. } => fields.iter().cloned().collect(),
        }
    }

    /// The output key implied by this alias when a field has no name.
    pub(crate) fn implied_name(&self) -> Option<&str> {
        match self {
            Self::Simple { field } => Some(field),
            _ => None,
        }
    }
}

/// A `%...%` token names a field only when it is non-empty and carries no
/// surrounding whitespace, so `50% of %total%` still finds `%total%`.
fn is_placeholder(name: &str) -> bool {
    !name.is_empty() && name.trim() == name
}

/// Substitute `%name%` placeholders. Tokens that do not match a record
/// field are left as literal text.
fn render_template(template: &str, record: &RawRecord) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find('%') {
        out.push_str(&rest[..start]);
        let after = &rest[start + 1..];
        let Some(end) = after.find('%') else {
            out.push_str(&rest[start..]);
            return out;
        };
        let name = &after[..end];
        if !is_placeholder(name) {
            // Stray percent sign; the closing one may open a real token
            out.push('%');
            out.push_str(name);
            rest = &after[end..];
            continue;
        }
        match record.get(name) {
            Some(value) => out.push_str(&value_to_string(value)),
            None => {
                out.push('%');
                out.push_str(name);
                out.push('%');
            }
        }
        rest = &after[end + 1..];
    }
    out.push_str(rest);
    out
}

fn placeholders(template: &str) -> Vec<&str> {
    let mut names = Vec::new();
    let mut rest = template;

    while let Some(start) = rest.find('%') {
        let after = &rest[start + 1..];
        let Some(end) = after.find('%') else { break };
        let name = &after[..end];
        if is_placeholder(name) {
            names.push(name);
            rest = &after[end + 1..];
        } else {
            rest = &after[end..];
        }
    }
    names
}
