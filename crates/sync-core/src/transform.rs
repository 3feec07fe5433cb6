//! Value transforms applied to a field after its alias is resolved.
//!
//! Transforms are pure `Value -> Value` functions. A field applies its
//! transforms in registration order, so `[to_integer, date_format]` and
//! `[date_format, to_integer]` are different pipelines.
//!
//! # YAML Format
//!
//! ```yaml
//! transforms:
//!   - type: trim
//!   - type: replace
//!     from: "-"
//!     to: ""
//!   - type: date_format
//!     from: "%d/%m/%Y"
//!     to: "%Y-%m-%d"
//! ```

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};
use std::fmt;
use std::sync::Arc;

use crate::values::{is_empty_value, value_to_string};

/// Date/time layouts tried when a transform has no explicit input pattern.
const FALLBACK_DATETIME_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"];
const FALLBACK_DATE_FORMATS: &[&str] = &["%Y-%m-%d"];

/// Injected single-value function used by [`Transform::Custom`].
#[derive(Clone)]
pub struct ValueFn(Arc<dyn Fn(Value) -> Value + Send + Sync>);

impl ValueFn {
    pub fn new(f: impl Fn(Value) -> Value + Send + Sync + 'static) -> Self {
        Self(Arc::new(f))
    }

    pub fn call(&self, value: Value) -> Value {
        (self.0)(value)
    }
}

impl fmt::Debug for ValueFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ValueFn(..)")
    }
}

/// A single value transformation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Transform {
    /// Cast to a 64-bit integer; unparsable values become null
    ToInteger,

    /// Cast to a float; unparsable values become null
    ToFloat,

    /// Cast to a boolean (`1/true/yes/y/on` are true)
    ToBoolean,

    /// Render scalars as strings; null stays null
    ToString,

    /// Trim surrounding whitespace
    Trim,

    /// Lowercase strings
    Lowercase,

    /// Uppercase strings
    Uppercase,

    /// Strip control characters and collapse whitespace runs
    Sanitize,

    /// Replace every occurrence of `from` with `to`
    Replace { from: String, to: String },

    /// Keep at most `length` characters
    Truncate { length: usize },

    /// Substitute `value` for null or empty strings
    Default { value: Value },

    /// Parse a date (unix seconds, RFC 3339 or the `from` pattern) and
    /// render it with the `to` pattern. Unparsable input is left untouched.
    DateFormat {
        #[serde(default)]
        from: Option<String>,
        to: String,
    },

    /// Parse a date into unix seconds. Unparsable input is left untouched.
    UnixTimestamp {
        #[serde(default)]
        from: Option<String>,
    },

    /// Injected function, configured programmatically only
    #[serde(skip)]
    Custom(ValueFn),
}

impl Transform {
    /// Wrap a closure as a transform.
    pub fn custom(f: impl Fn(Value) -> Value + Send + Sync + 'static) -> Self {
        Self::Custom(ValueFn::new(f))
    }

    /// Apply this transform to a value.
    pub fn apply(&self, value: Value) -> Value {
        match self {
            Self::ToInteger => to_integer(value),
            Self::ToFloat => to_float(value),
            Self::ToBoolean => Value::Bool(to_boolean(&value)),
            Self::ToString => match value {
                Value::Null => Value::Null,
                Value::String(s) => Value::String(s),
                other => Value::String(value_to_string(&other)),
            },
            Self::Trim => map_str(value, |s| s.trim().to_string()),
            Self::Lowercase => map_str(value, |s| s.to_lowercase()),
            Self::Uppercase => map_str(value, |s| s.to_uppercase()),
            Self::Sanitize => map_str(value, sanitize),
            Self::Replace { from, to } => {
                if from.is_empty() {
                    value
                } else {
                    map_str(value, |s| s.replace(from.as_str(), to))
                }
            }
            Self::Truncate { length } => map_str(value, |s| s.chars().take(*length).collect()),
            Self::Default { value: default } => {
                if is_empty_value(&value) {
                    default.clone()
                } else {
                    value
                }
            }
            Self::DateFormat { from, to } => match parse_datetime(&value, from.as_deref()) {
                Some(dt) => format_datetime(&dt, to).map(Value::String).unwrap_or(value),
                None => value,
            },
            Self::UnixTimestamp { from } => match parse_datetime(&value, from.as_deref()) {
                Some(dt) => Value::from(dt.and_utc().timestamp()),
                None => value,
            },
            Self::Custom(f) => f.call(value),
        }
    }
}

fn map_str(value: Value, f: impl FnOnce(&str) -> String) -> Value {
    match value {
        Value::String(s) => Value::String(f(&s)),
        other => other,
    }
}

fn sanitize(s: &str) -> String {
    s.split_whitespace()
        .map(|word| word.chars().filter(|c| !c.is_control()).collect::<String>())
        .filter(|word| !word.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

fn to_integer(value: Value) -> Value {
    match value {
        Value::Number(n) => match n.as_i64() {
            Some(i) => Value::from(i),
            None => n
                .as_f64()
                .map(|f| Value::from(f.trunc() as i64))
                .unwrap_or(Value::Null),
        },
        Value::String(s) => {
            let s = s.trim();
            if let Ok(i) = s.parse::<i64>() {
                Value::from(i)
            } else if let Ok(f) = s.parse::<f64>() {
                if f.is_finite() {
                    Value::from(f.trunc() as i64)
                } else {
                    Value::Null
                }
            } else {
                Value::Null
            }
        }
        Value::Bool(b) => Value::from(i64::from(b)),
        _ => Value::Null,
    }
}

fn to_float(value: Value) -> Value {
    let f = match &value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        _ => None,
    };
    f.and_then(Number::from_f64)
        .map(Value::Number)
        .unwrap_or(Value::Null)
}

fn to_boolean(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(false),
        Value::String(s) => matches!(
            s.trim().to_ascii_lowercase().as_str(),
            "1" | "true" | "yes" | "y" | "on"
        ),
        _ => false,
    }
}

/// Parse a value into a naive UTC date/time.
///
/// Integers (and all-digit strings) are unix seconds. Strings are tried
/// against `pattern` when given, otherwise RFC 3339 and a few ISO layouts.
pub fn parse_datetime(value: &Value, pattern: Option<&str>) -> Option<NaiveDateTime> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .and_then(|secs| DateTime::from_timestamp(secs, 0))
            .map(|dt| dt.naive_utc()),
        Value::String(s) => {
            let s = s.trim();
            if s.is_empty() {
                return None;
            }
            if let Some(pattern) = pattern {
                return NaiveDateTime::parse_from_str(s, pattern).ok().or_else(|| {
                    NaiveDate::parse_from_str(s, pattern)
                        .ok()
                        .and_then(|d| d.and_hms_opt(0, 0, 0))
                });
            }
            if let Ok(secs) = s.parse::<i64>() {
                return DateTime::from_timestamp(secs, 0).map(|dt| dt.naive_utc());
            }
            if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
                return Some(dt.naive_utc());
            }
            FALLBACK_DATETIME_FORMATS
                .iter()
                .find_map(|f| NaiveDateTime::parse_from_str(s, f).ok())
                .or_else(|| {
                    FALLBACK_DATE_FORMATS
                        .iter()
                        .find_map(|f| NaiveDate::parse_from_str(s, f).ok())
                        .and_then(|d| d.and_hms_opt(0, 0, 0))
                })
        }
        _ => None,
    }
}

/// Render a date/time with a chrono pattern, or `None` if the pattern is invalid.
pub fn format_datetime(dt: &NaiveDateTime, pattern: &str) -> Option<String> {
    use std::fmt::Write;

    let mut out = String::new();
    write!(out, "{}", dt.format(pattern)).ok()?;
    Some(out)
}
