//! Query options, filters and pages.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cmp::Ordering;
use sync_core::{value_to_string, Row};

/// Comparison operator of a [`Filter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterOp {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
    Like,
}

impl FilterOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Eq => "eq",
            Self::Ne => "ne",
            Self::Gt => "gt",
            Self::Gte => "gte",
            Self::Lt => "lt",
            Self::Lte => "lte",
            Self::Like => "like",
        }
    }
}

/// One `field op value` condition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Filter {
    pub field: String,
    pub op: FilterOp,
    pub value: Value,
}

impl Filter {
    pub fn new(field: impl Into<String>, op: FilterOp, value: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            op,
            value: value.into(),
        }
    }

    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(field, FilterOp::Eq, value)
    }

    pub fn gte(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(field, FilterOp::Gte, value)
    }

    /// Query-string key, e.g. `filter[created][gte]`.
    pub fn query_key(&self) -> String {
        format!("filter[{}][{}]", self.field, self.op.as_str())
    }

    /// Evaluate the filter against a record. Missing fields never match.
    pub fn matches(&self, record: &Row) -> bool {
        let Some(actual) = record.get(&self.field) else {
            return false;
        };
        match self.op {
            FilterOp::Eq => value_to_string(actual) == value_to_string(&self.value),
            FilterOp::Ne => value_to_string(actual) != value_to_string(&self.value),
            FilterOp::Gt => compare(actual, &self.value) == Ordering::Greater,
            FilterOp::Gte => compare(actual, &self.value) != Ordering::Less,
            FilterOp::Lt => compare(actual, &self.value) == Ordering::Less,
            FilterOp::Lte => compare(actual, &self.value) != Ordering::Greater,
            FilterOp::Like => {
                let needle = value_to_string(&self.value);
                value_to_string(actual).contains(needle.trim_matches('%'))
            }
        }
    }
}

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Numeric comparison when both sides are numeric, string comparison otherwise.
pub(crate) fn compare(a: &Value, b: &Value) -> Ordering {
    match (as_number(a), as_number(b)) {
        (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
        _ => value_to_string(a).cmp(&value_to_string(b)),
    }
}

/// Sort order of a listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub field: String,
    #[serde(default)]
    pub descending: bool,
}

/// Query parameters stored in a connector session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryOptions {
    /// 1-based page cursor
    #[serde(default = "first_page")]
    pub page: u32,

    #[serde(default)]
    pub per_page: Option<u32>,

    #[serde(default)]
    pub filters: Vec<Filter>,

    #[serde(default)]
    pub order: Option<Order>,
}

fn first_page() -> u32 {
    1
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            page: first_page(),
            per_page: None,
            filters: Vec::new(),
            order: None,
        }
    }
}

impl QueryOptions {
    pub fn with_filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    /// Render as query-string pairs, appending `extra` filters.
    pub fn to_query_pairs(&self, extra: &[Filter]) -> Vec<(String, String)> {
        let mut pairs = vec![("page".to_string(), self.page.to_string())];
        if let Some(per_page) = self.per_page {
            pairs.push(("per_page".to_string(), per_page.to_string()));
        }
        if let Some(order) = &self.order {
            let prefix = if order.descending { "-" } else { "" };
            pairs.push(("order".to_string(), format!("{prefix}{}", order.field)));
        }
        for filter in self.filters.iter().chain(extra) {
            pairs.push((filter.query_key(), value_to_string(&filter.value)));
        }
        pairs
    }
}

/// One page of records returned by a connector.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Page {
    pub records: Vec<Row>,
    pub has_more: bool,
}
