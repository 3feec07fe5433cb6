//! Record model: the ordered field list that maps raw records to rows.

use std::collections::{BTreeSet, HashSet};

use crate::error::{ConfigError, MappingError};
use crate::field::{Field, FieldKind};
use crate::values::{value_to_string, RawRecord, Row};

/// Ordered collection of fields, built once and read-only afterwards.
///
/// Field order is the output column order for exports. Keys are unique,
/// and at most one primary and one secondary key may be configured.
#[derive(Debug, Clone)]
pub struct Model {
    fields: Vec<Field>,
    primary_key: Option<usize>,
    secondary_key: Option<usize>,
}

impl Model {
    /// Build a model, rejecting duplicate keys and inconsistent key fields.
    pub fn new(fields: Vec<Field>) -> Result<Self, ConfigError> {
        let mut normalized = Vec::with_capacity(fields.len());
        let mut seen = HashSet::new();
        let mut primary_key: Option<usize> = None;
        let mut secondary_key: Option<usize> = None;

        for (index, field) in fields.into_iter().enumerate() {
            let field = field.normalized()?;
            let key = field.key()?.to_string();
            if !seen.insert(key.clone()) {
                return Err(ConfigError::DuplicateField(key));
            }

            match field.kind {
                FieldKind::PrimaryKey => {
                    if let Some(first) = primary_key {
                        return Err(ConfigError::MultiplePrimaryKeys {
                            first: key_of(&normalized, first),
                            second: key,
                        });
                    }
                    primary_key = Some(index);
                }
                FieldKind::SecondaryKey => {
                    if let Some(first) = secondary_key {
                        return Err(ConfigError::MultipleSecondaryKeys {
                            first: key_of(&normalized, first),
                            second: key,
                        });
                    }
                    secondary_key = Some(index);
                }
                _ => {}
            }
            normalized.push(field);
        }

        if primary_key.is_none() {
            if let Some(index) = secondary_key {
                return Err(ConfigError::SecondaryKeyWithoutPrimary(key_of(
                    &normalized,
                    index,
                )));
            }
        }

        Ok(Self {
            fields: normalized,
            primary_key,
            secondary_key,
        })
    }

    /// Map one raw record into an output row.
    pub fn fill(&self, record: &RawRecord) -> Result<Row, MappingError> {
        let mut row = Row::with_capacity(self.fields.len());
        for field in &self.fields {
            let value = field.resolve(record)?;
            row.insert(field.name.clone().unwrap_or_default(), value);
        }
        Ok(row)
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    /// Output keys in model order.
    pub fn keys(&self) -> Vec<String> {
        (0..self.fields.len())
            .map(|i| key_of(&self.fields, i))
            .collect()
    }

    pub fn primary_key(&self) -> Option<&str> {
        self.primary_key
            .and_then(|i| self.fields[i].name.as_deref())
    }

    pub fn secondary_key(&self) -> Option<&str> {
        self.secondary_key
            .and_then(|i| self.fields[i].name.as_deref())
    }

    /// Union of the raw field names read by every field.
    pub fn referenced_fields(&self) -> BTreeSet<String> {
        self.fields
            .iter()
            .flat_map(Field::referenced_fields)
            .collect()
    }

    /// Dedupe identity of a row: `pk` or `pk,sk`.
    ///
    /// Returns `None` when the model has no primary key or the row lacks it.
    pub fn composite_key(&self, row: &Row) -> Option<String> {
        let primary = row.get(self.primary_key()?)?;
        let mut key = value_to_string(primary);
        if let Some(secondary_name) = self.secondary_key() {
            key.push(',');
            if let Some(secondary) = row.get(secondary_name) {
                key.push_str(&value_to_string(secondary));
            }
        }
        Some(key)
    }
}

fn key_of(fields: &[Field], index: usize) -> String {
    fields[index].name.clone().unwrap_or_default()
}
