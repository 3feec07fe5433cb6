//! Field definitions.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeSet;

use crate::alias::Alias;
use crate::error::{ConfigError, MappingError};
use crate::transform::Transform;
use crate::values::{is_empty_value, RawRecord};

/// Role of a field inside a model.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    /// Fixed value, typically with a constant alias
    Constant,
    /// Plain mapped value
    #[default]
    Variable,
    /// Record identity used for dedupe, updates and deletes
    PrimaryKey,
    /// Second component of the record identity
    SecondaryKey,
    /// Mapped value that must not be empty
    Required,
}

/// One output field: a key, a kind, an alias and an ordered transform chain.
///
/// When no alias is given the field reads the raw field of the same name.
/// When no name is given the key is taken from a simple alias.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Field {
    #[serde(default)]
    pub name: Option<String>,

    #[serde(default, rename = "type")]
    pub kind: FieldKind,

    #[serde(default)]
    pub alias: Option<Alias>,

    #[serde(default)]
    pub transforms: Vec<Transform>,
}

impl Field {
    /// A variable field reading the raw field of the same name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            kind: FieldKind::Variable,
            alias: None,
            transforms: Vec::new(),
        }
    }

    /// A field whose key is implied by its alias.
    pub fn from_alias(alias: Alias) -> Self {
        Self {
            name: None,
            kind: FieldKind::Variable,
            alias: Some(alias),
            transforms: Vec::new(),
        }
    }

    pub fn primary_key(name: impl Into<String>) -> Self {
        Self::new(name).with_kind(FieldKind::PrimaryKey)
    }

    pub fn secondary_key(name: impl Into<String>) -> Self {
        Self::new(name).with_kind(FieldKind::SecondaryKey)
    }

    pub fn required(name: impl Into<String>) -> Self {
        Self::new(name).with_kind(FieldKind::Required)
    }

    pub fn constant(name: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(name)
            .with_kind(FieldKind::Constant)
            .with_alias(Alias::constant(value))
    }

    pub fn with_kind(mut self, kind: FieldKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn with_alias(mut self, alias: Alias) -> Self {
        self.alias = Some(alias);
        self
    }

    pub fn with_transform(mut self, transform: Transform) -> Self {
        self.transforms.push(transform);
        self
    }

    /// Output key of this field.
    pub fn key(&self) -> Result<&str, ConfigError> {
        match (&self.name, &self.alias) {
            (Some(name), _) => Ok(name),
            (None, Some(alias)) => alias.implied_name().ok_or(ConfigError::UnnamedField),
            (None, None) => Err(ConfigError::UnnamedField),
        }
    }

    /// Fill in the implied name and alias so both are always set.
    pub(crate) fn normalized(mut self) -> Result<Self, ConfigError> {
        let key = self.key()?.to_string();
        if self.alias.is_none() {
            self.alias = Some(Alias::simple(key.clone()));
        }
        self.name = Some(key);
        Ok(self)
    }

    /// Raw field names read by this field's alias.
    pub fn referenced_fields(&self) -> BTreeSet<String> {
        match (&self.alias, &self.name) {
            (Some(alias), _) => alias.referenced_fields(),
            (None, Some(name)) => BTreeSet::from([name.clone()]),
            (None, None) => BTreeSet::new(),
        }
    }

    /// Resolve the alias and run the transform chain.
    pub fn resolve(&self, record: &RawRecord) -> Result<Value, MappingError> {
        let key = self.name.as_deref().unwrap_or_default();
        let mut value = match &self.alias {
            Some(alias) => alias.value(record)?,
            None => record
                .get(key)
                .cloned()
                .ok_or_else(|| MappingError::MissingField(key.to_string()))?,
        };

        for transform in &self.transforms {
            value = transform.apply(value);
        }

        if self.kind == FieldKind::Required && is_empty_value(&value) {
            return Err(MappingError::RequiredEmpty(key.to_string()));
        }
        Ok(value)
    }
}
