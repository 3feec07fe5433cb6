//! Error types for model construction and record mapping.

/// Configuration error raised while building a model or an engine.
///
/// These are always fatal and surface before any record is processed.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    /// A field was configured without a name and without an alias to derive one from
    #[error("Field has neither a name nor an alias to derive one from")]
    UnnamedField,

    /// Two fields share the same output key
    #[error("Duplicate field '{0}' in model")]
    DuplicateField(String),

    /// More than one field carries the primary key kind
    #[error("Fields '{first}' and '{second}' are both marked as primary key")]
    MultiplePrimaryKeys { first: String, second: String },

    /// More than one field carries the secondary key kind
    #[error("Fields '{first}' and '{second}' are both marked as secondary key")]
    MultipleSecondaryKeys { first: String, second: String },

    /// A secondary key was configured without a primary key
    #[error("Secondary key field '{0}' requires a primary key field")]
    SecondaryKeyWithoutPrimary(String),

    /// Sync mode was requested for a model without a primary key
    #[error("Sync requires a primary key field in the model")]
    SyncWithoutPrimaryKey,

    /// The input source does not provide fields that the model reads
    #[error("Input '{source_name}' is missing fields referenced by the model: {}", fields.join(", "))]
    MissingInputFields {
        source_name: String,
        fields: Vec<String>,
    },

    /// The remote structure does not know fields that the model writes
    #[error("Remote object '{object}' has no field(s): {}", fields.join(", "))]
    UnknownRemoteFields { object: String, fields: Vec<String> },

    /// Any other invalid setting
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Record-level mapping failure.
///
/// Never fatal to a run: engines route these to the failure log and move on.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum MappingError {
    /// An alias read a field that the record does not contain
    #[error("Field '{0}' not found in record")]
    MissingField(String),

    /// A required field resolved to null or an empty string
    #[error("Required field '{0}' is empty")]
    RequiredEmpty(String),
}
