//! Connector error type.

/// Failure of a remote call.
///
/// During an import these are record-level and end up in the failure log.
/// During connection setup and structure discovery they are fatal.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConnectorError {
    /// The request never produced an HTTP response
    #[error("Request to '{url}' failed: {message}")]
    Transport { url: String, message: String },

    /// The remote answered with a non-success status
    #[error("Remote returned HTTP {status} for '{url}': {body}")]
    Status {
        status: u16,
        url: String,
        body: String,
    },

    /// The remote flagged the request as `INVALID_REQUEST`
    #[error("Invalid request: {}", .0.join("; "))]
    InvalidRequest(Vec<String>),

    /// The response body did not match the expected envelope
    #[error("Malformed response: {0}")]
    Malformed(String),

    /// A keyed operation was attempted without a primary key configured
    #[error("No primary key field configured for {0}")]
    NoPrimaryKey(String),

    /// The row does not carry a value for the primary key field
    #[error("Record has no value for primary key field '{0}'")]
    MissingKey(String),

    /// The addressed record does not exist
    #[error("Record '{0}' not found")]
    NotFound(String),

    /// The remote refused the record
    #[error("{0}")]
    Rejected(String),
}

impl ConnectorError {
    /// Whether retrying the same request may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport { .. } => true,
            Self::Status { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}
