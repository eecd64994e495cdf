use thiserror::Error;

/// Errors from the signature layer.
///
/// An empty key or message is a caller bug, never a valid "unsigned" state.
#[derive(Debug, Error)]
pub enum SignatureError {
    #[error("invalid signing input: {0} must not be empty")]
    InvalidInput(&'static str),
    #[error("failed to canonicalize payload: {0}")]
    Canonicalization(#[from] serde_json::Error),
}

/// Configuration rejected at construction time.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("config field `{field}` out of range: {reason}")]
    OutOfRange { field: &'static str, reason: String },
}

impl ConfigError {
    pub(crate) fn out_of_range(field: &'static str, reason: impl Into<String>) -> Self {
        Self::OutOfRange {
            field,
            reason: reason.into(),
        }
    }
}
