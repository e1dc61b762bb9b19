//! Decode errors.

use thiserror::Error;

/// A field that was present on the wire but could not be decoded.
///
/// Missing keys and the `-` sentinel are not errors; they resolve to the
/// field's documented default.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("field `{key}` has non-numeric value `{value}`")]
    InvalidNumber { key: String, value: String },

    #[error("field `{key}` expected {expected} values, got {actual}")]
    VectorLength {
        key: String,
        expected: usize,
        actual: usize,
    },
}

impl DecodeError {
    pub(crate) fn invalid_number(key: &str, value: &str) -> Self {
        DecodeError::InvalidNumber {
            key: key.to_string(),
            value: value.to_string(),
        }
    }

    pub(crate) fn vector_length(key: &str, expected: usize, actual: usize) -> Self {
        DecodeError::VectorLength {
            key: key.to_string(),
            expected,
            actual,
        }
    }

    /// The wire key of the offending field.
    pub fn key(&self) -> &str {
        match self {
            DecodeError::InvalidNumber { key, .. } | DecodeError::VectorLength { key, .. } => key,
        }
    }
}
