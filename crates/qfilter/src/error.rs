//! Error types for the qfilter crate.

use std::io;
use std::path::PathBuf;

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

/// A filter tree was rejected.
///
/// Validation is fail-fast: the first offending node in pre-order stops the
/// walk, so there is only ever one error per call.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    /// A structurally required key is absent, or `children` is empty.
    #[error("'{field}' is a required field.")]
    Required { field: &'static str },

    /// A key is present but its value fails a constraint.
    #[error("{message}")]
    InvalidValue {
        field: &'static str,
        value: Value,
        message: String,
    },
}

impl ValidationError {
    /// Creates a [`ValidationError::Required`] error.
    pub fn required(field: &'static str) -> Self {
        ValidationError::Required { field }
    }

    /// Creates a [`ValidationError::InvalidValue`] error.
    pub fn invalid(field: &'static str, value: impl Into<Value>, message: impl Into<String>) -> Self {
        ValidationError::InvalidValue {
            field,
            value: value.into(),
            message: message.into(),
        }
    }

    /// The key of the filter node that failed.
    pub fn field(&self) -> &'static str {
        match self {
            ValidationError::Required { field } | ValidationError::InvalidValue { field, .. } => {
                field
            }
        }
    }

    /// Machine-readable error code: `required` or `invalid`.
    pub fn code(&self) -> &'static str {
        match self {
            ValidationError::Required { .. } => "required",
            ValidationError::InvalidValue { .. } => "invalid",
        }
    }

    /// The offending value, for [`ValidationError::InvalidValue`].
    pub fn value(&self) -> Option<&Value> {
        match self {
            ValidationError::Required { .. } => None,
            ValidationError::InvalidValue { value, .. } => Some(value),
        }
    }

    /// Structured form for an API boundary (the body of a 400 response).
    pub fn to_body(&self) -> ErrorBody {
        ErrorBody {
            field: self.field(),
            code: self.code(),
            message: self.to_string(),
        }
    }
}

/// Serializable description of a [`ValidationError`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorBody {
    pub field: &'static str,
    pub code: &'static str,
    pub message: String,
}

/// Errors from the one-call parse, validate and compile entry points.
#[derive(Debug, Error)]
pub enum FilterError {
    /// The filter tree was rejected.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The filter text is not valid JSON.
    #[error("invalid filter JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors that can occur when loading schemas or options from disk.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid JSON in {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid YAML in {path}: {source}")]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
}

/// Result type for filter operations.
pub type Result<T> = std::result::Result<T, FilterError>;
