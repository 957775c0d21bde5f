//! Compilation error types
//!
//! Every failure here is raised before any SQL leaves the process. The
//! compiler never falls back to an always-true or always-false fragment on bad
//! input; it rejects the definition instead.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CompileError {
    #[error("Unsupported condition kind: {0}")]
    UnsupportedCondition(String),

    #[error("Invalid operator '{operator}' for {context}")]
    InvalidOperator { operator: String, context: String },

    #[error("Invalid value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("Unknown property: {0}")]
    UnknownProperty(String),

    #[error("Invalid property name: {0}")]
    InvalidPropertyName(String),

    #[error("Invalid definition: {0}")]
    InvalidDefinition(String),

    #[error("Invalid timestamp: {0}")]
    InvalidTimestamp(String),

    #[error("Invalid project id: {0}")]
    InvalidProjectId(String),

    #[error("Time window must be between 1 and {max} days, got {days}")]
    InvalidWindow { days: u32, max: u32 },

    #[error("Condition tree exceeds maximum depth of {max}")]
    TooDeep { max: usize },
}

impl CompileError {
    /// Shorthand for [`CompileError::InvalidValue`]
    pub fn invalid_value(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            field: field.into(),
            reason: reason.into(),
        }
    }
}
