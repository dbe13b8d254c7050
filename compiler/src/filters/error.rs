//! Filter compilation errors

use thiserror::Error;

/// Domain error raised while compiling or rewriting a filter body
///
/// Unknown filter names are never an error; they are skipped so callers can
/// pass broader parameter sets than a given query supports.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FilterError {
    /// Body (or a combinator value inside it) is not a key-value mapping
    #[error("Invalid filter body: {0}")]
    InvalidBody(String),

    /// Timestamp range filter received a comparison keyword it does not know
    #[error("Unknown comparison '{operator}' for filter '{filter}'")]
    UnknownComparison { filter: String, operator: String },

    /// Filter value has the wrong shape or cannot be converted
    #[error("Invalid value for filter '{filter}': {message}")]
    InvalidValue { filter: String, message: String },

    /// Custom filter declared without a generator function
    #[error("Custom filter '{0}' has no generator")]
    MissingGenerator(String),

    /// Raised by caller-supplied generator functions and transforms
    #[error("{0}")]
    Custom(String),

    /// Filter configuration could not be loaded
    #[error("Configuration error: {0}")]
    Config(String),
}

impl FilterError {
    pub fn invalid_value(filter: &str, message: impl Into<String>) -> Self {
        Self::InvalidValue {
            filter: filter.to_string(),
            message: message.into(),
        }
    }

    pub fn custom(message: impl Into<String>) -> Self {
        Self::Custom(message.into())
    }
}
