//! Core error types for the cap-table engine.
//!
//! Every failure is a value-level error returned to the caller. The engine never
//! substitutes a guessed value for malformed financial input; deciding whether
//! to surface an error or abort a scenario save is left to the calling layer.

use rust_decimal::Decimal;
use thiserror::Error;

/// Type alias for Result using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Root error type for the engine.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// Bad financial inputs on a funding round: non-positive investment or
    /// valuation, an empty share base, or terms that cannot be honoured.
    #[error("Invalid round {index}: {reason}")]
    InvalidRound { index: u32, reason: String },

    /// Rounds must be supplied in strictly increasing index order.
    #[error("Round {index} supplied out of order (last applied round was {previous})")]
    OutOfOrderRound { previous: u32, index: u32 },

    #[error("Exit value must not be negative (got {0})")]
    NegativeExitValue(Decimal),

    #[error("Cap table has no shares to distribute against")]
    EmptyCapTable,

    #[error("Invalid company setup: {0}")]
    InvalidCompany(String),

    #[error("Invalid liquidation terms on share class {class_id}: {reason}")]
    InvalidTerms { class_id: String, reason: String },

    #[error("Input validation failed: {0}")]
    Validation(#[from] ValidationError),
}

/// Validation errors for configuration and serialized input.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Failed to parse decimal number: {0}")]
    DecimalParse(#[from] rust_decimal::Error),

    #[error("Failed to parse JSON: {0}")]
    Json(String),
}

impl Error {
    pub(crate) fn invalid_round(index: u32, reason: impl Into<String>) -> Self {
        Error::InvalidRound {
            index,
            reason: reason.into(),
        }
    }

    pub(crate) fn invalid_terms(class_id: &str, reason: impl Into<String>) -> Self {
        Error::InvalidTerms {
            class_id: class_id.to_string(),
            reason: reason.into(),
        }
    }
}

// === From implementations for common error types ===

impl From<rust_decimal::Error> for Error {
    fn from(err: rust_decimal::Error) -> Self {
        Error::Validation(ValidationError::DecimalParse(err))
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Validation(ValidationError::Json(err.to_string()))
    }
}

impl From<Error> for String {
    fn from(err: Error) -> Self {
        err.to_string()
    }
}
