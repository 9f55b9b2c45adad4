//! Error types for the Commission Engine.
//!
//! Evaluation itself never fails; these errors cover rule authoring,
//! rule set bookkeeping, import of the interchange document and
//! configuration.

use thiserror::Error;

/// A rule that would be rejected at authoring time.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("rule id must not be empty")]
    EmptyId,

    #[error("rule name must not be empty")]
    EmptyName,

    #[error("rate must be a finite, non-negative number (got {0})")]
    InvalidRate(f64),

    #[error("amount bound must be finite (got {0})")]
    InvalidBound(f64),

    #[error("maxAmount {max} is below minAmount {min}")]
    InvertedBounds { min: f64, max: f64 },

    #[error("condition {0}: duplicate condition id")]
    DuplicateConditionId(String),

    #[error("condition {0}: between requires a secondValue not below value")]
    InvalidRange(String),

    #[error("condition {0}: operand kind does not match its field")]
    ValueKindMismatch(String),

    #[error("condition {0}: operator is not supported on text fields")]
    UnsupportedTextOperator(String),

    #[error("condition {0}: rate override must be a finite, non-negative number")]
    InvalidOverride(String),
}

/// Errors raised by [`crate::ruleset::RuleSet`] mutations.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RuleSetError {
    #[error("rule not found: {0}")]
    NotFound(String),

    #[error("rule already exists: {0}")]
    DuplicateId(String),

    #[error("template not found: {0}")]
    TemplateNotFound(String),

    #[error("invalid rule {id}: {source}")]
    Invalid {
        id: String,
        #[source]
        source: ValidationError,
    },
}

/// Errors that reject an entire import document.
#[derive(Debug, Error)]
pub enum ImportError {
    #[error("import document is not valid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("import document has no `rules` array")]
    MissingRules,
}

/// Errors raised while reading configuration from the environment.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("invalid value for {var}: {value:?}")]
    InvalidValue { var: String, value: String },
}
