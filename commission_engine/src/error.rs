//! Error types for rule authoring and configuration.
//!
//! Evaluation never fails: malformed scenarios and unsupported
//! conditions simply do not match.  The errors below are raised only
//! when a rule or tier ladder is being created, edited or loaded.

use thiserror::Error;

/// Errors surfaced to callers of the rule store and validators.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RuleError {
    /// Another rule in the store already uses this name (compared
    /// case-insensitively).
    #[error("a commission rule named `{0}` already exists")]
    DuplicateName(String),

    /// A required field was left empty.
    #[error("missing required field: {0}")]
    MissingField(String),

    /// The rate is negative or not a finite number.
    #[error("invalid rate {0}: rates must be finite and non-negative")]
    InvalidRate(f64),

    /// `minAmount` is greater than `maxAmount`, or a bound is negative.
    #[error("invalid amount bounds: {0}")]
    InvalidBounds(String),

    /// No rule with this id exists in the store.
    #[error("commission rule `{0}` not found")]
    NotFound(String),

    /// No tier ladder with this id is known.
    #[error("tiered configuration `{0}` not found")]
    UnknownTierConfig(String),

    /// A tiered commission ladder failed validation.
    #[error("invalid tiered configuration `{config}`: {reason}")]
    InvalidTierConfig { config: String, reason: String },
}

impl RuleError {
    pub(crate) fn tier_config(config: &str, reason: impl Into<String>) -> Self {
        RuleError::InvalidTierConfig {
            config: config.to_string(),
            reason: reason.into(),
        }
    }
}
