//! Error types for the authorization engine

use thiserror::Error;

/// Authorization engine errors
#[derive(Debug, Error)]
pub enum AuthzError {
    /// Policy document is not valid JSON or has the wrong shape
    #[error("Policy parse error: {0}")]
    ParseError(String),

    /// Condition block is not an operator map of key/value maps
    #[error("Malformed condition: {0}")]
    MalformedCondition(String),

    /// Condition operator the engine does not implement
    #[error("Unsupported condition operator: {0}")]
    UnsupportedOperator(String),

    /// Policy not found
    #[error("Policy not found: {0}")]
    PolicyNotFound(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Database error
    #[error("Database error: {0}")]
    DatabaseError(String),

    /// Store contract error (timeouts, unavailability)
    #[error("Store error: {0}")]
    Store(#[from] monkeys_core::CoreError),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AuthzError {
    /// Whether the error came from a malformed policy rather than from
    /// infrastructure.
    pub fn is_malformed_policy(&self) -> bool {
        matches!(
            self,
            AuthzError::ParseError(_)
                | AuthzError::MalformedCondition(_)
                | AuthzError::UnsupportedOperator(_)
        )
    }
}

/// Result type for authorization operations
pub type Result<T> = std::result::Result<T, AuthzError>;
