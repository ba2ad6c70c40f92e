//! Unified error types for the store contracts
//!
//! Every external collaborator of the core (database, shared cache) reports
//! failures through [`CoreError`] so callers can decide per dependency whether
//! to fail open, fall back, or surface the error.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, CoreError>;

/// Core error type shared by store implementations
#[derive(Debug, Error)]
pub enum CoreError {
    /// Database-related errors
    #[error("Database error: {0}")]
    Database(String),

    /// Shared cache (Redis) errors
    #[error("Cache error: {0}")]
    Cache(String),

    /// A bounded external call did not finish in time
    #[error("Timeout: {0}")]
    Timeout(String),

    /// Serialization/Deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid input/state
    #[error("Invalid: {0}")]
    Invalid(String),
}

impl CoreError {
    /// Create a database error
    pub fn database<S: Into<String>>(msg: S) -> Self {
        CoreError::Database(msg.into())
    }

    /// Create a cache error
    pub fn cache<S: Into<String>>(msg: S) -> Self {
        CoreError::Cache(msg.into())
    }

    /// Create a timeout error
    pub fn timeout<S: Into<String>>(msg: S) -> Self {
        CoreError::Timeout(msg.into())
    }

    /// Create a serialization error
    pub fn serialization<S: Into<String>>(msg: S) -> Self {
        CoreError::Serialization(msg.into())
    }

    /// Create a configuration error
    pub fn configuration<S: Into<String>>(msg: S) -> Self {
        CoreError::Configuration(msg.into())
    }

    /// Create a not found error
    pub fn not_found<S: Into<String>>(msg: S) -> Self {
        CoreError::NotFound(msg.into())
    }

    /// Create an invalid error
    pub fn invalid<S: Into<String>>(msg: S) -> Self {
        CoreError::Invalid(msg.into())
    }

    /// Whether the error means the dependency was unreachable or too slow,
    /// as opposed to answering with a definitive failure.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, CoreError::Database(_) | CoreError::Cache(_) | CoreError::Timeout(_))
    }
}
