//! Error types for authentication

use thiserror::Error;

/// Authentication errors
///
/// Variants carry detail for logs. HTTP callers must collapse every variant
/// into one generic "invalid or expired credential" response.
#[derive(Debug, Error)]
pub enum AuthError {
    /// No bearer token in the header or the fallback cookie
    #[error("Missing credential")]
    MissingCredential,

    /// Malformed token, bad signature, wrong issuer or audience
    #[error("Invalid token: {0}")]
    InvalidToken(String),

    #[error("Token expired")]
    TokenExpired,

    /// The token's session id is in the revocation store
    #[error("Token revoked")]
    TokenRevoked,

    /// Declared algorithm has no configured verification key
    #[error("Unsupported signing method: {0}")]
    UnsupportedSigningMethod(String),

    /// Claims lack a user id or organization id
    #[error("Incomplete auth context: {0}")]
    IncompleteAuthContext(String),

    /// Invalid key material or missing keys at startup
    #[error("Configuration error: {0}")]
    Configuration(String),
}

/// Result type for authentication operations
pub type Result<T> = std::result::Result<T, AuthError>;
