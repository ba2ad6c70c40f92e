use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use monkeys_authn::AuthError;
use monkeys_authz::AuthzError;
use monkeys_core::CoreError;
use serde_json::json;
use tracing::{error, warn};

pub type Result<T> = std::result::Result<T, ApiError>;

/// Message for every authentication failure
pub const UNAUTHORIZED_MESSAGE: &str = "invalid or expired credential";

/// Message for every authorization denial
pub const FORBIDDEN_MESSAGE: &str = "forbidden";

/// Message when the authorization check itself failed
pub const CHECK_FAILED_MESSAGE: &str = "authorization check failed";

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Authentication failed; the cause is logged, never rendered
    #[error("Unauthorized: {0}")]
    Unauthorized(#[from] AuthError),

    #[error("Forbidden")]
    Forbidden,

    /// The policy evaluator or its store failed
    #[error("Authorization check failed: {0}")]
    AuthorizationFailed(String),

    #[error("Authorization error: {0}")]
    Authz(#[from] AuthzError),

    #[error("Store error: {0}")]
    Store(#[from] CoreError),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Internal server error: {0}")]
    InternalError(String),
}

impl From<validator::ValidationErrors> for ApiError {
    fn from(errors: validator::ValidationErrors) -> Self {
        ApiError::ValidationError(errors.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::Unauthorized(cause) => {
                warn!(cause = %cause, "Authentication rejected");
                (StatusCode::UNAUTHORIZED, UNAUTHORIZED_MESSAGE.to_string())
            }
            ApiError::Forbidden => (StatusCode::FORBIDDEN, FORBIDDEN_MESSAGE.to_string()),
            ApiError::AuthorizationFailed(cause) => {
                error!(cause = %cause, "Authorization check failed");
                (StatusCode::INTERNAL_SERVER_ERROR, CHECK_FAILED_MESSAGE.to_string())
            }
            ApiError::Authz(e) if e.is_malformed_policy() => (StatusCode::BAD_REQUEST, e.to_string()),
            ApiError::Authz(AuthzError::PolicyNotFound(id)) => {
                (StatusCode::NOT_FOUND, format!("policy not found: {}", id))
            }
            ApiError::Authz(AuthzError::InvalidInput(msg)) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Authz(e) => {
                error!(error = %e, "Authorization engine error");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal error".to_string())
            }
            ApiError::Store(CoreError::NotFound(what)) => {
                (StatusCode::NOT_FOUND, format!("not found: {}", what))
            }
            ApiError::Store(CoreError::Invalid(msg)) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Store(e) => {
                error!(error = %e, "Store error");
                (StatusCode::SERVICE_UNAVAILABLE, "dependency unavailable".to_string())
            }
            ApiError::ValidationError(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::InternalError(msg) => {
                error!(error = %msg, "Internal error");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal error".to_string())
            }
        };

        let body = Json(json!({
            "error": message,
            "status": status.as_u16(),
        }));

        (status, body).into_response()
    }
}
