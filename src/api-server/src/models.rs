use monkeys_authn::TenantContext;
use monkeys_authz::{Decision, RequestContext, SimulationCase, SimulationResult};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

/// Health check response
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
}

/// Error body returned by every failing endpoint
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
    pub status: u16,
}

/// Authorization check for the calling principal
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct AuthorizeBody {
    /// Action to perform (e.g. `iam:GetUser`)
    #[validate(length(min = 1, max = 256))]
    pub action: String,

    /// Resource name (e.g. `arn:monkeys:iam:org-1:user/123`)
    #[validate(length(min = 1, max = 2048))]
    pub resource: String,

    /// Extra condition attributes; `iam:*` keys are set by the server
    #[serde(default)]
    #[schema(value_type = Object)]
    pub context: RequestContext,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AuthorizeResponse {
    #[schema(value_type = String, example = "Allow")]
    pub decision: Decision,
    pub allowed: bool,
}

/// Candidate policy document with expected outcomes
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct SimulateBody {
    #[schema(value_type = Object)]
    pub policy: serde_json::Value,

    #[validate(length(min = 1, max = 500))]
    #[schema(value_type = Vec<Object>)]
    pub test_cases: Vec<SimulationCase>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SimulateResponse {
    #[schema(value_type = Vec<Object>)]
    pub results: Vec<SimulationResult>,
    pub passed: usize,
    pub total: usize,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PolicyResponse {
    pub policy_id: String,
    pub organization_id: String,
    #[schema(value_type = Object)]
    pub document: serde_json::Value,
}

/// Replacement list of allowed origins
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct UpdateOriginsBody {
    #[validate(length(max = 100))]
    pub origins: Vec<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OriginsResponse {
    pub organization_id: String,
    pub origins: Vec<String>,
}

/// Caller identity, when a valid credential was sent
#[derive(Debug, Serialize, ToSchema)]
pub struct MeResponse {
    pub authenticated: bool,
    #[schema(value_type = Option<Object>)]
    pub tenant: Option<TenantContext>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_authorize_body_validation() {
        let body: AuthorizeBody = serde_json::from_str(
            r#"{"action":"iam:GetUser","resource":"arn:monkeys:iam::user/1","context":{"mfa":true}}"#,
        )
        .unwrap();
        assert!(body.validate().is_ok());
        assert_eq!(body.context.len(), 1);

        let empty: AuthorizeBody = serde_json::from_str(r#"{"action":"","resource":"r"}"#).unwrap();
        assert!(empty.validate().is_err());
    }

    #[test]
    fn test_simulate_body_requires_cases() {
        let body: SimulateBody =
            serde_json::from_str(r#"{"policy":{"Statement":[]},"test_cases":[]}"#).unwrap();
        assert!(body.validate().is_err());
    }
}
