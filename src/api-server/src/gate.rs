//! Authorization gate
//!
//! Evaluates the caller's effective policies for one action on one
//! resource. Only an explicit `Allow` proceeds; an evaluator failure is
//! reported as its own outcome and never as a grant.

use crate::error::ApiError;
use monkeys_authn::TenantContext;
use monkeys_authz::{
    Authorizer, AuthorizeRequest, Decision, Principal, RequestContext, ResourceName,
    CONTEXT_IS_ROOT, CONTEXT_PRINCIPAL_ID, CONTEXT_PRINCIPAL_ORG_ID, CONTEXT_SOURCE_IP,
};
use std::net::IpAddr;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

/// Result of a gate check
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateOutcome {
    Proceed,
    Forbidden,
    /// The evaluator or policy store failed
    CheckFailed(String),
}

#[derive(Clone)]
pub struct AuthorizationGate {
    authorizer: Arc<Authorizer>,
}

impl AuthorizationGate {
    pub fn new(authorizer: Arc<Authorizer>) -> Self {
        Self { authorizer }
    }

    /// Context attributes the server vouches for
    pub fn request_context(tenant: &TenantContext, source_ip: Option<IpAddr>) -> RequestContext {
        let mut context = RequestContext::new()
            .with(CONTEXT_PRINCIPAL_ORG_ID, tenant.organization_id.as_str())
            .with(CONTEXT_PRINCIPAL_ID, tenant.user_id.as_str())
            .with(CONTEXT_IS_ROOT, tenant.is_root);
        if let Some(ip) = source_ip {
            context.insert(CONTEXT_SOURCE_IP, ip.to_string());
        }
        context
    }

    /// Evaluate `action` on `resource` for the caller
    #[instrument(skip(self, tenant, source_ip), fields(user_id = %tenant.user_id, resource = %resource))]
    pub async fn check(
        &self,
        tenant: &TenantContext,
        action: &str,
        resource: &ResourceName,
        source_ip: Option<IpAddr>,
    ) -> GateOutcome {
        let request = AuthorizeRequest {
            principal: Principal::user(tenant.user_id.as_str(), tenant.organization_id.as_str()),
            action: action.to_string(),
            resource: resource.to_string(),
            context: Self::request_context(tenant, source_ip),
        };

        match self.authorizer.authorize(&request).await {
            Ok(Decision::Allow) => GateOutcome::Proceed,
            Ok(decision) => {
                debug!(%decision, "Gate denied request");
                GateOutcome::Forbidden
            }
            Err(e) => {
                warn!(error = %e, "Gate could not evaluate policies");
                GateOutcome::CheckFailed(e.to_string())
            }
        }
    }

    /// [`AuthorizationGate::check`] mapped onto handler errors
    pub async fn enforce(
        &self,
        tenant: &TenantContext,
        action: &str,
        resource: &ResourceName,
        source_ip: Option<IpAddr>,
    ) -> Result<(), ApiError> {
        match self.check(tenant, action, resource, source_ip).await {
            GateOutcome::Proceed => Ok(()),
            GateOutcome::Forbidden => Err(ApiError::Forbidden),
            GateOutcome::CheckFailed(cause) => Err(ApiError::AuthorizationFailed(cause)),
        }
    }
}
