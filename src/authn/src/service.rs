//! Request authentication entry point

use crate::error::{AuthError, Result};
use crate::extract::{extract_bearer, DEFAULT_TOKEN_COOKIE};
use crate::tenant::{TenantContext, TenantResolver};
use crate::token::TokenValidator;
use tracing::{debug, instrument};

/// Validates credentials and builds the tenant context
pub struct AuthService {
    validator: TokenValidator,
    tenants: TenantResolver,
    cookie_name: String,
}

impl AuthService {
    pub fn new(validator: TokenValidator, tenants: TenantResolver) -> Self {
        Self {
            validator,
            tenants,
            cookie_name: DEFAULT_TOKEN_COOKIE.to_string(),
        }
    }

    /// Name of the fallback session cookie
    pub fn with_cookie_name(mut self, cookie_name: impl Into<String>) -> Self {
        self.cookie_name = cookie_name.into();
        self
    }

    pub fn cookie_name(&self) -> &str {
        &self.cookie_name
    }

    pub fn tenants(&self) -> &TenantResolver {
        &self.tenants
    }

    /// Validate a raw token and resolve the caller's tenant context
    #[instrument(skip_all)]
    pub async fn validate_request_auth(&self, raw_token: &str) -> Result<TenantContext> {
        let claims = self.validator.validate(raw_token).await?;
        let context = self.tenants.resolve(&claims).await?;
        debug!(
            user_id = %context.user_id,
            org_id = %context.organization_id,
            is_root = context.is_root,
            "Request authenticated"
        );
        Ok(context)
    }

    /// Extract the credential from header values, then validate it
    pub async fn authenticate(
        &self,
        authorization: Option<&str>,
        cookie_header: Option<&str>,
    ) -> Result<TenantContext> {
        let token = extract_bearer(authorization, cookie_header, &self.cookie_name)
            .ok_or(AuthError::MissingCredential)?;
        self.validate_request_auth(&token).await
    }

    /// Optional mode: any failure yields an anonymous caller
    pub async fn authenticate_optional(
        &self,
        authorization: Option<&str>,
        cookie_header: Option<&str>,
    ) -> Option<TenantContext> {
        match self.authenticate(authorization, cookie_header).await {
            Ok(context) => Some(context),
            Err(AuthError::MissingCredential) => None,
            Err(e) => {
                debug!(error = %e, "Optional authentication failed, continuing anonymously");
                None
            }
        }
    }
}
