//! # Monkeys IAM Authentication
//!
//! Turns a bearer credential into a request-scoped [`TenantContext`]:
//!
//! 1. extract the token from the `Authorization` header or the session cookie
//! 2. verify signature and expiry ([`TokenValidator`])
//! 3. reject revoked sessions (fail-open when the revocation store is down)
//! 4. resolve user, organization, role and root membership ([`TenantResolver`])

pub mod claims;
pub mod error;
pub mod extract;
pub mod revocation;
pub mod service;
pub mod system_org;
pub mod tenant;
pub mod token;

// Re-export commonly used types
pub use claims::{Audience, Claims};
pub use error::{AuthError, Result};
pub use extract::{extract_bearer, DEFAULT_TOKEN_COOKIE};
pub use revocation::{RedisRevocationStore, DEFAULT_REVOCATION_PREFIX};
pub use service::AuthService;
pub use system_org::{SystemOrgConfig, SystemOrgResolver, DEFAULT_SYSTEM_ORG_SLUG};
pub use tenant::{TenantContext, TenantResolver, ADMIN_ROLES};
pub use token::{SigningKeys, TokenValidator, TokenValidatorConfig};
