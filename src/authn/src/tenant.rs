//! Request-scoped tenant context
//!
//! `TenantContext` is built once per request from validated claims and is
//! immutable afterwards. Its three capability queries are the only place
//! organization scoping rules are written down; handlers call them instead
//! of comparing organization ids themselves.

use crate::claims::Claims;
use crate::error::{AuthError, Result};
use crate::system_org::SystemOrgResolver;
use monkeys_core::{OrgId, SessionId, UserId};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Roles that may administer their own organization
pub const ADMIN_ROLES: [&str; 2] = ["admin", "owner"];

/// Resolved identity and organization facts for one request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenantContext {
    pub user_id: UserId,
    pub email: String,
    pub organization_id: OrgId,
    pub role: String,
    pub session_id: Option<SessionId>,
    /// Member of the system organization
    pub is_root: bool,
}

impl TenantContext {
    /// Whether the role grants administration of the caller's own org
    pub fn is_admin(&self) -> bool {
        ADMIN_ROLES
            .iter()
            .any(|role| self.role.trim().eq_ignore_ascii_case(role))
    }

    /// Root, or the caller's own organization
    pub fn can_access_org(&self, target_org_id: &str) -> bool {
        self.is_root || self.organization_id == target_org_id
    }

    /// Root, or an admin of the target organization
    pub fn can_admin_org(&self, target_org_id: &str) -> bool {
        self.is_root || (self.organization_id == target_org_id && self.is_admin())
    }

    /// Organization filter for list queries; `None` means unscoped (root)
    pub fn org_filter(&self) -> Option<&str> {
        if self.is_root {
            None
        } else {
            Some(&self.organization_id)
        }
    }
}

/// Builds tenant contexts from validated claims
pub struct TenantResolver {
    system_org: Arc<SystemOrgResolver>,
}

impl TenantResolver {
    pub fn new(system_org: Arc<SystemOrgResolver>) -> Self {
        Self { system_org }
    }

    /// Requires a user id (or subject) and an organization id
    pub async fn resolve(&self, claims: &Claims) -> Result<TenantContext> {
        let user_id = claims
            .resolved_user_id()
            .ok_or_else(|| AuthError::IncompleteAuthContext("token carries no user id".to_string()))?;
        let organization_id = claims.organization_id().ok_or_else(|| {
            AuthError::IncompleteAuthContext("token carries no organization id".to_string())
        })?;

        let is_root = self.system_org.is_system_org(organization_id).await;

        Ok(TenantContext {
            user_id: user_id.to_string(),
            email: claims.email.clone(),
            organization_id: organization_id.to_string(),
            role: claims.role.clone(),
            session_id: claims.session_id().map(str::to_string),
            is_root,
        })
    }

    pub fn system_org(&self) -> &Arc<SystemOrgResolver> {
        &self.system_org
    }
}
