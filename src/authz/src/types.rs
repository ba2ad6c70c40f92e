//! Core authorization types

use crate::condition::ConditionValue;
use monkeys_core::PrincipalType;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Context key holding the caller's source IP address
pub const CONTEXT_SOURCE_IP: &str = "iam:SourceIP";

/// Context key holding the caller's organization id
pub const CONTEXT_PRINCIPAL_ORG_ID: &str = "iam:PrincipalOrgID";

/// Context key holding the caller's principal id
pub const CONTEXT_PRINCIPAL_ID: &str = "iam:PrincipalId";

/// Context key flagging members of the root organization
pub const CONTEXT_IS_ROOT: &str = "iam:IsRoot";

/// Partition segment of every resource name
pub const RESOURCE_PARTITION: &str = "monkeys";

/// Service segment of every resource name
pub const RESOURCE_SERVICE: &str = "iam";

/// Outcome of a policy evaluation
///
/// `NotApplicable` means no statement matched. Enforcement treats it like
/// `Deny`, but it is reported separately: a deny-by-statement and a
/// deny-by-default have different audit meanings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Decision {
    Allow,
    Deny,
    NotApplicable,
}

impl Decision {
    /// Only an explicit `Allow` lets a request proceed
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allow)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Decision::Allow => "Allow",
            Decision::Deny => "Deny",
            Decision::NotApplicable => "NotApplicable",
        }
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Dynamic attributes supplied fresh with every evaluation call
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestContext {
    attributes: BTreeMap<String, ConditionValue>,
}

impl RequestContext {
    /// Create an empty context
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an attribute to the context
    pub fn with(mut self, key: impl Into<String>, value: impl Into<ConditionValue>) -> Self {
        self.insert(key, value);
        self
    }

    /// Insert or replace an attribute
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<ConditionValue>) {
        self.attributes.insert(key.into(), value.into());
    }

    /// Look up an attribute
    pub fn get(&self, key: &str) -> Option<&ConditionValue> {
        self.attributes.get(key)
    }

    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &ConditionValue)> {
        self.attributes.iter()
    }
}

/// Identity a policy set is attached to, scoped to one organization
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Principal {
    /// Principal identifier (user id, service account id, group id)
    pub id: String,

    /// Principal type
    #[serde(rename = "type")]
    pub principal_type: PrincipalType,

    /// Organization the policies are evaluated in
    pub org_id: String,
}

impl Principal {
    pub fn new(id: impl Into<String>, principal_type: PrincipalType, org_id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            principal_type,
            org_id: org_id.into(),
        }
    }

    /// Shorthand for a user principal
    pub fn user(id: impl Into<String>, org_id: impl Into<String>) -> Self {
        Self::new(id, PrincipalType::User, org_id)
    }
}

/// Authorization request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthorizeRequest {
    /// Who is making the request
    pub principal: Principal,

    /// What action is being performed (e.g. `iam:GetUser`)
    pub action: String,

    /// What resource is being accessed (a resource name)
    pub resource: String,

    /// Additional context (source IP, caller attributes)
    #[serde(default)]
    pub context: RequestContext,
}

/// Structured resource identifier
///
/// Renders as `arn:monkeys:iam:<org>:<type>/<id>`. An empty organization
/// renders as `arn:monkeys:iam::<type>/<id>` for global resources.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceName {
    pub org_id: String,
    pub resource_type: String,
    pub resource_id: String,
}

impl ResourceName {
    pub fn new(
        org_id: impl Into<String>,
        resource_type: impl Into<String>,
        resource_id: impl Into<String>,
    ) -> Self {
        Self {
            org_id: org_id.into(),
            resource_type: resource_type.into(),
            resource_id: resource_id.into(),
        }
    }

    /// Resource not scoped to any organization
    pub fn global(resource_type: impl Into<String>, resource_id: impl Into<String>) -> Self {
        Self::new("", resource_type, resource_id)
    }
}

impl fmt::Display for ResourceName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "arn:{}:{}:{}:{}/{}",
            RESOURCE_PARTITION, RESOURCE_SERVICE, self.org_id, self.resource_type, self.resource_id
        )
    }
}
