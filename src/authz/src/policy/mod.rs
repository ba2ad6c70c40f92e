//! Policy documents and storage
//!
//! A policy document is a JSON object holding a list of statements:
//!
//! ```json
//! {
//!   "Version": "2012-10-17",
//!   "Statement": [
//!     {
//!       "Sid": "ReadUsers",
//!       "Effect": "Allow",
//!       "Action": ["iam:GetUser", "iam:ListUsers"],
//!       "Resource": "arn:monkeys:iam:org-1:user/*",
//!       "Condition": { "IpAddress": { "iam:SourceIP": "10.0.0.0/8" } }
//!     }
//!   ]
//! }
//! ```
//!
//! `Action` and `Resource` accept a single string or a list. A statement
//! without them matches nothing.

mod store;

#[cfg(feature = "postgres")]
pub mod postgres;

pub use store::{InMemoryPolicyStore, PolicyStore};

#[cfg(feature = "postgres")]
pub use postgres::PostgresPolicyStore;

use crate::condition::ConditionBlock;
use crate::error::{AuthzError, Result};
use crate::types::RequestContext;
use crate::wildcard::match_any;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;
use std::fmt;

/// Policy language version assumed when a document omits `Version`
pub const DEFAULT_POLICY_VERSION: &str = "2012-10-17";

/// Statement effect
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Effect {
    #[serde(alias = "allow", alias = "ALLOW")]
    Allow,
    #[serde(alias = "deny", alias = "DENY")]
    Deny,
}

impl fmt::Display for Effect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Effect::Allow => f.write_str("Allow"),
            Effect::Deny => f.write_str("Deny"),
        }
    }
}

/// One allow/deny rule
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Statement {
    /// Optional statement id, reported in evaluation traces
    #[serde(rename = "Sid", skip_serializing_if = "Option::is_none")]
    pub sid: Option<String>,

    #[serde(rename = "Effect")]
    pub effect: Effect,

    /// Action patterns; empty matches nothing
    #[serde(rename = "Action")]
    pub actions: Vec<String>,

    /// Resource patterns; empty matches nothing
    #[serde(rename = "Resource")]
    pub resources: Vec<String>,

    #[serde(
        rename = "Condition",
        skip_serializing_if = "Option::is_none",
        serialize_with = "serialize_condition"
    )]
    pub condition: Option<ConditionBlock>,
}

impl Statement {
    pub fn allow(actions: &[&str], resources: &[&str]) -> Self {
        Self::with_effect(Effect::Allow, actions, resources)
    }

    pub fn deny(actions: &[&str], resources: &[&str]) -> Self {
        Self::with_effect(Effect::Deny, actions, resources)
    }

    fn with_effect(effect: Effect, actions: &[&str], resources: &[&str]) -> Self {
        Self {
            sid: None,
            effect,
            actions: actions.iter().map(|a| a.to_string()).collect(),
            resources: resources.iter().map(|r| r.to_string()).collect(),
            condition: None,
        }
    }

    pub fn with_sid(mut self, sid: impl Into<String>) -> Self {
        self.sid = Some(sid.into());
        self
    }

    /// Attach a condition given in its JSON form
    pub fn with_condition(mut self, condition: &Value) -> Result<Self> {
        self.condition = Some(ConditionBlock::from_json(condition)?);
        Ok(self)
    }

    /// Whether the action and resource both match this statement's patterns
    pub fn matches(&self, action: &str, resource: &str) -> bool {
        match_any(&self.actions, action) && match_any(&self.resources, resource)
    }

    /// Whether the statement matches and its condition holds
    pub fn applies(&self, action: &str, resource: &str, ctx: &RequestContext) -> bool {
        if !self.matches(action, resource) {
            return false;
        }
        match &self.condition {
            Some(condition) => condition.evaluate(ctx),
            None => true,
        }
    }
}

fn serialize_condition<S>(condition: &Option<ConditionBlock>, serializer: S) -> std::result::Result<S::Ok, S::Error>
where
    S: Serializer,
{
    match condition {
        Some(block) => block.to_json().serialize(serializer),
        None => serializer.serialize_none(),
    }
}

/// A parsed and validated policy document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawPolicyDocument")]
pub struct PolicyDocument {
    #[serde(rename = "Version")]
    pub version: String,

    #[serde(rename = "Statement")]
    pub statements: Vec<Statement>,
}

impl PolicyDocument {
    pub fn new(statements: Vec<Statement>) -> Self {
        Self {
            version: DEFAULT_POLICY_VERSION.to_string(),
            statements,
        }
    }

    /// Parse a document from JSON text
    ///
    /// Invalid JSON or a wrong shape is a `ParseError`. Condition problems
    /// surface as `MalformedCondition` or `UnsupportedOperator`.
    pub fn parse(json: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(json)
            .map_err(|e| AuthzError::ParseError(format!("invalid policy JSON: {}", e)))?;
        Self::from_value(&value)
    }

    /// Parse a document from an already-decoded JSON value
    pub fn from_value(value: &Value) -> Result<Self> {
        let raw: RawPolicyDocument = serde_json::from_value(value.clone())
            .map_err(|e| AuthzError::ParseError(format!("invalid policy document: {}", e)))?;
        Self::try_from(raw)
    }

    pub fn to_json(&self) -> Value {
        // Serializing plain strings and maps cannot fail
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

/// Accept one value or a list of values
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum OneOrMany<T> {
    One(T),
    Many(Vec<T>),
}

impl<T> OneOrMany<T> {
    fn into_vec(self) -> Vec<T> {
        match self {
            OneOrMany::One(item) => vec![item],
            OneOrMany::Many(items) => items,
        }
    }
}

impl<T> Default for OneOrMany<T> {
    fn default() -> Self {
        OneOrMany::Many(Vec::new())
    }
}

/// Wire shape of a policy document before validation
#[derive(Debug, Deserialize)]
struct RawPolicyDocument {
    #[serde(rename = "Version", alias = "version", default)]
    version: Option<String>,

    #[serde(rename = "Statement", alias = "statement", alias = "statements")]
    statements: OneOrMany<RawStatement>,
}

#[derive(Debug, Deserialize)]
struct RawStatement {
    #[serde(rename = "Sid", alias = "sid", default)]
    sid: Option<String>,

    #[serde(rename = "Effect", alias = "effect")]
    effect: Effect,

    #[serde(rename = "Action", alias = "action", alias = "actions", default)]
    actions: OneOrMany<String>,

    #[serde(rename = "Resource", alias = "resource", alias = "resources", default)]
    resources: OneOrMany<String>,

    #[serde(rename = "Condition", alias = "condition", default)]
    condition: Option<Value>,
}

impl TryFrom<RawStatement> for Statement {
    type Error = AuthzError;

    fn try_from(raw: RawStatement) -> Result<Self> {
        let condition = match raw.condition {
            None | Some(Value::Null) => None,
            Some(value) => Some(ConditionBlock::from_json(&value)?),
        };

        Ok(Statement {
            sid: raw.sid,
            effect: raw.effect,
            actions: raw.actions.into_vec(),
            resources: raw.resources.into_vec(),
            condition,
        })
    }
}

impl TryFrom<RawPolicyDocument> for PolicyDocument {
    type Error = AuthzError;

    fn try_from(raw: RawPolicyDocument) -> Result<Self> {
        let statements = raw
            .statements
            .into_vec()
            .into_iter()
            .map(Statement::try_from)
            .collect::<Result<Vec<_>>>()?;

        Ok(PolicyDocument {
            version: raw.version.unwrap_or_else(|| DEFAULT_POLICY_VERSION.to_string()),
            statements,
        })
    }
}
