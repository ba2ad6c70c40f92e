//! Condition evaluation
//!
//! A condition block maps operator names to maps of context key to expected
//! value:
//!
//! ```json
//! {
//!   "IpAddress":    { "iam:SourceIP": "192.168.1.0/24" },
//!   "StringEquals": { "iam:PrincipalOrgID": "org-1" }
//! }
//! ```
//!
//! Every operator and every key within an operator must be satisfied. A key
//! missing from the request context is never satisfied. Evaluation is pure:
//! no I/O, no shared state.

mod value;

pub use value::ConditionValue;

use crate::error::{AuthzError, Result};
use crate::types::RequestContext;
use crate::wildcard::match_wildcard;
use ipnet::IpNet;
use serde_json::{Map, Value};
use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;
use tracing::trace;

/// Supported condition operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConditionOperator {
    StringEquals,
    StringNotEquals,
    StringEqualsIgnoreCase,
    StringLike,
    Bool,
    NumericEquals,
    IpAddress,
}

impl ConditionOperator {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConditionOperator::StringEquals => "StringEquals",
            ConditionOperator::StringNotEquals => "StringNotEquals",
            ConditionOperator::StringEqualsIgnoreCase => "StringEqualsIgnoreCase",
            ConditionOperator::StringLike => "StringLike",
            ConditionOperator::Bool => "Bool",
            ConditionOperator::NumericEquals => "NumericEquals",
            ConditionOperator::IpAddress => "IpAddress",
        }
    }

    /// Check one (actual, expected) pair
    pub fn test(&self, actual: &ConditionValue, expected: &ConditionValue) -> bool {
        match self {
            ConditionOperator::StringEquals => actual.canonical() == expected.canonical(),
            ConditionOperator::StringNotEquals => actual.canonical() != expected.canonical(),
            ConditionOperator::StringEqualsIgnoreCase => {
                actual.canonical().to_lowercase() == expected.canonical().to_lowercase()
            }
            ConditionOperator::StringLike => {
                match_wildcard(&expected.canonical(), &actual.canonical())
            }
            ConditionOperator::Bool => match (actual.as_bool(), expected.as_bool()) {
                (Some(a), Some(e)) => a == e,
                _ => actual.canonical() == expected.canonical(),
            },
            ConditionOperator::NumericEquals => numeric_equals(actual, expected),
            ConditionOperator::IpAddress => ip_address_matches(actual, expected),
        }
    }
}

impl fmt::Display for ConditionOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConditionOperator {
    type Err = AuthzError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "StringEquals" => Ok(ConditionOperator::StringEquals),
            "StringNotEquals" => Ok(ConditionOperator::StringNotEquals),
            "StringEqualsIgnoreCase" => Ok(ConditionOperator::StringEqualsIgnoreCase),
            "StringLike" => Ok(ConditionOperator::StringLike),
            "Bool" => Ok(ConditionOperator::Bool),
            "NumericEquals" => Ok(ConditionOperator::NumericEquals),
            "IpAddress" => Ok(ConditionOperator::IpAddress),
            other => Err(AuthzError::UnsupportedOperator(other.to_string())),
        }
    }
}

/// Numbers compare as numbers when both sides read as finite numbers, so
/// `1` equals `1.0`. Anything else falls back to canonical string equality.
fn numeric_equals(actual: &ConditionValue, expected: &ConditionValue) -> bool {
    match (actual.as_number(), expected.as_number()) {
        (Some(a), Some(e)) => a == e,
        _ => actual.canonical() == expected.canonical(),
    }
}

/// CIDR containment when the expected value has a prefix length, exact
/// address equality otherwise. Anything unparsable is not satisfied.
fn ip_address_matches(actual: &ConditionValue, expected: &ConditionValue) -> bool {
    let (ConditionValue::String(actual), ConditionValue::String(expected)) = (actual, expected)
    else {
        return false;
    };

    let Ok(addr) = actual.trim().parse::<IpAddr>() else {
        return false;
    };

    let expected = expected.trim();
    if expected.contains('/') {
        match expected.parse::<IpNet>() {
            Ok(net) => net.contains(&addr),
            Err(_) => false,
        }
    } else {
        match expected.parse::<IpAddr>() {
            Ok(expected) => expected == addr,
            Err(_) => false,
        }
    }
}

/// One (operator, key, expected) triple of a condition block
#[derive(Debug, Clone, PartialEq)]
pub struct ConditionClause {
    pub operator: ConditionOperator,
    pub key: String,
    pub expected: ConditionValue,
}

impl ConditionClause {
    /// A key absent from the context fails closed
    pub fn is_satisfied(&self, ctx: &RequestContext) -> bool {
        match ctx.get(&self.key) {
            Some(actual) => self.operator.test(actual, &self.expected),
            None => false,
        }
    }
}

/// A parsed, validated condition block
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConditionBlock {
    clauses: Vec<ConditionClause>,
}

impl ConditionBlock {
    /// Parse a condition block from its JSON form
    ///
    /// Fails with `MalformedCondition` when the value is not a map of maps
    /// or an expected value is `null` or an object, and with
    /// `UnsupportedOperator` for unknown operator names.
    pub fn from_json(value: &Value) -> Result<Self> {
        let operators = value.as_object().ok_or_else(|| {
            AuthzError::MalformedCondition(format!(
                "condition must be an object of operators, got {}",
                json_kind(value)
            ))
        })?;

        let mut clauses = Vec::new();
        for (name, pairs) in operators {
            let operator = ConditionOperator::from_str(name)?;
            let pairs = pairs.as_object().ok_or_else(|| {
                AuthzError::MalformedCondition(format!(
                    "operator {} must map context keys to values, got {}",
                    name,
                    json_kind(pairs)
                ))
            })?;

            for (key, expected) in pairs {
                let expected = ConditionValue::try_from(expected).map_err(|e| {
                    AuthzError::MalformedCondition(format!("{}.{}: {}", name, key, e))
                })?;
                clauses.push(ConditionClause {
                    operator,
                    key: key.clone(),
                    expected,
                });
            }
        }

        Ok(Self { clauses })
    }

    /// AND over all clauses, short-circuiting on the first failure
    pub fn evaluate(&self, ctx: &RequestContext) -> bool {
        for clause in &self.clauses {
            if !clause.is_satisfied(ctx) {
                trace!(
                    operator = %clause.operator,
                    key = %clause.key,
                    "condition clause not satisfied"
                );
                return false;
            }
        }
        true
    }

    pub fn clauses(&self) -> &[ConditionClause] {
        &self.clauses
    }

    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    /// Render back to the operator-map JSON form
    pub fn to_json(&self) -> Value {
        let mut operators = Map::new();
        for clause in &self.clauses {
            let entry = operators
                .entry(clause.operator.as_str().to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            if let Value::Object(pairs) = entry {
                pairs.insert(clause.key.clone(), Value::from(clause.expected.clone()));
            }
        }
        Value::Object(operators)
    }
}

/// Evaluate a raw condition against a request context
///
/// `None` (and JSON `null`) is always satisfied.
pub fn evaluate(condition: Option<&Value>, ctx: &RequestContext) -> Result<bool> {
    match condition {
        None | Some(Value::Null) => Ok(true),
        Some(value) => Ok(ConditionBlock::from_json(value)?.evaluate(ctx)),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
