//! Condition operand values

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A JSON-decoded condition operand or context attribute
///
/// Documents and request contexts arrive as JSON, so operands keep the
/// shape JSON gave them. Operators then coerce explicitly: most compare the
/// canonical string form, `Bool` compares booleans strictly when both sides
/// are booleans, and `NumericEquals` compares numbers as numbers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Value", into = "Value")]
pub enum ConditionValue {
    String(String),
    Number(f64),
    Bool(bool),
    List(Vec<ConditionValue>),
}

impl ConditionValue {
    /// Canonical string form used by the string operators.
    ///
    /// Integral numbers render without a fractional part (`1`, not `1.0`).
    /// Lists render as `[a b c]`.
    pub fn canonical(&self) -> String {
        match self {
            ConditionValue::String(s) => s.clone(),
            ConditionValue::Bool(b) => b.to_string(),
            ConditionValue::Number(n) => canonical_number(*n),
            ConditionValue::List(items) => {
                let parts: Vec<String> = items.iter().map(|item| item.canonical()).collect();
                format!("[{}]", parts.join(" "))
            }
        }
    }

    /// Numeric reading of the value: numbers as-is, strings if they parse as
    /// a finite number.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            ConditionValue::Number(n) if n.is_finite() => Some(*n),
            ConditionValue::String(s) => s.trim().parse::<f64>().ok().filter(|n| n.is_finite()),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ConditionValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn is_list(&self) -> bool {
        matches!(self, ConditionValue::List(_))
    }
}

fn canonical_number(n: f64) -> String {
    if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

impl TryFrom<Value> for ConditionValue {
    type Error = String;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        ConditionValue::try_from(&value)
    }
}

impl TryFrom<&Value> for ConditionValue {
    type Error = String;

    fn try_from(value: &Value) -> Result<Self, Self::Error> {
        match value {
            Value::String(s) => Ok(ConditionValue::String(s.clone())),
            Value::Bool(b) => Ok(ConditionValue::Bool(*b)),
            Value::Number(n) => n
                .as_f64()
                .map(ConditionValue::Number)
                .ok_or_else(|| format!("number {} is not representable", n)),
            Value::Array(items) => items
                .iter()
                .map(ConditionValue::try_from)
                .collect::<Result<Vec<_>, _>>()
                .map(ConditionValue::List),
            Value::Null => Err("null is not a valid condition value".to_string()),
            Value::Object(_) => Err("objects are not valid condition values".to_string()),
        }
    }
}

impl From<ConditionValue> for Value {
    fn from(value: ConditionValue) -> Self {
        match value {
            ConditionValue::String(s) => Value::String(s),
            ConditionValue::Bool(b) => Value::Bool(b),
            ConditionValue::Number(n) => serde_json::Number::from_f64(n)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            ConditionValue::List(items) => Value::Array(items.into_iter().map(Value::from).collect()),
        }
    }
}

impl From<&str> for ConditionValue {
    fn from(s: &str) -> Self {
        ConditionValue::String(s.to_string())
    }
}

impl From<String> for ConditionValue {
    fn from(s: String) -> Self {
        ConditionValue::String(s)
    }
}

impl From<bool> for ConditionValue {
    fn from(b: bool) -> Self {
        ConditionValue::Bool(b)
    }
}

impl From<f64> for ConditionValue {
    fn from(n: f64) -> Self {
        ConditionValue::Number(n)
    }
}

impl From<i64> for ConditionValue {
    fn from(n: i64) -> Self {
        ConditionValue::Number(n as f64)
    }
}

impl From<Vec<ConditionValue>> for ConditionValue {
    fn from(items: Vec<ConditionValue>) -> Self {
        ConditionValue::List(items)
    }
}
