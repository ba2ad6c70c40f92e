//! Identity claims carried by access tokens

use serde::{Deserialize, Serialize};

/// Access token claims
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Service-specific user id
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub user_id: String,

    /// Standard subject; used when `user_id` is empty
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub sub: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub email: String,

    #[serde(default, alias = "org_id", skip_serializing_if = "String::is_empty")]
    pub organization_id: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub role: String,

    /// Session id, checked against the revocation store
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jti: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aud: Option<Audience>,

    /// Expiry, seconds since the epoch
    pub exp: i64,

    #[serde(default)]
    pub iat: i64,
}

/// `aud` is either one string or a list of strings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Audience {
    One(String),
    Many(Vec<String>),
}

impl Audience {
    pub fn contains(&self, audience: &str) -> bool {
        match self {
            Audience::One(value) => value == audience,
            Audience::Many(values) => values.iter().any(|value| value == audience),
        }
    }
}

impl From<&str> for Audience {
    fn from(value: &str) -> Self {
        Audience::One(value.to_string())
    }
}

impl Claims {
    /// User id, falling back to `sub`
    pub fn resolved_user_id(&self) -> Option<&str> {
        [self.user_id.as_str(), self.sub.as_str()]
            .into_iter()
            .map(str::trim)
            .find(|id| !id.is_empty())
    }

    pub fn organization_id(&self) -> Option<&str> {
        Some(self.organization_id.trim()).filter(|id| !id.is_empty())
    }

    /// Session id, ignoring empty values
    pub fn session_id(&self) -> Option<&str> {
        self.jti.as_deref().map(str::trim).filter(|id| !id.is_empty())
    }
}
