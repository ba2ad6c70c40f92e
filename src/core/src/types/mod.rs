//! Shared identifier types

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Organization (tenant) identifier
pub type OrgId = String;

/// User identifier for authentication
pub type UserId = String;

/// Session identifier (the token's `jti`)
pub type SessionId = String;

/// Kind of identity a policy set is attached to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrincipalType {
    /// Human user
    User,
    /// Non-human service account
    ServiceAccount,
    /// Group of users
    Group,
}

impl PrincipalType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PrincipalType::User => "user",
            PrincipalType::ServiceAccount => "service_account",
            PrincipalType::Group => "group",
        }
    }
}

impl fmt::Display for PrincipalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PrincipalType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(PrincipalType::User),
            "service_account" | "service-account" => Ok(PrincipalType::ServiceAccount),
            "group" => Ok(PrincipalType::Group),
            other => Err(format!("unknown principal type: {}", other)),
        }
    }
}
