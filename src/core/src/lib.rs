//! # Monkeys Core
//!
//! Shared types, traits, and error handling for the Monkeys IAM backend.
//! The authorization and authentication crates both depend on this package,
//! so the contracts they consume from the outside world (organization data,
//! session revocation state) live here rather than in either of them.

pub mod error;
pub mod timeout;
pub mod traits;
pub mod types;

// Re-export commonly used types
pub use error::{CoreError, Result};
pub use timeout::with_timeout;
pub use traits::{
    InMemoryOrganizationStore, InMemoryRevocationStore, OrganizationStore, RevocationStore,
};
pub use types::{OrgId, PrincipalType, SessionId, UserId};
