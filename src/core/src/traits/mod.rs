//! Store contracts consumed by the authorization core
//!
//! The core never owns persistence. It reads organization data and session
//! revocation state through these traits; production implementations live in
//! the crates that own the backing technology (PostgreSQL, Redis), and the
//! in-memory implementations here serve tests and single-node setups.

pub mod organization;
pub mod revocation;

// Re-export commonly used traits
pub use organization::{InMemoryOrganizationStore, OrganizationStore};
pub use revocation::{InMemoryRevocationStore, RevocationStore};
