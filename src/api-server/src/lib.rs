//! HTTP surface for the Monkeys IAM authorization core
//!
//! Thin handlers over `monkeys-authz` and `monkeys-authn`, plus the pieces
//! that only make sense at the HTTP edge: request authentication
//! middleware, the authorization gate and dynamic CORS.

pub mod config;
pub mod cors;
pub mod error;
pub mod gate;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod server;
pub mod state;
pub mod stores;

pub use config::{Args, AuthConfig, Settings};
pub use cors::{OriginCache, OriginCacheConfig, OriginMatch};
pub use error::{ApiError, Result};
pub use gate::{AuthorizationGate, GateOutcome};
pub use server::{Server, ServerConfig};
pub use state::AppState;

/// API version
pub const API_VERSION: &str = "v1";
