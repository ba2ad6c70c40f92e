//! # Monkeys IAM Authorization Engine
//!
//! Statement-based policy evaluation for the Monkeys IAM backend.
//!
//! ## Features
//!
//! - **Deny-override** evaluation across every statement of a principal's
//!   effective policy set
//! - **Wildcard matching** (`*`, `?`) for actions, resources and `StringLike`
//! - **Condition operators** over a typed request context
//! - **Effective-policy cache** with TTL and explicit invalidation
//! - **Simulation** of candidate documents through the live evaluator
//!
//! ## Example
//!
//! ```rust
//! use monkeys_authz::{evaluate_json, Decision, RequestContext};
//!
//! let document = r#"{"Statement":[{"Effect":"Allow","Action":"iam:GetUser","Resource":"arn:monkeys:iam::user/123"}]}"#;
//! let ctx = RequestContext::new();
//!
//! let decision = evaluate_json(document, "iam:GetUser", "arn:monkeys:iam::user/123", &ctx).unwrap();
//! assert_eq!(decision, Decision::Allow);
//!
//! let decision = evaluate_json(document, "iam:DeleteUser", "arn:monkeys:iam::user/123", &ctx).unwrap();
//! assert_eq!(decision, Decision::NotApplicable);
//! ```

pub mod condition;
pub mod engine;
pub mod error;
pub mod policy;
pub mod simulation;
pub mod types;
pub mod wildcard;

// Re-export commonly used types
pub use condition::{ConditionBlock, ConditionOperator, ConditionValue};
pub use engine::{
    evaluate, evaluate_documents, evaluate_json, evaluate_value, explain, Authorizer,
    AuthorizerConfig, EngineMetrics, Evaluation, MatchedStatement, PolicyCacheConfig,
};
pub use error::{AuthzError, Result};
pub use policy::{Effect, InMemoryPolicyStore, PolicyDocument, PolicyStore, Statement};
pub use simulation::{simulate, SimulationCase, SimulationResult};
pub use types::{
    AuthorizeRequest, Decision, Principal, RequestContext, ResourceName, CONTEXT_IS_ROOT,
    CONTEXT_PRINCIPAL_ID, CONTEXT_PRINCIPAL_ORG_ID, CONTEXT_SOURCE_IP,
};
pub use wildcard::match_wildcard;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
