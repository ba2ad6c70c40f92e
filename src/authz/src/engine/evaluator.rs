//! Deny-override policy evaluation
//!
//! Every statement of every document is tested against the action, the
//! resource and the request context. Among the statements that apply, any
//! `Deny` wins; otherwise any `Allow` allows; otherwise the decision is
//! `NotApplicable`. Statement order never changes the outcome.

use crate::error::Result;
use crate::policy::{Effect, PolicyDocument, Statement};
use crate::types::{Decision, RequestContext};
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

/// A statement that applied during an evaluation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MatchedStatement {
    /// Index of the document within the evaluated set
    pub document: usize,
    /// Index of the statement within its document
    pub statement: usize,
    pub sid: Option<String>,
    pub effect: Effect,
}

/// Decision plus the statements that produced it
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Evaluation {
    pub decision: Decision,
    pub matched: Vec<MatchedStatement>,
}

/// Evaluate a single document
pub fn evaluate(
    document: &PolicyDocument,
    action: &str,
    resource: &str,
    ctx: &RequestContext,
) -> Decision {
    evaluate_documents(std::slice::from_ref(document), action, resource, ctx)
}

/// Evaluate the union of statements across a set of documents
///
/// Stops at the first applicable `Deny`.
pub fn evaluate_documents(
    documents: &[PolicyDocument],
    action: &str,
    resource: &str,
    ctx: &RequestContext,
) -> Decision {
    let mut allowed = false;

    for statement in documents.iter().flat_map(|doc| doc.statements.iter()) {
        if !statement.applies(action, resource, ctx) {
            continue;
        }
        match statement.effect {
            Effect::Deny => {
                debug!(sid = ?statement.sid, action, resource, "explicit deny");
                return Decision::Deny;
            }
            Effect::Allow => allowed = true,
        }
    }

    if allowed {
        Decision::Allow
    } else {
        Decision::NotApplicable
    }
}

/// Parse a raw JSON document and evaluate it
///
/// Malformed documents and conditions are errors, never a decision.
pub fn evaluate_json(
    document: &str,
    action: &str,
    resource: &str,
    ctx: &RequestContext,
) -> Result<Decision> {
    let document = PolicyDocument::parse(document)?;
    Ok(evaluate(&document, action, resource, ctx))
}

/// Same as [`evaluate_json`] for an already-decoded JSON value
pub fn evaluate_value(
    document: &Value,
    action: &str,
    resource: &str,
    ctx: &RequestContext,
) -> Result<Decision> {
    let document = PolicyDocument::from_value(document)?;
    Ok(evaluate(&document, action, resource, ctx))
}

/// Evaluate and report every applicable statement
///
/// Produces the same decision as [`evaluate_documents`]; it only keeps
/// going past the first deny to collect the full trace.
pub fn explain(
    documents: &[PolicyDocument],
    action: &str,
    resource: &str,
    ctx: &RequestContext,
) -> Evaluation {
    let matched: Vec<MatchedStatement> = documents
        .iter()
        .enumerate()
        .flat_map(|(doc_idx, doc)| {
            doc.statements
                .iter()
                .enumerate()
                .map(move |(stmt_idx, statement)| (doc_idx, stmt_idx, statement))
        })
        .filter(|(_, _, statement)| statement.applies(action, resource, ctx))
        .map(|(document, statement, s): (usize, usize, &Statement)| MatchedStatement {
            document,
            statement,
            sid: s.sid.clone(),
            effect: s.effect,
        })
        .collect();

    let decision = if matched.iter().any(|m| m.effect == Effect::Deny) {
        Decision::Deny
    } else if matched.iter().any(|m| m.effect == Effect::Allow) {
        Decision::Allow
    } else {
        Decision::NotApplicable
    };

    Evaluation { decision, matched }
}
