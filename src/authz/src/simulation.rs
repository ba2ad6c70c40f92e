//! Policy simulation
//!
//! Runs authoring-time test cases through the same evaluator used for live
//! enforcement. A case passes only when the actual decision equals the
//! expected one exactly, so `Deny` and `NotApplicable` are never
//! interchangeable here.

use crate::engine::evaluator::explain;
use crate::engine::MatchedStatement;
use crate::policy::PolicyDocument;
use crate::types::{Decision, Principal, RequestContext};
use serde::{Deserialize, Serialize};

/// One expected outcome for a candidate document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationCase {
    /// Informational; the document under test is evaluated as-is
    pub principal: Principal,
    pub resource: String,
    pub action: String,
    pub expected: Decision,
    #[serde(default)]
    pub context: RequestContext,
}

/// Outcome of one simulation case
#[derive(Debug, Clone, Serialize)]
pub struct SimulationResult {
    #[serde(rename = "test_case")]
    pub case: SimulationCase,
    pub actual: Decision,
    pub passed: bool,
    /// Statements that applied, for debugging failing cases
    pub matched: Vec<MatchedStatement>,
}

/// Evaluate each case against `document`
pub fn simulate(document: &PolicyDocument, cases: &[SimulationCase]) -> Vec<SimulationResult> {
    cases
        .iter()
        .map(|case| {
            let evaluation = explain(
                std::slice::from_ref(document),
                &case.action,
                &case.resource,
                &case.context,
            );
            SimulationResult {
                case: case.clone(),
                actual: evaluation.decision,
                passed: evaluation.decision == case.expected,
                matched: evaluation.matched,
            }
        })
        .collect()
}

/// Number of passing results
pub fn passed_count(results: &[SimulationResult]) -> usize {
    results.iter().filter(|r| r.passed).count()
}
