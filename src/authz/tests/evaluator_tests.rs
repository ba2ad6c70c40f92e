//! Policy evaluator tests
//!
//! End-to-end decisions over JSON documents: wildcard matching, condition
//! gating, deny-override precedence and malformed input handling.

use monkeys_authz::{
    evaluate, evaluate_documents, evaluate_json, evaluate_value, match_wildcard, AuthzError,
    Decision, PolicyDocument, RequestContext, Statement, CONTEXT_SOURCE_IP,
};
use proptest::prelude::*;
use serde_json::json;

const USER_123: &str = "arn:monkeys:iam::user/123";

fn ip_gated_document() -> serde_json::Value {
    json!({
        "Version": "2012-10-17",
        "Statement": [{
            "Effect": "Allow",
            "Action": "*",
            "Resource": "*",
            "Condition": {"IpAddress": {"iam:SourceIP": "192.168.1.0/24"}}
        }]
    })
}

// ============================================================================
// SCENARIOS
// ============================================================================

#[test]
fn test_get_user_scenario() {
    let document =
        r#"{"Statement":[{"Effect":"Allow","Action":"iam:GetUser","Resource":"arn:monkeys:iam::user/123"}]}"#;
    let ctx = RequestContext::new();

    assert_eq!(
        evaluate_json(document, "iam:GetUser", USER_123, &ctx).unwrap(),
        Decision::Allow
    );
    assert_eq!(
        evaluate_json(document, "iam:DeleteUser", USER_123, &ctx).unwrap(),
        Decision::NotApplicable
    );
}

#[test]
fn test_wildcard_cases() {
    assert!(match_wildcard("iam:*", "iam:GetUser"));
    assert!(!match_wildcard("iam:*", "auth:Login"));
    assert!(match_wildcard("arn:monkeys:iam::user/???", USER_123));
    assert!(!match_wildcard("arn:monkeys:iam::user/??", USER_123));
}

#[test]
fn test_wildcard_resource_in_document() {
    let document = r#"{"Statement":[{"Effect":"Allow","Action":"iam:Get*","Resource":"arn:monkeys:iam:org-1:user/*"}]}"#;
    let ctx = RequestContext::new();

    assert_eq!(
        evaluate_json(document, "iam:GetUser", "arn:monkeys:iam:org-1:user/42", &ctx).unwrap(),
        Decision::Allow
    );
    assert_eq!(
        evaluate_json(document, "iam:GetUser", "arn:monkeys:iam:org-2:user/42", &ctx).unwrap(),
        Decision::NotApplicable
    );
}

// ============================================================================
// CONDITION GATING
// ============================================================================

#[test]
fn test_ip_condition_gates_statement() {
    let document = ip_gated_document();

    let inside = RequestContext::new().with(CONTEXT_SOURCE_IP, "192.168.1.50");
    assert_eq!(
        evaluate_value(&document, "iam:GetUser", USER_123, &inside).unwrap(),
        Decision::Allow
    );

    let outside = RequestContext::new().with(CONTEXT_SOURCE_IP, "10.0.0.1");
    assert_eq!(
        evaluate_value(&document, "iam:GetUser", USER_123, &outside).unwrap(),
        Decision::NotApplicable
    );
}

#[test]
fn test_missing_context_key_fails_closed() {
    let document = ip_gated_document();
    let ctx = RequestContext::new().with("unrelated", "value");

    let decision = evaluate_value(&document, "iam:GetUser", USER_123, &ctx).unwrap();
    assert_eq!(decision, Decision::NotApplicable);
}

#[test]
fn test_conditional_deny_only_applies_when_condition_holds() {
    let document = json!({"Statement": [
        {"Effect": "Allow", "Action": "iam:*", "Resource": "*"},
        {
            "Effect": "Deny", "Action": "iam:*", "Resource": "*",
            "Condition": {"Bool": {"iam:IsRoot": false}, "StringNotEquals": {"mfa": "present"}}
        }
    ]});

    let with_mfa = RequestContext::new().with("iam:IsRoot", false).with("mfa", "present");
    assert_eq!(
        evaluate_value(&document, "iam:ListUsers", "*", &with_mfa).unwrap(),
        Decision::Allow
    );

    let without_mfa = RequestContext::new().with("iam:IsRoot", false).with("mfa", "absent");
    assert_eq!(
        evaluate_value(&document, "iam:ListUsers", "*", &without_mfa).unwrap(),
        Decision::Deny
    );
}

/// NumericEquals compares numeric values, so integer and float spellings of
/// the same number are equal. Non-numeric text falls back to string equality.
#[test]
fn test_numeric_equals_documented_behavior() {
    let document = json!({"Statement": [{
        "Effect": "Allow", "Action": "*", "Resource": "*",
        "Condition": {"NumericEquals": {"tier": 1}}
    }]});

    for tier in [json!(1), json!(1.0), json!("1"), json!("1.0")] {
        let ctx: RequestContext = serde_json::from_value(json!({"tier": tier})).unwrap();
        assert_eq!(
            evaluate_value(&document, "a", "r", &ctx).unwrap(),
            Decision::Allow,
            "tier = {}",
            tier
        );
    }

    let ctx = RequestContext::new().with("tier", "gold");
    assert_eq!(evaluate_value(&document, "a", "r", &ctx).unwrap(), Decision::NotApplicable);
}

// ============================================================================
// MALFORMED INPUT
// ============================================================================

#[test]
fn test_malformed_documents_are_errors_not_decisions() {
    let ctx = RequestContext::new();

    let err = evaluate_json("not json", "a", "r", &ctx).unwrap_err();
    assert!(matches!(err, AuthzError::ParseError(_)));

    let err = evaluate_json(r#"{"Statement": "nope"}"#, "a", "r", &ctx).unwrap_err();
    assert!(matches!(err, AuthzError::ParseError(_)));

    let unsupported = json!({"Statement": [{
        "Effect": "Allow", "Action": "*", "Resource": "*",
        "Condition": {"StringGreaterThan": {"k": "v"}}
    }]});
    let err = evaluate_value(&unsupported, "a", "r", &ctx).unwrap_err();
    assert!(matches!(err, AuthzError::UnsupportedOperator(_)));
    assert!(err.is_malformed_policy());

    let malformed = json!({"Statement": [{
        "Effect": "Allow", "Action": "*", "Resource": "*",
        "Condition": {"StringEquals": ["k", "v"]}
    }]});
    let err = evaluate_value(&malformed, "a", "r", &ctx).unwrap_err();
    assert!(matches!(err, AuthzError::MalformedCondition(_)));
}

#[test]
fn test_statement_without_resource_matches_nothing() {
    let document = json!({"Statement": [{"Effect": "Allow", "Action": "*"}]});
    let decision = evaluate_value(&document, "iam:GetUser", USER_123, &RequestContext::new()).unwrap();
    assert_eq!(decision, Decision::NotApplicable);
}

// ============================================================================
// DENY OVERRIDE
// ============================================================================

#[test]
fn test_explicit_deny_beats_many_allows() {
    let mut statements: Vec<Statement> = (0..10)
        .map(|_| Statement::allow(&["iam:*"], &["*"]))
        .collect();
    statements.push(Statement::deny(&["iam:DeleteUser"], &[USER_123]));
    let document = PolicyDocument::new(statements);

    let ctx = RequestContext::new();
    assert_eq!(evaluate(&document, "iam:DeleteUser", USER_123, &ctx), Decision::Deny);
    assert_eq!(
        evaluate(&document, "iam:DeleteUser", "arn:monkeys:iam::user/456", &ctx),
        Decision::Allow
    );
}

#[test]
fn test_deny_in_one_document_overrides_allow_in_another() {
    let documents = vec![
        PolicyDocument::new(vec![Statement::allow(&["*"], &["*"])]),
        PolicyDocument::new(vec![Statement::deny(&["iam:DeletePolicy"], &["*"])]),
    ];
    let ctx = RequestContext::new();

    assert_eq!(
        evaluate_documents(&documents, "iam:DeletePolicy", "p/1", &ctx),
        Decision::Deny
    );
    assert_eq!(evaluate_documents(&documents.iter().rev().cloned().collect::<Vec<_>>(), "iam:DeletePolicy", "p/1", &ctx), Decision::Deny);
}

fn arb_statement() -> impl Strategy<Value = Statement> {
    let actions = prop::sample::select(vec!["iam:GetUser", "iam:*", "*", "iam:Delete*", "auth:Login"]);
    let resources = prop::sample::select(vec![USER_123, "*", "arn:monkeys:iam::user/???", "arn:monkeys:iam::group/*"]);
    (any::<bool>(), actions, resources).prop_map(|(allow, action, resource)| {
        if allow {
            Statement::allow(&[action], &[resource])
        } else {
            Statement::deny(&[action], &[resource])
        }
    })
}

proptest! {
    #[test]
    fn prop_deny_override_is_order_independent(
        statements in prop::collection::vec(arb_statement(), 0..12),
        seed in any::<u64>(),
    ) {
        let ctx = RequestContext::new();
        let mut with_both = statements.clone();
        with_both.push(Statement::allow(&["iam:GetUser"], &[USER_123]));
        with_both.push(Statement::deny(&["iam:GetUser"], &[USER_123]));

        // Deterministic shuffle driven by the seed
        let mut shuffled = with_both.clone();
        let mut state = seed | 1;
        for i in (1..shuffled.len()).rev() {
            state ^= state << 13;
            state ^= state >> 7;
            state ^= state << 17;
            let j = (state % (i as u64 + 1)) as usize;
            shuffled.swap(i, j);
        }

        let original = evaluate(&PolicyDocument::new(with_both), "iam:GetUser", USER_123, &ctx);
        let reordered = evaluate(&PolicyDocument::new(shuffled), "iam:GetUser", USER_123, &ctx);

        prop_assert_eq!(original, Decision::Deny);
        prop_assert_eq!(reordered, Decision::Deny);
    }

    #[test]
    fn prop_decision_independent_of_order(
        statements in prop::collection::vec(arb_statement(), 0..12),
    ) {
        let ctx = RequestContext::new();
        let mut reversed = statements.clone();
        reversed.reverse();

        for action in ["iam:GetUser", "iam:DeleteUser", "auth:Login"] {
            let forward = evaluate(&PolicyDocument::new(statements.clone()), action, USER_123, &ctx);
            let backward = evaluate(&PolicyDocument::new(reversed.clone()), action, USER_123, &ctx);
            prop_assert_eq!(forward, backward);
        }
    }

    #[test]
    fn prop_no_matching_statement_is_never_allow(
        statements in prop::collection::vec(arb_statement(), 0..12),
    ) {
        // No generated pattern matches this action
        let decision = evaluate(
            &PolicyDocument::new(statements.into_iter().filter(|s| !s.actions.iter().any(|a| a == "*")).collect()),
            "billing:Charge",
            USER_123,
            &RequestContext::new(),
        );
        prop_assert_eq!(decision, Decision::NotApplicable);
    }
}
