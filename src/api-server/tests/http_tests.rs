//! End-to-end HTTP tests over in-memory stores

use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use chrono::Utc;
use jsonwebtoken::{encode, EncodingKey, Header};
use monkeys_api_server::{
    cors::{InMemorySharedOriginSet, OriginCache, OriginCacheConfig},
    error::{FORBIDDEN_MESSAGE, UNAUTHORIZED_MESSAGE},
    routes::create_router,
    AppState, ServerConfig,
};
use monkeys_authn::{
    AuthService, Claims, SigningKeys, SystemOrgConfig, SystemOrgResolver, TenantResolver,
    TokenValidator, TokenValidatorConfig, DEFAULT_SYSTEM_ORG_SLUG,
};
use monkeys_authz::{Authorizer, AuthorizerConfig, InMemoryPolicyStore, PolicyDocument, Principal};
use monkeys_core::InMemoryOrganizationStore;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

const SECRET: &[u8] = b"http-test-secret";
const CONSOLE_ORIGIN: &str = "https://console.monkeys.example";

struct Fixture {
    app: Router,
    state: AppState,
    orgs: InMemoryOrganizationStore,
    shared: InMemorySharedOriginSet,
}

async fn fixture() -> Fixture {
    fixture_with(OriginCacheConfig {
        static_origins: vec![CONSOLE_ORIGIN.to_string()],
        ..Default::default()
    })
    .await
}

async fn fixture_with(origin_config: OriginCacheConfig) -> Fixture {
    let orgs = InMemoryOrganizationStore::new();
    orgs.insert("org-root", DEFAULT_SYSTEM_ORG_SLUG, vec![]).await;
    orgs.insert("org-acme", "acme", vec!["https://app.acme.example".to_string()])
        .await;
    orgs.insert("org-globex", "globex", vec![]).await;

    let policies = InMemoryPolicyStore::new();
    policies
        .put_policy(
            "p-read",
            "org-acme",
            PolicyDocument::parse(
                r#"{"Statement":[{"Effect":"Allow","Action":"iam:GetPolicy","Resource":"arn:monkeys:iam:org-acme:policy/*"}]}"#,
            )
            .unwrap(),
        )
        .await;
    policies
        .attach("p-read", &Principal::user("alice", "org-acme"))
        .await
        .unwrap();
    policies
        .put_policy(
            "p-globex-billing",
            "org-globex",
            PolicyDocument::parse(
                r#"{"Statement":[{"Sid":"GlobexBilling","Effect":"Allow","Action":"billing:*","Resource":"*"}]}"#,
            )
            .unwrap(),
        )
        .await;
    policies
        .put_policy(
            "p-office",
            "org-acme",
            PolicyDocument::parse(
                r#"{"Statement":[{"Effect":"Allow","Action":"iam:*","Resource":"*",
                    "Condition":{"IpAddress":{"iam:SourceIP":"10.0.0.0/8"}}}]}"#,
            )
            .unwrap(),
        )
        .await;
    policies
        .attach("p-office", &Principal::user("carol", "org-acme"))
        .await
        .unwrap();

    let validator = TokenValidator::new(
        SigningKeys::new().with_hmac_secret(SECRET),
        TokenValidatorConfig::default(),
    )
    .unwrap();
    let system_org = Arc::new(SystemOrgResolver::new(
        Arc::new(orgs.clone()),
        SystemOrgConfig::default(),
    ));
    let auth = Arc::new(AuthService::new(validator, TenantResolver::new(system_org)));
    let authorizer = Arc::new(Authorizer::new(AuthorizerConfig::default(), Arc::new(policies)));

    let shared = InMemorySharedOriginSet::new();
    let origins = OriginCache::new(
        origin_config,
        Arc::new(orgs.clone()),
        Arc::new(shared.clone()),
    );

    let state = AppState::new(
        authorizer,
        auth,
        origins,
        Arc::new(orgs.clone()),
        &ServerConfig {
            trust_proxy: true,
            ..Default::default()
        },
    );

    Fixture {
        app: create_router(state.clone()),
        state,
        orgs,
        shared,
    }
}

fn token(user: &str, org: &str, role: &str) -> String {
    let claims = Claims {
        user_id: user.to_string(),
        email: format!("{}@example.com", user),
        organization_id: org.to_string(),
        role: role.to_string(),
        jti: Some(uuid::Uuid::new_v4().to_string()),
        exp: Utc::now().timestamp() + 3600,
        iat: Utc::now().timestamp(),
        ..Default::default()
    };
    encode(&Header::default(), &claims, &EncodingKey::from_secret(SECRET)).unwrap()
}

fn bearer(token: &str) -> String {
    format!("Bearer {}", token)
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, axum::http::HeaderMap, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, headers, body)
}

fn get(uri: &str, auth: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().uri(uri);
    if let Some(token) = auth {
        builder = builder.header(header::AUTHORIZATION, bearer(token));
    }
    builder.body(Body::empty()).unwrap()
}

fn json_request(method: Method, uri: &str, token: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::AUTHORIZATION, bearer(token))
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

// ============================================================================
// PUBLIC ENDPOINTS
// ============================================================================

#[tokio::test]
async fn test_health_and_docs_are_public() {
    let f = fixture().await;

    let (status, headers, body) = send(&f.app, get("/health", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert!(headers.contains_key("x-request-id"));

    let (status, _, body) = send(&f.app, get("/api-docs/openapi.json", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["paths"]["/api/v1/authorize"].is_object());
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let f = fixture().await;
    let response = f.app.clone().oneshot(get("/metrics", None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let text = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(text.contains("monkeys_authz_requests_total"));
}

// ============================================================================
// AUTHENTICATION
// ============================================================================

#[tokio::test]
async fn test_protected_route_rejects_missing_and_bad_credentials() {
    let f = fixture().await;
    let body = json!({"action": "iam:GetPolicy", "resource": "arn:monkeys:iam:org-acme:policy/p-read"});

    let missing = Request::builder()
        .method(Method::POST)
        .uri("/api/v1/authorize")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    let (status, _, response) = send(&f.app, missing).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(response["error"], UNAUTHORIZED_MESSAGE);

    let (status, _, response) =
        send(&f.app, json_request(Method::POST, "/api/v1/authorize", "garbage", body)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(response["error"], UNAUTHORIZED_MESSAGE);
}

#[tokio::test]
async fn test_cookie_credential_is_accepted() {
    let f = fixture().await;
    let request = Request::builder()
        .uri("/api/v1/auth/me")
        .header(header::COOKIE, format!("monkeys_token={}", token("alice", "org-acme", "member")))
        .body(Body::empty())
        .unwrap();

    let (status, _, body) = send(&f.app, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["authenticated"], true);
    assert_eq!(body["tenant"]["organization_id"], "org-acme");
}

#[tokio::test]
async fn test_optional_auth_allows_anonymous() {
    let f = fixture().await;

    let (status, _, body) = send(&f.app, get("/api/v1/auth/me", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["authenticated"], false);

    let (status, _, body) = send(&f.app, get("/api/v1/auth/me", Some("not-a-token"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["authenticated"], false);
}

#[tokio::test]
async fn test_root_member_is_detected() {
    let f = fixture().await;
    let root = token("ops", "org-root", "member");

    let (_, _, body) = send(&f.app, get("/api/v1/auth/me", Some(&root))).await;
    assert_eq!(body["tenant"]["is_root"], true);
}

// ============================================================================
// AUTHORIZE
// ============================================================================

#[tokio::test]
async fn test_authorize_reports_tri_state_decision() {
    let f = fixture().await;
    let alice = token("alice", "org-acme", "member");

    let (status, _, body) = send(
        &f.app,
        json_request(
            Method::POST,
            "/api/v1/authorize",
            &alice,
            json!({"action": "iam:GetPolicy", "resource": "arn:monkeys:iam:org-acme:policy/p-read"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["decision"], "Allow");
    assert_eq!(body["allowed"], true);

    let (_, _, body) = send(
        &f.app,
        json_request(
            Method::POST,
            "/api/v1/authorize",
            &alice,
            json!({"action": "iam:DeleteUser", "resource": "arn:monkeys:iam:org-acme:user/1"}),
        ),
    )
    .await;
    assert_eq!(body["decision"], "NotApplicable");
    assert_eq!(body["allowed"], false);
}

#[tokio::test]
async fn test_client_cannot_spoof_source_ip() {
    let f = fixture().await;
    let carol = token("carol", "org-acme", "member");

    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/v1/authorize")
        .header(header::AUTHORIZATION, bearer(&carol))
        .header(header::CONTENT_TYPE, "application/json")
        .header("x-forwarded-for", "192.168.0.9")
        .body(Body::from(
            json!({
                "action": "iam:GetUser",
                "resource": "arn:monkeys:iam:org-acme:user/1",
                "context": {"iam:SourceIP": "10.0.0.1"}
            })
            .to_string(),
        ))
        .unwrap();

    let (_, _, body) = send(&f.app, request).await;
    assert_eq!(body["decision"], "NotApplicable");
}

#[tokio::test]
async fn test_invalid_authorize_body() {
    let f = fixture().await;
    let alice = token("alice", "org-acme", "member");

    let (status, _, _) = send(
        &f.app,
        json_request(Method::POST, "/api/v1/authorize", &alice, json!({"action": "", "resource": "x"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

// ============================================================================
// GATED POLICY READ
// ============================================================================

#[tokio::test]
async fn test_policy_read_is_gated() {
    let f = fixture().await;
    let alice = token("alice", "org-acme", "member");
    let bob = token("bob", "org-acme", "member");

    let (status, _, body) = send(
        &f.app,
        get("/api/v1/organizations/org-acme/policies/p-read", Some(&alice)),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["document"]["Statement"][0]["Effect"], "Allow");

    // No attached policy: default deny, generic message
    let (status, _, body) = send(
        &f.app,
        get("/api/v1/organizations/org-acme/policies/p-read", Some(&bob)),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], FORBIDDEN_MESSAGE);

    // Another organization
    let (status, _, _) = send(
        &f.app,
        get("/api/v1/organizations/org-globex/policies/p-read", Some(&alice)),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _, _) = send(
        &f.app,
        get("/api/v1/organizations/org-acme/policies/p-missing", Some(&alice)),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_policy_read_never_crosses_organizations() {
    let f = fixture().await;
    let alice = token("alice", "org-acme", "member");

    // Allowed on org-acme:policy/*, but the id belongs to org-globex
    let (status, _, body) = send(
        &f.app,
        get("/api/v1/organizations/org-acme/policies/p-globex-billing", Some(&alice)),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(!body.to_string().contains("GlobexBilling"));

    let root = token("ops", "org-root", "member");
    let (status, _, _) = send(
        &f.app,
        get("/api/v1/organizations/org-acme/policies/p-globex-billing", Some(&root)),
    )
    .await;
    assert_ne!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_source_ip_from_trusted_proxy_reaches_conditions() {
    let f = fixture().await;
    let carol = token("carol", "org-acme", "member");

    let from = |ip: &str| {
        Request::builder()
            .uri("/api/v1/organizations/org-acme/policies/p-read")
            .header(header::AUTHORIZATION, bearer(&carol))
            .header("x-forwarded-for", ip)
            .body(Body::empty())
            .unwrap()
    };

    let (status, _, _) = send(&f.app, from("10.20.30.40")).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _, _) = send(&f.app, from("192.168.1.1")).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

// ============================================================================
// SIMULATION
// ============================================================================

#[tokio::test]
async fn test_simulate_candidate_policy() {
    let f = fixture().await;
    let alice = token("alice", "org-acme", "member");

    let body = json!({
        "policy": {"Statement": [
            {"Effect": "Allow", "Action": "iam:*", "Resource": "*"},
            {"Effect": "Deny", "Action": "iam:DeleteUser", "Resource": "*"}
        ]},
        "test_cases": [
            {"principal": {"id": "u-1", "type": "user", "org_id": "org-acme"},
             "resource": "arn:monkeys:iam:org-acme:user/1", "action": "iam:GetUser", "expected": "Allow"},
            {"principal": {"id": "u-1", "type": "user", "org_id": "org-acme"},
             "resource": "arn:monkeys:iam:org-acme:user/1", "action": "iam:DeleteUser", "expected": "Allow"}
        ]
    });

    let (status, _, response) =
        send(&f.app, json_request(Method::POST, "/api/v1/policies/simulate", &alice, body)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(response["total"], 2);
    assert_eq!(response["passed"], 1);
    assert_eq!(response["results"][1]["actual"], "Deny");
}

#[tokio::test]
async fn test_simulate_rejects_malformed_policy() {
    let f = fixture().await;
    let alice = token("alice", "org-acme", "member");

    let body = json!({
        "policy": {"Statement": [{"Effect": "Allow", "Action": "*", "Resource": "*",
            "Condition": {"DateGreaterThan": {"aws:CurrentTime": "2020-01-01"}}}]},
        "test_cases": [
            {"principal": {"id": "u-1", "type": "user", "org_id": "org-acme"},
             "resource": "*", "action": "iam:GetUser", "expected": "Allow"}
        ]
    });

    let (status, _, _) =
        send(&f.app, json_request(Method::POST, "/api/v1/policies/simulate", &alice, body)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

// ============================================================================
// ORIGINS AND CORS
// ============================================================================

fn preflight(origin: &str) -> Request<Body> {
    Request::builder()
        .method(Method::OPTIONS)
        .uri("/api/v1/authorize")
        .header(header::ORIGIN, origin)
        .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
        .body(Body::empty())
        .unwrap()
}

#[tokio::test]
async fn test_request_without_origin_passes_untouched() {
    let f = fixture().await;
    let (status, headers, _) = send(&f.app, get("/health", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert!(!headers.contains_key(header::ACCESS_CONTROL_ALLOW_ORIGIN));
}

#[tokio::test]
async fn test_preflight_allowed_and_rejected() {
    let f = fixture().await;

    let (status, headers, _) = send(&f.app, preflight(CONSOLE_ORIGIN)).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], CONSOLE_ORIGIN);
    assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_CREDENTIALS], "true");

    let (status, headers, _) = send(&f.app, preflight("https://evil.example")).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert!(!headers.contains_key(header::ACCESS_CONTROL_ALLOW_ORIGIN));
}

#[tokio::test]
async fn test_simple_request_gets_headers_only_when_allowed() {
    let f = fixture().await;
    f.state.origins.refresh().await.unwrap();

    let allowed = Request::builder()
        .uri("/health")
        .header(header::ORIGIN, "https://app.acme.example")
        .body(Body::empty())
        .unwrap();
    let (status, headers, _) = send(&f.app, allowed).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], "https://app.acme.example");

    let denied = Request::builder()
        .uri("/health")
        .header(header::ORIGIN, "https://evil.example")
        .body(Body::empty())
        .unwrap();
    let (status, headers, _) = send(&f.app, denied).await;
    assert_eq!(status, StatusCode::OK);
    assert!(!headers.contains_key(header::ACCESS_CONTROL_ALLOW_ORIGIN));
}

#[tokio::test]
async fn test_origin_update_requires_admin() {
    let f = fixture().await;
    let member = token("alice", "org-acme", "member");
    let other_admin = token("gina", "org-globex", "admin");
    let body = json!({"origins": ["https://new.acme.example"]});

    let (status, _, _) = send(
        &f.app,
        json_request(Method::PUT, "/api/v1/organizations/org-acme/origins", &member, body.clone()),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _, _) = send(
        &f.app,
        json_request(Method::PUT, "/api/v1/organizations/org-acme/origins", &other_admin, body),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_origin_update_rejects_invalid_origins() {
    let f = fixture().await;
    let admin = token("olga", "org-acme", "owner");

    let (status, _, _) = send(
        &f.app,
        json_request(
            Method::PUT,
            "/api/v1/organizations/org-acme/origins",
            &admin,
            json!({"origins": ["*"]}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

/// Readers may see the old set until the invalidation refresh completes.
/// The window is one refresh cycle; after it the new origin is allowed.
#[tokio::test]
async fn test_origin_update_visible_within_one_refresh_cycle() {
    let f = fixture().await;
    f.state.origins.refresh().await.unwrap();
    let refreshes_before = f.state.origins.refresh_count();
    let admin = token("olga", "org-acme", "admin");
    let new_origin = "https://new.acme.example";

    assert!(!f.state.origins.is_origin_allowed(new_origin, None).await);

    let (status, _, body) = send(
        &f.app,
        json_request(
            Method::PUT,
            "/api/v1/organizations/org-acme/origins",
            &admin,
            json!({"origins": ["https://New.Acme.Example/", "https://app.acme.example"]}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["origins"], json!(["https://app.acme.example", new_origin]));

    let mut visible = false;
    for _ in 0..100 {
        if f.state.origins.refresh_count() > refreshes_before
            && f.state.origins.is_origin_allowed(new_origin, None).await
        {
            visible = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(visible, "origin not visible after the invalidation refresh");
    assert!(f.shared.replacements() >= 2);
}

#[tokio::test]
async fn test_slow_origin_update_is_bounded() {
    let f = fixture_with(OriginCacheConfig {
        refresh_timeout: Duration::from_millis(50),
        ..Default::default()
    })
    .await;
    let admin = token("olga", "org-acme", "admin");

    // Resolve the system organization before the store slows down
    let (status, _, _) = send(&f.app, get("/api/v1/auth/me", Some(&admin))).await;
    assert_eq!(status, StatusCode::OK);

    f.orgs.set_latency(Some(Duration::from_secs(2)));
    let started = std::time::Instant::now();
    let (status, _, _) = send(
        &f.app,
        json_request(
            Method::PUT,
            "/api/v1/organizations/org-acme/origins",
            &admin,
            json!({"origins": ["https://slow.acme.example"]}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert!(started.elapsed() < Duration::from_secs(1));
}

#[tokio::test]
async fn test_root_can_update_any_org_origins() {
    let f = fixture().await;
    let root = token("ops", "org-root", "member");

    let (status, _, _) = send(
        &f.app,
        json_request(
            Method::PUT,
            "/api/v1/organizations/org-globex/origins",
            &root,
            json!({"origins": ["https://globex.example"]}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let stored = monkeys_core::OrganizationStore::get_organization_origins(&f.orgs, "org-globex")
        .await
        .unwrap();
    assert_eq!(stored, vec!["https://globex.example"]);
}

#[tokio::test]
async fn test_cors_survives_shared_cache_outage() {
    let f = fixture().await;
    f.state.origins.refresh().await.unwrap();
    f.shared.set_available(false);

    let request = Request::builder()
        .uri("/health")
        .header(header::ORIGIN, "https://app.acme.example")
        .body(Body::empty())
        .unwrap();
    let (_, headers, _) = send(&f.app, request).await;
    assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], "https://app.acme.example");

    let (status, _, _) = send(&f.app, preflight("https://evil.example")).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_allow_all_answers_without_credentials() {
    let f = fixture_with(OriginCacheConfig {
        static_origins: vec![CONSOLE_ORIGIN.to_string()],
        allow_all: true,
        ..Default::default()
    })
    .await;

    let request = Request::builder()
        .uri("/health")
        .header(header::ORIGIN, "https://evil.example")
        .body(Body::empty())
        .unwrap();
    let (status, headers, _) = send(&f.app, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
    assert!(!headers.contains_key(header::ACCESS_CONTROL_ALLOW_CREDENTIALS));

    let (status, headers, _) = send(&f.app, preflight("https://evil.example")).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
    assert!(!headers.contains_key(header::ACCESS_CONTROL_ALLOW_CREDENTIALS));

    // Configured origins keep credentialed access
    let (_, headers, _) = send(&f.app, preflight(CONSOLE_ORIGIN)).await;
    assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], CONSOLE_ORIGIN);
    assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_CREDENTIALS], "true");
}
