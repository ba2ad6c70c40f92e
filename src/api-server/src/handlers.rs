use axum::{
    extract::{Path, State},
    http::header,
    response::IntoResponse,
    Extension, Json,
};
use monkeys_authn::TenantContext;
use monkeys_authz::{
    simulation::passed_count, AuthorizeRequest, PolicyDocument, Principal,
    RequestContext, ResourceName,
};
use monkeys_core::with_timeout;
use tracing::info;
use utoipa::OpenApi;
use validator::Validate;

use crate::{
    cors::normalize_origin,
    error::{ApiError, Result},
    gate::AuthorizationGate,
    middleware::{ClientIp, OptionalTenant},
    models::*,
    routes::ApiDoc,
    state::AppState,
};

/// Action checked before a stored policy is returned
pub const GET_POLICY_ACTION: &str = "iam:GetPolicy";

/// Health check endpoint
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse)
    ),
    tag = "health"
)]
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: state.version.clone(),
        uptime_seconds: state.uptime_seconds(),
    })
}

/// Engine metrics in Prometheus text format
#[utoipa::path(
    get,
    path = "/metrics",
    responses(
        (status = 200, description = "Prometheus metrics", body = String)
    ),
    tag = "health"
)]
pub async fn metrics(State(state): State<AppState>) -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.authorizer.export_prometheus().await,
    )
}

pub async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

/// Identity of the caller, or anonymous
#[utoipa::path(
    get,
    path = "/api/v1/auth/me",
    responses(
        (status = 200, description = "Caller identity", body = MeResponse)
    ),
    tag = "auth"
)]
pub async fn auth_me(Extension(OptionalTenant(tenant)): Extension<OptionalTenant>) -> Json<MeResponse> {
    Json(MeResponse {
        authenticated: tenant.is_some(),
        tenant,
    })
}

/// Evaluate the caller's effective policies
#[utoipa::path(
    post,
    path = "/api/v1/authorize",
    request_body = AuthorizeBody,
    responses(
        (status = 200, description = "Authorization decision", body = AuthorizeResponse),
        (status = 400, description = "Invalid request", body = ErrorResponse),
        (status = 401, description = "Missing or invalid credential", body = ErrorResponse),
        (status = 500, description = "Authorization check failed", body = ErrorResponse)
    ),
    tag = "authorization"
)]
pub async fn authorize(
    State(state): State<AppState>,
    Extension(tenant): Extension<TenantContext>,
    Extension(ClientIp(client_ip)): Extension<ClientIp>,
    Json(body): Json<AuthorizeBody>,
) -> Result<Json<AuthorizeResponse>> {
    body.validate()?;

    // Caller-supplied iam:* keys are dropped; the server sets its own
    let mut context = RequestContext::new();
    for (key, value) in body.context.iter().filter(|(key, _)| !key.starts_with("iam:")) {
        context.insert(key.clone(), value.clone());
    }
    for (key, value) in AuthorizationGate::request_context(&tenant, client_ip).iter() {
        context.insert(key.clone(), value.clone());
    }

    let request = AuthorizeRequest {
        principal: Principal::user(tenant.user_id.as_str(), tenant.organization_id.as_str()),
        action: body.action,
        resource: body.resource,
        context,
    };

    let decision = state
        .authorizer
        .authorize(&request)
        .await
        .map_err(|e| ApiError::AuthorizationFailed(e.to_string()))?;

    Ok(Json(AuthorizeResponse {
        allowed: decision.is_allowed(),
        decision,
    }))
}

/// Run test cases against a candidate policy document
#[utoipa::path(
    post,
    path = "/api/v1/policies/simulate",
    request_body = SimulateBody,
    responses(
        (status = 200, description = "Simulation results", body = SimulateResponse),
        (status = 400, description = "Malformed policy or request", body = ErrorResponse),
        (status = 401, description = "Missing or invalid credential", body = ErrorResponse)
    ),
    tag = "policies"
)]
pub async fn simulate_policy(
    State(state): State<AppState>,
    Extension(tenant): Extension<TenantContext>,
    Json(body): Json<SimulateBody>,
) -> Result<Json<SimulateResponse>> {
    body.validate()?;

    let document = PolicyDocument::from_value(&body.policy)?;
    let results = state.authorizer.simulate(&document, &body.test_cases);
    let passed = passed_count(&results);

    info!(
        user_id = %tenant.user_id,
        total = results.len(),
        passed,
        "Policy simulated"
    );

    Ok(Json(SimulateResponse {
        total: results.len(),
        passed,
        results,
    }))
}

/// Fetch a stored policy document
#[utoipa::path(
    get,
    path = "/api/v1/organizations/{org_id}/policies/{policy_id}",
    params(
        ("org_id" = String, Path, description = "Organization id"),
        ("policy_id" = String, Path, description = "Policy id")
    ),
    responses(
        (status = 200, description = "Policy document", body = PolicyResponse),
        (status = 403, description = "Forbidden", body = ErrorResponse),
        (status = 404, description = "Policy not found", body = ErrorResponse)
    ),
    tag = "policies"
)]
pub async fn get_policy(
    State(state): State<AppState>,
    Extension(tenant): Extension<TenantContext>,
    Extension(ClientIp(client_ip)): Extension<ClientIp>,
    Path((org_id, policy_id)): Path<(String, String)>,
) -> Result<Json<PolicyResponse>> {
    if !tenant.can_access_org(&org_id) {
        return Err(ApiError::Forbidden);
    }

    let resource = ResourceName::new(org_id.as_str(), "policy", policy_id.as_str());
    state
        .gate
        .enforce(&tenant, GET_POLICY_ACTION, &resource, client_ip)
        .await?;

    let document = state.authorizer.policy_document(&org_id, &policy_id).await?;

    Ok(Json(PolicyResponse {
        policy_id,
        organization_id: org_id,
        document: document.to_json(),
    }))
}

/// Replace an organization's allowed origins
#[utoipa::path(
    put,
    path = "/api/v1/organizations/{org_id}/origins",
    params(
        ("org_id" = String, Path, description = "Organization id")
    ),
    request_body = UpdateOriginsBody,
    responses(
        (status = 200, description = "Origins updated", body = OriginsResponse),
        (status = 400, description = "Invalid origin", body = ErrorResponse),
        (status = 403, description = "Forbidden", body = ErrorResponse),
        (status = 404, description = "Organization not found", body = ErrorResponse)
    ),
    tag = "organizations"
)]
pub async fn update_origins(
    State(state): State<AppState>,
    Extension(tenant): Extension<TenantContext>,
    Path(org_id): Path<String>,
    Json(body): Json<UpdateOriginsBody>,
) -> Result<Json<OriginsResponse>> {
    if !tenant.can_admin_org(&org_id) {
        return Err(ApiError::Forbidden);
    }
    body.validate()?;

    let mut origins = body
        .origins
        .iter()
        .map(|origin| parse_origin(origin))
        .collect::<Result<Vec<_>>>()?;
    origins.sort();
    origins.dedup();

    with_timeout(
        state.origins.config().refresh_timeout,
        "update organization origins",
        state
            .organizations
            .update_organization_origins(&org_id, origins.clone()),
    )
    .await?;
    state.origins.invalidate();

    info!(%org_id, user_id = %tenant.user_id, count = origins.len(), "Allowed origins updated");

    Ok(Json(OriginsResponse {
        organization_id: org_id,
        origins,
    }))
}

/// Normalized `scheme://host[:port]`, rejecting paths and wildcards
fn parse_origin(origin: &str) -> Result<String> {
    let normalized = normalize_origin(origin);
    let host = normalized
        .strip_prefix("https://")
        .or_else(|| normalized.strip_prefix("http://"))
        .ok_or_else(|| ApiError::ValidationError(format!("origin must use http or https: {}", origin)))?;

    if host.is_empty() || host.contains(['/', '*', ' ', '?', '#']) {
        return Err(ApiError::ValidationError(format!("invalid origin: {}", origin)));
    }
    Ok(normalized)
}
