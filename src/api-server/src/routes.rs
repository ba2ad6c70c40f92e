//! Route definitions for the API server
//!
//! Routes are organized by authentication requirement:
//! - Health, metrics and the OpenAPI document are public
//! - `/api/v1/auth/me` accepts anonymous callers
//! - Everything else under `/api/v1` requires a valid credential

use crate::{cors, handlers, middleware, state::AppState};
use axum::{
    middleware as axum_middleware,
    routing::{get, post, put},
    Router,
};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;

/// OpenAPI documentation configuration
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Monkeys IAM Authorization API",
        version = "1.0.0",
        description = "Policy evaluation, request authentication and organization origin settings"
    ),
    paths(
        handlers::health_check,
        handlers::metrics,
        handlers::auth_me,
        handlers::authorize,
        handlers::simulate_policy,
        handlers::get_policy,
        handlers::update_origins,
    ),
    components(
        schemas(
            crate::models::HealthResponse,
            crate::models::ErrorResponse,
            crate::models::AuthorizeBody,
            crate::models::AuthorizeResponse,
            crate::models::SimulateBody,
            crate::models::SimulateResponse,
            crate::models::PolicyResponse,
            crate::models::UpdateOriginsBody,
            crate::models::OriginsResponse,
            crate::models::MeResponse,
        )
    ),
    tags(
        (name = "health", description = "Health and monitoring endpoints"),
        (name = "auth", description = "Caller identity"),
        (name = "authorization", description = "Authorization check endpoints"),
        (name = "policies", description = "Policy inspection and simulation"),
        (name = "organizations", description = "Organization settings"),
    )
)]
pub struct ApiDoc;

/// Create the application router with all routes and middleware
pub fn create_router(state: AppState) -> Router {
    let protected = Router::new()
        .route("/authorize", post(handlers::authorize))
        .route("/policies/simulate", post(handlers::simulate_policy))
        .route(
            "/organizations/:org_id/policies/:policy_id",
            get(handlers::get_policy),
        )
        .route("/organizations/:org_id/origins", put(handlers::update_origins))
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::require_auth,
        ));

    let optional = Router::new()
        .route("/auth/me", get(handlers::auth_me))
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::optional_auth,
        ));

    let request_timeout = state.request_timeout;

    Router::new()
        .route("/health", get(handlers::health_check))
        .route("/metrics", get(handlers::metrics))
        .route("/api-docs/openapi.json", get(handlers::openapi_json))
        .nest("/api/v1", protected.merge(optional))
        // Middleware layers run bottom to top
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::client_ip_middleware,
        ))
        .layer(axum_middleware::from_fn(middleware::logging_middleware))
        .layer(axum_middleware::from_fn(middleware::request_id_middleware))
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            cors::cors_middleware,
        ))
        .layer(TimeoutLayer::new(request_timeout))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
