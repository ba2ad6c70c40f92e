//! Dynamic CORS
//!
//! Allowed origins come from configuration and from each organization's
//! settings, so the allow-list is resolved per request through
//! [`OriginCache`] instead of a static layer.

pub mod cache;
pub mod shared;

pub use cache::{OriginCache, OriginCacheConfig, OriginMatch};
pub use shared::{InMemorySharedOriginSet, RedisOriginSet, SharedOriginSet, DEFAULT_ORIGIN_SET_KEY};

use crate::middleware::X_REQUEST_ID;
use crate::state::AppState;
use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, HeaderValue, Method, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::debug;

const ALLOWED_METHODS: &str = "GET, POST, PUT, DELETE, PATCH, OPTIONS";
const ALLOWED_HEADERS: &str = "authorization, content-type, accept, x-request-id";
const PREFLIGHT_MAX_AGE: &str = "600";

/// Canonical form used for every origin comparison
pub fn normalize_origin(origin: &str) -> String {
    origin.trim().trim_end_matches('/').to_ascii_lowercase()
}

/// Organization named by an `/api/v1/organizations/{org}/...` path
fn org_from_path(path: &str) -> Option<&str> {
    let rest = path.strip_prefix("/api/v1/organizations/")?;
    rest.split('/').next().filter(|segment| !segment.is_empty())
}

fn is_preflight(request: &Request) -> bool {
    request.method() == Method::OPTIONS
        && request
            .headers()
            .contains_key(header::ACCESS_CONTROL_REQUEST_METHOD)
}

/// Listed origins are echoed with credentials; allow-all gets a bare `*`
fn apply_cors_headers(headers: &mut HeaderMap, origin: HeaderValue, matched: OriginMatch) {
    match matched {
        OriginMatch::Listed => {
            headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, origin);
            headers.insert(
                header::ACCESS_CONTROL_ALLOW_CREDENTIALS,
                HeaderValue::from_static("true"),
            );
            headers.append(header::VARY, HeaderValue::from_static("Origin"));
        }
        OriginMatch::Any => {
            headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
        }
    }
}

/// Per-request CORS check
///
/// Requests without an `Origin` header pass through untouched. Preflights
/// are answered here; other requests get CORS headers only when allowed.
pub async fn cors_middleware(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let Some(origin) = request.headers().get(header::ORIGIN).cloned() else {
        return next.run(request).await;
    };

    let org_id = org_from_path(request.uri().path()).map(str::to_string);
    let matched = match origin.to_str() {
        Ok(value) => state.origins.check_origin(value, org_id.as_deref()).await,
        Err(_) => None,
    };

    if is_preflight(&request) {
        let Some(matched) = matched else {
            debug!(origin = ?origin, "Preflight from disallowed origin");
            return StatusCode::FORBIDDEN.into_response();
        };

        let mut response = StatusCode::NO_CONTENT.into_response();
        let headers = response.headers_mut();
        apply_cors_headers(headers, origin, matched);
        headers.insert(
            header::ACCESS_CONTROL_ALLOW_METHODS,
            HeaderValue::from_static(ALLOWED_METHODS),
        );
        headers.insert(
            header::ACCESS_CONTROL_ALLOW_HEADERS,
            HeaderValue::from_static(ALLOWED_HEADERS),
        );
        headers.insert(
            header::ACCESS_CONTROL_MAX_AGE,
            HeaderValue::from_static(PREFLIGHT_MAX_AGE),
        );
        return response;
    }

    let mut response = next.run(request).await;
    if let Some(matched) = matched {
        let headers = response.headers_mut();
        apply_cors_headers(headers, origin, matched);
        headers.insert(
            header::ACCESS_CONTROL_EXPOSE_HEADERS,
            HeaderValue::from_static(X_REQUEST_ID),
        );
    }
    response
}
