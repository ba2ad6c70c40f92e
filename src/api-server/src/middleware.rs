//! Middleware layer for the API server
//!
//! This module provides middleware components for:
//! - Request ID tracking
//! - Request logging
//! - Client address resolution
//! - Required and optional authentication

use crate::error::ApiError;
use crate::state::AppState;
use axum::{
    extract::{ConnectInfo, Request, State},
    http::{header, HeaderMap, HeaderValue},
    middleware::Next,
    response::Response,
};
use monkeys_authn::TenantContext;
use std::net::{IpAddr, SocketAddr};
use tracing::info;
use uuid::Uuid;

/// Request ID header name
pub const X_REQUEST_ID: &str = "x-request-id";

/// Proxy chain header consulted when proxies are trusted
pub const X_FORWARDED_FOR: &str = "x-forwarded-for";

/// Caller address, if one could be determined
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientIp(pub Option<IpAddr>);

/// Result of optional authentication; `None` for anonymous callers
#[derive(Debug, Clone)]
pub struct OptionalTenant(pub Option<TenantContext>);

/// Request ID middleware
///
/// Generates or extracts a unique request ID for tracking requests through
/// the system. The request ID is added to all log messages and returned in
/// the response headers.
pub async fn request_id_middleware(mut request: Request, next: Next) -> Response {
    let request_id = request
        .headers()
        .get(X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| Uuid::parse_str(s).ok())
        .unwrap_or_else(Uuid::new_v4);

    request.extensions_mut().insert(request_id);

    let mut response = next.run(request).await;

    if let Ok(value) = HeaderValue::from_str(&request_id.to_string()) {
        response.headers_mut().insert(X_REQUEST_ID, value);
    }

    response
}

/// Request logging middleware
///
/// Logs all incoming requests with method, URI, and response status.
/// Includes request ID for correlation.
pub async fn logging_middleware(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let request_id = request
        .extensions()
        .get::<Uuid>()
        .copied()
        .unwrap_or_else(Uuid::new_v4);

    info!(
        request_id = %request_id,
        method = %method,
        uri = %uri,
        "Incoming request"
    );

    let start = std::time::Instant::now();
    let response = next.run(request).await;
    let elapsed = start.elapsed();

    let status = response.status();
    macro_rules! completed {
        ($level:expr) => {
            tracing::event!(
                $level,
                request_id = %request_id,
                method = %method,
                uri = %uri,
                status = status.as_u16(),
                duration_ms = elapsed.as_millis() as u64,
                "Request completed"
            )
        };
    }
    match status.as_u16() {
        500..=599 => completed!(tracing::Level::ERROR),
        400..=499 => completed!(tracing::Level::WARN),
        _ => completed!(tracing::Level::INFO),
    }

    response
}

/// Caller address: first `X-Forwarded-For` hop when proxies are trusted,
/// otherwise the peer address
pub fn resolve_client_ip(headers: &HeaderMap, peer: Option<IpAddr>, trust_proxy: bool) -> Option<IpAddr> {
    if trust_proxy {
        let forwarded = headers
            .get(X_FORWARDED_FOR)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .and_then(|hop| hop.trim().parse::<IpAddr>().ok());
        if forwarded.is_some() {
            return forwarded;
        }
    }
    peer
}

/// Stores the [`ClientIp`] extension
pub async fn client_ip_middleware(State(state): State<AppState>, mut request: Request, next: Next) -> Response {
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip());
    let client_ip = resolve_client_ip(request.headers(), peer, state.trust_proxy);
    request.extensions_mut().insert(ClientIp(client_ip));
    next.run(request).await
}

/// Owned copies so the request is not borrowed across the await
///
/// Every `Cookie` header is kept; HTTP/2 clients may send one per cookie.
fn credential_headers(request: &Request) -> (Option<String>, Option<String>) {
    let headers = request.headers();
    let authorization = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let cookies: Vec<&str> = headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .collect();
    let cookies = (!cookies.is_empty()).then(|| cookies.join("; "));
    (authorization, cookies)
}

/// Rejects unauthenticated requests; stores the [`TenantContext`]
pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let (authorization, cookies) = credential_headers(&request);
    let tenant = state
        .auth
        .authenticate(authorization.as_deref(), cookies.as_deref())
        .await?;
    request.extensions_mut().insert(tenant);
    Ok(next.run(request).await)
}

/// Never rejects; stores an [`OptionalTenant`]
pub async fn optional_auth(State(state): State<AppState>, mut request: Request, next: Next) -> Response {
    let (authorization, cookies) = credential_headers(&request);
    let tenant = state
        .auth
        .authenticate_optional(authorization.as_deref(), cookies.as_deref())
        .await;
    request.extensions_mut().insert(OptionalTenant(tenant));
    next.run(request).await
}
