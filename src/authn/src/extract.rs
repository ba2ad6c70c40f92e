//! Bearer credential extraction

use cookie::{Cookie, CookieJar};

/// Default name of the fallback session cookie
pub const DEFAULT_TOKEN_COOKIE: &str = "monkeys_token";

/// Pull a bearer token from an `Authorization` header value, falling back to
/// the named cookie in a `Cookie` header value.
///
/// A present but non-bearer `Authorization` header does not block the cookie
/// fallback.
pub fn extract_bearer(
    authorization: Option<&str>,
    cookie_header: Option<&str>,
    cookie_name: &str,
) -> Option<String> {
    authorization
        .and_then(bearer_from_header)
        .map(str::to_string)
        .or_else(|| cookie_header.and_then(|cookies| cookie_value(cookies, cookie_name)))
}

fn bearer_from_header(value: &str) -> Option<&str> {
    let value = value.trim();
    let (scheme, token) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    Some(token.trim()).filter(|token| !token.is_empty())
}

/// Parse every `;`-separated cookie, skipping chunks that do not parse
fn parse_cookies(cookie_header: &str) -> CookieJar {
    let mut jar = CookieJar::new();
    for cookie in Cookie::split_parse(cookie_header).filter_map(|cookie| cookie.ok()) {
        jar.add_original(cookie.into_owned());
    }
    jar
}

fn cookie_value(cookie_header: &str, name: &str) -> Option<String> {
    parse_cookies(cookie_header)
        .get(name)
        .map(|cookie| cookie.value_trimmed().to_string())
        .filter(|value| !value.is_empty())
}
