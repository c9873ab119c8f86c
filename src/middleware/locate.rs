//! Token locator.
//!
//! Extracts a candidate token from a request's headers. The named cookie
//! takes precedence over the `Authorization: Bearer` header; a request with
//! neither simply has no token, which is not an error.

use axum::http::{header, HeaderMap};

/// Locate a candidate token in the request headers.
///
/// Precedence is exact: when both the cookie and the header are present the
/// cookie wins.
pub fn locate_token(headers: &HeaderMap, cookie_name: &str) -> Option<String> {
    cookie_token(headers, cookie_name).or_else(|| bearer_token(headers))
}

/// Value of the named cookie, searched across all `Cookie` headers.
fn cookie_token(headers: &HeaderMap, cookie_name: &str) -> Option<String> {
    for value in headers.get_all(header::COOKIE) {
        let Ok(raw) = value.to_str() else { continue };
        for pair in raw.split(';') {
            if let Some((name, value)) = pair.trim().split_once('=') {
                if name == cookie_name && !value.is_empty() {
                    return Some(value.to_string());
                }
            }
        }
    }
    None
}

/// Token from `Authorization: Bearer <token>`.
fn bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .filter(|t| !t.is_empty())
        .map(ToString::to_string)
}
