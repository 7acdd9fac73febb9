//! Where a request may carry its token.
//!
//! Sources are tried in order and the first non-empty value wins. Adding a
//! transport means adding a function to the list.

use axum::http::{HeaderMap, header};

use super::cookie::{ACCESS_COOKIE_NAME, REFRESH_COOKIE_NAME, get_cookie};

/// Pulls a raw token out of the request headers.
pub type TokenSource = for<'a> fn(&'a HeaderMap) -> Option<&'a str>;

/// Sources for access tokens: the cookie first, then the Authorization header.
pub const ACCESS_TOKEN_SOURCES: &[TokenSource] = &[access_cookie, bearer_header];

/// Header sources for refresh tokens. The request body is checked after these.
pub const REFRESH_TOKEN_SOURCES: &[TokenSource] = &[refresh_cookie];

pub fn access_cookie(headers: &HeaderMap) -> Option<&str> {
    get_cookie(headers, ACCESS_COOKIE_NAME)
}

pub fn refresh_cookie(headers: &HeaderMap) -> Option<&str> {
    get_cookie(headers, REFRESH_COOKIE_NAME)
}

/// `Authorization: Bearer <token>`
pub fn bearer_header(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    value.strip_prefix("Bearer ").map(str::trim)
}

/// Run the sources in order and return the first non-empty token.
pub fn extract_token<'a>(headers: &'a HeaderMap, sources: &[TokenSource]) -> Option<&'a str> {
    sources
        .iter()
        .filter_map(|source| source(headers))
        .find(|token| !token.is_empty())
}
