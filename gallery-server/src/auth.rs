//! Request authentication
//!
//! A request is authenticated by either
//! - an `Authorization: token <t>` or `Authorization: Bearer <t>` header, or
//! - a `gallery-token` cookie.
//!
//! Cookies are sent by the browser automatically, so cookie-authenticated
//! unsafe requests must also echo the `_xsrf` cookie in the `X-XSRFToken`
//! header. Header tokens are never sent implicitly and skip that check.

use std::sync::Arc;

use axum::body::Body;
use axum::extract::State;
use axum::http::{header, HeaderMap, Request};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use tracing::{debug, warn};

use crate::error::ApiError;
use crate::state::AppState;

/// Cookie carrying the server token
pub const TOKEN_COOKIE: &str = "gallery-token";
/// Cookie carrying the XSRF token
pub const XSRF_COOKIE: &str = "_xsrf";
/// Header that must echo the XSRF cookie
pub const XSRF_HEADER: &str = "x-xsrftoken";

/// Authentication middleware.
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    req: Request<Body>,
    next: Next,
) -> Response {
    match authorize(&state, &req) {
        Ok(()) => next.run(req).await,
        Err(err) => {
            warn!(
                method = %req.method(),
                path = %req.uri().path(),
                error = %err,
                "Rejected request"
            );
            err.into_response()
        }
    }
}

fn authorize(state: &AppState, req: &Request<Body>) -> Result<(), ApiError> {
    let headers = req.headers();

    if let Some(presented) = header_token(headers) {
        // A wrong header token is not retried against the cookie
        return if tokens_match(presented, state.token()) {
            debug!("Authenticated by header token");
            Ok(())
        } else {
            Err(ApiError::Unauthorized)
        };
    }

    match cookie(headers, TOKEN_COOKIE) {
        Some(presented) if tokens_match(presented, state.token()) => {
            if !req.method().is_safe() && !xsrf_matches(headers) {
                return Err(ApiError::Forbidden(
                    "XSRF cookie does not match X-XSRFToken header".to_string(),
                ));
            }
            debug!("Authenticated by cookie");
            Ok(())
        }
        _ => Err(ApiError::Unauthorized),
    }
}

/// Token from an `Authorization: token ...` or `Authorization: Bearer ...` header
fn header_token(headers: &HeaderMap) -> Option<&str> {
    let raw = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = raw.trim().split_once(' ')?;

    if scheme.eq_ignore_ascii_case("token") || scheme.eq_ignore_ascii_case("bearer") {
        Some(token.trim())
    } else {
        None
    }
}

/// Value of cookie `name`, searching every Cookie header
fn cookie<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.trim())
}

fn xsrf_matches(headers: &HeaderMap) -> bool {
    let Some(cookie) = cookie(headers, XSRF_COOKIE).filter(|c| !c.is_empty()) else {
        return false;
    };

    headers
        .get(XSRF_HEADER)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|header| tokens_match(header, cookie))
}

/// Compare without an early exit on the first differing byte
fn tokens_match(presented: &str, expected: &str) -> bool {
    presented.len() == expected.len()
        && presented
            .bytes()
            .zip(expected.bytes())
            .fold(0u8, |diff, (a, b)| diff | (a ^ b))
            == 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(pairs: &[(&'static str, &str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.append(*name, HeaderValue::from_str(value).unwrap());
        }
        map
    }

    #[test]
    fn test_header_token_schemes() {
        assert_eq!(
            header_token(&headers(&[("authorization", "token abc")])),
            Some("abc")
        );
        assert_eq!(
            header_token(&headers(&[("authorization", "Bearer abc")])),
            Some("abc")
        );
        assert_eq!(header_token(&headers(&[("authorization", "Basic abc")])), None);
        assert_eq!(header_token(&headers(&[])), None);
    }

    #[test]
    fn test_cookie_parsing() {
        let map = headers(&[
            ("cookie", "theme=dark; gallery-token=abc"),
            ("cookie", "_xsrf=xyz"),
        ]);
        assert_eq!(cookie(&map, TOKEN_COOKIE), Some("abc"));
        assert_eq!(cookie(&map, XSRF_COOKIE), Some("xyz"));
        assert_eq!(cookie(&map, "missing"), None);
    }

    #[test]
    fn test_xsrf_requires_matching_non_empty_values() {
        assert!(xsrf_matches(&headers(&[
            ("cookie", "_xsrf=xyz"),
            ("x-xsrftoken", "xyz")
        ])));
        assert!(!xsrf_matches(&headers(&[
            ("cookie", "_xsrf=xyz"),
            ("x-xsrftoken", "abc")
        ])));
        assert!(!xsrf_matches(&headers(&[("cookie", "_xsrf="), ("x-xsrftoken", "")])));
        assert!(!xsrf_matches(&headers(&[("x-xsrftoken", "xyz")])));
    }

    #[test]
    fn test_tokens_match() {
        assert!(tokens_match("secret", "secret"));
        assert!(!tokens_match("secret", "secreT"));
        assert!(!tokens_match("secret", "secret2"));
    }
}
