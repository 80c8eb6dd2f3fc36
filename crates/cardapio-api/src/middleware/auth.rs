//! Session authentication middleware
//!
//! The session token is read from the HTTP-only `session_token` cookie, or
//! from an `Authorization: Bearer <token>` header for API clients. A valid
//! token whose account no longer exists is rejected.

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use cardapio_db::repository::users;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ApiError;
use crate::AppState;

/// Cookie carrying the session JWT
pub const SESSION_COOKIE: &str = "session_token";

/// Cookie carrying the pending OAuth `state`
pub const OAUTH_STATE_COOKIE: &str = "oauth_state";

/// Authenticated user, injected into request extensions
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthUser {
    pub user_id: i32,
    /// Current display name
    pub name: String,
}

/// Value of cookie `name`, if the request carries it
pub fn read_cookie<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|cookies| cookies.split(';'))
        .map(str::trim)
        .find_map(|cookie| {
            cookie
                .strip_prefix(name)
                .and_then(|rest| rest.strip_prefix('='))
        })
        .filter(|value| !value.is_empty())
}

/// `Set-Cookie` value for an HTTP-only cookie
pub fn set_cookie(name: &str, value: &str, max_age_secs: i64, secure: bool) -> String {
    let mut cookie = format!(
        "{}={}; HttpOnly; SameSite=Lax; Path=/; Max-Age={}",
        name, value, max_age_secs
    );
    if secure {
        cookie.push_str("; Secure");
    }
    cookie
}

/// `Set-Cookie` value that removes cookie `name`
pub fn clear_cookie(name: &str) -> String {
    format!("{}=; HttpOnly; SameSite=Lax; Path=/; Max-Age=0", name)
}

fn extract_token(headers: &HeaderMap) -> Result<&str, ApiError> {
    if let Some(token) = read_cookie(headers, SESSION_COOKIE) {
        return Ok(token);
    }

    let auth_header = headers
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .ok_or_else(|| {
            ApiError::Unauthorized(
                "Missing authentication token (cookie or Authorization header)".to_string(),
            )
        })?;

    auth_header.strip_prefix("Bearer ").ok_or_else(|| {
        ApiError::Unauthorized(
            "Invalid Authorization header format. Expected 'Bearer <token>'".to_string(),
        )
    })
}

/// Resolve the session of a request to the account it belongs to
pub async fn authenticate(state: &AppState, headers: &HeaderMap) -> Result<AuthUser, ApiError> {
    let token = extract_token(headers)?;

    let claims = state
        .sessions
        .validate(token)
        .map_err(|e| ApiError::Unauthorized(format!("Invalid or expired token: {}", e)))?;

    let account = users::find_by_id(&state.db, claims.user_id)
        .await?
        .ok_or_else(|| {
            debug!(user_id = claims.user_id, "Session refers to a deleted account");
            ApiError::Unauthorized("Session is no longer valid".to_string())
        })?;

    Ok(AuthUser {
        user_id: account.id,
        name: account.name,
    })
}

/// JSON API guard: 401 with an [`ErrorResponse`](crate::models::ErrorResponse)
/// when the request has no valid session
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let user = authenticate(&state, request.headers()).await?;
    request.extensions_mut().insert(user);
    Ok(next.run(request).await)
}

/// HTML page guard: sends visitors without a valid session to `/login`
pub async fn require_page_auth(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Response {
    match authenticate(&state, request.headers()).await {
        Ok(user) => {
            request.extensions_mut().insert(user);
            next.run(request).await
        }
        Err(ApiError::Internal(detail)) => ApiError::Internal(detail).into_response(),
        Err(_) => Redirect::to("/login").into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers_with_cookie(cookie: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_str(cookie).unwrap());
        headers
    }

    #[test]
    fn test_read_cookie_among_others() {
        let headers = headers_with_cookie("theme=dark; session_token=abc.def.ghi; oauth_state=xyz");

        assert_eq!(read_cookie(&headers, SESSION_COOKIE), Some("abc.def.ghi"));
        assert_eq!(read_cookie(&headers, OAUTH_STATE_COOKIE), Some("xyz"));
        assert_eq!(read_cookie(&headers, "missing"), None);
    }

    #[test]
    fn test_read_cookie_requires_exact_name() {
        let headers = headers_with_cookie("session_token_old=stale");
        assert_eq!(read_cookie(&headers, SESSION_COOKIE), None);

        let headers = headers_with_cookie("session_token=");
        assert_eq!(read_cookie(&headers, SESSION_COOKIE), None);
    }

    #[test]
    fn test_cookie_token_preferred_over_header() {
        let mut headers = headers_with_cookie("session_token=from-cookie");
        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_static("Bearer from-header"),
        );

        assert_eq!(extract_token(&headers).unwrap(), "from-cookie");
    }

    #[test]
    fn test_bearer_header() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_static("Bearer token123"),
        );
        assert_eq!(extract_token(&headers).unwrap(), "token123");

        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_static("Basic dXNlcjpwYXNz"),
        );
        assert!(matches!(
            extract_token(&headers),
            Err(ApiError::Unauthorized(m)) if m.contains("Invalid Authorization header format")
        ));
    }

    #[test]
    fn test_missing_token() {
        assert!(matches!(
            extract_token(&HeaderMap::new()),
            Err(ApiError::Unauthorized(m)) if m.contains("Missing authentication token")
        ));
    }

    #[test]
    fn test_cookie_strings() {
        let cookie = set_cookie(SESSION_COOKIE, "tok", 3600, true);
        assert!(cookie.starts_with("session_token=tok;"));
        assert!(cookie.contains("HttpOnly"));
        assert!(cookie.contains("Max-Age=3600"));
        assert!(cookie.ends_with("; Secure"));

        assert!(!set_cookie(SESSION_COOKIE, "tok", 60, false).contains("Secure"));
        assert!(clear_cookie(SESSION_COOKIE).contains("Max-Age=0"));
    }
}
