//! Request handlers
//!
//! JSON endpoints live under `/api`; [`pages`] renders the HTML screens and
//! [`oauth`] drives the provider redirects.

pub mod auth;
pub mod categories;
pub mod health;
pub mod oauth;
pub mod pages;
pub mod products;

use cardapio_db::entities::user;

use crate::accounts::AccountError;
use crate::error::ApiError;
use crate::middleware::{set_cookie, SESSION_COOKIE};
use crate::models::SessionResponse;
use crate::AppState;

/// Sign a session for `account`; returns the `Set-Cookie` value and the body
pub(crate) fn start_session(
    state: &AppState,
    account: &user::Model,
) -> Result<(String, SessionResponse), ApiError> {
    let (token, claims) = state
        .sessions
        .issue(account.id, &account.name)
        .map_err(AccountError::from)?;

    let cookie = set_cookie(
        SESSION_COOKIE,
        &token,
        state.sessions.validity().num_seconds(),
        state.secure_cookies,
    );

    Ok((
        cookie,
        SessionResponse {
            user: account.into(),
            token,
            expires_at: claims.expires_at(),
        },
    ))
}

/// Trimmed text, `None` when blank
pub(crate) fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_non_blank() {
        assert_eq!(non_blank(Some("  Bebidas ")), Some("Bebidas".to_string()));
        assert_eq!(non_blank(Some("   ")), None);
        assert_eq!(non_blank(None), None);
    }
}
