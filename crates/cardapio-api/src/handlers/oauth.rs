//! Provider redirects for federated login
//!
//! `GET /login/{provider}` stores a random `state` in a short-lived cookie
//! and sends the browser to the provider. The callback checks that the
//! returned `state` matches the cookie before exchanging the code.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap},
    response::{AppendHeaders, IntoResponse, Redirect, Response},
};
use cardapio_auth::{new_oauth_state, Provider};
use tracing::{error, info, warn};

use super::start_session;
use crate::accounts;
use crate::middleware::{clear_cookie, read_cookie, set_cookie, OAUTH_STATE_COOKIE};
use crate::models::OAuthCallbackQuery;
use crate::AppState;

/// Lifetime of the `oauth_state` cookie
const OAUTH_STATE_MAX_AGE_SECS: i64 = 600;

fn login_error(code: &str) -> Response {
    (
        AppendHeaders([(header::SET_COOKIE, clear_cookie(OAUTH_STATE_COOKIE))]),
        Redirect::to(&format!("/login?erro={}", code)),
    )
        .into_response()
}

/// Start a federated login
pub async fn oauth_login(
    State(state): State<Arc<AppState>>,
    Path(provider): Path<Provider>,
) -> Response {
    let Some(idp) = state.identity_provider(provider) else {
        warn!(%provider, "Login attempted with unconfigured provider");
        return login_error("provedor_indisponivel");
    };

    let oauth_state = new_oauth_state();
    let url = match idp.authorize_url(&oauth_state, &state.redirect_uri(provider)) {
        Ok(url) => url,
        Err(e) => {
            error!(%provider, "Failed to build authorization URL: {}", e);
            return login_error("provedor_indisponivel");
        }
    };

    (
        AppendHeaders([(
            header::SET_COOKIE,
            set_cookie(
                OAUTH_STATE_COOKIE,
                &oauth_state,
                OAUTH_STATE_MAX_AGE_SECS,
                state.secure_cookies,
            ),
        )]),
        Redirect::to(&url),
    )
        .into_response()
}

/// Provider callback: verify `state`, exchange the code, upsert the account
pub async fn oauth_callback(
    State(state): State<Arc<AppState>>,
    Path(provider): Path<Provider>,
    Query(query): Query<OAuthCallbackQuery>,
    headers: HeaderMap,
) -> Response {
    let Some(idp) = state.identity_provider(provider) else {
        return login_error("provedor_indisponivel");
    };

    if let Some(reason) = query.error.as_deref() {
        info!(%provider, reason, "Provider returned an error");
        return login_error("login_falhou");
    }

    let expected = read_cookie(&headers, OAUTH_STATE_COOKIE);
    match (expected, query.state.as_deref()) {
        (Some(expected), Some(got)) if expected == got => {}
        _ => {
            warn!(%provider, "OAuth state mismatch");
            return login_error("estado_invalido");
        }
    }

    let Some(code) = query.code.as_deref() else {
        return login_error("login_falhou");
    };

    let identity = match idp.exchange(code, &state.redirect_uri(provider)).await {
        Ok(identity) => identity,
        Err(e) => {
            warn!(%provider, "Code exchange failed: {}", e);
            return login_error("login_falhou");
        }
    };

    let account = match accounts::login_federated(&state.db, &identity).await {
        Ok(account) => account,
        Err(e) => {
            warn!(%provider, "Federated login rejected: {}", e);
            return login_error("login_falhou");
        }
    };

    let session_cookie = match start_session(&state, &account) {
        Ok((cookie, _)) => cookie,
        Err(e) => return e.into_response(),
    };

    info!(user_id = account.id, %provider, "User logged in");

    (
        AppendHeaders([
            (header::SET_COOKIE, clear_cookie(OAUTH_STATE_COOKIE)),
            (header::SET_COOKIE, session_cookie),
        ]),
        Redirect::to("/dashboard"),
    )
        .into_response()
}
