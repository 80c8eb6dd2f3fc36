use std::sync::Arc;

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
    Extension, Json,
};
use cardapio_db::repository::users;
use tracing::{debug, info};

use super::start_session;
use crate::accounts;
use crate::error::ApiError;
use crate::extract::ApiJson;
use crate::middleware::{clear_cookie, AuthUser, SESSION_COOKIE};
use crate::models::*;
use crate::AppState;

/// Register a local account
#[utoipa::path(
    post,
    path = "/api/auth/register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Account created, session started", body = SessionResponse),
        (status = 400, description = "Missing field", body = ErrorResponse),
        (status = 403, description = "Signup disabled", body = ErrorResponse),
        (status = 409, description = "Email already registered", body = ErrorResponse)
    ),
    tag = "auth"
)]
pub async fn register(
    State(state): State<Arc<AppState>>,
    ApiJson(req): ApiJson<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if !state.allow_signup {
        return Err(ApiError::Forbidden("signup is disabled".to_string()));
    }

    let account = accounts::register(
        &state.db,
        req.name.as_deref(),
        req.email.as_deref(),
        req.password.as_deref(),
    )
    .await?;

    let (cookie, body) = start_session(&state, &account)?;
    Ok((
        StatusCode::CREATED,
        [(header::SET_COOKIE, cookie)],
        Json(body),
    ))
}

/// Log in with email and password
#[utoipa::path(
    post,
    path = "/api/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Session started", body = SessionResponse),
        (status = 401, description = "Login failed", body = ErrorResponse)
    ),
    tag = "auth"
)]
pub async fn login(
    State(state): State<Arc<AppState>>,
    ApiJson(req): ApiJson<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let account =
        accounts::login_local(&state.db, req.email.as_deref(), req.password.as_deref()).await?;

    info!(user_id = account.id, "User logged in");

    let (cookie, body) = start_session(&state, &account)?;
    Ok(([(header::SET_COOKIE, cookie)], Json(body)))
}

/// End the session
#[utoipa::path(
    post,
    path = "/api/auth/logout",
    responses(
        (status = 204, description = "Session cookie cleared")
    ),
    tag = "auth"
)]
pub async fn logout() -> impl IntoResponse {
    (
        StatusCode::NO_CONTENT,
        [(header::SET_COOKIE, clear_cookie(SESSION_COOKIE))],
    )
}

/// Current user with its login methods
#[utoipa::path(
    get,
    path = "/api/auth/me",
    responses(
        (status = 200, description = "Current user", body = UserResponse),
        (status = 401, description = "Not authenticated", body = ErrorResponse)
    ),
    tag = "auth"
)]
pub async fn get_current_user(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<UserResponse>, ApiError> {
    debug!(user_id = user.user_id, "Getting current user");

    let account = users::get(&state.db, user.user_id).await?;
    Ok(Json(UserResponse::from(&account)))
}

/// Delete the current account with all its categories and products
#[utoipa::path(
    delete,
    path = "/api/auth/me",
    responses(
        (status = 204, description = "Account deleted"),
        (status = 401, description = "Not authenticated", body = ErrorResponse)
    ),
    tag = "auth"
)]
pub async fn delete_current_user(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<impl IntoResponse, ApiError> {
    if !accounts::delete_account(&state.db, user.user_id).await? {
        return Err(ApiError::not_found("account"));
    }

    Ok((
        StatusCode::NO_CONTENT,
        [(header::SET_COOKIE, clear_cookie(SESSION_COOKIE))],
    ))
}
