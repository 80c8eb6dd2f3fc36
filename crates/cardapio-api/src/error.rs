//! HTTP error mapping
//!
//! Every handler returns `Result<_, ApiError>`; the response body is always
//! an [`ErrorResponse`] with a stable machine-readable code.

use axum::{
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use cardapio_db::RepoError;
use thiserror::Error;
use tracing::error;

use crate::accounts::AccountError;
use crate::models::ErrorResponse;

/// Message returned for every rejected login, whatever the reason
pub const LOGIN_FAILED_MESSAGE: &str = "login failed";

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),

    /// Missing, or owned by another user
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("login failed")]
    LoginFailed,

    #[error("{0}")]
    Forbidden(String),

    /// Logged server-side, never shown to the client
    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Unauthorized(_) | ApiError::LoginFailed => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ApiError::Validation(_) => "VALIDATION_ERROR",
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::Conflict(_) => "CONFLICT",
            ApiError::Unauthorized(_) => "UNAUTHORIZED",
            ApiError::LoginFailed => "LOGIN_FAILED",
            ApiError::Forbidden(_) => "FORBIDDEN",
            ApiError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    pub fn not_found(what: &str) -> Self {
        ApiError::NotFound(format!("{} not found", what))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let message = match &self {
            ApiError::Internal(detail) => {
                error!("Internal error: {}", detail);
                "internal server error".to_string()
            }
            ApiError::LoginFailed => LOGIN_FAILED_MESSAGE.to_string(),
            other => other.to_string(),
        };

        (
            self.status(),
            Json(ErrorResponse {
                error: message,
                code: Some(self.code().to_string()),
            }),
        )
            .into_response()
    }
}

impl From<RepoError> for ApiError {
    fn from(err: RepoError) -> Self {
        match err {
            RepoError::NotFound => ApiError::NotFound("resource not found".to_string()),
            RepoError::Conflict(detail) => ApiError::Conflict(detail),
            RepoError::Invalid(detail) => ApiError::Validation(detail),
            RepoError::Db(e) => ApiError::Internal(e.to_string()),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::Validation(format!("invalid request body: {}", rejection.body_text()))
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        ApiError::Validation(format!("invalid path parameter: {}", rejection.body_text()))
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::Validation(format!("invalid query string: {}", rejection.body_text()))
    }
}

impl From<AccountError> for ApiError {
    fn from(err: AccountError) -> Self {
        match err {
            AccountError::MissingField(field) => {
                ApiError::Validation(format!("field '{}' is required", field))
            }
            AccountError::EmailTaken => ApiError::Conflict("email already registered".to_string()),
            AccountError::LoginFailed
            | AccountError::EmailNotVerified(_)
            | AccountError::IdentityMismatch(_) => ApiError::LoginFailed,
            AccountError::Repo(e) => e.into(),
            AccountError::Password(e) => ApiError::Internal(e.to_string()),
            AccountError::Session(e) => ApiError::Internal(e.to_string()),
        }
    }
}
