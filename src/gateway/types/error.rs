//! Handler error type and its mapping from domain errors

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};

use super::response::{ApiResponse, error_codes};
use crate::ledger::StoreError;
use crate::user_auth::AuthError;

/// Error returned by every handler: HTTP status plus envelope code and message
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub code: i32,
    pub msg: String,
}

impl ApiError {
    pub fn new(status: StatusCode, code: i32, msg: impl Into<String>) -> Self {
        Self {
            status,
            code,
            msg: msg.into(),
        }
    }

    pub fn bad_request(code: i32, msg: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, code, msg)
    }

    pub fn unauthorized(code: i32, msg: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, code, msg)
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, error_codes::NOT_FOUND, msg)
    }

    pub fn timeout() -> Self {
        Self::new(
            StatusCode::GATEWAY_TIMEOUT,
            error_codes::TIMEOUT,
            "request timed out",
        )
    }

    pub fn into_err<T>(self) -> Result<T, Self> {
        Err(self)
    }

    pub fn internal() -> Self {
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            error_codes::INTERNAL_ERROR,
            "internal error",
        )
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(ApiResponse::<()>::error(self.code, self.msg)),
        )
            .into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match &err {
            StoreError::NotFound => ApiError::not_found(err.to_string()),
            StoreError::UniqueViolation { .. } => ApiError::new(
                StatusCode::FORBIDDEN,
                error_codes::ALREADY_EXISTS,
                err.to_string(),
            ),
            StoreError::ForeignKeyViolation { .. } => ApiError::new(
                StatusCode::FORBIDDEN,
                error_codes::CONSTRAINT_VIOLATION,
                err.to_string(),
            ),
            StoreError::InvalidAmount(_) => {
                ApiError::bad_request(error_codes::INVALID_AMOUNT, err.to_string())
            }
            _ => {
                if err.is_state_uncertain() {
                    tracing::error!(error = %err, code = err.code(), "Ledger state uncertain");
                } else {
                    tracing::error!(error = %err, code = err.code(), "Storage failure");
                }
                ApiError::internal()
            }
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::InvalidInput(msg) => {
                ApiError::bad_request(error_codes::INVALID_PARAMETER, msg)
            }
            AuthError::UserExists => ApiError::new(
                StatusCode::FORBIDDEN,
                error_codes::ALREADY_EXISTS,
                "username or email already exists",
            ),
            AuthError::UserNotFound => ApiError::not_found("user not found"),
            AuthError::InvalidCredentials => {
                ApiError::unauthorized(error_codes::AUTH_FAILED, "incorrect password")
            }
            AuthError::InvalidToken => {
                ApiError::unauthorized(error_codes::AUTH_FAILED, "invalid or expired token")
            }
            AuthError::Store(e) => e.into(),
            other => {
                tracing::error!(error = %other, "Authentication failure");
                ApiError::internal()
            }
        }
    }
}
