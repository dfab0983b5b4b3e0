//! Gateway types
//!
//! - [`ApiResponse<T>`]: unified response envelope
//! - [`ApiError`]: handler error, maps domain errors to HTTP status
//! - [`error_codes`]: envelope error codes

pub mod error;
pub mod response;

use axum::{Json, http::StatusCode};

pub use error::ApiError;
pub use response::{ApiResponse, error_codes};

/// Handler return type: status plus success envelope, or an [`ApiError`]
pub type ApiResult<T> = Result<(StatusCode, Json<ApiResponse<T>>), ApiError>;

pub fn ok<T>(data: T) -> ApiResult<T> {
    Ok((StatusCode::OK, Json(ApiResponse::success(data))))
}

pub fn created<T>(data: T) -> ApiResult<T> {
    Ok((StatusCode::CREATED, Json(ApiResponse::success(data))))
}
