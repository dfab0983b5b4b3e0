//! HTTP handlers

pub mod account;
pub mod health;
pub mod transfer;

pub use account::{
    AccountIdPath, CreateAccountRequest, ListAccountsQuery, create_account, delete_account,
    get_account, list_accounts,
};
pub use health::{HealthResponse, health_check};
pub use transfer::{CreateTransferRequest, create_transfer};

use axum::{
    Json,
    extract::{
        Path, Query,
        rejection::{JsonRejection, PathRejection, QueryRejection},
    },
};
use validator::Validate;

use super::types::{ApiError, error_codes};

/// Unwrap a JSON body, reporting malformed input as 400 instead of axum's 422
pub(crate) fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    payload
        .map(|Json(body)| body)
        .map_err(|e| ApiError::bad_request(error_codes::INVALID_PARAMETER, e.body_text()))
}

pub(crate) fn query_params<T>(params: Result<Query<T>, QueryRejection>) -> Result<T, ApiError> {
    params
        .map(|Query(q)| q)
        .map_err(|e| ApiError::bad_request(error_codes::INVALID_PARAMETER, e.body_text()))
}

pub(crate) fn path_params<T>(params: Result<Path<T>, PathRejection>) -> Result<T, ApiError> {
    params
        .map(|Path(p)| p)
        .map_err(|e| ApiError::bad_request(error_codes::INVALID_PARAMETER, e.body_text()))
}

/// Run derive-based field validation
pub(crate) fn validated<T: Validate>(value: T) -> Result<T, ApiError> {
    value
        .validate()
        .map_err(|e| ApiError::bad_request(error_codes::INVALID_PARAMETER, e.to_string()))?;
    Ok(value)
}
