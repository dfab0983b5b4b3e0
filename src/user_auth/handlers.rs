use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
};
use std::sync::Arc;

use super::service::{CreateUserRequest, LoginUserRequest, LoginUserResponse, UserResponse};
use crate::gateway::handlers::json_body;
use crate::gateway::state::AppState;
use crate::gateway::types::{ApiError, ApiResult, created, ok};

/// Register a new user
///
/// POST /api/v1/users
#[utoipa::path(
    post,
    path = "/api/v1/users",
    request_body = CreateUserRequest,
    responses(
        (status = 201, description = "User registered successfully", body = UserResponse),
        (status = 400, description = "Invalid input"),
        (status = 403, description = "Username or email already exists"),
        (status = 500, description = "Internal server error")
    ),
    tag = "Users"
)]
pub async fn create_user(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<CreateUserRequest>, JsonRejection>,
) -> ApiResult<UserResponse> {
    let req = json_body(payload)?;
    let user = state
        .with_timeout(async { Ok::<_, ApiError>(state.user_auth.register(req).await?) })
        .await?;
    created(user)
}

/// Login user
///
/// POST /api/v1/users/login
#[utoipa::path(
    post,
    path = "/api/v1/users/login",
    request_body = LoginUserRequest,
    responses(
        (status = 200, description = "Login successful", body = LoginUserResponse),
        (status = 400, description = "Invalid input"),
        (status = 401, description = "Incorrect password"),
        (status = 404, description = "User not found")
    ),
    tag = "Users"
)]
pub async fn login_user(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<LoginUserRequest>, JsonRejection>,
) -> ApiResult<LoginUserResponse> {
    let req = json_body(payload)?;
    let resp = state
        .with_timeout(async { Ok::<_, ApiError>(state.user_auth.login(req).await?) })
        .await?;
    tracing::info!(username = %resp.user.username, "User logged in");
    ok(resp)
}
