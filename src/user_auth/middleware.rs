use axum::{
    body::Body,
    extract::State,
    http::{Request, header},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;

use crate::gateway::{
    state::AppState,
    types::{ApiError, error_codes},
};

const BEARER: &str = "Bearer ";

/// Require a valid access token and expose its [`Claims`](super::Claims)
/// to downstream handlers through request extensions.
pub async fn jwt_auth_middleware(
    State(state): State<Arc<AppState>>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, ApiError> {
    let auth_header = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .ok_or_else(|| {
            ApiError::unauthorized(error_codes::MISSING_AUTH, "Missing Authorization header")
        })?;

    let token = auth_header.strip_prefix(BEARER).ok_or_else(|| {
        ApiError::unauthorized(error_codes::AUTH_FAILED, "Unsupported authorization type")
    })?;

    let claims = state.user_auth.verify_token(token).map_err(|_| {
        ApiError::unauthorized(error_codes::AUTH_FAILED, "Invalid or expired token")
    })?;

    request.extensions_mut().insert(claims);
    Ok(next.run(request).await)
}
