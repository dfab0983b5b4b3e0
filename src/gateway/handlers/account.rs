//! Account handlers
//!
//! Every route here runs behind `jwt_auth_middleware`; the token subject is
//! the only owner a caller may act for.

use std::sync::Arc;

use axum::{
    Extension, Json,
    extract::{
        Path, Query, State,
        rejection::{JsonRejection, PathRejection, QueryRejection},
    },
};
use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use super::super::state::AppState;
use super::super::types::{ApiError, ApiResult, created, error_codes, ok};
use super::{json_body, path_params, query_params, validated};
use crate::ledger::{Account, CreateAccountParams, Currency, ListAccountsParams};
use crate::user_auth::Claims;

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateAccountRequest {
    #[schema(example = "USD")]
    pub currency: Currency,
}

#[derive(Debug, Deserialize, Validate, IntoParams)]
#[into_params(parameter_in = Path)]
pub struct AccountIdPath {
    /// Account ID
    #[validate(range(min = 1))]
    pub id: i64,
}

#[derive(Debug, Deserialize, Validate, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ListAccountsQuery {
    /// 1-based page number
    #[validate(range(min = 1))]
    pub page_id: i32,
    /// Accounts per page
    #[validate(range(min = 5, max = 100))]
    pub page_size: i32,
}

fn ensure_owner(account: &Account, claims: &Claims) -> Result<(), ApiError> {
    if account.owner != claims.sub {
        tracing::warn!(
            account_id = account.id,
            caller = %claims.sub,
            "Account does not belong to the authenticated user"
        );
        return ApiError::unauthorized(
            error_codes::NOT_OWNER,
            "account doesn't belong to the authenticated user",
        )
        .into_err();
    }
    Ok(())
}

/// Open an account for the caller
///
/// POST /api/v1/accounts
#[utoipa::path(
    post,
    path = "/api/v1/accounts",
    request_body = CreateAccountRequest,
    responses(
        (status = 201, description = "Account created", body = Account),
        (status = 400, description = "Invalid currency"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Account for this currency already exists")
    ),
    security(("bearer_auth" = [])),
    tag = "Accounts"
)]
pub async fn create_account(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<Claims>,
    payload: Result<Json<CreateAccountRequest>, JsonRejection>,
) -> ApiResult<Account> {
    let req = json_body(payload)?;

    let account = state
        .with_timeout(async {
            let params = CreateAccountParams::new(claims.sub.clone(), req.currency);
            let account = state.store.queries().create_account(params).await?;
            Ok::<_, ApiError>(account)
        })
        .await?;

    tracing::info!(
        account_id = account.id,
        owner = %account.owner,
        currency = %account.currency,
        "Account created"
    );
    created(account)
}

/// Get one of the caller's accounts
///
/// GET /api/v1/accounts/{id}
#[utoipa::path(
    get,
    path = "/api/v1/accounts/{id}",
    params(AccountIdPath),
    responses(
        (status = 200, description = "Account details", body = Account),
        (status = 401, description = "Not the account owner"),
        (status = 404, description = "Account not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Accounts"
)]
pub async fn get_account(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<Claims>,
    path: Result<Path<AccountIdPath>, PathRejection>,
) -> ApiResult<Account> {
    let AccountIdPath { id } = validated(path_params(path)?)?;

    let account = state
        .with_timeout(async {
            let account = state.store.queries().get_account(id).await?;
            Ok::<_, ApiError>(account)
        })
        .await?;

    ensure_owner(&account, &claims)?;
    ok(account)
}

/// Page through the caller's accounts
///
/// GET /api/v1/accounts?page_id=1&page_size=5
#[utoipa::path(
    get,
    path = "/api/v1/accounts",
    params(ListAccountsQuery),
    responses(
        (status = 200, description = "Accounts in creation order", body = Vec<Account>),
        (status = 400, description = "Invalid paging parameters"),
        (status = 401, description = "Unauthorized")
    ),
    security(("bearer_auth" = [])),
    tag = "Accounts"
)]
pub async fn list_accounts(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<Claims>,
    query: Result<Query<ListAccountsQuery>, QueryRejection>,
) -> ApiResult<Vec<Account>> {
    let page = validated(query_params(query)?)?;

    let params = ListAccountsParams {
        owner: claims.sub,
        limit: page.page_size as i64,
        offset: (page.page_id as i64 - 1) * page.page_size as i64,
    };

    let accounts = state
        .with_timeout(async {
            let accounts = state.store.queries().list_accounts(params).await?;
            Ok::<_, ApiError>(accounts)
        })
        .await?;

    ok(accounts)
}

/// Close one of the caller's accounts
///
/// DELETE /api/v1/accounts/{id}
#[utoipa::path(
    delete,
    path = "/api/v1/accounts/{id}",
    params(AccountIdPath),
    responses(
        (status = 200, description = "Account deleted"),
        (status = 401, description = "Not the account owner"),
        (status = 403, description = "Account still referenced by ledger records"),
        (status = 404, description = "Account not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Accounts"
)]
pub async fn delete_account(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<Claims>,
    path: Result<Path<AccountIdPath>, PathRejection>,
) -> ApiResult<()> {
    let AccountIdPath { id } = validated(path_params(path)?)?;

    state
        .with_timeout(async {
            let mut q = state.store.queries();
            let account = q.get_account(id).await?;
            ensure_owner(&account, &claims)?;
            q.delete_account(id).await?;
            Ok::<_, ApiError>(())
        })
        .await?;

    tracing::info!(account_id = id, "Account deleted");
    ok(())
}
