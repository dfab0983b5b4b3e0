//! Transfer handler

use std::sync::Arc;

use axum::{
    Extension, Json,
    extract::{State, rejection::JsonRejection},
};
use serde::Deserialize;
use utoipa::ToSchema;
use validator::Validate;

use super::super::state::AppState;
use super::super::types::{ApiError, ApiResult, error_codes, ok};
use super::{json_body, validated};
use crate::ledger::{Account, Currency, Querier, TransferTxParams, TransferTxResult};
use crate::user_auth::Claims;

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateTransferRequest {
    #[schema(example = 1)]
    #[validate(range(min = 1))]
    pub from_account_id: i64,
    #[schema(example = 2)]
    #[validate(range(min = 1))]
    pub to_account_id: i64,
    /// Amount in minor units
    #[schema(example = 1000)]
    #[validate(range(min = 1))]
    pub amount: i64,
    #[schema(example = "USD")]
    pub currency: String,
}

/// Load an account and check it is held in `currency`
async fn valid_account(
    q: &mut dyn Querier,
    account_id: i64,
    currency: Currency,
) -> Result<Account, ApiError> {
    let account = q.get_account(account_id).await?;

    if account.currency != currency.as_str() {
        return ApiError::bad_request(
            error_codes::CURRENCY_MISMATCH,
            format!(
                "account [{}] currency mismatch: {} vs {}",
                account.id, account.currency, currency
            ),
        )
        .into_err();
    }
    Ok(account)
}

/// Move money from one of the caller's accounts
///
/// POST /api/v1/transfers
#[utoipa::path(
    post,
    path = "/api/v1/transfers",
    request_body = CreateTransferRequest,
    responses(
        (status = 200, description = "Transfer committed", body = TransferTxResult),
        (status = 400, description = "Invalid amount, unsupported currency or currency mismatch"),
        (status = 401, description = "Source account not owned by caller"),
        (status = 404, description = "Account not found"),
        (status = 504, description = "Timed out; nothing was committed")
    ),
    security(("bearer_auth" = [])),
    tag = "Transfers"
)]
pub async fn create_transfer(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<Claims>,
    payload: Result<Json<CreateTransferRequest>, JsonRejection>,
) -> ApiResult<TransferTxResult> {
    let req = validated(json_body(payload)?)?;
    let currency: Currency = req
        .currency
        .parse()
        .map_err(|e: crate::ledger::UnsupportedCurrency| {
            ApiError::bad_request(error_codes::INVALID_PARAMETER, e.to_string())
        })?;

    let result = state
        .with_timeout(async {
            let mut q = state.store.queries();
            let from_account = valid_account(q.as_mut(), req.from_account_id, currency).await?;
            if from_account.owner != claims.sub {
                return ApiError::unauthorized(
                    error_codes::NOT_OWNER,
                    "from account doesn't belong to the authenticated user",
                )
                .into_err();
            }
            valid_account(q.as_mut(), req.to_account_id, currency).await?;

            let result = state
                .store
                .transfer_tx(TransferTxParams {
                    from_account_id: req.from_account_id,
                    to_account_id: req.to_account_id,
                    amount: req.amount,
                })
                .await?;
            Ok::<_, ApiError>(result)
        })
        .await?;

    tracing::info!(
        transfer_id = result.transfer.id,
        from = result.transfer.from_account_id,
        to = result.transfer.to_account_id,
        amount = result.transfer.amount,
        "Transfer committed"
    );
    ok(result)
}
