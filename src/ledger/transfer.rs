//! Transfer orchestration
//!
//! One transfer writes four records inside a single unit of work:
//! the transfer row, a debit entry, a credit entry, and the two balance
//! adjustments. Balance rows are always locked in ascending account id
//! order so opposing transfers between the same pair cannot deadlock.

use serde::{Deserialize, Serialize};
use tracing::debug;
use utoipa::ToSchema;

use super::error::StoreError;
use super::models::{
    Account, AddAccountBalanceParams, CreateEntryParams, CreateTransferParams, Entry, Transfer,
};
use super::querier::Querier;

/// Input to a money transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct TransferTxParams {
    pub from_account_id: i64,
    pub to_account_id: i64,
    /// Strictly positive, in minor units
    pub amount: i64,
}

/// Every record written by one transfer, as seen inside its transaction.
///
/// When `from == to` the two account slots are successive snapshots of the same
/// row: `to_account` after the credit, `from_account` after the debit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct TransferTxResult {
    pub transfer: Transfer,
    pub from_account: Account,
    pub to_account: Account,
    pub from_entry: Entry,
    pub to_entry: Entry,
}

/// Write one transfer through `q`.
///
/// Must run inside a transaction; on error the caller rolls back.
pub async fn execute_transfer<Q>(q: &mut Q, arg: TransferTxParams) -> Result<TransferTxResult, StoreError>
where
    Q: Querier + ?Sized,
{
    let transfer = q
        .create_transfer(CreateTransferParams {
            from_account_id: arg.from_account_id,
            to_account_id: arg.to_account_id,
            amount: arg.amount,
        })
        .await?;
    debug!(transfer_id = transfer.id, "Transfer record created");

    let from_entry = q
        .create_entry(CreateEntryParams {
            account_id: arg.from_account_id,
            amount: -arg.amount,
        })
        .await?;

    let to_entry = q
        .create_entry(CreateEntryParams {
            account_id: arg.to_account_id,
            amount: arg.amount,
        })
        .await?;
    debug!(
        from_entry_id = from_entry.id,
        to_entry_id = to_entry.id,
        "Entries created"
    );

    let (from_account, to_account) = if arg.from_account_id < arg.to_account_id {
        add_money(q, arg.from_account_id, -arg.amount, arg.to_account_id, arg.amount).await?
    } else {
        let (to_account, from_account) =
            add_money(q, arg.to_account_id, arg.amount, arg.from_account_id, -arg.amount).await?;
        (from_account, to_account)
    };
    debug!(
        from_balance = from_account.balance,
        to_balance = to_account.balance,
        "Balances updated"
    );

    Ok(TransferTxResult {
        transfer,
        from_account,
        to_account,
        from_entry,
        to_entry,
    })
}

/// Apply `amount1` to `account_id1`, then `amount2` to `account_id2`.
///
/// When both ids are equal the second read reflects the first write.
async fn add_money<Q>(
    q: &mut Q,
    account_id1: i64,
    amount1: i64,
    account_id2: i64,
    amount2: i64,
) -> Result<(Account, Account), StoreError>
where
    Q: Querier + ?Sized,
{
    let account1 = q
        .add_account_balance(AddAccountBalanceParams {
            id: account_id1,
            amount: amount1,
        })
        .await?;
    let account2 = q
        .add_account_balance(AddAccountBalanceParams {
            id: account_id2,
            amount: amount2,
        })
        .await?;
    Ok((account1, account2))
}
