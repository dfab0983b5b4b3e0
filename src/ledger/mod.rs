//! Ledger Core
//!
//! Accounts, entries and transfers over PostgreSQL. A transfer is four writes
//! committed together; balance rows are locked in ascending id order.

pub mod error;
pub mod models;
pub mod pg;
pub mod querier;
pub mod store;
pub mod transfer;
pub mod tx;

#[cfg(test)]
pub mod mock;

pub use error::StoreError;
pub use models::{
    Account, AddAccountBalanceParams, CreateAccountParams, CreateEntryParams,
    CreateTransferParams, CreateUserParams, Currency, Entry, ListAccountsParams,
    ListEntriesParams, ListTransfersParams, Transfer, UnsupportedCurrency, User,
};
pub use pg::{PgBackend, PgQuerier, PgTxQuerier};
pub use querier::Querier;
pub use store::{LedgerStore, Store};
pub use transfer::{TransferTxParams, TransferTxResult, execute_transfer};
pub use tx::{Backend, run_in_transaction};

#[cfg(test)]
pub use mock::MemoryBackend;
