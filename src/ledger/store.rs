//! Store facade consumed by the HTTP layer

use async_trait::async_trait;
use tracing::{Instrument, info_span, warn};

use super::error::StoreError;
use super::querier::Querier;
use super::transfer::{TransferTxParams, TransferTxResult, execute_transfer};
use super::tx::{Backend, run_in_transaction};

/// Everything callers need: autocommit queries plus the atomic transfer.
#[async_trait]
pub trait Store: Send + Sync {
    /// Autocommit query layer
    fn queries(&self) -> Box<dyn Querier>;

    /// Move `amount` between two accounts as one unit of work.
    ///
    /// Callers are expected to have checked account existence, currency
    /// and ownership; this only enforces a positive amount.
    async fn transfer_tx(&self, arg: TransferTxParams) -> Result<TransferTxResult, StoreError>;

    /// Storage liveness
    async fn ping(&self) -> Result<(), StoreError>;
}

/// [`Store`] over any [`Backend`]
pub struct LedgerStore<B> {
    backend: B,
}

impl<B: Backend> LedgerStore<B> {
    pub fn new(backend: B) -> Self {
        Self { backend }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }
}

#[async_trait]
impl<B: Backend> Store for LedgerStore<B> {
    fn queries(&self) -> Box<dyn Querier> {
        Box::new(self.backend.direct())
    }

    async fn transfer_tx(&self, arg: TransferTxParams) -> Result<TransferTxResult, StoreError> {
        let span = info_span!(
            "transfer_tx",
            from = arg.from_account_id,
            to = arg.to_account_id,
            amount = arg.amount
        );

        async move {
            if arg.amount <= 0 {
                warn!("Rejected non-positive transfer amount");
                return Err(StoreError::InvalidAmount(arg.amount));
            }
            run_in_transaction(&self.backend, move |q| Box::pin(execute_transfer(q, arg))).await
        }
        .instrument(span)
        .await
    }

    async fn ping(&self) -> Result<(), StoreError> {
        self.backend.ping().await.map_err(StoreError::Database)
    }
}
