//! Transaction Manager
//!
//! Owns the lifetime of a unit of work: begin, hand a scoped query layer to
//! the caller's closure, then commit or roll back as a single decision.

use async_trait::async_trait;
use futures::future::BoxFuture;
use tracing::{debug, error, warn};

use super::error::StoreError;
use super::querier::Querier;

/// Storage engine capable of atomic units of work.
///
/// `Direct` is the autocommit binding, `Tx` the transaction-scoped one.
/// Dropping a `Tx` without commit must discard its writes.
#[async_trait]
pub trait Backend: Send + Sync {
    type Direct: Querier + 'static;
    type Tx: Querier + 'static;

    fn direct(&self) -> Self::Direct;

    async fn begin(&self) -> Result<Self::Tx, sqlx::Error>;

    async fn commit(&self, tx: Self::Tx) -> Result<(), sqlx::Error>;

    async fn rollback(&self, tx: Self::Tx) -> Result<(), sqlx::Error>;

    /// Cheap liveness probe
    async fn ping(&self) -> Result<(), sqlx::Error>;
}

/// Run `work` inside one unit of work.
///
/// - begin failure: [`StoreError::TransactionStart`]
/// - `work` error: rolled back, error returned unchanged; if the rollback
///   also fails both are returned as [`StoreError::Rollback`]
/// - commit failure: [`StoreError::Commit`], never retried here
///
/// If the returned future is dropped before completion the open `Tx` is
/// dropped with it and nothing is committed.
pub async fn run_in_transaction<B, T, F>(backend: &B, work: F) -> Result<T, StoreError>
where
    B: Backend + ?Sized,
    T: Send,
    F: for<'q> FnOnce(&'q mut B::Tx) -> BoxFuture<'q, Result<T, StoreError>> + Send,
{
    let mut tx = backend.begin().await.map_err(|e| {
        error!(error = %e, "Failed to start transaction");
        StoreError::TransactionStart(e)
    })?;

    match work(&mut tx).await {
        Ok(value) => {
            backend.commit(tx).await.map_err(|e| {
                error!(error = %e, "Failed to commit transaction");
                StoreError::Commit(e)
            })?;
            debug!("Transaction committed");
            Ok(value)
        }
        Err(err) => {
            if let Err(rb_err) = backend.rollback(tx).await {
                error!(error = %err, rollback_error = %rb_err, "Rollback failed after error");
                return Err(StoreError::Rollback {
                    source: Box::new(err),
                    rollback: rb_err,
                });
            }
            warn!(error = %err, code = err.code(), "Transaction rolled back");
            Err(err)
        }
    }
}
