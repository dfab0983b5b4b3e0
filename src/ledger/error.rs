//! Ledger Error Types

use sqlx::error::ErrorKind;
use thiserror::Error;

/// Errors surfaced by the query layer, the transaction manager and the
/// transfer orchestrator. Nothing is retried internally.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("record not found")]
    NotFound,

    #[error("unique constraint violated: {constraint}")]
    UniqueViolation { constraint: String },

    #[error("foreign key constraint violated: {constraint}")]
    ForeignKeyViolation { constraint: String },

    #[error("transfer amount must be greater than zero, got {0}")]
    InvalidAmount(i64),

    #[error("failed to start transaction: {0}")]
    TransactionStart(#[source] sqlx::Error),

    #[error("failed to commit transaction: {0}")]
    Commit(#[source] sqlx::Error),

    /// The unit of work failed AND its rollback failed. Data state must be
    /// verified independently.
    #[error("tx err: {source}, rb err: {rollback}")]
    Rollback {
        #[source]
        source: Box<StoreError>,
        rollback: sqlx::Error,
    },

    #[error("database error: {0}")]
    Database(#[source] sqlx::Error),
}

impl StoreError {
    /// Get the error code for API responses and logs
    pub fn code(&self) -> &'static str {
        match self {
            StoreError::NotFound => "NOT_FOUND",
            StoreError::UniqueViolation { .. } => "UNIQUE_VIOLATION",
            StoreError::ForeignKeyViolation { .. } => "FOREIGN_KEY_VIOLATION",
            StoreError::InvalidAmount(_) => "INVALID_AMOUNT",
            StoreError::TransactionStart(_) => "TX_START_FAILED",
            StoreError::Commit(_) => "COMMIT_FAILED",
            StoreError::Rollback { .. } => "ROLLBACK_FAILED",
            StoreError::Database(_) => "DATABASE_ERROR",
        }
    }

    /// True when a write may or may not have become durable
    pub fn is_state_uncertain(&self) -> bool {
        matches!(self, StoreError::Rollback { .. } | StoreError::Commit(_))
    }

    /// True for constraint violations the caller can map to a domain response
    pub fn is_constraint_violation(&self) -> bool {
        matches!(
            self,
            StoreError::UniqueViolation { .. } | StoreError::ForeignKeyViolation { .. }
        )
    }

    /// The business error that triggered a failed rollback, or self
    pub fn root(&self) -> &StoreError {
        match self {
            StoreError::Rollback { source, .. } => source.root(),
            other => other,
        }
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        if matches!(e, sqlx::Error::RowNotFound) {
            return StoreError::NotFound;
        }

        let classified = e.as_database_error().and_then(|db_err| {
            let constraint = db_err.constraint().unwrap_or_default().to_string();
            match db_err.kind() {
                ErrorKind::UniqueViolation => Some(StoreError::UniqueViolation { constraint }),
                ErrorKind::ForeignKeyViolation => {
                    Some(StoreError::ForeignKeyViolation { constraint })
                }
                _ => None,
            }
        });

        classified.unwrap_or(StoreError::Database(e))
    }
}
