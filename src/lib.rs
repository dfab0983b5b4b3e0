//! Simple Bank - ledger-backed banking service
//!
//! Accounts, append-only ledger entries and atomic money transfers on
//! PostgreSQL, served over an authenticated HTTP API.
//!
//! # Modules
//!
//! - [`ledger`] - Query layer, transaction manager and transfer orchestrator
//! - [`user_auth`] - Registration, password hashing and access tokens
//! - [`gateway`] - HTTP router, handlers and OpenAPI document
//! - [`db`] - Connection pool and schema migrations
//! - [`config`] - YAML configuration with environment overrides
//! - [`logging`] - Tracing subscriber setup

pub mod config;
pub mod db;
pub mod gateway;
pub mod ledger;
pub mod logging;
pub mod user_auth;

// Convenient re-exports at crate root
pub use config::AppConfig;
pub use ledger::{
    Account, Backend, Entry, LedgerStore, PgBackend, Querier, Store, StoreError, Transfer,
    TransferTxParams, TransferTxResult,
};
