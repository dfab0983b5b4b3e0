//! In-memory backend for testing
//!
//! A transaction works on a private copy of the ledger and publishes it on
//! commit, so rollback and drop both discard its writes. Faults can be
//! injected at begin, commit, rollback, or at the Nth query of a
//! transaction. Overlapping transactions are last-commit-wins; tests that
//! need real row locking run against PostgreSQL instead.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use super::error::StoreError;
use super::models::{
    Account, AddAccountBalanceParams, CreateAccountParams, CreateEntryParams,
    CreateTransferParams, CreateUserParams, Entry, ListAccountsParams, ListEntriesParams,
    ListTransfersParams, Transfer, User,
};
use super::querier::Querier;
use super::tx::Backend;

fn injected(msg: &str) -> sqlx::Error {
    sqlx::Error::Protocol(format!("injected fault: {}", msg))
}

fn page<T: Clone>(items: impl Iterator<Item = T>, limit: i64, offset: i64) -> Vec<T> {
    items
        .skip(offset.max(0) as usize)
        .take(limit.max(0) as usize)
        .collect()
}

#[derive(Debug, Clone, Default)]
struct MemState {
    users: BTreeMap<String, User>,
    accounts: BTreeMap<i64, Account>,
    entries: BTreeMap<i64, Entry>,
    transfers: BTreeMap<i64, Transfer>,
    last_account_id: i64,
    last_entry_id: i64,
    last_transfer_id: i64,
}

impl MemState {
    fn create_user(&mut self, arg: CreateUserParams) -> Result<User, StoreError> {
        if self.users.contains_key(&arg.username) {
            return Err(StoreError::UniqueViolation {
                constraint: "users_pkey".into(),
            });
        }
        if self.users.values().any(|u| u.email == arg.email) {
            return Err(StoreError::UniqueViolation {
                constraint: "users_email_key".into(),
            });
        }
        let now = Utc::now();
        let user = User {
            username: arg.username,
            hashed_password: arg.hashed_password,
            full_name: arg.full_name,
            email: arg.email,
            password_changed_at: now,
            created_at: now,
        };
        self.users.insert(user.username.clone(), user.clone());
        Ok(user)
    }

    fn get_user(&self, username: &str) -> Result<User, StoreError> {
        self.users.get(username).cloned().ok_or(StoreError::NotFound)
    }

    fn create_account(&mut self, arg: CreateAccountParams) -> Result<Account, StoreError> {
        if !self.users.contains_key(&arg.owner) {
            return Err(StoreError::ForeignKeyViolation {
                constraint: "accounts_owner_fkey".into(),
            });
        }
        if self
            .accounts
            .values()
            .any(|a| a.owner == arg.owner && a.currency == arg.currency)
        {
            return Err(StoreError::UniqueViolation {
                constraint: "owner_currency_key".into(),
            });
        }
        self.last_account_id += 1;
        let account = Account {
            id: self.last_account_id,
            owner: arg.owner,
            balance: arg.balance,
            currency: arg.currency,
            created_at: Utc::now(),
        };
        self.accounts.insert(account.id, account.clone());
        Ok(account)
    }

    fn get_account(&self, id: i64) -> Result<Account, StoreError> {
        self.accounts.get(&id).cloned().ok_or(StoreError::NotFound)
    }

    fn list_accounts(&self, arg: &ListAccountsParams) -> Vec<Account> {
        page(
            self.accounts
                .values()
                .filter(|a| a.owner == arg.owner)
                .cloned(),
            arg.limit,
            arg.offset,
        )
    }

    fn add_account_balance(&mut self, arg: AddAccountBalanceParams) -> Result<Account, StoreError> {
        let account = self.accounts.get_mut(&arg.id).ok_or(StoreError::NotFound)?;
        account.balance = account.balance.checked_add(arg.amount).ok_or_else(|| {
            StoreError::Database(sqlx::Error::Protocol("bigint out of range".into()))
        })?;
        Ok(account.clone())
    }

    fn delete_account(&mut self, id: i64) -> Result<(), StoreError> {
        if self.entries.values().any(|e| e.account_id == id) {
            return Err(StoreError::ForeignKeyViolation {
                constraint: "entries_account_id_fkey".into(),
            });
        }
        if self
            .transfers
            .values()
            .any(|t| t.from_account_id == id || t.to_account_id == id)
        {
            return Err(StoreError::ForeignKeyViolation {
                constraint: "transfers_from_account_id_fkey".into(),
            });
        }
        self.accounts
            .remove(&id)
            .map(|_| ())
            .ok_or(StoreError::NotFound)
    }

    fn create_entry(&mut self, arg: CreateEntryParams) -> Result<Entry, StoreError> {
        if !self.accounts.contains_key(&arg.account_id) {
            return Err(StoreError::ForeignKeyViolation {
                constraint: "entries_account_id_fkey".into(),
            });
        }
        self.last_entry_id += 1;
        let entry = Entry {
            id: self.last_entry_id,
            account_id: arg.account_id,
            amount: arg.amount,
            created_at: Utc::now(),
        };
        self.entries.insert(entry.id, entry.clone());
        Ok(entry)
    }

    fn get_entry(&self, id: i64) -> Result<Entry, StoreError> {
        self.entries.get(&id).cloned().ok_or(StoreError::NotFound)
    }

    fn list_entries(&self, arg: &ListEntriesParams) -> Vec<Entry> {
        page(
            self.entries
                .values()
                .filter(|e| e.account_id == arg.account_id)
                .cloned(),
            arg.limit,
            arg.offset,
        )
    }

    fn create_transfer(&mut self, arg: CreateTransferParams) -> Result<Transfer, StoreError> {
        if !self.accounts.contains_key(&arg.from_account_id) {
            return Err(StoreError::ForeignKeyViolation {
                constraint: "transfers_from_account_id_fkey".into(),
            });
        }
        if !self.accounts.contains_key(&arg.to_account_id) {
            return Err(StoreError::ForeignKeyViolation {
                constraint: "transfers_to_account_id_fkey".into(),
            });
        }
        if arg.amount <= 0 {
            return Err(StoreError::Database(sqlx::Error::Protocol(
                "transfers_amount_check".into(),
            )));
        }
        self.last_transfer_id += 1;
        let transfer = Transfer {
            id: self.last_transfer_id,
            from_account_id: arg.from_account_id,
            to_account_id: arg.to_account_id,
            amount: arg.amount,
            created_at: Utc::now(),
        };
        self.transfers.insert(transfer.id, transfer.clone());
        Ok(transfer)
    }

    fn get_transfer(&self, id: i64) -> Result<Transfer, StoreError> {
        self.transfers.get(&id).cloned().ok_or(StoreError::NotFound)
    }

    fn list_transfers(&self, arg: &ListTransfersParams) -> Vec<Transfer> {
        page(
            self.transfers
                .values()
                .filter(|t| {
                    t.from_account_id == arg.from_account_id || t.to_account_id == arg.to_account_id
                })
                .cloned(),
            arg.limit,
            arg.offset,
        )
    }
}

#[derive(Default)]
struct Inner {
    state: Mutex<MemState>,
    /// Account ids in the order transactional balance updates were issued
    balance_updates: Mutex<Vec<i64>>,
    fail_begin: AtomicBool,
    fail_ping: AtomicBool,
    fail_commit: AtomicBool,
    fail_rollback: AtomicBool,
    fail_on_call: Mutex<Option<usize>>,
    stall_on_call: Mutex<Option<usize>>,
    begin_count: AtomicUsize,
    commit_count: AtomicUsize,
    rollback_count: AtomicUsize,
}

/// Shared handle to one in-memory ledger
#[derive(Clone, Default)]
pub struct MemoryBackend {
    inner: Arc<Inner>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed_user(&self, username: &str) -> User {
        let mut state = self.inner.state.lock().unwrap();
        if let Ok(user) = state.get_user(username) {
            return user;
        }
        state
            .create_user(CreateUserParams {
                username: username.to_string(),
                hashed_password: "not-a-real-hash".to_string(),
                full_name: username.to_uppercase(),
                email: format!("{}@example.com", username),
            })
            .unwrap()
    }

    /// Create the owner if needed, then an account with an opening balance
    pub fn seed_account(&self, owner: &str, balance: i64, currency: &str) -> Account {
        self.seed_user(owner);
        self.inner
            .state
            .lock()
            .unwrap()
            .create_account(CreateAccountParams {
                owner: owner.to_string(),
                balance,
                currency: currency.to_string(),
            })
            .unwrap()
    }

    pub fn balance_of(&self, account_id: i64) -> Option<i64> {
        let state = self.inner.state.lock().unwrap();
        state.accounts.get(&account_id).map(|a| a.balance)
    }

    pub fn entries_for(&self, account_id: i64) -> Vec<Entry> {
        let state = self.inner.state.lock().unwrap();
        state
            .entries
            .values()
            .filter(|e| e.account_id == account_id)
            .cloned()
            .collect()
    }

    pub fn entry_count(&self) -> usize {
        self.inner.state.lock().unwrap().entries.len()
    }

    pub fn transfer_count(&self) -> usize {
        self.inner.state.lock().unwrap().transfers.len()
    }

    pub fn balance_updates(&self) -> Vec<i64> {
        self.inner.balance_updates.lock().unwrap().clone()
    }

    pub fn set_fail_begin(&self, fail: bool) {
        self.inner.fail_begin.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_ping(&self, fail: bool) {
        self.inner.fail_ping.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_commit(&self, fail: bool) {
        self.inner.fail_commit.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_rollback(&self, fail: bool) {
        self.inner.fail_rollback.store(fail, Ordering::SeqCst);
    }

    /// Fail the Nth (1-based) query of every transaction
    pub fn set_fail_on_call(&self, call: Option<usize>) {
        *self.inner.fail_on_call.lock().unwrap() = call;
    }

    /// Never complete the Nth (1-based) query of every transaction
    pub fn set_stall_on_call(&self, call: Option<usize>) {
        *self.inner.stall_on_call.lock().unwrap() = call;
    }

    pub fn begin_count(&self) -> usize {
        self.inner.begin_count.load(Ordering::SeqCst)
    }

    pub fn commit_count(&self) -> usize {
        self.inner.commit_count.load(Ordering::SeqCst)
    }

    pub fn rollback_count(&self) -> usize {
        self.inner.rollback_count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Backend for MemoryBackend {
    type Direct = MemQuerier;
    type Tx = MemTx;

    fn direct(&self) -> MemQuerier {
        MemQuerier {
            inner: self.inner.clone(),
        }
    }

    async fn begin(&self) -> Result<MemTx, sqlx::Error> {
        if self.inner.fail_begin.load(Ordering::SeqCst) {
            return Err(injected("begin"));
        }
        self.inner.begin_count.fetch_add(1, Ordering::SeqCst);
        let snapshot = self.inner.state.lock().unwrap().clone();
        Ok(MemTx {
            state: snapshot,
            calls: 0,
            inner: self.inner.clone(),
        })
    }

    async fn commit(&self, tx: MemTx) -> Result<(), sqlx::Error> {
        if self.inner.fail_commit.load(Ordering::SeqCst) {
            return Err(injected("commit"));
        }
        *self.inner.state.lock().unwrap() = tx.state;
        self.inner.commit_count.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn rollback(&self, _tx: MemTx) -> Result<(), sqlx::Error> {
        if self.inner.fail_rollback.load(Ordering::SeqCst) {
            return Err(injected("rollback"));
        }
        self.inner.rollback_count.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn ping(&self) -> Result<(), sqlx::Error> {
        if self.inner.fail_ping.load(Ordering::SeqCst) {
            return Err(injected("ping"));
        }
        Ok(())
    }
}

/// Autocommit binding: every call mutates the shared ledger directly
pub struct MemQuerier {
    inner: Arc<Inner>,
}

impl MemQuerier {
    fn with_state<T>(&self, f: impl FnOnce(&mut MemState) -> T) -> T {
        let mut state = self.inner.state.lock().unwrap();
        f(&mut state)
    }
}

#[async_trait]
impl Querier for MemQuerier {
    async fn create_user(&mut self, arg: CreateUserParams) -> Result<User, StoreError> {
        self.with_state(|s| s.create_user(arg))
    }

    async fn get_user(&mut self, username: &str) -> Result<User, StoreError> {
        self.with_state(|s| s.get_user(username))
    }

    async fn create_account(&mut self, arg: CreateAccountParams) -> Result<Account, StoreError> {
        self.with_state(|s| s.create_account(arg))
    }

    async fn get_account(&mut self, id: i64) -> Result<Account, StoreError> {
        self.with_state(|s| s.get_account(id))
    }

    async fn list_accounts(
        &mut self,
        arg: ListAccountsParams,
    ) -> Result<Vec<Account>, StoreError> {
        Ok(self.with_state(|s| s.list_accounts(&arg)))
    }

    async fn add_account_balance(
        &mut self,
        arg: AddAccountBalanceParams,
    ) -> Result<Account, StoreError> {
        self.with_state(|s| s.add_account_balance(arg))
    }

    async fn delete_account(&mut self, id: i64) -> Result<(), StoreError> {
        self.with_state(|s| s.delete_account(id))
    }

    async fn create_entry(&mut self, arg: CreateEntryParams) -> Result<Entry, StoreError> {
        self.with_state(|s| s.create_entry(arg))
    }

    async fn get_entry(&mut self, id: i64) -> Result<Entry, StoreError> {
        self.with_state(|s| s.get_entry(id))
    }

    async fn list_entries(&mut self, arg: ListEntriesParams) -> Result<Vec<Entry>, StoreError> {
        Ok(self.with_state(|s| s.list_entries(&arg)))
    }

    async fn create_transfer(
        &mut self,
        arg: CreateTransferParams,
    ) -> Result<Transfer, StoreError> {
        self.with_state(|s| s.create_transfer(arg))
    }

    async fn get_transfer(&mut self, id: i64) -> Result<Transfer, StoreError> {
        self.with_state(|s| s.get_transfer(id))
    }

    async fn list_transfers(
        &mut self,
        arg: ListTransfersParams,
    ) -> Result<Vec<Transfer>, StoreError> {
        Ok(self.with_state(|s| s.list_transfers(&arg)))
    }
}

/// Transaction binding over a private copy of the ledger
pub struct MemTx {
    state: MemState,
    calls: usize,
    inner: Arc<Inner>,
}

impl MemTx {
    /// Count this query and apply any configured fault
    async fn tick(&mut self) -> Result<(), StoreError> {
        self.calls += 1;
        let stall = *self.inner.stall_on_call.lock().unwrap() == Some(self.calls);
        if stall {
            futures::future::pending::<()>().await;
        }
        let fail = *self.inner.fail_on_call.lock().unwrap() == Some(self.calls);
        if fail {
            return Err(StoreError::Database(injected("query")));
        }
        Ok(())
    }
}

#[async_trait]
impl Querier for MemTx {
    async fn create_user(&mut self, arg: CreateUserParams) -> Result<User, StoreError> {
        self.tick().await?;
        self.state.create_user(arg)
    }

    async fn get_user(&mut self, username: &str) -> Result<User, StoreError> {
        self.tick().await?;
        self.state.get_user(username)
    }

    async fn create_account(&mut self, arg: CreateAccountParams) -> Result<Account, StoreError> {
        self.tick().await?;
        self.state.create_account(arg)
    }

    async fn get_account(&mut self, id: i64) -> Result<Account, StoreError> {
        self.tick().await?;
        self.state.get_account(id)
    }

    async fn list_accounts(
        &mut self,
        arg: ListAccountsParams,
    ) -> Result<Vec<Account>, StoreError> {
        self.tick().await?;
        Ok(self.state.list_accounts(&arg))
    }

    async fn add_account_balance(
        &mut self,
        arg: AddAccountBalanceParams,
    ) -> Result<Account, StoreError> {
        self.tick().await?;
        self.inner.balance_updates.lock().unwrap().push(arg.id);
        self.state.add_account_balance(arg)
    }

    async fn delete_account(&mut self, id: i64) -> Result<(), StoreError> {
        self.tick().await?;
        self.state.delete_account(id)
    }

    async fn create_entry(&mut self, arg: CreateEntryParams) -> Result<Entry, StoreError> {
        self.tick().await?;
        self.state.create_entry(arg)
    }

    async fn get_entry(&mut self, id: i64) -> Result<Entry, StoreError> {
        self.tick().await?;
        self.state.get_entry(id)
    }

    async fn list_entries(&mut self, arg: ListEntriesParams) -> Result<Vec<Entry>, StoreError> {
        self.tick().await?;
        Ok(self.state.list_entries(&arg))
    }

    async fn create_transfer(
        &mut self,
        arg: CreateTransferParams,
    ) -> Result<Transfer, StoreError> {
        self.tick().await?;
        self.state.create_transfer(arg)
    }

    async fn get_transfer(&mut self, id: i64) -> Result<Transfer, StoreError> {
        self.tick().await?;
        self.state.get_transfer(id)
    }

    async fn list_transfers(
        &mut self,
        arg: ListTransfersParams,
    ) -> Result<Vec<Transfer>, StoreError> {
        self.tick().await?;
        Ok(self.state.list_transfers(&arg))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_direct_binding_writes_through() {
        let backend = MemoryBackend::new();
        backend.seed_user("alice");
        let mut q = backend.direct();

        let account = q
            .create_account(CreateAccountParams {
                owner: "alice".into(),
                balance: 10,
                currency: "USD".into(),
            })
            .await
            .unwrap();
        assert_eq!(backend.balance_of(account.id), Some(10));
    }

    #[tokio::test]
    async fn test_dropped_tx_discards_writes() {
        let backend = MemoryBackend::new();
        let account = backend.seed_account("alice", 10, "USD");

        {
            let mut tx = backend.begin().await.unwrap();
            tx.add_account_balance(AddAccountBalanceParams {
                id: account.id,
                amount: 5,
            })
            .await
            .unwrap();
        }

        assert_eq!(backend.balance_of(account.id), Some(10));
    }

    #[tokio::test]
    async fn test_fail_on_call() {
        let backend = MemoryBackend::new();
        let account = backend.seed_account("alice", 10, "USD");
        backend.set_fail_on_call(Some(2));

        let mut tx = backend.begin().await.unwrap();
        assert!(tx.get_account(account.id).await.is_ok());
        assert!(matches!(
            tx.get_account(account.id).await,
            Err(StoreError::Database(_))
        ));
    }

    #[tokio::test]
    async fn test_ping_fault_independent_of_begin() {
        let backend = MemoryBackend::new();
        backend.set_fail_begin(true);
        assert!(backend.ping().await.is_ok());
        assert!(backend.begin().await.is_err());

        backend.set_fail_begin(false);
        backend.set_fail_ping(true);
        assert!(backend.ping().await.is_err());
        assert!(backend.begin().await.is_ok());
    }
}
