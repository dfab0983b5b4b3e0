//! PostgreSQL bindings for the query layer
//!
//! `PgQuerier` runs each statement on a pooled connection (autocommit).
//! `PgTxQuerier` runs every statement inside one open transaction.
//! Both share the statements in [`sql`].

use async_trait::async_trait;
use sqlx::{PgPool, Postgres, Transaction};

use super::error::StoreError;
use super::models::{
    Account, AddAccountBalanceParams, CreateAccountParams, CreateEntryParams,
    CreateTransferParams, CreateUserParams, Entry, ListAccountsParams, ListEntriesParams,
    ListTransfersParams, Transfer, User,
};
use super::querier::Querier;
use super::tx::Backend;

/// SQL statements, generic over pool or connection executors
pub(crate) mod sql {
    use sqlx::PgExecutor;

    use super::*;

    pub async fn create_user<'e, E: PgExecutor<'e>>(
        exec: E,
        arg: &CreateUserParams,
    ) -> Result<User, StoreError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (username, hashed_password, full_name, email)
            VALUES ($1, $2, $3, $4)
            RETURNING username, hashed_password, full_name, email, password_changed_at, created_at
            "#,
        )
        .bind(&arg.username)
        .bind(&arg.hashed_password)
        .bind(&arg.full_name)
        .bind(&arg.email)
        .fetch_one(exec)
        .await?;
        Ok(user)
    }

    pub async fn get_user<'e, E: PgExecutor<'e>>(
        exec: E,
        username: &str,
    ) -> Result<User, StoreError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT username, hashed_password, full_name, email, password_changed_at, created_at
            FROM users WHERE username = $1
            "#,
        )
        .bind(username)
        .fetch_one(exec)
        .await?;
        Ok(user)
    }

    pub async fn create_account<'e, E: PgExecutor<'e>>(
        exec: E,
        arg: &CreateAccountParams,
    ) -> Result<Account, StoreError> {
        let account = sqlx::query_as::<_, Account>(
            r#"
            INSERT INTO accounts (owner, balance, currency)
            VALUES ($1, $2, $3)
            RETURNING id, owner, balance, currency, created_at
            "#,
        )
        .bind(&arg.owner)
        .bind(arg.balance)
        .bind(&arg.currency)
        .fetch_one(exec)
        .await?;
        Ok(account)
    }

    pub async fn get_account<'e, E: PgExecutor<'e>>(exec: E, id: i64) -> Result<Account, StoreError> {
        let account = sqlx::query_as::<_, Account>(
            r#"SELECT id, owner, balance, currency, created_at FROM accounts WHERE id = $1"#,
        )
        .bind(id)
        .fetch_one(exec)
        .await?;
        Ok(account)
    }

    pub async fn list_accounts<'e, E: PgExecutor<'e>>(
        exec: E,
        arg: &ListAccountsParams,
    ) -> Result<Vec<Account>, StoreError> {
        let accounts = sqlx::query_as::<_, Account>(
            r#"
            SELECT id, owner, balance, currency, created_at
            FROM accounts
            WHERE owner = $1
            ORDER BY id
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(&arg.owner)
        .bind(arg.limit)
        .bind(arg.offset)
        .fetch_all(exec)
        .await?;
        Ok(accounts)
    }

    /// Single-statement increment; the row lock is taken by the UPDATE itself.
    pub async fn add_account_balance<'e, E: PgExecutor<'e>>(
        exec: E,
        arg: &AddAccountBalanceParams,
    ) -> Result<Account, StoreError> {
        let account = sqlx::query_as::<_, Account>(
            r#"
            UPDATE accounts
            SET balance = balance + $1
            WHERE id = $2
            RETURNING id, owner, balance, currency, created_at
            "#,
        )
        .bind(arg.amount)
        .bind(arg.id)
        .fetch_one(exec)
        .await?;
        Ok(account)
    }

    pub async fn delete_account<'e, E: PgExecutor<'e>>(exec: E, id: i64) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM accounts WHERE id = $1")
            .bind(id)
            .execute(exec)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    pub async fn create_entry<'e, E: PgExecutor<'e>>(
        exec: E,
        arg: &CreateEntryParams,
    ) -> Result<Entry, StoreError> {
        let entry = sqlx::query_as::<_, Entry>(
            r#"
            INSERT INTO entries (account_id, amount)
            VALUES ($1, $2)
            RETURNING id, account_id, amount, created_at
            "#,
        )
        .bind(arg.account_id)
        .bind(arg.amount)
        .fetch_one(exec)
        .await?;
        Ok(entry)
    }

    pub async fn get_entry<'e, E: PgExecutor<'e>>(exec: E, id: i64) -> Result<Entry, StoreError> {
        let entry = sqlx::query_as::<_, Entry>(
            r#"SELECT id, account_id, amount, created_at FROM entries WHERE id = $1"#,
        )
        .bind(id)
        .fetch_one(exec)
        .await?;
        Ok(entry)
    }

    pub async fn list_entries<'e, E: PgExecutor<'e>>(
        exec: E,
        arg: &ListEntriesParams,
    ) -> Result<Vec<Entry>, StoreError> {
        let entries = sqlx::query_as::<_, Entry>(
            r#"
            SELECT id, account_id, amount, created_at
            FROM entries
            WHERE account_id = $1
            ORDER BY id
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(arg.account_id)
        .bind(arg.limit)
        .bind(arg.offset)
        .fetch_all(exec)
        .await?;
        Ok(entries)
    }

    pub async fn create_transfer<'e, E: PgExecutor<'e>>(
        exec: E,
        arg: &CreateTransferParams,
    ) -> Result<Transfer, StoreError> {
        let transfer = sqlx::query_as::<_, Transfer>(
            r#"
            INSERT INTO transfers (from_account_id, to_account_id, amount)
            VALUES ($1, $2, $3)
            RETURNING id, from_account_id, to_account_id, amount, created_at
            "#,
        )
        .bind(arg.from_account_id)
        .bind(arg.to_account_id)
        .bind(arg.amount)
        .fetch_one(exec)
        .await?;
        Ok(transfer)
    }

    pub async fn get_transfer<'e, E: PgExecutor<'e>>(
        exec: E,
        id: i64,
    ) -> Result<Transfer, StoreError> {
        let transfer = sqlx::query_as::<_, Transfer>(
            r#"
            SELECT id, from_account_id, to_account_id, amount, created_at
            FROM transfers WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_one(exec)
        .await?;
        Ok(transfer)
    }

    pub async fn list_transfers<'e, E: PgExecutor<'e>>(
        exec: E,
        arg: &ListTransfersParams,
    ) -> Result<Vec<Transfer>, StoreError> {
        let transfers = sqlx::query_as::<_, Transfer>(
            r#"
            SELECT id, from_account_id, to_account_id, amount, created_at
            FROM transfers
            WHERE from_account_id = $1 OR to_account_id = $2
            ORDER BY id
            LIMIT $3 OFFSET $4
            "#,
        )
        .bind(arg.from_account_id)
        .bind(arg.to_account_id)
        .bind(arg.limit)
        .bind(arg.offset)
        .fetch_all(exec)
        .await?;
        Ok(transfers)
    }
}

// ============================================================================
// Direct (pool) binding
// ============================================================================

/// Query layer bound to the pool: every statement autocommits
#[derive(Clone)]
pub struct PgQuerier {
    pool: PgPool,
}

impl PgQuerier {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Querier for PgQuerier {
    async fn create_user(&mut self, arg: CreateUserParams) -> Result<User, StoreError> {
        sql::create_user(&self.pool, &arg).await
    }

    async fn get_user(&mut self, username: &str) -> Result<User, StoreError> {
        sql::get_user(&self.pool, username).await
    }

    async fn create_account(&mut self, arg: CreateAccountParams) -> Result<Account, StoreError> {
        sql::create_account(&self.pool, &arg).await
    }

    async fn get_account(&mut self, id: i64) -> Result<Account, StoreError> {
        sql::get_account(&self.pool, id).await
    }

    async fn list_accounts(
        &mut self,
        arg: ListAccountsParams,
    ) -> Result<Vec<Account>, StoreError> {
        sql::list_accounts(&self.pool, &arg).await
    }

    async fn add_account_balance(
        &mut self,
        arg: AddAccountBalanceParams,
    ) -> Result<Account, StoreError> {
        sql::add_account_balance(&self.pool, &arg).await
    }

    async fn delete_account(&mut self, id: i64) -> Result<(), StoreError> {
        sql::delete_account(&self.pool, id).await
    }

    async fn create_entry(&mut self, arg: CreateEntryParams) -> Result<Entry, StoreError> {
        sql::create_entry(&self.pool, &arg).await
    }

    async fn get_entry(&mut self, id: i64) -> Result<Entry, StoreError> {
        sql::get_entry(&self.pool, id).await
    }

    async fn list_entries(&mut self, arg: ListEntriesParams) -> Result<Vec<Entry>, StoreError> {
        sql::list_entries(&self.pool, &arg).await
    }

    async fn create_transfer(
        &mut self,
        arg: CreateTransferParams,
    ) -> Result<Transfer, StoreError> {
        sql::create_transfer(&self.pool, &arg).await
    }

    async fn get_transfer(&mut self, id: i64) -> Result<Transfer, StoreError> {
        sql::get_transfer(&self.pool, id).await
    }

    async fn list_transfers(
        &mut self,
        arg: ListTransfersParams,
    ) -> Result<Vec<Transfer>, StoreError> {
        sql::list_transfers(&self.pool, &arg).await
    }
}

// ============================================================================
// Transaction binding
// ============================================================================

/// Query layer bound to one open transaction. Dropping it without commit
/// rolls the transaction back.
pub struct PgTxQuerier {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl Querier for PgTxQuerier {
    async fn create_user(&mut self, arg: CreateUserParams) -> Result<User, StoreError> {
        sql::create_user(&mut *self.tx, &arg).await
    }

    async fn get_user(&mut self, username: &str) -> Result<User, StoreError> {
        sql::get_user(&mut *self.tx, username).await
    }

    async fn create_account(&mut self, arg: CreateAccountParams) -> Result<Account, StoreError> {
        sql::create_account(&mut *self.tx, &arg).await
    }

    async fn get_account(&mut self, id: i64) -> Result<Account, StoreError> {
        sql::get_account(&mut *self.tx, id).await
    }

    async fn list_accounts(
        &mut self,
        arg: ListAccountsParams,
    ) -> Result<Vec<Account>, StoreError> {
        sql::list_accounts(&mut *self.tx, &arg).await
    }

    async fn add_account_balance(
        &mut self,
        arg: AddAccountBalanceParams,
    ) -> Result<Account, StoreError> {
        sql::add_account_balance(&mut *self.tx, &arg).await
    }

    async fn delete_account(&mut self, id: i64) -> Result<(), StoreError> {
        sql::delete_account(&mut *self.tx, id).await
    }

    async fn create_entry(&mut self, arg: CreateEntryParams) -> Result<Entry, StoreError> {
        sql::create_entry(&mut *self.tx, &arg).await
    }

    async fn get_entry(&mut self, id: i64) -> Result<Entry, StoreError> {
        sql::get_entry(&mut *self.tx, id).await
    }

    async fn list_entries(&mut self, arg: ListEntriesParams) -> Result<Vec<Entry>, StoreError> {
        sql::list_entries(&mut *self.tx, &arg).await
    }

    async fn create_transfer(
        &mut self,
        arg: CreateTransferParams,
    ) -> Result<Transfer, StoreError> {
        sql::create_transfer(&mut *self.tx, &arg).await
    }

    async fn get_transfer(&mut self, id: i64) -> Result<Transfer, StoreError> {
        sql::get_transfer(&mut *self.tx, id).await
    }

    async fn list_transfers(
        &mut self,
        arg: ListTransfersParams,
    ) -> Result<Vec<Transfer>, StoreError> {
        sql::list_transfers(&mut *self.tx, &arg).await
    }
}

// ============================================================================
// Backend
// ============================================================================

/// PostgreSQL unit-of-work provider
#[derive(Clone)]
pub struct PgBackend {
    pool: PgPool,
}

impl PgBackend {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl Backend for PgBackend {
    type Direct = PgQuerier;
    type Tx = PgTxQuerier;

    fn direct(&self) -> PgQuerier {
        PgQuerier::new(self.pool.clone())
    }

    async fn begin(&self) -> Result<PgTxQuerier, sqlx::Error> {
        let tx = self.pool.begin().await?;
        Ok(PgTxQuerier { tx })
    }

    async fn commit(&self, tx: PgTxQuerier) -> Result<(), sqlx::Error> {
        tx.tx.commit().await
    }

    async fn rollback(&self, tx: PgTxQuerier) -> Result<(), sqlx::Error> {
        tx.tx.rollback().await
    }

    async fn ping(&self) -> Result<(), sqlx::Error> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
