use async_trait::async_trait;
use sqlx::{PgPool, Postgres, Transaction};

use super::{AccountStore, AccountTransaction};
use crate::error::{AppError, Result};
use crate::models::{Account, Page, PageRequest};

const ACCOUNT_COLUMNS: &str =
    "id, account_number, account_holder_name, contact_number, balance, created_at";

/// Unique index name Postgres generates for `bank_account.account_number`.
const ACCOUNT_NUMBER_UNIQUE: &str = "bank_account_account_number_key";

/// PostgreSQL account store over the `bank_account` table.
#[derive(Clone)]
pub struct PgAccountRepository {
    pool: PgPool,
}

impl PgAccountRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn map_insert_error(err: sqlx::Error, account_number: &str) -> AppError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.constraint() == Some(ACCOUNT_NUMBER_UNIQUE) {
            return AppError::DuplicateAccount(account_number.to_string());
        }
    }
    AppError::Database(err)
}

#[async_trait]
impl AccountStore for PgAccountRepository {
    async fn find_by_account_number(&self, account_number: &str) -> Result<Option<Account>> {
        let row = sqlx::query_as::<_, Account>(&format!(
            "SELECT {} FROM bank_account WHERE account_number = $1",
            ACCOUNT_COLUMNS
        ))
        .bind(account_number)
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::Database)?;

        Ok(row)
    }

    async fn exists_by_account_number(&self, account_number: &str) -> Result<bool> {
        let row: (bool,) = sqlx::query_as(
            r#"
            SELECT EXISTS(SELECT 1 FROM bank_account WHERE account_number = $1)
            "#,
        )
        .bind(account_number)
        .fetch_one(&self.pool)
        .await
        .map_err(AppError::Database)?;

        Ok(row.0)
    }

    async fn insert(&self, account: &Account) -> Result<Account> {
        let row = sqlx::query_as::<_, Account>(&format!(
            r#"
            INSERT INTO bank_account ({cols})
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {cols}
            "#,
            cols = ACCOUNT_COLUMNS
        ))
        .bind(account.id)
        .bind(&account.account_number)
        .bind(&account.account_holder_name)
        .bind(&account.contact_number)
        .bind(account.balance)
        .bind(account.created_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_insert_error(e, &account.account_number))?;

        Ok(row)
    }

    async fn list(&self, request: &PageRequest) -> Result<Page<Account>> {
        // Sort column and direction come from closed enums, never from caller text.
        let rows = sqlx::query_as::<_, Account>(&format!(
            "SELECT {} FROM bank_account ORDER BY {} {}, id DESC LIMIT $1 OFFSET $2",
            ACCOUNT_COLUMNS,
            request.sort.column(),
            request.direction.keyword()
        ))
        .bind(request.limit())
        .bind(request.offset())
        .fetch_all(&self.pool)
        .await
        .map_err(AppError::Database)?;

        let total: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM bank_account")
            .fetch_one(&self.pool)
            .await
            .map_err(AppError::Database)?;

        Ok(Page::new(rows, total.0, request))
    }

    async fn begin(&self) -> Result<Box<dyn AccountTransaction>> {
        let tx = self.pool.begin().await.map_err(AppError::Database)?;
        Ok(Box::new(PgAccountTransaction { tx }))
    }

    async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(AppError::Database)?;
        Ok(())
    }
}

/// Transaction handle; sqlx rolls back on drop if `commit` was never reached.
pub struct PgAccountTransaction {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl AccountTransaction for PgAccountTransaction {
    async fn find_for_update(&mut self, account_number: &str) -> Result<Option<Account>> {
        let row = sqlx::query_as::<_, Account>(&format!(
            "SELECT {} FROM bank_account WHERE account_number = $1 FOR UPDATE",
            ACCOUNT_COLUMNS
        ))
        .bind(account_number)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(AppError::Database)?;

        Ok(row)
    }

    async fn update(&mut self, account: &Account) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE bank_account
            SET account_holder_name = $2, contact_number = $3, balance = $4
            WHERE account_number = $1
            "#,
        )
        .bind(&account.account_number)
        .bind(&account.account_holder_name)
        .bind(&account.contact_number)
        .bind(account.balance)
        .execute(&mut *self.tx)
        .await
        .map_err(AppError::Database)?;

        if result.rows_affected() == 0 {
            return Err(AppError::AccountNotFound(account.account_number.clone()));
        }
        Ok(())
    }

    async fn delete(&mut self, account_number: &str) -> Result<bool> {
        let result = sqlx::query(
            r#"
            DELETE FROM bank_account
            WHERE account_number = $1
            "#,
        )
        .bind(account_number)
        .execute(&mut *self.tx)
        .await
        .map_err(AppError::Database)?;

        Ok(result.rows_affected() > 0)
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        self.tx.commit().await.map_err(AppError::Database)
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        self.tx.rollback().await.map_err(AppError::Database)
    }
}
