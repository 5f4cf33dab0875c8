use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use crate::cache::AccountCache;
use crate::config::LockSettings;
use crate::error::{AppError, Result};
use crate::id_generator::IdGenerator;
use crate::lock::{lock_order, LockLease, LockManager};
use crate::models::{normalize_amount, require_not_blank, Account, Page, PageRequest};
use crate::observability::{get_metrics, mask_amount, mask_sensitive, LatencyTimer};
use crate::repositories::AccountStore;

/// Request to open a new account.
#[derive(Debug, Clone)]
pub struct CreateAccountRequest {
    pub account_number: String,
    pub account_holder_name: String,
    pub contact_number: String,
}

/// Holder metadata replacing the current values.
#[derive(Debug, Clone)]
pub struct UpdateAccountRequest {
    pub account_holder_name: String,
    pub contact_number: String,
}

/// Request to move funds between two accounts.
#[derive(Debug, Clone)]
pub struct TransferRequest {
    pub from_account: String,
    pub to_account: String,
    pub amount: Decimal,
}

/// Outcome of a committed transfer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferReceipt {
    pub from_account: String,
    pub to_account: String,
    pub amount: Decimal,
    pub from_balance: Decimal,
    pub to_balance: Decimal,
}

/// Account engine: CRUD with cache-aside reads and the two-account transfer.
///
/// Every mutation runs under a distributed lock on the affected account
/// numbers. Balance changes additionally go through `find_for_update` inside
/// one store transaction, which is what serializes concurrent transfers; the
/// distributed lock guards against races between different operations on the
/// same account (a transfer racing a delete).
pub struct AccountService {
    store: Arc<dyn AccountStore>,
    locks: Arc<dyn LockManager>,
    cache: Arc<dyn AccountCache>,
    ids: Arc<dyn IdGenerator>,
    lock_settings: LockSettings,
    cache_ttl: Duration,
}

impl AccountService {
    pub fn new(
        store: Arc<dyn AccountStore>,
        locks: Arc<dyn LockManager>,
        cache: Arc<dyn AccountCache>,
        ids: Arc<dyn IdGenerator>,
        lock_settings: LockSettings,
        cache_ttl: Duration,
    ) -> Self {
        Self {
            store,
            locks,
            cache,
            ids,
            lock_settings,
            cache_ttl,
        }
    }

    /// Readiness probe for the backing store.
    pub async fn ping(&self) -> Result<()> {
        self.store.ping().await
    }

    /// Creates an account with a zero balance.
    pub async fn create_account(&self, request: CreateAccountRequest) -> Result<Account> {
        let timer = LatencyTimer::new();
        let result = self.create_account_inner(request).await;
        record_outcome("create", &result, &timer);
        result
    }

    async fn create_account_inner(&self, request: CreateAccountRequest) -> Result<Account> {
        require_not_blank("account_number", &request.account_number)?;
        require_not_blank("account_holder_name", &request.account_holder_name)?;
        require_not_blank("contact_number", &request.contact_number)?;

        if self
            .store
            .exists_by_account_number(&request.account_number)
            .await?
        {
            return Err(AppError::DuplicateAccount(request.account_number));
        }

        let lease = self
            .acquire("create", &request.account_number, self.lock_settings.create_wait())
            .await?;
        let result = self.insert_account(request).await;
        self.release(&lease).await;

        let account = result?;
        tracing::info!(
            account_number = %account.account_number,
            id = account.id,
            "Account created"
        );
        Ok(account)
    }

    async fn insert_account(&self, request: CreateAccountRequest) -> Result<Account> {
        // Another creator may have inserted between the first check and the lock.
        if self
            .store
            .exists_by_account_number(&request.account_number)
            .await?
        {
            return Err(AppError::DuplicateAccount(request.account_number));
        }

        let account = Account::new(
            self.ids.next_id(),
            request.account_number,
            request.account_holder_name,
            request.contact_number,
        );
        let account = self.store.insert(&account).await?;
        self.refresh_cache(&account).await;

        Ok(account)
    }

    /// Returns an account, serving from the cache when possible. A cached
    /// snapshot may lag the store. Misses fall through to the store and leave
    /// the cache untouched.
    pub async fn get_account(&self, account_number: &str) -> Result<Account> {
        let timer = LatencyTimer::new();
        let result = self.get_account_inner(account_number).await;
        record_outcome("get", &result, &timer);
        result
    }

    async fn get_account_inner(&self, account_number: &str) -> Result<Account> {
        require_not_blank("account_number", account_number)?;

        if let Some(cached) = self.cache.get(account_number).await {
            return Ok(cached);
        }

        let account = self
            .store
            .find_by_account_number(account_number)
            .await?
            .ok_or_else(|| AppError::AccountNotFound(account_number.to_string()))?;

        // No write-back: the cache is only written under the account lock.
        Ok(account)
    }

    /// Replaces holder name and contact. Balance is never touched here.
    pub async fn update_account(
        &self,
        account_number: &str,
        request: UpdateAccountRequest,
    ) -> Result<Account> {
        let timer = LatencyTimer::new();
        let result = self.update_account_inner(account_number, request).await;
        record_outcome("update", &result, &timer);
        result
    }

    async fn update_account_inner(
        &self,
        account_number: &str,
        request: UpdateAccountRequest,
    ) -> Result<Account> {
        require_not_blank("account_number", account_number)?;
        require_not_blank("account_holder_name", &request.account_holder_name)?;
        require_not_blank("contact_number", &request.contact_number)?;

        let lease = self
            .acquire("update", account_number, self.lock_settings.mutate_wait())
            .await?;
        let result = self.update_locked(account_number, request).await;
        self.release(&lease).await;

        let account = result?;
        tracing::info!(account_number = %account_number, "Account updated");
        Ok(account)
    }

    async fn update_locked(
        &self,
        account_number: &str,
        request: UpdateAccountRequest,
    ) -> Result<Account> {
        // An uncommitted transaction rolls back when dropped on an error path.
        let mut tx = self.store.begin().await?;

        let mut account = tx
            .find_for_update(account_number)
            .await?
            .ok_or_else(|| AppError::AccountNotFound(account_number.to_string()))?;

        account.update_holder(request.account_holder_name, request.contact_number);
        tx.update(&account).await?;
        tx.commit().await?;

        self.refresh_cache(&account).await;

        Ok(account)
    }

    /// Removes an account and its cache entry.
    pub async fn delete_account(&self, account_number: &str) -> Result<()> {
        let timer = LatencyTimer::new();
        let result = self.delete_account_inner(account_number).await;
        record_outcome("delete", &result, &timer);
        result
    }

    async fn delete_account_inner(&self, account_number: &str) -> Result<()> {
        require_not_blank("account_number", account_number)?;

        let lease = self
            .acquire("delete", account_number, self.lock_settings.mutate_wait())
            .await?;
        let result = self.delete_locked(account_number).await;
        self.release(&lease).await;

        result?;
        tracing::info!(account_number = %account_number, "Account deleted");
        Ok(())
    }

    async fn delete_locked(&self, account_number: &str) -> Result<()> {
        let mut tx = self.store.begin().await?;

        if tx.find_for_update(account_number).await?.is_none() {
            return Err(AppError::AccountNotFound(account_number.to_string()));
        }
        if !tx.delete(account_number).await? {
            return Err(AppError::AccountNotFound(account_number.to_string()));
        }
        tx.commit().await?;

        self.invalidate_cache(account_number).await;

        Ok(())
    }

    /// Returns one page of accounts. Sizes outside 1..=100 are clamped.
    pub async fn list_accounts(&self, request: PageRequest) -> Result<Page<Account>> {
        let timer = LatencyTimer::new();
        let result = self.store.list(&request.clamped()).await;
        record_outcome("list", &result, &timer);
        result
    }

    /// Moves `amount` from one account to another in a single transaction.
    pub async fn transfer_funds(&self, request: TransferRequest) -> Result<TransferReceipt> {
        let timer = LatencyTimer::new();
        let result = self.transfer_funds_inner(request).await;
        record_outcome("transfer", &result, &timer);
        result
    }

    async fn transfer_funds_inner(&self, request: TransferRequest) -> Result<TransferReceipt> {
        require_not_blank("from_account", &request.from_account)?;
        require_not_blank("to_account", &request.to_account)?;

        if request.from_account == request.to_account {
            return Err(AppError::SameAccount(request.from_account));
        }

        let amount = normalize_amount(request.amount)?;
        let (first, second) = lock_order(&request.from_account, &request.to_account);
        let wait = self.lock_settings.mutate_wait();

        let first_lease = self.acquire("transfer", first, wait).await?;
        let second_lease = match self.acquire("transfer", second, wait).await {
            Ok(lease) => lease,
            Err(e) => {
                self.release(&first_lease).await;
                return Err(e);
            }
        };

        let result = self
            .transfer_locked(
                &request.from_account,
                &request.to_account,
                amount,
                [&first_lease, &second_lease],
            )
            .await;

        self.release(&second_lease).await;
        self.release(&first_lease).await;

        let receipt = result?;
        tracing::info!(
            from_account = %mask_sensitive(&receipt.from_account, 2),
            to_account = %mask_sensitive(&receipt.to_account, 2),
            amount = %mask_amount(&receipt.amount),
            "Transfer committed"
        );
        Ok(receipt)
    }

    async fn transfer_locked(
        &self,
        from_account: &str,
        to_account: &str,
        amount: Decimal,
        leases: [&LockLease; 2],
    ) -> Result<TransferReceipt> {
        let mut tx = self.store.begin().await?;

        // Row locks follow the same order as the distributed locks.
        let (first, second) = lock_order(from_account, to_account);
        let first_row = tx
            .find_for_update(first)
            .await?
            .ok_or_else(|| AppError::AccountNotFound(first.to_string()))?;
        let second_row = tx
            .find_for_update(second)
            .await?
            .ok_or_else(|| AppError::AccountNotFound(second.to_string()))?;

        let (mut source, mut destination) = if first == from_account {
            (first_row, second_row)
        } else {
            (second_row, first_row)
        };

        source.debit(amount)?;
        destination.credit(amount);

        tx.update(&source).await?;
        tx.update(&destination).await?;

        self.warn_on_expired_leases(leases).await;
        tx.commit().await?;
        get_metrics().record_transfer_committed();

        // Invalidate rather than refresh; the next read goes to the store.
        self.invalidate_cache(&source.account_number).await;
        self.invalidate_cache(&destination.account_number).await;

        Ok(TransferReceipt {
            from_account: source.account_number,
            to_account: destination.account_number,
            amount,
            from_balance: source.balance,
            to_balance: destination.balance,
        })
    }

    fn lock_key(&self, account_number: &str) -> String {
        format!("{}:lock:{}", self.lock_settings.key_prefix, account_number)
    }

    async fn acquire(
        &self,
        operation: &'static str,
        account_number: &str,
        wait: Duration,
    ) -> Result<LockLease> {
        let key = self.lock_key(account_number);
        let timer = LatencyTimer::new();

        let lease = self
            .locks
            .try_lock(&key, wait, self.lock_settings.hold())
            .await?;
        get_metrics().record_lock_wait(operation, timer.elapsed_ms(), lease.is_some());

        lease.ok_or_else(|| {
            tracing::warn!(
                operation,
                key = %key,
                wait_ms = wait.as_millis() as u64,
                "Timed out waiting for account lock"
            );
            AppError::LockTimeout(account_number.to_string())
        })
    }

    /// Releases a lease. Failures are logged and never replace the result of
    /// the operation that held the lock.
    async fn release(&self, lease: &LockLease) {
        match self.locks.unlock(lease).await {
            Ok(true) => {}
            Ok(false) => {
                tracing::warn!(key = %lease.key(), "Lock expired before release");
            }
            Err(e) => {
                get_metrics().record_lock_release_failure();
                tracing::error!(key = %lease.key(), error = %e, "Failed to release lock");
            }
        }
    }

    async fn warn_on_expired_leases(&self, leases: [&LockLease; 2]) {
        for lease in leases {
            match self.locks.is_held(lease).await {
                Ok(true) => {}
                Ok(false) => tracing::warn!(
                    key = %lease.key(),
                    "Lock lease expired during transfer, relying on row locks"
                ),
                Err(e) => tracing::warn!(key = %lease.key(), error = %e, "Could not check lock lease"),
            }
        }
    }

    async fn refresh_cache(&self, account: &Account) {
        if let Err(e) = self.cache.set(account, self.cache_ttl).await {
            tracing::warn!(account_number = %account.account_number, "Cache refresh failed: {}", e);
        }
    }

    async fn invalidate_cache(&self, account_number: &str) {
        if let Err(e) = self.cache.delete(account_number).await {
            tracing::warn!(account_number = %account_number, "Cache invalidation failed: {}", e);
        }
    }
}

fn record_outcome<T>(operation: &'static str, result: &Result<T>, timer: &LatencyTimer) {
    let outcome = match result {
        Ok(_) => "success",
        Err(e) if e.is_domain() => {
            tracing::warn!(operation, code = e.code(), "{}", e);
            e.kind()
        }
        Err(e) => {
            tracing::error!(operation, code = e.code(), error = ?e, "Account operation failed");
            e.kind()
        }
    };
    get_metrics().record_operation(operation, outcome, timer.elapsed_ms());
}
