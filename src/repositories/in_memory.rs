use async_trait::async_trait;
use std::cmp::Ordering as CmpOrdering;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::{Mutex as RowLock, OwnedMutexGuard};

use super::{AccountStore, AccountTransaction};
use crate::error::{AppError, Result};
use crate::models::{Account, Page, PageRequest, SortDirection, SortField};

/// Process-local account store.
///
/// Committed rows live behind a plain mutex; `find_for_update` additionally
/// takes a per-row async lock that the transaction keeps until it ends, so
/// the exclusive-read semantics match `SELECT ... FOR UPDATE`. Writes are
/// staged in the transaction and applied in one step on commit.
#[derive(Clone, Default)]
pub struct InMemoryAccountRepository {
    inner: Arc<Inner>,
}

#[derive(Default)]
struct Inner {
    rows: Mutex<HashMap<String, Account>>,
    row_locks: Mutex<HashMap<String, Arc<RowLock<()>>>>,
    fail_next_commit: AtomicBool,
}

impl Inner {
    fn rows(&self) -> MutexGuard<'_, HashMap<String, Account>> {
        self.rows.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn row_lock(&self, account_number: &str) -> Arc<RowLock<()>> {
        self.row_locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(account_number.to_string())
            .or_default()
            .clone()
    }

    /// Drops the row lock of a deleted row unless another transaction is
    /// queued on it. The caller's guard accounts for one reference.
    fn forget_row_lock(&self, account_number: &str) {
        let mut locks = self.row_locks.lock().unwrap_or_else(PoisonError::into_inner);
        let idle = locks
            .get(account_number)
            .map(|lock| Arc::strong_count(lock) <= 2)
            .unwrap_or(false);
        if idle {
            locks.remove(account_number);
        }
    }
}

impl InMemoryAccountRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next `commit` fail after all writes were staged. Used to
    /// exercise rollback paths.
    pub fn fail_next_commit(&self) {
        self.inner.fail_next_commit.store(true, Ordering::SeqCst);
    }

    /// Overwrites a committed row directly. Intended for seeding balances.
    pub fn put(&self, account: Account) {
        self.inner
            .rows()
            .insert(account.account_number.clone(), account);
    }

    pub fn len(&self) -> usize {
        self.inner.rows().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn compare(a: &Account, b: &Account, sort: SortField) -> CmpOrdering {
    match sort {
        SortField::Id => a.id.cmp(&b.id),
        SortField::AccountNumber => a.account_number.cmp(&b.account_number),
        SortField::Balance => a.balance.cmp(&b.balance),
        SortField::CreatedAt => a.created_at.cmp(&b.created_at),
    }
}

#[async_trait]
impl AccountStore for InMemoryAccountRepository {
    async fn find_by_account_number(&self, account_number: &str) -> Result<Option<Account>> {
        Ok(self.inner.rows().get(account_number).cloned())
    }

    async fn exists_by_account_number(&self, account_number: &str) -> Result<bool> {
        Ok(self.inner.rows().contains_key(account_number))
    }

    async fn insert(&self, account: &Account) -> Result<Account> {
        let mut rows = self.inner.rows();
        if rows.contains_key(&account.account_number) {
            return Err(AppError::DuplicateAccount(account.account_number.clone()));
        }
        if rows.values().any(|existing| existing.id == account.id) {
            return Err(AppError::Internal(anyhow::anyhow!(
                "duplicate primary key {}",
                account.id
            )));
        }
        rows.insert(account.account_number.clone(), account.clone());
        Ok(account.clone())
    }

    async fn list(&self, request: &PageRequest) -> Result<Page<Account>> {
        let mut accounts: Vec<Account> = self.inner.rows().values().cloned().collect();
        accounts.sort_by(|a, b| {
            let primary = match request.direction {
                SortDirection::Asc => compare(a, b, request.sort),
                SortDirection::Desc => compare(b, a, request.sort),
            };
            primary.then_with(|| b.id.cmp(&a.id))
        });

        let total = accounts.len() as i64;
        let items = accounts
            .into_iter()
            .skip(request.offset() as usize)
            .take(request.limit() as usize)
            .collect();

        Ok(Page::new(items, total, request))
    }

    async fn begin(&self) -> Result<Box<dyn AccountTransaction>> {
        Ok(Box::new(InMemoryAccountTransaction {
            inner: self.inner.clone(),
            guards: HashMap::new(),
            writes: HashMap::new(),
        }))
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}

/// Pending unit of work. `None` in `writes` marks a staged delete.
pub struct InMemoryAccountTransaction {
    inner: Arc<Inner>,
    guards: HashMap<String, OwnedMutexGuard<()>>,
    writes: HashMap<String, Option<Account>>,
}

impl InMemoryAccountTransaction {
    async fn lock_row(&mut self, account_number: &str) {
        if self.guards.contains_key(account_number) {
            return;
        }
        let guard = self.inner.row_lock(account_number).lock_owned().await;
        self.guards.insert(account_number.to_string(), guard);
    }

    fn visible(&self, account_number: &str) -> Option<Account> {
        match self.writes.get(account_number) {
            Some(staged) => staged.clone(),
            None => self.inner.rows().get(account_number).cloned(),
        }
    }
}

#[async_trait]
impl AccountTransaction for InMemoryAccountTransaction {
    async fn find_for_update(&mut self, account_number: &str) -> Result<Option<Account>> {
        self.lock_row(account_number).await;
        Ok(self.visible(account_number))
    }

    async fn update(&mut self, account: &Account) -> Result<()> {
        self.lock_row(&account.account_number).await;
        if self.visible(&account.account_number).is_none() {
            return Err(AppError::AccountNotFound(account.account_number.clone()));
        }
        self.writes
            .insert(account.account_number.clone(), Some(account.clone()));
        Ok(())
    }

    async fn delete(&mut self, account_number: &str) -> Result<bool> {
        self.lock_row(account_number).await;
        let existed = self.visible(account_number).is_some();
        if existed {
            self.writes.insert(account_number.to_string(), None);
        }
        Ok(existed)
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        if self.inner.fail_next_commit.swap(false, Ordering::SeqCst) {
            return Err(AppError::Internal(anyhow::anyhow!("injected commit failure")));
        }

        let mut deleted = Vec::new();
        {
            let mut rows = self.inner.rows();
            for (account_number, staged) in &self.writes {
                match staged {
                    Some(account) => {
                        rows.insert(account_number.clone(), account.clone());
                    }
                    None => {
                        rows.remove(account_number);
                        deleted.push(account_number.as_str());
                    }
                }
            }
        }
        for account_number in deleted {
            self.inner.forget_row_lock(account_number);
        }
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use std::time::Duration;

    fn account(id: i64, number: &str) -> Account {
        Account::new(id, number.to_string(), "Holder".to_string(), "555-0100".to_string())
    }

    #[tokio::test]
    async fn test_insert_rejects_duplicate_account_number() {
        let store = InMemoryAccountRepository::new();
        store.insert(&account(1, "A")).await.unwrap();

        let err = store.insert(&account(2, "A")).await.unwrap_err();
        assert!(matches!(err, AppError::DuplicateAccount(n) if n == "A"));
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_uncommitted_writes_are_invisible_and_dropped_on_rollback() {
        let store = InMemoryAccountRepository::new();
        store.insert(&account(1, "A")).await.unwrap();

        let mut tx = store.begin().await.unwrap();
        let mut row = tx.find_for_update("A").await.unwrap().unwrap();
        row.balance = dec!(50.00);
        tx.update(&row).await.unwrap();

        let committed = store.find_by_account_number("A").await.unwrap().unwrap();
        assert_eq!(committed.balance, dec!(0.00));

        drop(tx);
        let committed = store.find_by_account_number("A").await.unwrap().unwrap();
        assert_eq!(committed.balance, dec!(0.00));
    }

    #[tokio::test]
    async fn test_commit_applies_all_writes() {
        let store = InMemoryAccountRepository::new();
        store.insert(&account(1, "A")).await.unwrap();
        store.insert(&account(2, "B")).await.unwrap();

        let mut tx = store.begin().await.unwrap();
        let mut a = tx.find_for_update("A").await.unwrap().unwrap();
        a.balance = dec!(10.00);
        tx.update(&a).await.unwrap();
        assert!(tx.delete("B").await.unwrap());
        tx.commit().await.unwrap();

        assert_eq!(
            store.find_by_account_number("A").await.unwrap().unwrap().balance,
            dec!(10.00)
        );
        assert!(!store.exists_by_account_number("B").await.unwrap());
    }

    #[tokio::test]
    async fn test_find_for_update_blocks_second_transaction() {
        let store = InMemoryAccountRepository::new();
        store.insert(&account(1, "A")).await.unwrap();

        let mut first = store.begin().await.unwrap();
        first.find_for_update("A").await.unwrap();

        let contender = store.clone();
        let waiter = tokio::spawn(async move {
            let mut second = contender.begin().await.unwrap();
            second.find_for_update("A").await.unwrap()
        });

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!waiter.is_finished());

        let mut row = first.find_for_update("A").await.unwrap().unwrap();
        row.balance = dec!(7.00);
        first.update(&row).await.unwrap();
        first.commit().await.unwrap();

        let seen = waiter.await.unwrap().unwrap();
        assert_eq!(seen.balance, dec!(7.00));
    }

    #[tokio::test]
    async fn test_committed_delete_drops_row_lock() {
        let store = InMemoryAccountRepository::new();
        store.insert(&account(1, "A")).await.unwrap();
        store.insert(&account(2, "B")).await.unwrap();

        let mut tx = store.begin().await.unwrap();
        tx.find_for_update("B").await.unwrap();
        assert!(tx.delete("A").await.unwrap());
        tx.commit().await.unwrap();

        let locks = store.inner.row_locks.lock().unwrap();
        assert!(!locks.contains_key("A"));
        assert!(locks.contains_key("B"));
    }

    #[tokio::test]
    async fn test_delete_keeps_row_lock_while_another_transaction_waits() {
        let store = InMemoryAccountRepository::new();
        store.insert(&account(1, "A")).await.unwrap();

        let mut deleter = store.begin().await.unwrap();
        assert!(deleter.delete("A").await.unwrap());

        let waiter = {
            let store = store.clone();
            tokio::spawn(async move {
                let mut tx = store.begin().await.unwrap();
                tx.find_for_update("A").await.unwrap()
            })
        };
        while Arc::strong_count(&store.inner.row_lock("A")) < 4 {
            tokio::task::yield_now().await;
        }

        deleter.commit().await.unwrap();
        assert!(waiter.await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_injected_commit_failure_discards_writes() {
        let store = InMemoryAccountRepository::new();
        store.insert(&account(1, "A")).await.unwrap();
        store.fail_next_commit();

        let mut tx = store.begin().await.unwrap();
        let mut row = tx.find_for_update("A").await.unwrap().unwrap();
        row.balance = dec!(99.00);
        tx.update(&row).await.unwrap();
        assert!(tx.commit().await.is_err());

        assert_eq!(
            store.find_by_account_number("A").await.unwrap().unwrap().balance,
            dec!(0.00)
        );
    }

    #[tokio::test]
    async fn test_list_sorts_by_id_descending_by_default() {
        let store = InMemoryAccountRepository::new();
        for (id, number) in [(1, "C"), (3, "A"), (2, "B")] {
            store.insert(&account(id, number)).await.unwrap();
        }

        let page = store.list(&PageRequest::new(0, 2)).await.unwrap();
        assert_eq!(page.total, 3);
        let ids: Vec<i64> = page.items.iter().map(|a| a.id).collect();
        assert_eq!(ids, vec![3, 2]);

        let page = store
            .list(&PageRequest::new(0, 10).sorted_by(SortField::AccountNumber, SortDirection::Asc))
            .await
            .unwrap();
        let numbers: Vec<&str> = page.items.iter().map(|a| a.account_number.as_str()).collect();
        assert_eq!(numbers, vec!["A", "B", "C"]);
    }
}
