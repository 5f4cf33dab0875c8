pub mod account_repository;
pub mod in_memory;

pub use account_repository::PgAccountRepository;
pub use in_memory::InMemoryAccountRepository;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{Account, Page, PageRequest};

/// Durable account storage. Lookups outside a transaction never take row locks
/// and only ever observe committed state.
#[async_trait]
pub trait AccountStore: Send + Sync {
    async fn find_by_account_number(&self, account_number: &str) -> Result<Option<Account>>;

    async fn exists_by_account_number(&self, account_number: &str) -> Result<bool>;

    /// Inserts a new row. A conflicting `account_number` yields `DuplicateAccount`.
    async fn insert(&self, account: &Account) -> Result<Account>;

    async fn list(&self, request: &PageRequest) -> Result<Page<Account>>;

    /// Opens a transaction. Dropping it without `commit` rolls it back.
    async fn begin(&self) -> Result<Box<dyn AccountTransaction>>;

    /// Cheap round-trip used by readiness checks.
    async fn ping(&self) -> Result<()>;
}

/// A unit of work over account rows. Rows read with `find_for_update` stay
/// exclusively locked until the transaction commits or rolls back.
#[async_trait]
pub trait AccountTransaction: Send {
    async fn find_for_update(&mut self, account_number: &str) -> Result<Option<Account>>;

    async fn update(&mut self, account: &Account) -> Result<()>;

    async fn delete(&mut self, account_number: &str) -> Result<bool>;

    async fn commit(self: Box<Self>) -> Result<()>;

    async fn rollback(self: Box<Self>) -> Result<()>;
}
