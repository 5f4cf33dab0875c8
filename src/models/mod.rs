pub mod account;
pub mod page;

pub use account::{normalize_amount, require_not_blank, Account, MONEY_SCALE};
pub use page::{Page, PageRequest, SortDirection, SortField, DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};
