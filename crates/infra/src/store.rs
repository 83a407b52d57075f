//! Store contracts used inside a unit of work.
//!
//! Both stores operate on the session's transaction; every read sees the
//! session's own uncommitted writes.

use async_trait::async_trait;

use ledgerly_accounts::{Account, LedgerEntry};
use ledgerly_core::{AccountId, DomainResult, TransactionId, UserId};

/// Maximum number of entries returned by [`TransactionStore::list`].
pub const HISTORY_LIMIT: usize = 100;

#[async_trait]
pub trait AccountStore: Send {
    /// Load a live (not soft-deleted) account.
    async fn get(&mut self, id: AccountId) -> DomainResult<Account>;

    /// Load an account whether or not it has been soft-deleted.
    async fn get_including_closed(&mut self, id: AccountId) -> DomainResult<Account>;

    /// Load a live account and hold its row lock until the session ends.
    async fn get_for_update(&mut self, id: AccountId) -> DomainResult<Account>;

    async fn create(&mut self, account: &Account) -> DomainResult<()>;

    /// Persist the mutable columns (balance, updated_at) of a live account.
    async fn update(&mut self, account: &Account) -> DomainResult<()>;

    /// Soft-delete; the row and its history stay in place.
    async fn delete(&mut self, id: AccountId) -> DomainResult<()>;
}

#[async_trait]
pub trait TransactionStore: Send {
    /// Insert an entry. Conversion metadata travels inside the entry.
    async fn create(&mut self, entry: &LedgerEntry) -> DomainResult<()>;

    async fn get(&mut self, id: TransactionId) -> DomainResult<LedgerEntry>;

    /// Entries of `account_id` recorded for `user_id`, newest first, at most
    /// [`HISTORY_LIMIT`].
    async fn list(
        &mut self,
        user_id: UserId,
        account_id: AccountId,
    ) -> DomainResult<Vec<LedgerEntry>>;
}
