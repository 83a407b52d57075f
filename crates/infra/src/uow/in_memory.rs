use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::{Mutex as RowLock, OwnedMutexGuard};

use ledgerly_accounts::{Account, LedgerEntry};
use ledgerly_core::{AccountId, DomainResult, Entity, TransactionId, UserId};

use super::{Session, SessionControl, UnitOfWork, Work, drive};
use crate::context::RequestContext;
use crate::error_map::{StoreError, map_persistence_error};
use crate::store::{AccountStore, HISTORY_LIMIT, TransactionStore};

#[derive(Debug, Default)]
struct Tables {
    accounts: HashMap<AccountId, Account>,
    /// Commit order, oldest first.
    transactions: Vec<LedgerEntry>,
}

#[derive(Debug, Default)]
struct Faults {
    begin: AtomicBool,
    transaction_insert: AtomicBool,
    commit: AtomicBool,
}

#[derive(Debug, Default)]
struct Shared {
    tables: RwLock<Tables>,
    row_locks: Mutex<HashMap<AccountId, Arc<RowLock<()>>>>,
    faults: Faults,
}

/// In-memory transactional backend.
///
/// Intended for tests/dev. Sessions stage their writes and apply them in one
/// step on commit; row locks taken by `get_for_update`, `create` and `update`
/// are held until the session ends, so concurrent sessions on one account
/// serialize the way they would under `SELECT ... FOR UPDATE`.
///
/// Cloning shares the underlying tables.
#[derive(Debug, Clone, Default)]
pub struct InMemoryUnitOfWork {
    shared: Arc<Shared>,
}

impl InMemoryUnitOfWork {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `begin` fail before any work runs.
    pub fn fail_next_begin(&self) {
        self.shared.faults.begin.store(true, Ordering::SeqCst);
    }

    /// Make the next ledger entry insert fail.
    pub fn fail_next_transaction_insert(&self) {
        self.shared
            .faults
            .transaction_insert
            .store(true, Ordering::SeqCst);
    }

    /// Make the next commit fail; the session's writes are discarded.
    pub fn fail_next_commit(&self) {
        self.shared.faults.commit.store(true, Ordering::SeqCst);
    }

    /// Committed snapshot of an account, deleted or not.
    pub fn committed_account(&self, id: AccountId) -> DomainResult<Option<Account>> {
        let tables = self.shared.read()?;
        Ok(tables.accounts.get(&id).cloned())
    }

    /// Number of committed ledger entries for `account_id`.
    pub fn committed_entry_count(&self, account_id: AccountId) -> DomainResult<usize> {
        let tables = self.shared.read()?;
        Ok(tables
            .transactions
            .iter()
            .filter(|e| e.account_id == account_id)
            .count())
    }

    #[cfg(test)]
    fn tracked_row_locks(&self) -> usize {
        self.shared.row_locks.lock().map(|locks| locks.len()).unwrap_or_default()
    }

    async fn begin(&self) -> DomainResult<InMemorySession> {
        if self.shared.faults.begin.swap(false, Ordering::SeqCst) {
            return Err(map_persistence_error(StoreError::InjectedFault("begin")));
        }
        Ok(InMemorySession {
            shared: Arc::clone(&self.shared),
            row_guards: HashMap::new(),
            staged_accounts: HashMap::new(),
            staged_transactions: Vec::new(),
        })
    }
}

impl Shared {
    fn read(&self) -> DomainResult<std::sync::RwLockReadGuard<'_, Tables>> {
        self.tables
            .read()
            .map_err(|_| map_persistence_error(StoreError::LockPoisoned))
    }
}

#[async_trait]
impl UnitOfWork for InMemoryUnitOfWork {
    async fn run<'a, T, F>(&'a self, ctx: &'a RequestContext, work: F) -> DomainResult<T>
    where
        T: Send + 'a,
        F: for<'s> FnOnce(&'s mut (dyn Session + 'a)) -> Work<'s, T> + Send + 'a,
    {
        let session = ctx.bound(self.begin()).await?;
        drive(ctx, session, work).await
    }
}

/// One in-flight in-memory transaction.
pub struct InMemorySession {
    shared: Arc<Shared>,
    row_guards: HashMap<AccountId, OwnedMutexGuard<()>>,
    staged_accounts: HashMap<AccountId, Account>,
    staged_transactions: Vec<LedgerEntry>,
}

impl InMemorySession {
    async fn lock_row(&mut self, id: AccountId) -> DomainResult<()> {
        if self.row_guards.contains_key(&id) {
            return Ok(());
        }
        let row = {
            let mut locks = self
                .shared
                .row_locks
                .lock()
                .map_err(|_| map_persistence_error(StoreError::LockPoisoned))?;
            Arc::clone(locks.entry(id).or_default())
        };
        let guard = row.lock_owned().await;
        self.row_guards.insert(id, guard);
        Ok(())
    }

    /// Latest version visible to this session, including soft-deleted rows.
    fn visible_account(&self, id: AccountId) -> DomainResult<Option<Account>> {
        if let Some(staged) = self.staged_accounts.get(&id) {
            return Ok(Some(staged.clone()));
        }
        let tables = self.shared.read()?;
        Ok(tables.accounts.get(&id).cloned())
    }

    fn live_account(&self, id: AccountId) -> DomainResult<Account> {
        self.visible_account(id)?
            .filter(|a| !a.is_deleted())
            .ok_or_else(|| map_persistence_error(StoreError::RecordNotFound(format!("account {id}"))))
    }

    fn find_entry(&self, id: TransactionId) -> DomainResult<LedgerEntry> {
        if let Some(staged) = self.staged_transactions.iter().find(|e| e.id == id) {
            return Ok(staged.clone());
        }
        let tables = self.shared.read()?;
        tables
            .transactions
            .iter()
            .find(|e| e.id == id)
            .cloned()
            .ok_or_else(|| map_persistence_error(StoreError::RecordNotFound(format!("transaction {id}"))))
    }
}

impl Session for InMemorySession {
    fn accounts(&mut self) -> &mut dyn AccountStore {
        self
    }

    fn transactions(&mut self) -> &mut dyn TransactionStore {
        self
    }
}

#[async_trait]
impl AccountStore for InMemorySession {
    async fn get(&mut self, id: AccountId) -> DomainResult<Account> {
        self.live_account(id)
    }

    async fn get_including_closed(&mut self, id: AccountId) -> DomainResult<Account> {
        self.visible_account(id)?
            .ok_or_else(|| map_persistence_error(StoreError::RecordNotFound(format!("account {id}"))))
    }

    async fn get_for_update(&mut self, id: AccountId) -> DomainResult<Account> {
        self.lock_row(id).await?;
        self.live_account(id)
    }

    async fn create(&mut self, account: &Account) -> DomainResult<()> {
        let id = account.id();
        self.lock_row(id).await?;
        if self.visible_account(id)?.is_some() {
            return Err(map_persistence_error(StoreError::DuplicateKey(format!(
                "account {id}"
            ))));
        }
        self.staged_accounts.insert(id, account.clone());
        Ok(())
    }

    async fn update(&mut self, account: &Account) -> DomainResult<()> {
        let id = account.id();
        self.lock_row(id).await?;
        let current = self.live_account(id)?;
        if current.currency() != account.currency() || current.owner_id() != account.owner_id() {
            return Err(map_persistence_error(StoreError::CheckViolation(format!(
                "account {id}: owner and currency are immutable"
            ))));
        }
        let next = Account::restore(
            id,
            current.owner_id(),
            account.balance(),
            current.created_at(),
            account.updated_at(),
            None,
        );
        self.staged_accounts.insert(id, next);
        Ok(())
    }

    async fn delete(&mut self, id: AccountId) -> DomainResult<()> {
        self.lock_row(id).await?;
        let current = self.live_account(id)?;
        let now = Utc::now();
        let deleted = Account::restore(
            id,
            current.owner_id(),
            current.balance(),
            current.created_at(),
            now,
            Some(now),
        );
        self.staged_accounts.insert(id, deleted);
        Ok(())
    }
}

#[async_trait]
impl TransactionStore for InMemorySession {
    async fn create(&mut self, entry: &LedgerEntry) -> DomainResult<()> {
        if self
            .shared
            .faults
            .transaction_insert
            .swap(false, Ordering::SeqCst)
        {
            return Err(map_persistence_error(StoreError::InjectedFault(
                "transaction insert",
            )));
        }
        if self.visible_account(entry.account_id)?.is_none() {
            return Err(map_persistence_error(StoreError::ForeignKey(format!(
                "account {}",
                entry.account_id
            ))));
        }
        if self.find_entry(entry.id).is_ok() {
            return Err(map_persistence_error(StoreError::DuplicateKey(format!(
                "transaction {}",
                entry.id
            ))));
        }
        self.staged_transactions.push(entry.clone());
        Ok(())
    }

    async fn get(&mut self, id: TransactionId) -> DomainResult<LedgerEntry> {
        self.find_entry(id)
    }

    async fn list(
        &mut self,
        user_id: UserId,
        account_id: AccountId,
    ) -> DomainResult<Vec<LedgerEntry>> {
        let tables = self.shared.read()?;
        Ok(tables
            .transactions
            .iter()
            .chain(self.staged_transactions.iter())
            .rev()
            .filter(|e| e.account_id == account_id && e.user_id == user_id)
            .take(HISTORY_LIMIT)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl SessionControl for InMemorySession {
    async fn commit(mut self) -> DomainResult<()> {
        if self.shared.faults.commit.swap(false, Ordering::SeqCst) {
            return Err(map_persistence_error(StoreError::InjectedFault("commit")));
        }
        let mut tables = self
            .shared
            .tables
            .write()
            .map_err(|_| map_persistence_error(StoreError::LockPoisoned))?;
        tables.accounts.extend(std::mem::take(&mut self.staged_accounts));
        tables
            .transactions
            .extend(std::mem::take(&mut self.staged_transactions));
        Ok(())
    }

    async fn rollback(self) -> DomainResult<()> {
        Ok(())
    }
}

impl Drop for InMemorySession {
    /// Releases the row locks and forgets rows no other session is waiting on.
    fn drop(&mut self) {
        if self.row_guards.is_empty() {
            return;
        }
        let Ok(mut locks) = self.shared.row_locks.lock() else {
            return;
        };
        for (id, guard) in self.row_guards.drain() {
            drop(guard);
            if locks.get(&id).is_some_and(|row| Arc::strong_count(row) == 1) {
                locks.remove(&id);
            }
        }
    }
}
