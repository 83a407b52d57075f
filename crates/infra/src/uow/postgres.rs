//! Postgres-backed unit of work.
//!
//! One session is one `sqlx` transaction. Account reads for mutation use
//! `SELECT ... FOR UPDATE`, so two sessions moving funds on the same account
//! serialize on the row lock and neither update is lost.
//!
//! Dropping a session without commit lets `sqlx` roll the transaction back
//! when the connection returns to the pool.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{FromRow, PgPool, Postgres, Row, Transaction};
use tracing::instrument;

use ledgerly_accounts::{Account, ConversionInfo, LedgerEntry, MoneySource};
use ledgerly_core::{
    AccountId, Currency, DomainError, DomainResult, Entity, Money, TransactionId, UserId,
};

use super::{Session, SessionControl, UnitOfWork, Work, drive};
use crate::config::DatabaseConfig;
use crate::context::RequestContext;
use crate::error_map::{PersistenceResultExt, StoreError, map_persistence_error};
use crate::store::{AccountStore, HISTORY_LIMIT, TransactionStore};

const SCHEMA: &str = include_str!("../../migrations/0001_ledger.sql");

#[derive(Debug, Clone)]
pub struct PgUnitOfWork {
    pool: PgPool,
}

impl PgUnitOfWork {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    #[instrument(skip(config), fields(max_connections = config.max_connections), err)]
    pub async fn connect(config: &DatabaseConfig) -> DomainResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(config.acquire_timeout)
            .connect(&config.url)
            .await
            .map_err(db_error("connect"))?;
        Ok(Self::new(pool))
    }

    /// Apply the bundled schema. Statements are idempotent.
    #[instrument(skip(self), err)]
    pub async fn migrate(&self) -> DomainResult<()> {
        sqlx::raw_sql(SCHEMA)
            .execute(&self.pool)
            .await
            .map_err(db_error("migrate"))?;
        Ok(())
    }

    async fn begin(&self) -> DomainResult<PgSession> {
        let tx = self.pool.begin().await.map_err(db_error("begin"))?;
        Ok(PgSession { tx })
    }
}

#[async_trait]
impl UnitOfWork for PgUnitOfWork {
    async fn run<'a, T, F>(&'a self, ctx: &'a RequestContext, work: F) -> DomainResult<T>
    where
        T: Send + 'a,
        F: for<'s> FnOnce(&'s mut (dyn Session + 'a)) -> Work<'s, T> + Send + 'a,
    {
        let session = ctx.bound(self.begin()).await?;
        drive(ctx, session, work).await
    }
}

/// One open Postgres transaction.
pub struct PgSession {
    tx: Transaction<'static, Postgres>,
}

impl Session for PgSession {
    fn accounts(&mut self) -> &mut dyn AccountStore {
        self
    }

    fn transactions(&mut self) -> &mut dyn TransactionStore {
        self
    }
}

#[derive(Debug, Clone, Copy)]
enum AccountRead {
    Live,
    LiveForUpdate,
    IncludingClosed,
}

impl AccountRead {
    fn sql(self) -> String {
        let filter = match self {
            AccountRead::Live => "AND deleted_at IS NULL",
            AccountRead::LiveForUpdate => "AND deleted_at IS NULL FOR UPDATE",
            AccountRead::IncludingClosed => "",
        };
        format!(
            "SELECT id, owner_id, currency, balance, created_at, updated_at, deleted_at \
             FROM accounts WHERE id = $1 {filter}"
        )
    }
}

impl PgSession {
    async fn fetch_account(&mut self, id: AccountId, read: AccountRead) -> DomainResult<Account> {
        let row = sqlx::query(&read.sql())
            .bind(id.as_uuid())
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(db_error("select_account"))?
            .ok_or_else(|| {
                map_persistence_error(StoreError::RecordNotFound(format!("account {id}")))
            })?;

        AccountRow::from_row(&row).map_persistence()?.into_account()
    }
}

#[async_trait]
impl AccountStore for PgSession {
    #[instrument(level = "debug", skip(self), fields(account_id = %id), err)]
    async fn get(&mut self, id: AccountId) -> DomainResult<Account> {
        self.fetch_account(id, AccountRead::Live).await
    }

    #[instrument(level = "debug", skip(self), fields(account_id = %id), err)]
    async fn get_including_closed(&mut self, id: AccountId) -> DomainResult<Account> {
        self.fetch_account(id, AccountRead::IncludingClosed).await
    }

    #[instrument(level = "debug", skip(self), fields(account_id = %id), err)]
    async fn get_for_update(&mut self, id: AccountId) -> DomainResult<Account> {
        self.fetch_account(id, AccountRead::LiveForUpdate).await
    }

    #[instrument(level = "debug", skip(self, account), fields(account_id = %account.id()), err)]
    async fn create(&mut self, account: &Account) -> DomainResult<()> {
        sqlx::query(
            r#"
            INSERT INTO accounts (id, owner_id, currency, balance, created_at, updated_at, deleted_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(account.id().as_uuid())
        .bind(account.owner_id().as_uuid())
        .bind(account.currency().code())
        .bind(account.balance().amount())
        .bind(account.created_at())
        .bind(account.updated_at())
        .bind(account.deleted_at())
        .execute(&mut *self.tx)
        .await
        .map_err(db_error("insert_account"))?;
        Ok(())
    }

    #[instrument(level = "debug", skip(self, account), fields(account_id = %account.id()), err)]
    async fn update(&mut self, account: &Account) -> DomainResult<()> {
        let id = account.id();
        let result = sqlx::query(
            r#"
            UPDATE accounts
            SET balance = $2, updated_at = $3
            WHERE id = $1 AND deleted_at IS NULL
            "#,
        )
        .bind(id.as_uuid())
        .bind(account.balance().amount())
        .bind(account.updated_at())
        .execute(&mut *self.tx)
        .await
        .map_err(db_error("update_account"))?;

        if result.rows_affected() == 0 {
            return Err(map_persistence_error(StoreError::RecordNotFound(format!(
                "account {id}"
            ))));
        }
        Ok(())
    }

    #[instrument(level = "debug", skip(self), fields(account_id = %id), err)]
    async fn delete(&mut self, id: AccountId) -> DomainResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE accounts
            SET deleted_at = $2, updated_at = $2
            WHERE id = $1 AND deleted_at IS NULL
            "#,
        )
        .bind(id.as_uuid())
        .bind(Utc::now())
        .execute(&mut *self.tx)
        .await
        .map_err(db_error("delete_account"))?;

        if result.rows_affected() == 0 {
            return Err(map_persistence_error(StoreError::RecordNotFound(format!(
                "account {id}"
            ))));
        }
        Ok(())
    }
}

#[async_trait]
impl TransactionStore for PgSession {
    #[instrument(level = "debug", skip(self, entry), fields(transaction_id = %entry.id, account_id = %entry.account_id), err)]
    async fn create(&mut self, entry: &LedgerEntry) -> DomainResult<()> {
        let conversion = entry.conversion.as_ref();
        sqlx::query(
            r#"
            INSERT INTO transactions (
                id, account_id, user_id, amount, currency, balance, money_source,
                original_amount, original_currency, conversion_rate,
                external_target_masked, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            "#,
        )
        .bind(entry.id.as_uuid())
        .bind(entry.account_id.as_uuid())
        .bind(entry.user_id.as_uuid())
        .bind(entry.amount.amount())
        .bind(entry.amount.currency().code())
        .bind(entry.balance.amount())
        .bind(entry.money_source.as_str())
        .bind(conversion.map(ConversionInfo::original_amount))
        .bind(conversion.map(|c| c.original_currency().code().to_string()))
        .bind(conversion.map(ConversionInfo::rate))
        .bind(entry.external_target_masked.as_deref())
        .bind(entry.created_at)
        .execute(&mut *self.tx)
        .await
        .map_err(db_error("insert_transaction"))?;
        Ok(())
    }

    #[instrument(level = "debug", skip(self), fields(transaction_id = %id), err)]
    async fn get(&mut self, id: TransactionId) -> DomainResult<LedgerEntry> {
        let row = sqlx::query(&format!("{ENTRY_COLUMNS} WHERE id = $1"))
            .bind(id.as_uuid())
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(db_error("select_transaction"))?
            .ok_or_else(|| {
                map_persistence_error(StoreError::RecordNotFound(format!("transaction {id}")))
            })?;

        EntryRow::from_row(&row).map_persistence()?.into_entry()
    }

    #[instrument(level = "debug", skip(self), fields(user_id = %user_id, account_id = %account_id), err)]
    async fn list(
        &mut self,
        user_id: UserId,
        account_id: AccountId,
    ) -> DomainResult<Vec<LedgerEntry>> {
        let rows = sqlx::query(&format!(
            "{ENTRY_COLUMNS} WHERE user_id = $1 AND account_id = $2 \
             ORDER BY created_at DESC, id DESC LIMIT $3"
        ))
        .bind(user_id.as_uuid())
        .bind(account_id.as_uuid())
        .bind(HISTORY_LIMIT as i64)
        .fetch_all(&mut *self.tx)
        .await
        .map_err(db_error("list_transactions"))?;

        let mut entries = Vec::with_capacity(rows.len());
        for row in rows {
            let entry = EntryRow::from_row(&row).map_persistence()?.into_entry()?;
            entries.push(entry);
        }
        Ok(entries)
    }
}

#[async_trait]
impl SessionControl for PgSession {
    async fn commit(self) -> DomainResult<()> {
        self.tx.commit().await.map_err(db_error("commit"))
    }

    async fn rollback(self) -> DomainResult<()> {
        self.tx.rollback().await.map_err(db_error("rollback"))
    }
}

fn db_error(operation: &'static str) -> impl FnOnce(sqlx::Error) -> DomainError {
    move |err| map_persistence_error(StoreError::operation(operation, err))
}

fn corrupt(what: &str, err: DomainError) -> DomainError {
    map_persistence_error(StoreError::Corrupt(format!("{what}: {err}")))
}

// SQLx row types

const ENTRY_COLUMNS: &str = "SELECT id, account_id, user_id, amount, currency, balance, \
     money_source, original_amount, original_currency, conversion_rate, \
     external_target_masked, created_at FROM transactions";

#[derive(Debug)]
struct AccountRow {
    id: uuid::Uuid,
    owner_id: uuid::Uuid,
    currency: String,
    balance: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    deleted_at: Option<DateTime<Utc>>,
}

impl<'r> FromRow<'r, PgRow> for AccountRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(AccountRow {
            id: row.try_get("id")?,
            owner_id: row.try_get("owner_id")?,
            currency: row.try_get("currency")?,
            balance: row.try_get("balance")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
            deleted_at: row.try_get("deleted_at")?,
        })
    }
}

impl AccountRow {
    fn into_account(self) -> DomainResult<Account> {
        let currency = Currency::parse(&self.currency).map_err(|e| corrupt("account currency", e))?;
        Ok(Account::restore(
            AccountId::from_uuid(self.id),
            UserId::from_uuid(self.owner_id),
            Money::new(self.balance, currency),
            self.created_at,
            self.updated_at,
            self.deleted_at,
        ))
    }
}

#[derive(Debug)]
struct EntryRow {
    id: uuid::Uuid,
    account_id: uuid::Uuid,
    user_id: uuid::Uuid,
    amount: i64,
    currency: String,
    balance: i64,
    money_source: String,
    original_amount: Option<Decimal>,
    original_currency: Option<String>,
    conversion_rate: Option<Decimal>,
    external_target_masked: Option<String>,
    created_at: DateTime<Utc>,
}

impl<'r> FromRow<'r, PgRow> for EntryRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(EntryRow {
            id: row.try_get("id")?,
            account_id: row.try_get("account_id")?,
            user_id: row.try_get("user_id")?,
            amount: row.try_get("amount")?,
            currency: row.try_get("currency")?,
            balance: row.try_get("balance")?,
            money_source: row.try_get("money_source")?,
            original_amount: row.try_get("original_amount")?,
            original_currency: row.try_get("original_currency")?,
            conversion_rate: row.try_get("conversion_rate")?,
            external_target_masked: row.try_get("external_target_masked")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

impl EntryRow {
    fn into_entry(self) -> DomainResult<LedgerEntry> {
        let currency = Currency::parse(&self.currency).map_err(|e| corrupt("entry currency", e))?;
        let money_source: MoneySource = self
            .money_source
            .parse()
            .map_err(|e| corrupt("money source", e))?;

        let conversion = match (self.original_amount, self.original_currency, self.conversion_rate) {
            (Some(amount), Some(code), Some(rate)) => {
                let original_currency =
                    Currency::parse(&code).map_err(|e| corrupt("original currency", e))?;
                let original = Money::from_major(amount, original_currency)
                    .map_err(|e| corrupt("original amount", e))?;
                Some(ConversionInfo::new(original, rate).map_err(|e| corrupt("conversion", e))?)
            }
            (None, None, None) => None,
            _ => {
                return Err(map_persistence_error(StoreError::Corrupt(
                    "partial conversion metadata".to_string(),
                )));
            }
        };

        Ok(LedgerEntry {
            id: TransactionId::from_uuid(self.id),
            account_id: AccountId::from_uuid(self.account_id),
            user_id: UserId::from_uuid(self.user_id),
            amount: Money::new(self.amount, currency),
            balance: Money::new(self.balance, currency),
            money_source,
            conversion,
            external_target_masked: self.external_target_masked,
            created_at: self.created_at,
        })
    }
}
