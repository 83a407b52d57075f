//! Account orchestration: every balance change runs inside one unit of work.
//!
//! ```text
//! deposit / withdraw
//!   ↓
//! 1. validate (amount > 0, target matches money source)
//!   ↓
//! 2. UnitOfWork::run
//!      get_for_update(account)      row lock held until commit/rollback
//!      ensure owner                 Unauthorized
//!      convert if currencies differ ConversionFailure
//!      credit / debit               InsufficientFunds
//!      update(account)
//!      transactions().create(entry)
//!   ↓
//! 3. commit (any error above rolls everything back)
//! ```
//!
//! The service holds no lock of its own; same-account serialization comes from
//! the store's row lock.

use core::fmt;
use core::str::FromStr;
use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use tracing::{info, instrument};

use ledgerly_accounts::{Account, ConversionInfo, ExternalTarget, LedgerEntry, MoneySource};
use ledgerly_core::{
    AccountId, Currency, DomainError, DomainResult, Entity, Money, TransactionId,
};

use crate::context::RequestContext;
use crate::conversion::CurrencyConverter;
use crate::uow::UnitOfWork;

/// Amount of a movement as the caller stated it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestedAmount {
    /// Amount in an explicit currency, possibly not the account's.
    Exact(Money),
    /// Major units in whatever currency the account holds.
    AccountCurrency(Decimal),
}

impl RequestedAmount {
    /// Parse a major-unit string. Without a currency the amount is resolved
    /// against the account once it has been loaded.
    pub fn parse_major(value: &str, currency: Option<Currency>) -> DomainResult<Self> {
        match currency {
            Some(currency) => Money::parse_major(value, currency).map(Self::Exact),
            None => Decimal::from_str(value.trim())
                .map(Self::AccountCurrency)
                .map_err(|_| DomainError::validation(format!("'{value}' is not a valid amount"))),
        }
    }

    pub fn is_positive(&self) -> bool {
        match self {
            Self::Exact(money) => money.is_positive(),
            Self::AccountCurrency(value) => *value > Decimal::ZERO,
        }
    }

    fn resolve(self, account_currency: Currency) -> DomainResult<Money> {
        match self {
            Self::Exact(money) => Ok(money),
            Self::AccountCurrency(value) => Money::from_major(value, account_currency),
        }
    }
}

impl From<Money> for RequestedAmount {
    fn from(value: Money) -> Self {
        Self::Exact(value)
    }
}

impl fmt::Display for RequestedAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exact(money) => fmt::Display::fmt(money, f),
            Self::AccountCurrency(value) => write!(f, "{value} (account currency)"),
        }
    }
}

/// A deposit or withdrawal as requested by the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MovementRequest {
    pub account_id: AccountId,
    /// Positive amount; may be in a currency other than the account's.
    pub amount: RequestedAmount,
    pub source: MoneySource,
    /// Raw external identifiers. Only the masked form is ever stored.
    pub external_target: Option<ExternalTarget>,
}

impl MovementRequest {
    pub fn internal(account_id: AccountId, amount: impl Into<RequestedAmount>) -> Self {
        Self {
            account_id,
            amount: amount.into(),
            source: MoneySource::Internal,
            external_target: None,
        }
    }

    /// Movement to or from an external target; the source follows the target.
    pub fn external(
        account_id: AccountId,
        amount: impl Into<RequestedAmount>,
        target: ExternalTarget,
    ) -> Self {
        Self {
            account_id,
            amount: amount.into(),
            source: target.money_source(),
            external_target: Some(target),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Credit,
    Debit,
}

pub struct AccountService<U, C> {
    uow: U,
    converter: Arc<C>,
    default_currency: Currency,
}

impl<U, C> AccountService<U, C>
where
    U: UnitOfWork,
    C: CurrencyConverter + 'static,
{
    pub fn new(uow: U, converter: C, default_currency: Currency) -> Self {
        Self {
            uow,
            converter: Arc::new(converter),
            default_currency,
        }
    }

    /// Open a zero-balance account for the acting user.
    #[instrument(skip(self, ctx), fields(user_id = %ctx.user_id()), err)]
    pub async fn create_account(
        &self,
        ctx: &RequestContext,
        currency: Option<Currency>,
    ) -> DomainResult<Account> {
        let currency = currency.unwrap_or(self.default_currency);
        let account = Account::open(AccountId::new(), ctx.user_id(), currency, Utc::now());
        let to_store = account.clone();

        self.uow
            .run(ctx, move |s| {
                Box::pin(async move { s.accounts().create(&to_store).await })
            })
            .await?;

        info!(account_id = %account.id(), currency = %currency, "account opened");
        Ok(account)
    }

    #[instrument(
        skip(self, ctx, request),
        fields(user_id = %ctx.user_id(), account_id = %request.account_id, amount = %request.amount),
        err
    )]
    pub async fn deposit(
        &self,
        ctx: &RequestContext,
        request: MovementRequest,
    ) -> DomainResult<LedgerEntry> {
        self.move_funds(ctx, request, Direction::Credit).await
    }

    #[instrument(
        skip(self, ctx, request),
        fields(user_id = %ctx.user_id(), account_id = %request.account_id, amount = %request.amount),
        err
    )]
    pub async fn withdraw(
        &self,
        ctx: &RequestContext,
        request: MovementRequest,
    ) -> DomainResult<LedgerEntry> {
        self.move_funds(ctx, request, Direction::Debit).await
    }

    /// The account as seen by its owner. Other users get `NotFound`.
    pub async fn account(&self, ctx: &RequestContext, account_id: AccountId) -> DomainResult<Account> {
        let user_id = ctx.user_id();
        self.uow
            .run(ctx, move |s| {
                Box::pin(async move {
                    let account = s.accounts().get(account_id).await?;
                    if !account.is_owned_by(user_id) {
                        return Err(DomainError::not_found(format!("account {account_id}")));
                    }
                    Ok(account)
                })
            })
            .await
    }

    #[instrument(skip(self, ctx), fields(user_id = %ctx.user_id()), err)]
    pub async fn balance(&self, ctx: &RequestContext, account_id: AccountId) -> DomainResult<Money> {
        Ok(self.account(ctx, account_id).await?.balance())
    }

    /// The acting user's entries on `account_id`, newest first (closed accounts included).
    ///
    /// Unknown accounts and accounts owned by someone else are `NotFound`.
    #[instrument(skip(self, ctx), fields(user_id = %ctx.user_id()), err)]
    pub async fn history(
        &self,
        ctx: &RequestContext,
        account_id: AccountId,
    ) -> DomainResult<Vec<LedgerEntry>> {
        let user_id = ctx.user_id();
        self.uow
            .run(ctx, move |s| {
                Box::pin(async move {
                    let account = s.accounts().get_including_closed(account_id).await?;
                    if !account.is_owned_by(user_id) {
                        return Err(DomainError::not_found(format!("account {account_id}")));
                    }
                    s.transactions().list(user_id, account_id).await
                })
            })
            .await
    }

    #[instrument(skip(self, ctx), fields(user_id = %ctx.user_id()), err)]
    pub async fn transaction(
        &self,
        ctx: &RequestContext,
        id: TransactionId,
    ) -> DomainResult<LedgerEntry> {
        let user_id = ctx.user_id();
        self.uow
            .run(ctx, move |s| {
                Box::pin(async move {
                    let entry = s.transactions().get(id).await?;
                    if entry.user_id != user_id {
                        return Err(DomainError::not_found(format!("transaction {id}")));
                    }
                    Ok(entry)
                })
            })
            .await
    }

    /// Soft-delete an empty account. History stays readable.
    #[instrument(skip(self, ctx), fields(user_id = %ctx.user_id()), err)]
    pub async fn close_account(&self, ctx: &RequestContext, account_id: AccountId) -> DomainResult<()> {
        let user_id = ctx.user_id();
        self.uow
            .run(ctx, move |s| {
                Box::pin(async move {
                    let mut account = s.accounts().get_for_update(account_id).await?;
                    account.ensure_owned_by(user_id)?;
                    account.mark_deleted(Utc::now())?;
                    s.accounts().delete(account_id).await
                })
            })
            .await?;

        info!(account_id = %account_id, "account closed");
        Ok(())
    }

    async fn move_funds(
        &self,
        ctx: &RequestContext,
        request: MovementRequest,
        direction: Direction,
    ) -> DomainResult<LedgerEntry> {
        if !request.amount.is_positive() {
            return Err(DomainError::validation("amount must be positive"));
        }
        request
            .source
            .ensure_compatible(request.external_target.as_ref())?;

        let MovementRequest {
            account_id,
            amount,
            source,
            external_target,
        } = request;
        let masked = external_target.as_ref().map(ExternalTarget::masked);
        let converter = Arc::clone(&self.converter);
        let user_id = ctx.user_id();

        let entry = self
            .uow
            .run(ctx, move |s| {
                Box::pin(async move {
                    let mut account = s.accounts().get_for_update(account_id).await?;
                    account.ensure_owned_by(user_id)?;

                    let target = account.currency();
                    let amount = amount.resolve(target)?;
                    let (applied, conversion) = if amount.currency() == target {
                        (amount, None)
                    } else {
                        let quote = converter.convert(&amount, target).await?;
                        if !quote.converted.is_positive() {
                            return Err(DomainError::validation(format!(
                                "{amount} converts to {}",
                                quote.converted
                            )));
                        }
                        (quote.converted, Some(ConversionInfo::new(amount, quote.rate)?))
                    };

                    let now = Utc::now();
                    let signed = match direction {
                        Direction::Credit => {
                            account.credit(&applied, now)?;
                            applied
                        }
                        Direction::Debit => {
                            account.debit(&applied, now)?;
                            applied.checked_neg()?
                        }
                    };

                    s.accounts().update(&account).await?;
                    let entry = LedgerEntry::record(
                        &account, user_id, signed, source, conversion, masked, now,
                    )?;
                    s.transactions().create(&entry).await?;
                    Ok(entry)
                })
            })
            .await?;

        info!(
            transaction_id = %entry.id,
            amount = %entry.amount,
            balance = %entry.balance,
            source = %entry.money_source,
            "funds moved"
        );
        Ok(entry)
    }
}
