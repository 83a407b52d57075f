//! Ledger entries: one immutable record per balance-changing event.

use core::fmt;
use core::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use ledgerly_core::{
    AccountId, Currency, DomainError, DomainResult, Entity, Money, TransactionId, UserId,
};

use crate::account::Account;
use crate::target::ExternalTarget;

/// Channel through which funds entered or left the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MoneySource {
    Internal,
    ExternalBank,
    ExternalWallet,
}

impl MoneySource {
    pub fn as_str(&self) -> &'static str {
        match self {
            MoneySource::Internal => "internal",
            MoneySource::ExternalBank => "external_bank",
            MoneySource::ExternalWallet => "external_wallet",
        }
    }

    /// Reject a target that contradicts the declared source.
    pub fn ensure_compatible(&self, target: Option<&ExternalTarget>) -> DomainResult<()> {
        match (self, target) {
            (_, None) => Ok(()),
            (MoneySource::Internal, Some(_)) => Err(DomainError::validation(
                "internal movements cannot carry an external target",
            )),
            (source, Some(target)) if target.money_source() != *source => {
                Err(DomainError::validation(format!(
                    "{} movement cannot target a {}",
                    source.as_str(),
                    target.money_source().as_str()
                )))
            }
            _ => Ok(()),
        }
    }
}

impl fmt::Display for MoneySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MoneySource {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "internal" => Ok(MoneySource::Internal),
            "external_bank" | "bank" => Ok(MoneySource::ExternalBank),
            "external_wallet" | "wallet" => Ok(MoneySource::ExternalWallet),
            other => Err(DomainError::validation(format!(
                "unknown money source '{other}'"
            ))),
        }
    }
}

/// Conversion metadata: the amount as requested and the rate applied.
///
/// Original amount, original currency and rate travel together; an entry either
/// has all three or none.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionInfo {
    original: Money,
    rate: Decimal,
}

impl ConversionInfo {
    pub fn new(original: Money, rate: Decimal) -> DomainResult<Self> {
        if rate <= Decimal::ZERO {
            return Err(DomainError::conversion(format!("non-positive rate {rate}")));
        }
        Ok(Self { original, rate })
    }

    pub fn original(&self) -> Money {
        self.original
    }

    /// Original amount in major units of the original currency.
    pub fn original_amount(&self) -> Decimal {
        self.original.to_major()
    }

    pub fn original_currency(&self) -> Currency {
        self.original.currency()
    }

    pub fn rate(&self) -> Decimal {
        self.rate
    }
}

/// Immutable record of one balance change.
///
/// `amount` is the signed movement in the account currency (credit > 0, debit < 0)
/// and `balance` is the account balance right after it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: TransactionId,
    pub account_id: AccountId,
    pub user_id: UserId,
    pub amount: Money,
    pub balance: Money,
    pub money_source: MoneySource,
    pub conversion: Option<ConversionInfo>,
    pub external_target_masked: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl LedgerEntry {
    /// Record the movement that produced `account`'s current balance.
    ///
    /// `account` must already carry the post-movement balance.
    pub fn record(
        account: &Account,
        user_id: UserId,
        amount: Money,
        money_source: MoneySource,
        conversion: Option<ConversionInfo>,
        external_target_masked: Option<String>,
        now: DateTime<Utc>,
    ) -> DomainResult<Self> {
        if amount.currency() != account.currency() {
            return Err(DomainError::invalid_currency(format!(
                "entry amount in {} for a {} account",
                amount.currency(),
                account.currency()
            )));
        }
        if amount.is_zero() {
            return Err(DomainError::validation("ledger entries must move funds"));
        }

        Ok(Self {
            id: TransactionId::new(),
            account_id: account.id(),
            user_id,
            amount,
            balance: account.balance(),
            money_source,
            conversion,
            external_target_masked,
            created_at: now,
        })
    }

    pub fn is_credit(&self) -> bool {
        self.amount.is_positive()
    }
}

impl Entity for LedgerEntry {
    type Id = TransactionId;

    fn id(&self) -> Self::Id {
        self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn usd(amount: i64) -> Money {
        Money::new(amount, Currency::USD)
    }

    #[test]
    fn record_captures_post_balance() {
        let mut account = Account::open(AccountId::new(), UserId::new(), Currency::USD, Utc::now());
        account.credit(&usd(5_000), Utc::now()).unwrap();

        let entry = LedgerEntry::record(
            &account,
            account.owner_id(),
            usd(5_000),
            MoneySource::Internal,
            None,
            None,
            Utc::now(),
        )
        .unwrap();

        assert_eq!(entry.account_id, account.id());
        assert_eq!(entry.amount, usd(5_000));
        assert_eq!(entry.balance, account.balance());
        assert!(entry.is_credit());
    }

    #[test]
    fn record_rejects_foreign_currency_amounts() {
        let account = Account::open(AccountId::new(), UserId::new(), Currency::USD, Utc::now());
        let err = LedgerEntry::record(
            &account,
            account.owner_id(),
            Money::new(100, Currency::EUR),
            MoneySource::Internal,
            None,
            None,
            Utc::now(),
        )
        .unwrap_err();
        assert!(matches!(err, DomainError::InvalidCurrency(_)));
    }

    #[test]
    fn conversion_info_exposes_original_in_major_units() {
        let info = ConversionInfo::new(Money::new(10_000, Currency::EUR), Decimal::new(108, 2)).unwrap();
        assert_eq!(info.original_amount(), Decimal::new(10_000, 2));
        assert_eq!(info.original_currency(), Currency::EUR);
        assert_eq!(info.rate(), Decimal::new(108, 2));
        assert!(ConversionInfo::new(Money::new(1, Currency::EUR), Decimal::ZERO).is_err());
    }

    #[test]
    fn money_source_parses_aliases() {
        assert_eq!("bank".parse::<MoneySource>().unwrap(), MoneySource::ExternalBank);
        assert_eq!("EXTERNAL_WALLET".parse::<MoneySource>().unwrap(), MoneySource::ExternalWallet);
        assert!("cash".parse::<MoneySource>().is_err());
    }

    #[test]
    fn source_and_target_must_agree() {
        let wallet = ExternalTarget::wallet("bc1qxy2kgdygjrsqtzq2n0yrf2493p83kkfjhx0wlh").unwrap();
        assert!(MoneySource::ExternalWallet.ensure_compatible(Some(&wallet)).is_ok());
        assert!(MoneySource::ExternalBank.ensure_compatible(Some(&wallet)).is_err());
        assert!(MoneySource::Internal.ensure_compatible(Some(&wallet)).is_err());
        assert!(MoneySource::Internal.ensure_compatible(None).is_ok());
    }
}
