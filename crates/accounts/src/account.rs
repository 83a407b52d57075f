use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use ledgerly_core::{AccountId, Currency, DomainError, DomainResult, Entity, Money, UserId};

/// Aggregate root: a single-currency account owned by one user.
///
/// # Invariants
/// - `id`, `owner_id` and the balance currency never change after [`Account::open`].
/// - The balance only moves through [`Account::credit`] and [`Account::debit`].
/// - A debit never takes the balance below zero.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    id: AccountId,
    owner_id: UserId,
    balance: Money,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    deleted_at: Option<DateTime<Utc>>,
}

impl Account {
    /// A fresh account with a zero balance in `currency`.
    pub fn open(id: AccountId, owner_id: UserId, currency: Currency, now: DateTime<Utc>) -> Self {
        Self {
            id,
            owner_id,
            balance: Money::zero(currency),
            created_at: now,
            updated_at: now,
            deleted_at: None,
        }
    }

    /// Rehydrate a persisted snapshot.
    pub fn restore(
        id: AccountId,
        owner_id: UserId,
        balance: Money,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
        deleted_at: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            id,
            owner_id,
            balance,
            created_at,
            updated_at,
            deleted_at,
        }
    }

    pub fn owner_id(&self) -> UserId {
        self.owner_id
    }

    pub fn balance(&self) -> Money {
        self.balance
    }

    pub fn currency(&self) -> Currency {
        self.balance.currency()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn deleted_at(&self) -> Option<DateTime<Utc>> {
        self.deleted_at
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    pub fn is_owned_by(&self, user_id: UserId) -> bool {
        self.owner_id == user_id
    }

    pub fn ensure_owned_by(&self, user_id: UserId) -> DomainResult<()> {
        if !self.is_owned_by(user_id) {
            return Err(DomainError::Unauthorized);
        }
        Ok(())
    }

    /// Add `amount` to the balance and return the new balance.
    pub fn credit(&mut self, amount: &Money, now: DateTime<Utc>) -> DomainResult<Money> {
        self.ensure_movement(amount)?;
        let next = self.balance.checked_add(amount)?;
        self.balance = next;
        self.updated_at = now;
        Ok(next)
    }

    /// Subtract `amount` from the balance and return the new balance.
    ///
    /// Leaves the account untouched when the balance would go negative.
    pub fn debit(&mut self, amount: &Money, now: DateTime<Utc>) -> DomainResult<Money> {
        self.ensure_movement(amount)?;
        let next = self.balance.checked_sub(amount)?;
        if next.is_negative() {
            return Err(DomainError::InsufficientFunds {
                available: self.balance,
                requested: *amount,
            });
        }
        self.balance = next;
        self.updated_at = now;
        Ok(next)
    }

    /// Soft-delete the account. Only an empty account can be closed.
    pub fn mark_deleted(&mut self, now: DateTime<Utc>) -> DomainResult<()> {
        if self.is_deleted() {
            return Err(DomainError::not_found(format!("account {}", self.id)));
        }
        if !self.balance.is_zero() {
            return Err(DomainError::validation(format!(
                "account {} still holds {}",
                self.id, self.balance
            )));
        }
        self.deleted_at = Some(now);
        self.updated_at = now;
        Ok(())
    }

    fn ensure_movement(&self, amount: &Money) -> DomainResult<()> {
        if amount.currency() != self.currency() {
            return Err(DomainError::invalid_currency(format!(
                "account {} holds {}, got {}",
                self.id,
                self.currency(),
                amount.currency()
            )));
        }
        if !amount.is_positive() {
            return Err(DomainError::validation("amount must be positive"));
        }
        Ok(())
    }
}

impl Entity for Account {
    type Id = AccountId;

    fn id(&self) -> Self::Id {
        self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn usd(amount: i64) -> Money {
        Money::new(amount, Currency::USD)
    }

    fn open_usd() -> Account {
        Account::open(AccountId::new(), UserId::new(), Currency::USD, Utc::now())
    }

    #[test]
    fn open_starts_at_zero_in_the_requested_currency() {
        let account = Account::open(AccountId::new(), UserId::new(), Currency::EUR, Utc::now());
        assert_eq!(account.balance(), Money::zero(Currency::EUR));
        assert_eq!(account.created_at(), account.updated_at());
        assert!(!account.is_deleted());
    }

    #[test]
    fn credit_and_debit_move_the_balance() {
        let mut account = open_usd();
        assert_eq!(account.credit(&usd(10_000), Utc::now()).unwrap(), usd(10_000));
        assert_eq!(account.debit(&usd(2_500), Utc::now()).unwrap(), usd(7_500));
        assert_eq!(account.balance(), usd(7_500));
    }

    #[test]
    fn overdraft_is_rejected_without_mutation() {
        let mut account = open_usd();
        account.credit(&usd(10_000), Utc::now()).unwrap();
        let before = account.clone();

        let err = account.debit(&usd(15_000), Utc::now()).unwrap_err();
        match err {
            DomainError::InsufficientFunds {
                available,
                requested,
            } => {
                assert_eq!(available, usd(10_000));
                assert_eq!(requested, usd(15_000));
            }
            other => panic!("expected insufficient funds, got {other:?}"),
        }
        assert_eq!(account, before);
    }

    #[test]
    fn debit_of_the_full_balance_reaches_zero() {
        let mut account = open_usd();
        account.credit(&usd(15_000), Utc::now()).unwrap();
        assert_eq!(account.debit(&usd(15_000), Utc::now()).unwrap(), usd(0));
    }

    #[test]
    fn movements_must_be_positive_and_in_account_currency() {
        let mut account = open_usd();
        assert!(matches!(
            account.credit(&usd(0), Utc::now()),
            Err(DomainError::Validation(_))
        ));
        assert!(matches!(
            account.debit(&usd(-5), Utc::now()),
            Err(DomainError::Validation(_))
        ));
        assert!(matches!(
            account.credit(&Money::new(100, Currency::EUR), Utc::now()),
            Err(DomainError::InvalidCurrency(_))
        ));
    }

    #[test]
    fn ownership_check_reports_unauthorized() {
        let account = open_usd();
        assert!(account.ensure_owned_by(account.owner_id()).is_ok());
        assert!(matches!(
            account.ensure_owned_by(UserId::new()),
            Err(DomainError::Unauthorized)
        ));
    }

    #[test]
    fn only_empty_accounts_can_be_closed() {
        let mut account = open_usd();
        account.credit(&usd(1), Utc::now()).unwrap();
        assert!(matches!(
            account.mark_deleted(Utc::now()),
            Err(DomainError::Validation(_))
        ));

        account.debit(&usd(1), Utc::now()).unwrap();
        account.mark_deleted(Utc::now()).unwrap();
        assert!(account.is_deleted());
        assert!(matches!(
            account.mark_deleted(Utc::now()),
            Err(DomainError::NotFound(_))
        ));
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 256,
            ..ProptestConfig::default()
        })]

        /// Property: whatever sequence of deposits and withdrawals is attempted,
        /// the balance equals the sum of the accepted movements and never goes negative.
        #[test]
        fn balance_tracks_accepted_movements(
            moves in prop::collection::vec((any::<bool>(), 1i64..1_000_000i64), 1..50)
        ) {
            let mut account = open_usd();
            let mut expected: i64 = 0;

            for (is_deposit, amount) in moves {
                if is_deposit {
                    account.credit(&usd(amount), Utc::now()).unwrap();
                    expected += amount;
                } else if account.debit(&usd(amount), Utc::now()).is_ok() {
                    expected -= amount;
                }
                prop_assert!(account.balance().amount() >= 0);
            }

            prop_assert_eq!(account.balance(), usd(expected));
        }
    }
}
