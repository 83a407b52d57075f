//! Currency conversion collaborator.
//!
//! The orchestrator asks a [`CurrencyConverter`] for a quote whenever a
//! movement's currency differs from the account's. Any converter failure ends
//! the unit of work with [`DomainError::ConversionFailure`].

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use rust_decimal::{Decimal, RoundingStrategy};
use thiserror::Error;

use ledgerly_core::{Currency, DomainError, DomainResult, Money};

/// Converted amount plus the rate that produced it (target per unit of source).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConversionQuote {
    pub converted: Money,
    pub rate: Decimal,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConversionError {
    #[error("no rate from {from} to {to}")]
    UnsupportedPair { from: Currency, to: Currency },

    #[error("converted amount is out of range")]
    Overflow,

    #[error("rate provider error: {0}")]
    Provider(String),
}

impl From<ConversionError> for DomainError {
    fn from(err: ConversionError) -> Self {
        DomainError::conversion(err.to_string())
    }
}

#[async_trait]
pub trait CurrencyConverter: Send + Sync {
    async fn convert(&self, amount: &Money, target: Currency) -> Result<ConversionQuote, ConversionError>;
}

#[async_trait]
impl<C> CurrencyConverter for Arc<C>
where
    C: CurrencyConverter + ?Sized,
{
    async fn convert(&self, amount: &Money, target: Currency) -> Result<ConversionQuote, ConversionError> {
        (**self).convert(amount, target).await
    }
}

/// Converter backed by a fixed rate table.
///
/// Only one direction of a pair needs to be configured; the inverse is derived.
/// Results are rounded half away from zero to the target currency's minor units.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StaticRateConverter {
    rates: HashMap<(Currency, Currency), Decimal>,
}

impl StaticRateConverter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rate(mut self, from: Currency, to: Currency, rate: Decimal) -> DomainResult<Self> {
        if rate <= Decimal::ZERO {
            return Err(DomainError::validation(format!(
                "rate {from}:{to} must be positive"
            )));
        }
        self.rates.insert((from, to), rate);
        Ok(self)
    }

    /// Parse a rate table such as `EUR:USD=1.08,GBP:USD=1.27`.
    pub fn parse(table: &str) -> DomainResult<Self> {
        let mut converter = Self::new();
        for pair in table.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            let (codes, rate) = pair
                .split_once('=')
                .ok_or_else(|| DomainError::validation(format!("rate '{pair}' is missing '='")))?;
            let (from, to) = codes
                .split_once(':')
                .ok_or_else(|| DomainError::validation(format!("rate '{pair}' is missing ':'")))?;
            let rate: Decimal = rate
                .trim()
                .parse()
                .map_err(|e| DomainError::validation(format!("rate '{pair}': {e}")))?;
            converter = converter.with_rate(Currency::parse(from)?, Currency::parse(to)?, rate)?;
        }
        Ok(converter)
    }

    pub fn is_empty(&self) -> bool {
        self.rates.is_empty()
    }

    pub fn rate(&self, from: Currency, to: Currency) -> Option<Decimal> {
        if from == to {
            return Some(Decimal::ONE);
        }
        if let Some(rate) = self.rates.get(&(from, to)) {
            return Some(*rate);
        }
        self.rates
            .get(&(to, from))
            .and_then(|inverse| Decimal::ONE.checked_div(*inverse))
    }
}

#[async_trait]
impl CurrencyConverter for StaticRateConverter {
    async fn convert(&self, amount: &Money, target: Currency) -> Result<ConversionQuote, ConversionError> {
        let from = amount.currency();
        let rate = self
            .rate(from, target)
            .ok_or(ConversionError::UnsupportedPair { from, to: target })?;

        let major = amount
            .to_major()
            .checked_mul(rate)
            .ok_or(ConversionError::Overflow)?
            .round_dp_with_strategy(target.minor_units(), RoundingStrategy::MidpointAwayFromZero);
        let converted = Money::from_major(major, target).map_err(|_| ConversionError::Overflow)?;

        Ok(ConversionQuote { converted, rate })
    }
}
