//! Money value object: an integer amount of minor units tagged with its currency.
//!
//! Arithmetic and ordering are only defined between amounts of the same currency.
//! Decimal major-unit values (`"100.50"`) are accepted at the edges and converted to
//! minor units exactly; anything that would need a fractional minor unit is rejected.

use core::cmp::Ordering;
use core::fmt;
use core::str::FromStr;

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};
use crate::value_object::ValueObject;

/// ISO 4217 codes this ledger accepts, with their minor-unit exponent.
const KNOWN_CURRENCIES: &[(&str, u32)] = &[
    ("AUD", 2),
    ("BHD", 3),
    ("BRL", 2),
    ("CAD", 2),
    ("CHF", 2),
    ("CNY", 2),
    ("DKK", 2),
    ("EUR", 2),
    ("GBP", 2),
    ("HKD", 2),
    ("INR", 2),
    ("JPY", 0),
    ("KRW", 0),
    ("KWD", 3),
    ("MXN", 2),
    ("NOK", 2),
    ("NZD", 2),
    ("PLN", 2),
    ("SEK", 2),
    ("SGD", 2),
    ("USD", 2),
    ("ZAR", 2),
];

/// Three-letter currency code.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Currency([u8; 3]);

impl Currency {
    pub const USD: Currency = Currency(*b"USD");
    pub const EUR: Currency = Currency(*b"EUR");
    pub const GBP: Currency = Currency(*b"GBP");
    pub const JPY: Currency = Currency(*b"JPY");

    /// Parse a code such as `"usd"` or `"EUR"`.
    ///
    /// Fails with `InvalidCurrency` if the code is malformed or not in the known set.
    pub fn parse(code: &str) -> DomainResult<Self> {
        let trimmed = code.trim();
        let bytes = trimmed.as_bytes();
        if bytes.len() != 3 || !bytes.iter().all(u8::is_ascii_alphabetic) {
            return Err(DomainError::invalid_currency(format!(
                "'{trimmed}' is not a three-letter code"
            )));
        }

        let upper = [
            bytes[0].to_ascii_uppercase(),
            bytes[1].to_ascii_uppercase(),
            bytes[2].to_ascii_uppercase(),
        ];
        let candidate = Currency(upper);
        if Self::lookup(candidate.code()).is_none() {
            return Err(DomainError::invalid_currency(format!(
                "unknown currency '{}'",
                candidate.code()
            )));
        }
        Ok(candidate)
    }

    pub fn code(&self) -> &str {
        // Only ever built from ASCII letters.
        core::str::from_utf8(&self.0).unwrap_or("???")
    }

    /// Number of decimal places of the minor unit (2 for USD, 0 for JPY).
    pub fn minor_units(&self) -> u32 {
        Self::lookup(self.code()).unwrap_or(2)
    }

    fn lookup(code: &str) -> Option<u32> {
        KNOWN_CURRENCIES
            .iter()
            .find(|(known, _)| *known == code)
            .map(|(_, exponent)| *exponent)
    }
}

impl ValueObject for Currency {}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl fmt::Debug for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Currency({})", self.code())
    }
}

impl FromStr for Currency {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Currency {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Currency> for String {
    fn from(value: Currency) -> Self {
        value.code().to_string()
    }
}

/// Signed amount in minor units of a single currency.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Money {
    amount: i64,
    currency: Currency,
}

impl Money {
    pub const fn new(amount: i64, currency: Currency) -> Self {
        Self { amount, currency }
    }

    pub const fn zero(currency: Currency) -> Self {
        Self::new(0, currency)
    }

    /// Convert a major-unit decimal (`100.50`) into minor units.
    ///
    /// Rejects values that need more fractional digits than the currency has.
    pub fn from_major(value: Decimal, currency: Currency) -> DomainResult<Self> {
        let factor = Decimal::from(10i64.pow(currency.minor_units()));
        let scaled = value
            .checked_mul(factor)
            .ok_or_else(|| DomainError::validation(format!("amount {value} is out of range")))?;

        if !scaled.fract().is_zero() {
            return Err(DomainError::validation(format!(
                "amount {value} has more than {} decimal places for {currency}",
                currency.minor_units()
            )));
        }

        let amount = scaled
            .to_i64()
            .ok_or_else(|| DomainError::validation(format!("amount {value} is out of range")))?;
        Ok(Self::new(amount, currency))
    }

    /// Parse a major-unit string (`"100.50"`) into minor units.
    pub fn parse_major(value: &str, currency: Currency) -> DomainResult<Self> {
        let decimal = Decimal::from_str(value.trim())
            .map_err(|_| DomainError::validation(format!("'{value}' is not a valid amount")))?;
        Self::from_major(decimal, currency)
    }

    pub const fn amount(&self) -> i64 {
        self.amount
    }

    pub const fn currency(&self) -> Currency {
        self.currency
    }

    /// The amount in major units, carrying the currency's scale (`10000` USD → `100.00`).
    pub fn to_major(&self) -> Decimal {
        Decimal::new(self.amount, self.currency.minor_units())
    }

    pub const fn is_zero(&self) -> bool {
        self.amount == 0
    }

    pub const fn is_positive(&self) -> bool {
        self.amount > 0
    }

    pub const fn is_negative(&self) -> bool {
        self.amount < 0
    }

    pub fn checked_add(&self, other: &Money) -> DomainResult<Money> {
        self.ensure_same_currency(other)?;
        let amount = self
            .amount
            .checked_add(other.amount)
            .ok_or_else(|| DomainError::validation("amount overflow"))?;
        Ok(Money::new(amount, self.currency))
    }

    pub fn checked_sub(&self, other: &Money) -> DomainResult<Money> {
        self.ensure_same_currency(other)?;
        let amount = self
            .amount
            .checked_sub(other.amount)
            .ok_or_else(|| DomainError::validation("amount overflow"))?;
        Ok(Money::new(amount, self.currency))
    }

    pub fn checked_neg(&self) -> DomainResult<Money> {
        let amount = self
            .amount
            .checked_neg()
            .ok_or_else(|| DomainError::validation("amount overflow"))?;
        Ok(Money::new(amount, self.currency))
    }

    fn ensure_same_currency(&self, other: &Money) -> DomainResult<()> {
        if self.currency != other.currency {
            return Err(DomainError::invalid_currency(format!(
                "currency mismatch: {} vs {}",
                self.currency, other.currency
            )));
        }
        Ok(())
    }
}

impl ValueObject for Money {}

/// Amounts in different currencies are unordered.
impl PartialOrd for Money {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        if self.currency != other.currency {
            return None;
        }
        Some(self.amount.cmp(&other.amount))
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.to_major(), self.currency)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn usd(amount: i64) -> Money {
        Money::new(amount, Currency::USD)
    }

    #[test]
    fn currency_parse_normalizes_case() {
        assert_eq!(Currency::parse("usd").unwrap(), Currency::USD);
        assert_eq!(Currency::parse(" EUR ").unwrap(), Currency::EUR);
    }

    #[test]
    fn currency_parse_rejects_malformed_and_unknown_codes() {
        for bad in ["US", "USDX", "U$D", "", "XYZ"] {
            match Currency::parse(bad) {
                Err(DomainError::InvalidCurrency(_)) => {}
                other => panic!("expected invalid currency for {bad:?}, got {other:?}"),
            }
        }
    }

    #[test]
    fn currency_minor_units_follow_iso() {
        assert_eq!(Currency::USD.minor_units(), 2);
        assert_eq!(Currency::JPY.minor_units(), 0);
        assert_eq!(Currency::parse("KWD").unwrap().minor_units(), 3);
    }

    #[test]
    fn currency_serializes_as_code() {
        let json = serde_json::to_string(&Currency::GBP).unwrap();
        assert_eq!(json, "\"GBP\"");
        let back: Currency = serde_json::from_str("\"jpy\"").unwrap();
        assert_eq!(back, Currency::JPY);
        assert!(serde_json::from_str::<Currency>("\"ABC\"").is_err());
    }

    #[test]
    fn parse_major_converts_to_minor_units() {
        assert_eq!(Money::parse_major("100.50", Currency::USD).unwrap(), usd(10_050));
        assert_eq!(Money::parse_major("100", Currency::USD).unwrap(), usd(10_000));
        assert_eq!(Money::parse_major("1.500", Currency::USD).unwrap(), usd(150));
        assert_eq!(
            Money::parse_major("1200", Currency::JPY).unwrap(),
            Money::new(1200, Currency::JPY)
        );
    }

    #[test]
    fn parse_major_rejects_fractional_minor_units() {
        assert!(matches!(
            Money::parse_major("0.001", Currency::USD),
            Err(DomainError::Validation(_))
        ));
        assert!(matches!(
            Money::parse_major("1.5", Currency::JPY),
            Err(DomainError::Validation(_))
        ));
        assert!(matches!(
            Money::parse_major("ten", Currency::USD),
            Err(DomainError::Validation(_))
        ));
    }

    #[test]
    fn parse_major_rejects_out_of_range() {
        assert!(matches!(
            Money::parse_major("99999999999999999999", Currency::USD),
            Err(DomainError::Validation(_))
        ));
    }

    #[test]
    fn display_uses_major_units() {
        assert_eq!(usd(10_000).to_string(), "100.00 USD");
        assert_eq!(usd(-15_000).to_string(), "-150.00 USD");
        assert_eq!(Money::new(1200, Currency::JPY).to_string(), "1200 JPY");
    }

    #[test]
    fn arithmetic_across_currencies_is_rejected() {
        let eur = Money::new(100, Currency::EUR);
        assert!(matches!(
            usd(100).checked_add(&eur),
            Err(DomainError::InvalidCurrency(_))
        ));
        assert!(matches!(
            usd(100).checked_sub(&eur),
            Err(DomainError::InvalidCurrency(_))
        ));
        assert_eq!(usd(100).partial_cmp(&eur), None);
    }

    #[test]
    fn arithmetic_overflow_is_a_validation_error() {
        assert!(usd(i64::MAX).checked_add(&usd(1)).is_err());
        assert!(usd(i64::MIN).checked_sub(&usd(1)).is_err());
        assert!(usd(i64::MIN).checked_neg().is_err());
    }

    #[test]
    fn same_currency_amounts_are_ordered() {
        assert!(usd(100) < usd(200));
        assert!(usd(-1) < Money::zero(Currency::USD));
    }

    proptest! {
        #[test]
        fn add_then_sub_is_identity(a in -1_000_000_000i64..1_000_000_000, b in -1_000_000_000i64..1_000_000_000) {
            let sum = usd(a).checked_add(&usd(b)).unwrap();
            prop_assert_eq!(sum.checked_sub(&usd(b)).unwrap(), usd(a));
        }

        #[test]
        fn major_units_round_trip(amount in -1_000_000_000_000i64..1_000_000_000_000) {
            let money = usd(amount);
            prop_assert_eq!(Money::from_major(money.to_major(), Currency::USD).unwrap(), money);
        }
    }
}
