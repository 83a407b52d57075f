//! External funding targets (bank accounts, wallets) and their masked form.
//!
//! Raw identifiers live only as long as the request that carries them. Ledger
//! entries store [`ExternalTarget::masked`], never the raw value, and `Debug`
//! output is masked as well so identifiers cannot leak through logs.

use core::fmt;

use ledgerly_core::{DomainError, DomainResult};

use crate::entry::MoneySource;

const MASK: &str = "****";
const MAX_VISIBLE: usize = 4;

/// A caller-supplied external account or wallet.
#[derive(Clone, PartialEq, Eq)]
pub enum ExternalTarget {
    BankAccount {
        account_number: String,
        routing_number: Option<String>,
    },
    Wallet {
        address: String,
    },
}

impl ExternalTarget {
    /// Bank account number plus optional routing number.
    ///
    /// Spaces and dashes are ignored; the remainder must be 4 to 34 alphanumerics
    /// (long enough for an IBAN).
    pub fn bank(account_number: &str, routing_number: Option<&str>) -> DomainResult<Self> {
        let account_number = normalize(account_number, "bank account number", 4, 34)?;
        let routing_number = routing_number
            .map(|r| normalize(r, "routing number", 4, 34))
            .transpose()?;
        Ok(Self::BankAccount {
            account_number,
            routing_number,
        })
    }

    /// External wallet address (8 to 128 alphanumerics).
    pub fn wallet(address: &str) -> DomainResult<Self> {
        let address = normalize(address, "wallet address", 8, 128)?;
        Ok(Self::Wallet { address })
    }

    /// The money source this target implies.
    pub fn money_source(&self) -> MoneySource {
        match self {
            Self::BankAccount { .. } => MoneySource::ExternalBank,
            Self::Wallet { .. } => MoneySource::ExternalWallet,
        }
    }

    /// Storage-safe descriptor, e.g. `bank ****6789 routing ****0021`.
    pub fn masked(&self) -> String {
        match self {
            Self::BankAccount {
                account_number,
                routing_number: Some(routing),
            } => format!(
                "bank {} routing {}",
                mask_suffix(account_number),
                mask_suffix(routing)
            ),
            Self::BankAccount {
                account_number,
                routing_number: None,
            } => format!("bank {}", mask_suffix(account_number)),
            Self::Wallet { address } => format!("wallet {}", mask_suffix(address)),
        }
    }
}

impl fmt::Debug for ExternalTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ExternalTarget").field(&self.masked()).finish()
    }
}

/// Replace everything but a short suffix with `****`.
///
/// At most four characters and never more than half of the value stay visible.
pub fn mask_suffix(raw: &str) -> String {
    let chars: Vec<char> = raw.chars().collect();
    let visible = MAX_VISIBLE.min(chars.len() / 2);
    let suffix: String = chars[chars.len() - visible..].iter().collect();
    format!("{MASK}{suffix}")
}

fn normalize(raw: &str, what: &str, min: usize, max: usize) -> DomainResult<String> {
    let cleaned: String = raw
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '-')
        .collect();

    if cleaned.is_empty() {
        return Err(DomainError::validation(format!("{what} is required")));
    }
    if !cleaned.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(DomainError::validation(format!(
            "{what} must be alphanumeric"
        )));
    }
    if cleaned.len() < min || cleaned.len() > max {
        return Err(DomainError::validation(format!(
            "{what} must be {min} to {max} characters"
        )));
    }
    Ok(cleaned)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mask_keeps_at_most_four_trailing_characters() {
        assert_eq!(mask_suffix("1234567890"), "****7890");
        assert_eq!(mask_suffix("123456"), "****456");
        assert_eq!(mask_suffix("1234"), "****34");
        assert_eq!(mask_suffix(""), "****");
    }

    #[test]
    fn bank_target_masks_both_numbers() {
        let target = ExternalTarget::bank("0001-2345-6789", Some("021000021")).unwrap();
        assert_eq!(target.masked(), "bank ****6789 routing ****0021");
        assert_eq!(target.money_source(), MoneySource::ExternalBank);
    }

    #[test]
    fn wallet_target_masks_address() {
        let target = ExternalTarget::wallet("0x52908400098527886E0F7030069857D2E4169EE7").unwrap();
        assert_eq!(target.masked(), "wallet ****9EE7");
        assert_eq!(target.money_source(), MoneySource::ExternalWallet);
    }

    #[test]
    fn debug_output_never_contains_the_raw_value() {
        let target = ExternalTarget::bank("123456789012", None).unwrap();
        let debug = format!("{target:?}");
        assert!(!debug.contains("123456789012"));
        assert!(debug.contains("****9012"));
    }

    #[test]
    fn malformed_targets_are_rejected() {
        assert!(ExternalTarget::bank("", None).is_err());
        assert!(ExternalTarget::bank("12", None).is_err());
        assert!(ExternalTarget::bank("1234;DROP", None).is_err());
        assert!(ExternalTarget::wallet("short").is_err());
    }
}
