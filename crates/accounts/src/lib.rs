//! Accounts module: the account aggregate and its append-only ledger entries.
//!
//! Pure domain logic only: no IO, no HTTP, no persistence concerns.

pub mod account;
pub mod entry;
pub mod target;

pub use account::Account;
pub use entry::{ConversionInfo, LedgerEntry, MoneySource};
pub use target::ExternalTarget;
