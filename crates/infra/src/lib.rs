//! Infrastructure layer: unit of work, stores, persistence backends, currency
//! conversion, configuration and the account orchestrator.

pub mod account_service;
pub mod config;
pub mod context;
pub mod conversion;
pub mod error_map;
pub mod store;
pub mod uow;

pub use account_service::{AccountService, MovementRequest, RequestedAmount};
pub use config::{ConfigError, DatabaseConfig, LedgerConfig};
pub use context::RequestContext;
pub use conversion::{ConversionError, ConversionQuote, CurrencyConverter, StaticRateConverter};
pub use error_map::{PersistenceResultExt, StoreError, map_persistence_error};
pub use store::{AccountStore, HISTORY_LIMIT, TransactionStore};
pub use uow::{InMemoryUnitOfWork, PgUnitOfWork, Session, UnitOfWork, Work};
