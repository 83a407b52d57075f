//! Domain error model.

use std::error::Error as StdError;
use std::sync::Arc;

use thiserror::Error;

use crate::money::Money;

/// Result type used across the domain layer.
pub type DomainResult<T> = Result<T, DomainError>;

/// Domain-level error.
///
/// Every orchestrator operation fails with exactly one of these kinds. Storage
/// backends translate their own failures into this taxonomy before the error
/// leaves the store boundary; anything they cannot classify travels as
/// [`DomainError::Unknown`] with the original error attached.
#[derive(Debug, Error, Clone)]
pub enum DomainError {
    /// An account, user or ledger entry is absent.
    #[error("not found: {0}")]
    NotFound(String),

    /// Identifier collision on create.
    #[error("already exists: {0}")]
    AlreadyExists(String),

    /// A withdrawal would take the balance below zero.
    #[error("insufficient funds: balance {available}, requested {requested}")]
    InsufficientFunds { available: Money, requested: Money },

    /// The currency conversion collaborator failed.
    #[error("currency conversion failed: {0}")]
    ConversionFailure(String),

    /// Malformed or unknown currency code, or arithmetic across currencies.
    #[error("invalid currency: {0}")]
    InvalidCurrency(String),

    /// A value failed validation (e.g. unparsable amount or id).
    #[error("validation failed: {0}")]
    Validation(String),

    /// The acting user does not own the account.
    #[error("unauthorized")]
    Unauthorized,

    /// The caller-supplied deadline expired before the operation finished.
    #[error("operation timed out")]
    Timeout,

    /// An underlying error no mapping recognized, passed through unchanged.
    #[error(transparent)]
    Unknown(Arc<dyn StdError + Send + Sync + 'static>),
}

impl DomainError {
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn already_exists(msg: impl Into<String>) -> Self {
        Self::AlreadyExists(msg.into())
    }

    pub fn conversion(msg: impl Into<String>) -> Self {
        Self::ConversionFailure(msg.into())
    }

    pub fn invalid_currency(msg: impl Into<String>) -> Self {
        Self::InvalidCurrency(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn unknown<E>(err: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        Self::Unknown(Arc::new(err))
    }

    /// The wrapped error of an [`DomainError::Unknown`], for downcasting.
    pub fn unknown_source(&self) -> Option<&(dyn StdError + Send + Sync + 'static)> {
        match self {
            Self::Unknown(inner) => Some(inner.as_ref()),
            _ => None,
        }
    }

    /// Stable machine-readable name of the kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "not_found",
            Self::AlreadyExists(_) => "already_exists",
            Self::InsufficientFunds { .. } => "insufficient_funds",
            Self::ConversionFailure(_) => "conversion_failure",
            Self::InvalidCurrency(_) => "invalid_currency",
            Self::Validation(_) => "validation_error",
            Self::Unauthorized => "unauthorized",
            Self::Timeout => "timeout",
            Self::Unknown(_) => "unknown",
        }
    }
}
