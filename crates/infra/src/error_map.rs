//! Translation of persistence failures into the domain error taxonomy.
//!
//! Backends wrap their failures in [`StoreError`] (or hand over raw `sqlx`
//! errors) and pass them through [`map_persistence_error`] before they leave
//! the store boundary. The whole `source()` chain is inspected, so a driver
//! error wrapped in context is still recognized.
//!
//! | Underlying failure                          | Domain kind     |
//! |---------------------------------------------|-----------------|
//! | `StoreError::RecordNotFound`, `RowNotFound` | `NotFound`      |
//! | `StoreError::DuplicateKey`, SQLSTATE 23505  | `AlreadyExists` |
//! | `StoreError::ForeignKey`, SQLSTATE 23503    | `NotFound`      |
//! | `StoreError::CheckViolation`, 23514 / 23502 | `Validation`    |
//! | `PoolTimedOut`                              | `Timeout`       |
//! | a typed `DomainError` anywhere in the chain | that error      |
//! | anything else                               | `Unknown`       |

use std::any::Any;
use std::error::Error as StdError;

use sqlx::error::ErrorKind;
use thiserror::Error;

use ledgerly_core::{DomainError, DomainResult};

/// Failures raised inside a store implementation.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("record not found: {0}")]
    RecordNotFound(String),

    #[error("duplicate key: {0}")]
    DuplicateKey(String),

    #[error("missing referenced record: {0}")]
    ForeignKey(String),

    #[error("constraint violated: {0}")]
    CheckViolation(String),

    #[error("{operation} failed: {source}")]
    Operation {
        operation: &'static str,
        #[source]
        source: Box<dyn StdError + Send + Sync>,
    },

    #[error("corrupt record: {0}")]
    Corrupt(String),

    #[error("store lock poisoned")]
    LockPoisoned,

    #[error("injected fault: {0}")]
    InjectedFault(&'static str),
}

impl StoreError {
    pub fn operation(
        operation: &'static str,
        source: impl Into<Box<dyn StdError + Send + Sync>>,
    ) -> Self {
        Self::Operation {
            operation,
            source: source.into(),
        }
    }

    fn classify(&self) -> Option<DomainError> {
        match self {
            Self::RecordNotFound(what) | Self::ForeignKey(what) => {
                Some(DomainError::not_found(what.clone()))
            }
            Self::DuplicateKey(what) => Some(DomainError::already_exists(what.clone())),
            Self::CheckViolation(what) => Some(DomainError::validation(what.clone())),
            Self::Operation { .. }
            | Self::Corrupt(_)
            | Self::LockPoisoned
            | Self::InjectedFault(_) => None,
        }
    }
}

/// Map any persistence error into a [`DomainError`].
///
/// A `DomainError` is returned unchanged. Recognized failures become their
/// domain kind; everything else is wrapped in [`DomainError::Unknown`] with the
/// original error kept for downcasting.
pub fn map_persistence_error<E>(err: E) -> DomainError
where
    E: StdError + Send + Sync + 'static,
{
    if let Some(domain) = (&err as &dyn Any).downcast_ref::<DomainError>() {
        return domain.clone();
    }
    classify(&err).unwrap_or_else(|| DomainError::unknown(err))
}

/// Find the first recognizable failure in `err`'s source chain.
pub fn classify(err: &(dyn StdError + 'static)) -> Option<DomainError> {
    let mut current = Some(err);
    while let Some(e) = current {
        if let Some(kind) = classify_one(e) {
            return Some(kind);
        }
        current = e.source();
    }
    None
}

fn classify_one(err: &(dyn StdError + 'static)) -> Option<DomainError> {
    if let Some(domain) = err.downcast_ref::<DomainError>() {
        return match domain {
            // transparent: source() would skip the wrapped error itself
            DomainError::Unknown(inner) => classify(inner.as_ref()),
            other => Some(other.clone()),
        };
    }
    if let Some(store) = err.downcast_ref::<StoreError>() {
        return store.classify();
    }
    if let Some(db) = err.downcast_ref::<sqlx::Error>() {
        return classify_sqlx(db);
    }
    None
}

fn classify_sqlx(err: &sqlx::Error) -> Option<DomainError> {
    match err {
        sqlx::Error::RowNotFound => Some(DomainError::not_found("row not found")),
        sqlx::Error::PoolTimedOut => Some(DomainError::Timeout),
        sqlx::Error::Database(db) => {
            let message = db.message().to_string();
            match db.kind() {
                ErrorKind::UniqueViolation => Some(DomainError::already_exists(message)),
                ErrorKind::ForeignKeyViolation => Some(DomainError::not_found(message)),
                ErrorKind::CheckViolation | ErrorKind::NotNullViolation => {
                    Some(DomainError::validation(message))
                }
                _ => None,
            }
        }
        _ => None,
    }
}

/// `Result` adapter: `Ok` passes through, `Err` goes through [`map_persistence_error`].
pub trait PersistenceResultExt<T> {
    fn map_persistence(self) -> DomainResult<T>;
}

impl<T, E> PersistenceResultExt<T> for Result<T, E>
where
    E: StdError + Send + Sync + 'static,
{
    fn map_persistence(self) -> DomainResult<T> {
        self.map_err(map_persistence_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fmt;
    use std::io;

    #[derive(Debug, Error)]
    #[error("while saving account")]
    struct Context {
        #[source]
        inner: StoreError,
    }

    #[test]
    fn duplicate_key_becomes_already_exists() {
        let err = map_persistence_error(StoreError::DuplicateKey("account 1".into()));
        assert!(matches!(err, DomainError::AlreadyExists(ref what) if what == "account 1"));
    }

    #[test]
    fn missing_row_becomes_not_found() {
        assert!(matches!(
            map_persistence_error(sqlx::Error::RowNotFound),
            DomainError::NotFound(_)
        ));
        assert!(matches!(
            map_persistence_error(StoreError::ForeignKey("account 2".into())),
            DomainError::NotFound(_)
        ));
    }

    #[test]
    fn pool_timeout_becomes_timeout() {
        assert!(matches!(
            map_persistence_error(sqlx::Error::PoolTimedOut),
            DomainError::Timeout
        ));
    }

    #[test]
    fn unrecognized_errors_pass_through() {
        let err = map_persistence_error(io::Error::new(io::ErrorKind::BrokenPipe, "socket"));
        assert_eq!(err.kind(), "unknown");

        let source = err.unknown_source().unwrap();
        let io_err = source.downcast_ref::<io::Error>().unwrap();
        assert_eq!(io_err.kind(), io::ErrorKind::BrokenPipe);
    }

    #[test]
    fn domain_errors_are_returned_unchanged() {
        let err = map_persistence_error(DomainError::Unauthorized);
        assert!(matches!(err, DomainError::Unauthorized));
    }

    #[test]
    fn wrapped_store_errors_are_found_through_the_chain() {
        let err = map_persistence_error(Context {
            inner: StoreError::operation(
                "insert_account",
                StoreError::DuplicateKey("account 3".into()),
            ),
        });
        assert!(matches!(err, DomainError::AlreadyExists(_)));
    }

    #[test]
    fn unknown_wrapping_a_known_error_is_reclassified() {
        let wrapped = DomainError::unknown(StoreError::RecordNotFound("entry 9".into()));
        assert!(matches!(classify(&wrapped), Some(DomainError::NotFound(_))));
    }

    #[test]
    fn ok_values_pass_through() {
        let ok: Result<u32, StoreError> = Ok(7);
        assert_eq!(ok.map_persistence().unwrap(), 7);

        let err: Result<u32, StoreError> = Err(StoreError::LockPoisoned);
        assert_eq!(err.map_persistence().unwrap_err().kind(), "unknown");
    }

    #[derive(Debug)]
    struct Exploding;

    impl fmt::Display for Exploding {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("exploding")
        }
    }

    impl StdError for Exploding {
        fn source(&self) -> Option<&(dyn StdError + 'static)> {
            panic!("source chain inspection failed")
        }
    }

    #[test]
    #[should_panic(expected = "source chain inspection failed")]
    fn panics_during_inspection_propagate() {
        let _ = map_persistence_error(Exploding);
    }
}
