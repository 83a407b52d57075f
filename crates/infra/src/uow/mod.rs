//! Unit of Work: one storage transaction scoped around a closure.
//!
//! [`UnitOfWork::run`] begins a transaction, hands the closure a [`Session`]
//! whose stores all share that transaction, and commits only when the closure
//! returns `Ok`. Any error rolls everything back. A panic unwinds through `run`
//! untouched; dropping the session discards its writes.
//!
//! The request deadline bounds `begin` and the closure. Once the closure has
//! succeeded, commit runs to completion so a timer never interrupts it halfway.

use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;
use tracing::{debug, warn};

use ledgerly_core::{DomainError, DomainResult};

use crate::context::RequestContext;
use crate::store::{AccountStore, TransactionStore};

pub mod in_memory;
pub mod postgres;

pub use in_memory::InMemoryUnitOfWork;
pub use postgres::PgUnitOfWork;

/// Transactional view handed to the work closure.
///
/// Both accessors return stores bound to the same transaction for the whole
/// session.
pub trait Session: Send {
    fn accounts(&mut self) -> &mut dyn AccountStore;
    fn transactions(&mut self) -> &mut dyn TransactionStore;
}

/// Future returned by a work closure, borrowing the session for `'s`.
pub type Work<'s, T> = BoxFuture<'s, DomainResult<T>>;

#[async_trait]
pub trait UnitOfWork: Send + Sync {
    async fn run<'a, T, F>(&'a self, ctx: &'a RequestContext, work: F) -> DomainResult<T>
    where
        T: Send + 'a,
        F: for<'s> FnOnce(&'s mut (dyn Session + 'a)) -> Work<'s, T> + Send + 'a;
}

#[async_trait]
impl<U> UnitOfWork for Arc<U>
where
    U: UnitOfWork,
{
    async fn run<'a, T, F>(&'a self, ctx: &'a RequestContext, work: F) -> DomainResult<T>
    where
        T: Send + 'a,
        F: for<'s> FnOnce(&'s mut (dyn Session + 'a)) -> Work<'s, T> + Send + 'a,
    {
        (**self).run(ctx, work).await
    }
}

/// Commit/rollback hooks a backend session provides to [`drive`].
#[async_trait]
pub(crate) trait SessionControl: Session + Sized {
    async fn commit(self) -> DomainResult<()>;
    async fn rollback(self) -> DomainResult<()>;
}

/// Run `work` against `session` and finish the transaction.
pub(crate) async fn drive<'a, S, T, F>(
    ctx: &RequestContext,
    mut session: S,
    work: F,
) -> DomainResult<T>
where
    S: SessionControl + 'a,
    T: Send + 'a,
    F: for<'s> FnOnce(&'s mut (dyn Session + 'a)) -> Work<'s, T> + Send + 'a,
{
    match ctx.bound(work(&mut session)).await {
        Ok(value) if !ctx.is_expired() => {
            session.commit().await?;
            debug!("unit of work committed");
            Ok(value)
        }
        Ok(_) => {
            rollback(session, &DomainError::Timeout).await;
            Err(DomainError::Timeout)
        }
        Err(err) => {
            rollback(session, &err).await;
            Err(err)
        }
    }
}

async fn rollback<S: SessionControl>(session: S, cause: &DomainError) {
    match session.rollback().await {
        Ok(()) => debug!(cause = %cause, "unit of work rolled back"),
        Err(rollback_err) => {
            warn!(cause = %cause, error = %rollback_err, "rollback failed")
        }
    }
}
