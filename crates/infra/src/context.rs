//! Per-request execution context.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;

use ledgerly_core::{DomainError, DomainResult, UserId};

/// Who is acting, and until when.
///
/// Built by the boundary (HTTP middleware, tests) from an authenticated
/// identity. There is no ambient or global user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestContext {
    user_id: UserId,
    deadline: Option<Instant>,
}

impl RequestContext {
    pub fn new(user_id: UserId) -> Self {
        Self {
            user_id,
            deadline: None,
        }
    }

    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn is_expired(&self) -> bool {
        self.deadline.is_some_and(|d| Instant::now() >= d)
    }

    /// Run `fut` under the deadline, if any. Expiry drops `fut` and yields `Timeout`.
    pub(crate) async fn bound<T, F>(&self, fut: F) -> DomainResult<T>
    where
        F: Future<Output = DomainResult<T>>,
    {
        match self.deadline {
            Some(deadline) => tokio::time::timeout_at(deadline, fut)
                .await
                .unwrap_or(Err(DomainError::Timeout)),
            None => fut.await,
        }
    }
}
