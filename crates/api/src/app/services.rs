//! Backend wiring: one [`AccountService`] over whichever store is configured.

use std::time::Duration;

use tracing::{info, warn};

use ledgerly_accounts::{Account, LedgerEntry};
use ledgerly_core::{AccountId, Currency, DomainResult, Money, TransactionId};
use ledgerly_infra::{
    AccountService, DatabaseConfig, InMemoryUnitOfWork, LedgerConfig, MovementRequest,
    PgUnitOfWork, RequestContext, StaticRateConverter,
};

use crate::context::PrincipalContext;

type InMemoryLedger = AccountService<InMemoryUnitOfWork, StaticRateConverter>;
type PersistentLedger = AccountService<PgUnitOfWork, StaticRateConverter>;

enum Backend {
    InMemory(InMemoryLedger),
    Persistent(PersistentLedger),
}

pub struct AppServices {
    backend: Backend,
    operation_timeout: Duration,
}

macro_rules! with_ledger {
    ($self:expr, $svc:ident => $body:expr) => {
        match &$self.backend {
            Backend::InMemory($svc) => $body,
            Backend::Persistent($svc) => $body,
        }
    };
}

pub async fn build_services(config: &LedgerConfig) -> DomainResult<AppServices> {
    match &config.database {
        Some(db) => AppServices::persistent(config, db).await,
        None => {
            warn!("DATABASE_URL not set; using in-memory store (data is lost on restart)");
            Ok(AppServices::in_memory(config))
        }
    }
}

impl AppServices {
    pub fn in_memory(config: &LedgerConfig) -> Self {
        let ledger = AccountService::new(
            InMemoryUnitOfWork::new(),
            config.fx_rates.clone(),
            config.default_currency,
        );
        Self {
            backend: Backend::InMemory(ledger),
            operation_timeout: config.operation_timeout,
        }
    }

    pub async fn persistent(config: &LedgerConfig, db: &DatabaseConfig) -> DomainResult<Self> {
        let uow = PgUnitOfWork::connect(db).await?;
        uow.migrate().await?;
        info!(max_connections = db.max_connections, "connected to postgres");

        let ledger = AccountService::new(uow, config.fx_rates.clone(), config.default_currency);
        Ok(Self {
            backend: Backend::Persistent(ledger),
            operation_timeout: config.operation_timeout,
        })
    }

    /// Per-request context: the caller plus the configured deadline.
    pub fn context(&self, principal: &PrincipalContext) -> RequestContext {
        RequestContext::new(principal.user_id()).with_timeout(self.operation_timeout)
    }

    pub async fn create_account(
        &self,
        ctx: &RequestContext,
        currency: Option<Currency>,
    ) -> DomainResult<Account> {
        with_ledger!(self, svc => svc.create_account(ctx, currency).await)
    }

    pub async fn balance(&self, ctx: &RequestContext, id: AccountId) -> DomainResult<Money> {
        with_ledger!(self, svc => svc.balance(ctx, id).await)
    }

    pub async fn deposit(
        &self,
        ctx: &RequestContext,
        request: MovementRequest,
    ) -> DomainResult<LedgerEntry> {
        with_ledger!(self, svc => svc.deposit(ctx, request).await)
    }

    pub async fn withdraw(
        &self,
        ctx: &RequestContext,
        request: MovementRequest,
    ) -> DomainResult<LedgerEntry> {
        with_ledger!(self, svc => svc.withdraw(ctx, request).await)
    }

    pub async fn history(&self, ctx: &RequestContext, id: AccountId) -> DomainResult<Vec<LedgerEntry>> {
        with_ledger!(self, svc => svc.history(ctx, id).await)
    }

    pub async fn transaction(
        &self,
        ctx: &RequestContext,
        id: TransactionId,
    ) -> DomainResult<LedgerEntry> {
        with_ledger!(self, svc => svc.transaction(ctx, id).await)
    }

    pub async fn close_account(&self, ctx: &RequestContext, id: AccountId) -> DomainResult<()> {
        with_ledger!(self, svc => svc.close_account(ctx, id).await)
    }
}
