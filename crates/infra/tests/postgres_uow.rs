//! Runs against a real Postgres. Needs `DATABASE_URL`; run with `--ignored`.

use std::sync::Arc;
use std::time::Duration;

use ledgerly_core::{Currency, DomainError, Entity, Money, UserId};
use ledgerly_infra::{
    AccountService, DatabaseConfig, MovementRequest, PgUnitOfWork, RequestContext,
    StaticRateConverter,
};

async fn service() -> AccountService<PgUnitOfWork, StaticRateConverter> {
    let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
    let uow = PgUnitOfWork::connect(&DatabaseConfig {
        url,
        max_connections: 16,
        acquire_timeout: Duration::from_secs(5),
    })
    .await
    .unwrap();
    uow.migrate().await.unwrap();

    let rates = StaticRateConverter::parse("EUR:USD=1.08").unwrap();
    AccountService::new(uow, rates, Currency::USD)
}

fn usd(amount: i64) -> Money {
    Money::new(amount, Currency::USD)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[ignore = "requires DATABASE_URL"]
async fn postgres_round_trip_and_overdraft() {
    let svc = service().await;
    let ctx = RequestContext::new(UserId::new());
    let account = svc.create_account(&ctx, None).await.unwrap();
    let id = account.id();

    svc.deposit(&ctx, MovementRequest::internal(id, usd(10_000)))
        .await
        .unwrap();
    let err = svc
        .withdraw(&ctx, MovementRequest::internal(id, usd(15_000)))
        .await
        .unwrap_err();
    assert!(matches!(err, DomainError::InsufficientFunds { .. }));

    let converted = svc
        .deposit(&ctx, MovementRequest::internal(id, Money::new(1_000, Currency::EUR)))
        .await
        .unwrap();
    assert_eq!(converted.amount, usd(1_080));

    let history = svc.history(&ctx, id).await.unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].id, converted.id);
    assert_eq!(history[0].conversion, converted.conversion);
    assert_eq!(svc.balance(&ctx, id).await.unwrap(), usd(11_080));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[ignore = "requires DATABASE_URL"]
async fn postgres_concurrent_deposits_serialize() {
    const DEPOSITS: i64 = 20;
    let svc = Arc::new(service().await);
    let ctx = RequestContext::new(UserId::new());
    let id = svc.create_account(&ctx, None).await.unwrap().id();

    let mut tasks = Vec::new();
    for _ in 0..DEPOSITS {
        let svc = Arc::clone(&svc);
        tasks.push(tokio::spawn(async move {
            svc.deposit(&ctx, MovementRequest::internal(id, usd(100))).await
        }));
    }
    for task in tasks {
        task.await.unwrap().unwrap();
    }

    assert_eq!(svc.balance(&ctx, id).await.unwrap(), usd(100 * DEPOSITS));
    assert_eq!(svc.history(&ctx, id).await.unwrap().len(), DEPOSITS as usize);
}
