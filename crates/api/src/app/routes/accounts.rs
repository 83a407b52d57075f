use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, get, post},
};

use ledgerly_core::{AccountId, Currency};

use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::context::PrincipalContext;

pub fn router() -> Router {
    Router::new()
        .route("/accounts", post(create_account))
        .route("/accounts/:id", delete(close_account))
        .route("/accounts/:id/balance", get(get_balance))
        .route("/accounts/:id/deposit", post(deposit))
        .route("/accounts/:id/withdraw", post(withdraw))
        .route("/accounts/:id/transactions", get(list_transactions))
}

pub async fn create_account(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    body: Option<Json<dto::CreateAccountRequest>>,
) -> axum::response::Response {
    let body = body.map(|Json(b)| b).unwrap_or_default();
    let currency = match body.currency.as_deref().map(Currency::parse).transpose() {
        Ok(c) => c,
        Err(e) => return errors::domain_error_to_response(e),
    };

    let ctx = services.context(&principal);
    match services.create_account(&ctx, currency).await {
        Ok(account) => (StatusCode::CREATED, Json(dto::account_to_json(&account))).into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}

pub async fn get_balance(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let account_id = match id.parse::<AccountId>() {
        Ok(v) => v,
        Err(e) => return errors::domain_error_to_response(e),
    };

    let ctx = services.context(&principal);
    match services.balance(&ctx, account_id).await {
        Ok(balance) => (StatusCode::OK, Json(dto::balance_to_json(account_id, &balance))).into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}

pub async fn deposit(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::MovementBody>,
) -> axum::response::Response {
    move_funds(&services, &principal, &id, body, Direction::Deposit).await
}

pub async fn withdraw(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::MovementBody>,
) -> axum::response::Response {
    move_funds(&services, &principal, &id, body, Direction::Withdraw).await
}

pub async fn list_transactions(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let account_id = match id.parse::<AccountId>() {
        Ok(v) => v,
        Err(e) => return errors::domain_error_to_response(e),
    };

    let ctx = services.context(&principal);
    match services.history(&ctx, account_id).await {
        Ok(entries) => {
            let items = entries.iter().map(dto::entry_to_json).collect::<Vec<_>>();
            (StatusCode::OK, Json(serde_json::json!({ "items": items }))).into_response()
        }
        Err(e) => errors::domain_error_to_response(e),
    }
}

pub async fn close_account(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let account_id = match id.parse::<AccountId>() {
        Ok(v) => v,
        Err(e) => return errors::domain_error_to_response(e),
    };

    let ctx = services.context(&principal);
    match services.close_account(&ctx, account_id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}

#[derive(Debug, Clone, Copy)]
enum Direction {
    Deposit,
    Withdraw,
}

async fn move_funds(
    services: &AppServices,
    principal: &PrincipalContext,
    id: &str,
    body: dto::MovementBody,
    direction: Direction,
) -> axum::response::Response {
    let ctx = services.context(principal);
    let result = async {
        let account_id = id.parse::<AccountId>()?;
        let request = body.into_request(account_id)?;
        match direction {
            Direction::Deposit => services.deposit(&ctx, request).await,
            Direction::Withdraw => services.withdraw(&ctx, request).await,
        }
    }
    .await;

    match result {
        Ok(entry) => (StatusCode::OK, Json(dto::entry_to_json(&entry))).into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}
