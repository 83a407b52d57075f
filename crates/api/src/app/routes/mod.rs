use axum::{Router, routing::get};

pub mod accounts;
pub mod system;
pub mod transactions;

/// Router for all authenticated endpoints.
pub fn router() -> Router {
    Router::new()
        .route("/whoami", get(system::whoami))
        .merge(accounts::router())
        .merge(transactions::router())
}
