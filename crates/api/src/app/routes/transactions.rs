use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
};

use ledgerly_core::TransactionId;

use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::context::PrincipalContext;

pub fn router() -> Router {
    Router::new().route("/transactions/:id", get(get_transaction))
}

pub async fn get_transaction(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let transaction_id = match id.parse::<TransactionId>() {
        Ok(v) => v,
        Err(e) => return errors::domain_error_to_response(e),
    };

    let ctx = services.context(&principal);
    match services.transaction(&ctx, transaction_id).await {
        Ok(entry) => (StatusCode::OK, Json(dto::entry_to_json(&entry))).into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}
