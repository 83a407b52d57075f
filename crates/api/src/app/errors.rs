use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;
use tracing::error;

use ledgerly_core::DomainError;

pub fn domain_error_to_response(err: DomainError) -> axum::response::Response {
    let status = match &err {
        DomainError::NotFound(_) => StatusCode::NOT_FOUND,
        DomainError::AlreadyExists(_) => StatusCode::CONFLICT,
        DomainError::InsufficientFunds { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        DomainError::ConversionFailure(_) => StatusCode::UNPROCESSABLE_ENTITY,
        DomainError::InvalidCurrency(_) | DomainError::Validation(_) => StatusCode::BAD_REQUEST,
        DomainError::Unauthorized => StatusCode::FORBIDDEN,
        DomainError::Timeout => StatusCode::GATEWAY_TIMEOUT,
        DomainError::Unknown(_) => {
            // Raw persistence text stays in the logs.
            error!(error = %err, "unhandled error");
            return json_error(StatusCode::INTERNAL_SERVER_ERROR, err.kind(), "internal error");
        }
    };
    json_error(status, err.kind(), err.to_string())
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ledgerly_core::{Currency, Money};

    #[test]
    fn kinds_map_to_statuses() {
        let cases = [
            (DomainError::not_found("account"), StatusCode::NOT_FOUND),
            (DomainError::already_exists("account"), StatusCode::CONFLICT),
            (
                DomainError::InsufficientFunds {
                    available: Money::new(1, Currency::USD),
                    requested: Money::new(2, Currency::USD),
                },
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
            (DomainError::invalid_currency("XYZ"), StatusCode::BAD_REQUEST),
            (DomainError::Unauthorized, StatusCode::FORBIDDEN),
            (DomainError::Timeout, StatusCode::GATEWAY_TIMEOUT),
            (
                DomainError::unknown(std::io::Error::other("disk full")),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (err, status) in cases {
            assert_eq!(domain_error_to_response(err).status(), status);
        }
    }
}
