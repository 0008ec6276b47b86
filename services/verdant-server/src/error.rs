//! API error mapping
//!
//! Business errors keep their stable machine-readable kind in the JSON
//! body so clients can branch without parsing messages.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};

use verdant_types::MarketError;

#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub kind: &'static str,
    pub message: String,
    /// Pending transaction a failed checkout can be retried against.
    pub transaction_id: Option<i64>,
}

impl ApiError {
    /// Missing or malformed caller identity headers.
    pub fn unauthenticated(message: &str) -> Self {
        Self {
            status: StatusCode::UNAUTHORIZED,
            kind: "unauthenticated",
            message: message.to_string(),
            transaction_id: None,
        }
    }

    pub fn bad_request(message: &str) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            kind: "invalid_input",
            message: message.to_string(),
            transaction_id: None,
        }
    }
}

impl From<MarketError> for ApiError {
    fn from(e: MarketError) -> Self {
        let status = match &e {
            MarketError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            MarketError::Unauthorized(_) => StatusCode::FORBIDDEN,
            MarketError::InvalidState(_) => StatusCode::CONFLICT,
            MarketError::Expired { .. } => StatusCode::GONE,
            MarketError::OutOfStock { .. } => StatusCode::CONFLICT,
            MarketError::AlreadyFinalized { .. } => StatusCode::CONFLICT,
            MarketError::NotFound(_) => StatusCode::NOT_FOUND,
            MarketError::Provider { .. } => StatusCode::BAD_GATEWAY,
            MarketError::FeeConfigUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            MarketError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let transaction_id = match &e {
            MarketError::Provider { transaction_id, .. } => *transaction_id,
            _ => None,
        };
        Self {
            status,
            kind: e.kind(),
            message: e.to_string(),
            transaction_id,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut body = serde_json::json!({
            "error": true,
            "kind": self.kind,
            "message": self.message,
        });
        if let Some(id) = self.transaction_id {
            body["transaction_id"] = serde_json::json!(id);
        }
        (self.status, Json(body)).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn business_errors_map_to_their_status() {
        let e: ApiError = MarketError::NotFound("offer 1".into()).into();
        assert_eq!(e.status, StatusCode::NOT_FOUND);
        assert_eq!(e.kind, "not_found");

        let e: ApiError = MarketError::Expired {
            offer_id: 1,
            expired_at: "2025-01-01T00:00:00Z".into(),
        }
        .into();
        assert_eq!(e.status, StatusCode::GONE);

        let e: ApiError = MarketError::Provider {
            message: "down".into(),
            transaction_id: Some(9),
        }
        .into();
        assert_eq!(e.status, StatusCode::BAD_GATEWAY);
        assert_eq!(e.transaction_id, Some(9));
    }
}
