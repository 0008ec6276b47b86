//! Error types for the marketplace engine
//!
//! Business-rule violations carry a stable machine-readable kind so RPC
//! clients can branch on them without parsing messages.

use thiserror::Error;

/// Result type for marketplace operations
pub type Result<T> = std::result::Result<T, MarketError>;

/// Marketplace error taxonomy
#[derive(Debug, Clone, Error)]
pub enum MarketError {
    /// Malformed amounts, quantities or targets
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Wrong actor for the operation
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Operation not valid in the entity's current lifecycle state
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Offer past its deadline
    #[error("Offer {offer_id} expired at {expired_at}")]
    Expired { offer_id: i64, expired_at: String },

    /// Requested quantity exceeds available stock
    #[error("Out of stock: listing {listing_id} has {available} available, requested {requested}")]
    OutOfStock {
        listing_id: i64,
        requested: i64,
        available: i64,
    },

    /// Transaction already reached a terminal state
    #[error("Transaction for provider order {provider_order_id} already finalized as {status}")]
    AlreadyFinalized {
        provider_order_id: String,
        status: String,
    },

    /// Entity not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Payment provider call failed. When order creation fails after the
    /// transaction row was persisted, `transaction_id` lets the caller
    /// retry against the same row.
    #[error("Provider error: {message}")]
    Provider {
        message: String,
        transaction_id: Option<i64>,
    },

    /// No fee configuration snapshot could be obtained
    #[error("Fee configuration unavailable: {0}")]
    FeeConfigUnavailable(String),

    /// Persistence failure, not a business-rule violation
    #[error("Storage error: {0}")]
    Storage(String),
}

impl MarketError {
    /// Stable machine-readable kind for RPC error bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            MarketError::InvalidInput(_) => "invalid_input",
            MarketError::Unauthorized(_) => "unauthorized",
            MarketError::InvalidState(_) => "invalid_state",
            MarketError::Expired { .. } => "expired",
            MarketError::OutOfStock { .. } => "out_of_stock",
            MarketError::AlreadyFinalized { .. } => "already_finalized",
            MarketError::NotFound(_) => "not_found",
            MarketError::Provider { .. } => "provider_error",
            MarketError::FeeConfigUnavailable(_) => "fee_config_unavailable",
            MarketError::Storage(_) => "storage_error",
        }
    }

    /// Whether the error is a deterministic business-rule violation that
    /// must never be retried automatically.
    pub fn is_business_rule(&self) -> bool {
        !matches!(
            self,
            MarketError::Provider { .. }
                | MarketError::FeeConfigUnavailable(_)
                | MarketError::Storage(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_are_stable() {
        assert_eq!(MarketError::InvalidInput("x".into()).kind(), "invalid_input");
        assert_eq!(
            MarketError::OutOfStock {
                listing_id: 1,
                requested: 5,
                available: 3
            }
            .kind(),
            "out_of_stock"
        );
        assert_eq!(
            MarketError::AlreadyFinalized {
                provider_order_id: "ord-1".into(),
                status: "refunded".into()
            }
            .kind(),
            "already_finalized"
        );
    }

    #[test]
    fn business_rules_are_not_retryable() {
        assert!(MarketError::InvalidState("x".into()).is_business_rule());
        assert!(!MarketError::Provider {
            message: "timeout".into(),
            transaction_id: None
        }
        .is_business_rule());
        assert!(!MarketError::Storage("down".into()).is_business_rule());
    }
}
