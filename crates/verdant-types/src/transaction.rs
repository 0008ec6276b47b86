//! Transaction types - a charged (or chargeable) settlement record

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{ListingId, OfferId, TransactionId, UserId};

/// Settlement state of a transaction.
///
/// Created `Pending`; moves to exactly one terminal state and never reverts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    Pending,
    Completed,
    Cancelled,
    Refunded,
}

impl TransactionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Pending => "pending",
            TransactionStatus::Completed => "completed",
            TransactionStatus::Cancelled => "cancelled",
            TransactionStatus::Refunded => "refunded",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(TransactionStatus::Pending),
            "completed" => Some(TransactionStatus::Completed),
            "cancelled" => Some(TransactionStatus::Cancelled),
            "refunded" => Some(TransactionStatus::Refunded),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, TransactionStatus::Pending)
    }
}

/// How the buyer pays
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
    /// Online payment through the external provider.
    Paypal,
    /// Settled off-platform at handover; no processor involved.
    Cash,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Paypal => "paypal",
            PaymentMethod::Cash => "cash",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "paypal" => Some(PaymentMethod::Paypal),
            "cash" => Some(PaymentMethod::Cash),
            _ => None,
        }
    }

    /// Whether the external payment processor participates in the charge.
    pub fn is_online(&self) -> bool {
        matches!(self, PaymentMethod::Paypal)
    }
}

/// A settlement record with its full fee breakdown.
///
/// `total_amount` is always recomputed from `subtotal + platform_fee +
/// processor_fee`; it is stored for audit but never trusted independently.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    pub id: TransactionId,
    pub listing_id: ListingId,
    pub buyer_id: UserId,
    pub seller_id: UserId,
    /// Present when the deal came out of a negotiation.
    pub offer_id: Option<OfferId>,
    pub quantity: i64,
    pub subtotal: Decimal,
    pub platform_fee: Decimal,
    pub processor_fee: Decimal,
    pub total_amount: Decimal,
    pub seller_amount: Decimal,
    pub payment_method: PaymentMethod,
    pub provider_order_id: Option<String>,
    pub provider_capture_id: Option<String>,
    pub status: TransactionStatus,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trips() {
        for s in [
            TransactionStatus::Pending,
            TransactionStatus::Completed,
            TransactionStatus::Cancelled,
            TransactionStatus::Refunded,
        ] {
            assert_eq!(TransactionStatus::parse(s.as_str()), Some(s));
        }
        assert_eq!(TransactionStatus::parse("failed"), None);
    }

    #[test]
    fn only_pending_is_non_terminal() {
        assert!(!TransactionStatus::Pending.is_terminal());
        assert!(TransactionStatus::Completed.is_terminal());
        assert!(TransactionStatus::Cancelled.is_terminal());
        assert!(TransactionStatus::Refunded.is_terminal());
    }

    #[test]
    fn payment_method_online() {
        assert!(PaymentMethod::Paypal.is_online());
        assert!(!PaymentMethod::Cash.is_online());
        assert_eq!(PaymentMethod::parse("paypal"), Some(PaymentMethod::Paypal));
        assert_eq!(PaymentMethod::parse("card"), None);
    }
}
