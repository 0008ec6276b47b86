//! Lifecycle events consumed by the notification dispatcher
//!
//! Events are fire-and-forget: dispatch must never block or fail the
//! operation that produced the event.

use serde::{Deserialize, Serialize};

use crate::{Offer, Transaction};

/// Something the notification layer may want to tell the parties about.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MarketEvent {
    OfferReceived { offer: Offer },
    OfferAccepted { offer: Offer },
    OfferRejected { offer: Offer },
    OfferCountered { offer: Offer },
    TransactionCompleted { transaction: Transaction },
    TransactionRefunded { transaction: Transaction },
}

impl MarketEvent {
    /// Short name used in logs.
    pub fn name(&self) -> &'static str {
        match self {
            MarketEvent::OfferReceived { .. } => "offer_received",
            MarketEvent::OfferAccepted { .. } => "offer_accepted",
            MarketEvent::OfferRejected { .. } => "offer_rejected",
            MarketEvent::OfferCountered { .. } => "offer_countered",
            MarketEvent::TransactionCompleted { .. } => "transaction_completed",
            MarketEvent::TransactionRefunded { .. } => "transaction_refunded",
        }
    }
}

/// Sink for lifecycle events. Implementations must be non-blocking; the
/// engines call this synchronously on their hot path.
pub trait EventSink: Send + Sync {
    fn dispatch(&self, event: MarketEvent);
}

/// Sink that drops every event. Useful in tests and batch tools.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSink;

impl EventSink for NoopSink {
    fn dispatch(&self, _event: MarketEvent) {}
}
