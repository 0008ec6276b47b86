//! Offer types - a buyer's price proposal and its negotiation lifecycle

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{ListingId, OfferId, UserId};

/// Negotiation state of an offer.
///
/// `Pending` and `Countered` are the only non-terminal states; everything
/// else is final and the offer becomes read-only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OfferStatus {
    Pending,
    Accepted,
    Rejected,
    Countered,
    Expired,
}

impl OfferStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OfferStatus::Pending => "pending",
            OfferStatus::Accepted => "accepted",
            OfferStatus::Rejected => "rejected",
            OfferStatus::Countered => "countered",
            OfferStatus::Expired => "expired",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(OfferStatus::Pending),
            "accepted" => Some(OfferStatus::Accepted),
            "rejected" => Some(OfferStatus::Rejected),
            "countered" => Some(OfferStatus::Countered),
            "expired" => Some(OfferStatus::Expired),
            _ => None,
        }
    }

    /// Terminal states are never left again.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OfferStatus::Accepted | OfferStatus::Rejected | OfferStatus::Expired
        )
    }
}

/// A buyer's price proposal for a listing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Offer {
    pub id: OfferId,
    pub listing_id: ListingId,
    pub buyer_id: UserId,
    /// Frozen from the listing at creation time.
    pub seller_id: UserId,
    pub offer_amount: Decimal,
    pub message: Option<String>,
    pub status: OfferStatus,
    /// Set exactly once, when the seller counters; never cleared afterwards.
    pub counter_amount: Option<Decimal>,
    pub counter_message: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
    /// First seller or buyer response (accept/reject/counter/respond).
    pub responded_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Offer {
    /// Whether the offer's deadline has passed.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.map(|t| now > t).unwrap_or(false)
    }

    /// The price an acceptance settles at: the counter amount once the
    /// seller has countered, the original amount otherwise.
    pub fn effective_amount(&self) -> Decimal {
        self.counter_amount.unwrap_or(self.offer_amount)
    }
}
