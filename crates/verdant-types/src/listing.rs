//! Listing types - the slice of a listing the engine touches
//!
//! Listing CRUD lives outside this engine; negotiation and settlement only
//! need ownership, pricing mode, stock and availability.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{ListingId, UserId};

/// Lifecycle state of a listing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ListingStatus {
    Active,
    Sold,
    Ended,
    Draft,
}

impl ListingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ListingStatus::Active => "active",
            ListingStatus::Sold => "sold",
            ListingStatus::Ended => "ended",
            ListingStatus::Draft => "draft",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "active" => Some(ListingStatus::Active),
            "sold" => Some(ListingStatus::Sold),
            "ended" => Some(ListingStatus::Ended),
            "draft" => Some(ListingStatus::Draft),
            _ => None,
        }
    }
}

/// Pricing mode of a listing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PriceType {
    Fixed,
    Offer,
}

impl PriceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PriceType::Fixed => "fixed",
            PriceType::Offer => "offer",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "fixed" => Some(PriceType::Fixed),
            "offer" => Some(PriceType::Offer),
            _ => None,
        }
    }
}

/// A listing as seen by the negotiation and settlement engines
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Listing {
    pub id: ListingId,
    pub seller_id: UserId,
    pub price_type: PriceType,
    pub fixed_price: Option<Decimal>,
    pub offer_min_price: Option<Decimal>,
    pub accepts_offers: bool,
    pub quantity: i64,
    pub status: ListingStatus,
    pub created_at: DateTime<Utc>,
}

impl Listing {
    /// A listing can be bought iff it is active and has stock left.
    pub fn is_purchasable(&self) -> bool {
        self.status == ListingStatus::Active && self.quantity >= 1
    }

    /// Whether price proposals are allowed on this listing.
    pub fn is_negotiable(&self) -> bool {
        self.accepts_offers || self.price_type == PriceType::Offer
    }

    /// Unit price for a direct (non-negotiated) purchase.
    pub fn direct_unit_price(&self) -> Option<Decimal> {
        match self.price_type {
            PriceType::Fixed => self.fixed_price,
            PriceType::Offer => self.offer_min_price,
        }
    }
}
