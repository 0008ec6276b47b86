//! Database models - mapped from PostgreSQL tables
//!
//! Statuses are stored as their canonical strings and parsed back through
//! the closed enums; an unknown status in a row is a corrupt-row error,
//! never a silently different state.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::FromRow;

use verdant_types::{
    Listing, ListingStatus, Offer, OfferStatus, PaymentMethod, PriceType, Transaction,
    TransactionStatus,
};

use crate::DbError;

#[derive(Debug, Clone, FromRow)]
pub struct ListingRow {
    pub id: i64,
    pub seller_id: i64,
    pub price_type: String,
    pub fixed_price: Option<Decimal>,
    pub offer_min_price: Option<Decimal>,
    pub accepts_offers: bool,
    pub quantity: i64,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<ListingRow> for Listing {
    type Error = DbError;

    fn try_from(row: ListingRow) -> Result<Self, DbError> {
        Ok(Listing {
            id: row.id,
            seller_id: row.seller_id,
            price_type: PriceType::parse(&row.price_type).ok_or_else(|| {
                DbError::CorruptRow(format!("listing {} price_type '{}'", row.id, row.price_type))
            })?,
            fixed_price: row.fixed_price,
            offer_min_price: row.offer_min_price,
            accepts_offers: row.accepts_offers,
            quantity: row.quantity,
            status: ListingStatus::parse(&row.status).ok_or_else(|| {
                DbError::CorruptRow(format!("listing {} status '{}'", row.id, row.status))
            })?,
            created_at: row.created_at,
        })
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct OfferRow {
    pub id: i64,
    pub listing_id: i64,
    pub buyer_id: i64,
    pub seller_id: i64,
    pub offer_amount: Decimal,
    pub message: Option<String>,
    pub status: String,
    pub counter_amount: Option<Decimal>,
    pub counter_message: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
    pub responded_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<OfferRow> for Offer {
    type Error = DbError;

    fn try_from(row: OfferRow) -> Result<Self, DbError> {
        Ok(Offer {
            id: row.id,
            listing_id: row.listing_id,
            buyer_id: row.buyer_id,
            seller_id: row.seller_id,
            offer_amount: row.offer_amount,
            message: row.message,
            status: OfferStatus::parse(&row.status).ok_or_else(|| {
                DbError::CorruptRow(format!("offer {} status '{}'", row.id, row.status))
            })?,
            counter_amount: row.counter_amount,
            counter_message: row.counter_message,
            expires_at: row.expires_at,
            responded_at: row.responded_at,
            created_at: row.created_at,
        })
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct TransactionRow {
    pub id: i64,
    pub listing_id: i64,
    pub buyer_id: i64,
    pub seller_id: i64,
    pub offer_id: Option<i64>,
    pub quantity: i64,
    pub subtotal: Decimal,
    pub platform_fee: Decimal,
    pub processor_fee: Decimal,
    pub total_amount: Decimal,
    pub seller_amount: Decimal,
    pub payment_method: String,
    pub provider_order_id: Option<String>,
    pub provider_capture_id: Option<String>,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<TransactionRow> for Transaction {
    type Error = DbError;

    fn try_from(row: TransactionRow) -> Result<Self, DbError> {
        Ok(Transaction {
            id: row.id,
            listing_id: row.listing_id,
            buyer_id: row.buyer_id,
            seller_id: row.seller_id,
            offer_id: row.offer_id,
            quantity: row.quantity,
            subtotal: row.subtotal,
            platform_fee: row.platform_fee,
            processor_fee: row.processor_fee,
            total_amount: row.total_amount,
            seller_amount: row.seller_amount,
            payment_method: PaymentMethod::parse(&row.payment_method).ok_or_else(|| {
                DbError::CorruptRow(format!(
                    "transaction {} payment_method '{}'",
                    row.id, row.payment_method
                ))
            })?,
            provider_order_id: row.provider_order_id,
            provider_capture_id: row.provider_capture_id,
            status: TransactionStatus::parse(&row.status).ok_or_else(|| {
                DbError::CorruptRow(format!("transaction {} status '{}'", row.id, row.status))
            })?,
            created_at: row.created_at,
        })
    }
}

/// A row of the generic key-value settings store.
#[derive(Debug, Clone, FromRow)]
pub struct SettingRow {
    pub id: i64,
    pub key: String,
    pub value: String,
    pub category: Option<String>,
    pub description: Option<String>,
    pub updated_at: DateTime<Utc>,
    pub updated_by: Option<i64>,
}
