//! Storage traits the engines are written against
//!
//! Every state-changing method is a conditional write: the implementation
//! must apply the change in a single atomic step guarded by the entity's
//! current status, and return `None` when the guard does not match. The
//! engines translate a failed guard into the right business error
//! (`InvalidState`, `AlreadyFinalized`, `OutOfStock`). Implementations must
//! not read-then-write.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use crate::{
    Listing, ListingId, Offer, OfferId, OfferStatus, PageRequest, Paginated, PaymentMethod, Result,
    Transaction, TransactionId, TransactionStatus, UserId,
};

/// Fields of a new offer row; id and `created_at` are assigned by the store.
#[derive(Debug, Clone)]
pub struct NewOffer {
    pub listing_id: ListingId,
    pub buyer_id: UserId,
    pub seller_id: UserId,
    pub offer_amount: Decimal,
    pub message: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
}

/// A status transition plus the fields it writes alongside.
#[derive(Debug, Clone)]
pub struct OfferTransition {
    pub to: OfferStatus,
    pub counter_amount: Option<Decimal>,
    pub counter_message: Option<String>,
    pub responded_at: Option<DateTime<Utc>>,
}

impl OfferTransition {
    /// Plain status move stamping the response time.
    pub fn respond(to: OfferStatus, at: DateTime<Utc>) -> Self {
        Self {
            to,
            counter_amount: None,
            counter_message: None,
            responded_at: Some(at),
        }
    }
}

/// Fields of a new transaction row; id and `created_at` are assigned by the
/// store. Always created in `pending` status.
#[derive(Debug, Clone)]
pub struct NewTransaction {
    pub listing_id: ListingId,
    pub buyer_id: UserId,
    pub seller_id: UserId,
    pub offer_id: Option<OfferId>,
    pub quantity: i64,
    pub subtotal: Decimal,
    pub platform_fee: Decimal,
    pub processor_fee: Decimal,
    pub total_amount: Decimal,
    pub seller_amount: Decimal,
    pub payment_method: PaymentMethod,
}

/// Read access to listings plus the one write settlement needs.
#[async_trait]
pub trait ListingStore: Send + Sync {
    async fn get_listing(&self, id: ListingId) -> Result<Option<Listing>>;

    /// Atomically decrement available stock by `quantity`, flipping the
    /// listing to `sold` when it reaches zero. Returns the remaining stock,
    /// or `None` when the listing is not active or the decrement would go
    /// negative.
    async fn decrement_stock(&self, id: ListingId, quantity: i64) -> Result<Option<i64>>;
}

/// Offer persistence with status-guarded transitions.
#[async_trait]
pub trait OfferStore: Send + Sync {
    async fn insert_offer(&self, offer: NewOffer) -> Result<Offer>;

    async fn get_offer(&self, id: OfferId) -> Result<Option<Offer>>;

    /// Apply `change` iff the offer's status is still `from`. Returns the
    /// updated offer, or `None` when the guard fails (raced or already
    /// resolved).
    async fn transition_offer(
        &self,
        id: OfferId,
        from: OfferStatus,
        change: OfferTransition,
    ) -> Result<Option<Offer>>;

    /// Sweep: mark every `pending`/`countered` offer whose deadline has
    /// passed as `expired`. Returns how many rows changed.
    async fn expire_due(&self, now: DateTime<Utc>) -> Result<u64>;

    /// Offers received by a seller, newest-created first.
    async fn offers_for_seller(
        &self,
        seller_id: UserId,
        page: PageRequest,
        status: Option<OfferStatus>,
    ) -> Result<Paginated<Offer>>;

    /// Offers placed by a buyer, newest-created first.
    async fn offers_for_buyer(
        &self,
        buyer_id: UserId,
        page: PageRequest,
        status: Option<OfferStatus>,
    ) -> Result<Paginated<Offer>>;

    /// `pending` offers awaiting this seller, newest first.
    async fn pending_for_seller(&self, seller_id: UserId) -> Result<Vec<Offer>>;

    /// `countered` offers awaiting this buyer, newest first.
    async fn countered_for_buyer(&self, buyer_id: UserId) -> Result<Vec<Offer>>;
}

/// Transaction persistence; finalize idempotency lives in the conditional
/// writes here, keyed on `provider_order_id`.
#[async_trait]
pub trait TransactionStore: Send + Sync {
    async fn insert_transaction(&self, tx: NewTransaction) -> Result<Transaction>;

    async fn get_transaction(&self, id: TransactionId) -> Result<Option<Transaction>>;

    async fn find_by_provider_order(&self, provider_order_id: &str) -> Result<Option<Transaction>>;

    /// Attach (or replace) the provider order id while the transaction is
    /// still `pending`. `None` when it has already left `pending`.
    async fn set_provider_order(
        &self,
        id: TransactionId,
        provider_order_id: &str,
    ) -> Result<Option<Transaction>>;

    /// `pending` -> `completed`, storing the capture id. `None` when the
    /// transaction was not `pending` (duplicate or out-of-order callback).
    async fn complete(
        &self,
        id: TransactionId,
        provider_capture_id: &str,
    ) -> Result<Option<Transaction>>;

    /// Move `from` -> `to` (cancel, refund). `None` when the guard fails.
    async fn transition_status(
        &self,
        id: TransactionId,
        from: TransactionStatus,
        to: TransactionStatus,
    ) -> Result<Option<Transaction>>;

    /// A buyer's purchases, newest first.
    async fn transactions_for_buyer(&self, buyer_id: UserId) -> Result<Vec<Transaction>>;

    /// A seller's sales, newest first.
    async fn transactions_for_seller(&self, seller_id: UserId) -> Result<Vec<Transaction>>;
}
