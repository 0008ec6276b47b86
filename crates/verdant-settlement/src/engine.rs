//! Transaction settlement orchestrator

use std::sync::Arc;
use std::time::Duration;

use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{error, info, warn};

use verdant_fees::FeeConfigProvider;
use verdant_types::{
    EventSink, ListingId, ListingStore, MarketError, MarketEvent, NewTransaction, OfferId,
    PaymentMethod, Result, Transaction, TransactionId, TransactionStatus, TransactionStore, UserId,
};

use crate::provider::{CreateOrderRequest, PaymentProvider};

/// Where the unit price of a settlement comes from.
#[derive(Debug, Clone, Copy)]
pub enum SettlementSource {
    /// Direct purchase at the listing's posted price.
    Direct,
    /// A negotiated deal; the price is the offer's effective amount.
    Offer {
        offer_id: OfferId,
        unit_price: Decimal,
    },
}

/// Result of `initiate`: the pending transaction plus, for online payments,
/// where the buyer approves the charge.
#[derive(Debug, Clone, Serialize)]
pub struct InitiatedSettlement {
    pub transaction: Transaction,
    pub approve_url: Option<String>,
}

/// Orchestrates order creation and capture reconciliation.
pub struct SettlementEngine {
    transactions: Arc<dyn TransactionStore>,
    listings: Arc<dyn ListingStore>,
    fees: Arc<FeeConfigProvider>,
    provider: Arc<dyn PaymentProvider>,
    events: Arc<dyn EventSink>,
    provider_timeout: Duration,
}

impl SettlementEngine {
    /// Default bound on external provider calls.
    pub const DEFAULT_PROVIDER_TIMEOUT: Duration = Duration::from_secs(10);

    pub fn new(
        transactions: Arc<dyn TransactionStore>,
        listings: Arc<dyn ListingStore>,
        fees: Arc<FeeConfigProvider>,
        provider: Arc<dyn PaymentProvider>,
        events: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            transactions,
            listings,
            fees,
            provider,
            events,
            provider_timeout: Self::DEFAULT_PROVIDER_TIMEOUT,
        }
    }

    pub fn with_provider_timeout(mut self, timeout: Duration) -> Self {
        self.provider_timeout = timeout;
        self
    }

    /// Start a settlement: validate stock, compute the breakdown from one
    /// pinned fee snapshot, persist the pending transaction, and for online
    /// payments open a provider order.
    ///
    /// Provider failures surface as `Provider` but leave the pending row in
    /// place; [`SettlementEngine::retry_order`] attaches a fresh provider
    /// order to the same row.
    pub async fn initiate(
        &self,
        buyer_id: UserId,
        listing_id: ListingId,
        quantity: i64,
        method: PaymentMethod,
        source: SettlementSource,
    ) -> Result<InitiatedSettlement> {
        if quantity < 1 {
            return Err(MarketError::InvalidInput(format!(
                "quantity must be at least 1, got {quantity}"
            )));
        }

        let listing = self
            .listings
            .get_listing(listing_id)
            .await?
            .ok_or_else(|| MarketError::NotFound(format!("listing {listing_id}")))?;

        if listing.seller_id == buyer_id {
            return Err(MarketError::InvalidInput(
                "cannot buy your own listing".into(),
            ));
        }
        if !listing.is_purchasable() {
            return Err(MarketError::InvalidInput(format!(
                "listing {listing_id} is not available"
            )));
        }
        if quantity > listing.quantity {
            return Err(MarketError::OutOfStock {
                listing_id,
                requested: quantity,
                available: listing.quantity,
            });
        }

        let (offer_id, unit_price) = match source {
            SettlementSource::Offer {
                offer_id,
                unit_price,
            } => (Some(offer_id), unit_price),
            SettlementSource::Direct => (
                None,
                listing.direct_unit_price().ok_or_else(|| {
                    MarketError::InvalidInput(format!("listing {listing_id} has no posted price"))
                })?,
            ),
        };

        // One snapshot for the whole computation; a concurrent settings
        // change cannot produce an inconsistent bill.
        let snapshot = self.fees.snapshot().await;
        let breakdown = verdant_fees::compute(unit_price, quantity, method, &snapshot)?;

        let transaction = self
            .transactions
            .insert_transaction(NewTransaction {
                listing_id,
                buyer_id,
                seller_id: listing.seller_id,
                offer_id,
                quantity,
                subtotal: breakdown.subtotal,
                platform_fee: breakdown.platform_fee,
                processor_fee: breakdown.processor_fee,
                total_amount: breakdown.total,
                seller_amount: breakdown.seller_net,
                payment_method: method,
            })
            .await?;

        info!(
            transaction_id = transaction.id,
            listing_id,
            buyer_id,
            quantity,
            total = %breakdown.total,
            method = method.as_str(),
            "settlement initiated"
        );

        if !method.is_online() {
            return Ok(InitiatedSettlement {
                transaction,
                approve_url: None,
            });
        }

        let (updated, approve_url) = self.open_provider_order(&transaction).await?;
        Ok(InitiatedSettlement {
            transaction: updated,
            approve_url,
        })
    }

    /// Attach a new provider order to a pending transaction whose original
    /// order creation failed or timed out.
    pub async fn retry_order(
        &self,
        buyer_id: UserId,
        transaction_id: TransactionId,
    ) -> Result<InitiatedSettlement> {
        let transaction = self
            .transactions
            .get_transaction(transaction_id)
            .await?
            .ok_or_else(|| MarketError::NotFound(format!("transaction {transaction_id}")))?;

        if transaction.buyer_id != buyer_id {
            return Err(MarketError::Unauthorized(format!(
                "user {buyer_id} is not the buyer of transaction {transaction_id}"
            )));
        }
        if transaction.status != TransactionStatus::Pending {
            return Err(MarketError::InvalidState(format!(
                "transaction {transaction_id} is {}, only pending orders can be retried",
                transaction.status.as_str()
            )));
        }
        if !transaction.payment_method.is_online() {
            return Err(MarketError::InvalidInput(
                "cash settlements have no provider order".into(),
            ));
        }

        let (updated, approve_url) = self.open_provider_order(&transaction).await?;
        Ok(InitiatedSettlement {
            transaction: updated,
            approve_url,
        })
    }

    /// Reconcile a provider capture callback. Idempotent: a redelivered
    /// callback for an already-completed transaction returns success without
    /// re-applying side effects.
    pub async fn finalize(
        &self,
        provider_order_id: &str,
        provider_capture_id: &str,
    ) -> Result<Transaction> {
        // Never create state for unknown orders; forged callbacks stop here.
        let transaction = self
            .transactions
            .find_by_provider_order(provider_order_id)
            .await?
            .ok_or_else(|| {
                MarketError::NotFound(format!("no transaction for provider order {provider_order_id}"))
            })?;

        match transaction.status {
            TransactionStatus::Completed => {
                return self.finalize_duplicate(transaction, provider_order_id, provider_capture_id)
            }
            TransactionStatus::Cancelled | TransactionStatus::Refunded => {
                return Err(MarketError::AlreadyFinalized {
                    provider_order_id: provider_order_id.to_string(),
                    status: transaction.status.as_str().to_string(),
                })
            }
            TransactionStatus::Pending => {}
        }

        let Some(completed) = self
            .transactions
            .complete(transaction.id, provider_capture_id)
            .await?
        else {
            // Lost a race against another delivery of the same callback;
            // re-read and treat like any other duplicate.
            let current = self
                .transactions
                .get_transaction(transaction.id)
                .await?
                .ok_or_else(|| MarketError::NotFound(format!("transaction {}", transaction.id)))?;
            return self.finalize_duplicate(current, provider_order_id, provider_capture_id);
        };

        match self
            .listings
            .decrement_stock(completed.listing_id, completed.quantity)
            .await?
        {
            Some(remaining) => {
                info!(
                    transaction_id = completed.id,
                    listing_id = completed.listing_id,
                    quantity = completed.quantity,
                    remaining,
                    "settlement finalized"
                );
            }
            None => {
                // The capture already happened; surface the conflict so an
                // operator can resolve the oversold listing.
                error!(
                    transaction_id = completed.id,
                    listing_id = completed.listing_id,
                    quantity = completed.quantity,
                    "capture succeeded but stock decrement failed"
                );
                return Err(MarketError::OutOfStock {
                    listing_id: completed.listing_id,
                    requested: completed.quantity,
                    available: 0,
                });
            }
        }

        self.events.dispatch(MarketEvent::TransactionCompleted {
            transaction: completed.clone(),
        });
        Ok(completed)
    }

    /// Buyer abandons a pending checkout. Stock is only decremented at
    /// finalize, so cancellation never touches it.
    pub async fn cancel(&self, actor_id: UserId, transaction_id: TransactionId) -> Result<Transaction> {
        let transaction = self
            .transactions
            .get_transaction(transaction_id)
            .await?
            .ok_or_else(|| MarketError::NotFound(format!("transaction {transaction_id}")))?;

        if transaction.buyer_id != actor_id {
            return Err(MarketError::Unauthorized(format!(
                "user {actor_id} is not the buyer of transaction {transaction_id}"
            )));
        }

        self.transactions
            .transition_status(
                transaction_id,
                TransactionStatus::Pending,
                TransactionStatus::Cancelled,
            )
            .await?
            .ok_or_else(|| {
                MarketError::InvalidState(format!(
                    "transaction {transaction_id} is no longer pending"
                ))
            })
            .map(|cancelled| {
                info!(transaction_id, "settlement cancelled");
                cancelled
            })
    }

    /// Administrative refund of a completed transaction. The refunded
    /// amount includes the processor fee only when `include_processor_fee`
    /// is set; stock is not restored.
    pub async fn refund(
        &self,
        transaction_id: TransactionId,
        include_processor_fee: bool,
    ) -> Result<Transaction> {
        let transaction = self
            .transactions
            .get_transaction(transaction_id)
            .await?
            .ok_or_else(|| MarketError::NotFound(format!("transaction {transaction_id}")))?;

        if transaction.status != TransactionStatus::Completed {
            return Err(MarketError::InvalidState(format!(
                "transaction {transaction_id} is {}, only completed transactions can be refunded",
                transaction.status.as_str()
            )));
        }
        let capture_id = transaction.provider_capture_id.clone().ok_or_else(|| {
            MarketError::InvalidState(format!(
                "transaction {transaction_id} has no provider capture"
            ))
        })?;

        let amount = if include_processor_fee {
            transaction.total_amount
        } else {
            transaction.total_amount - transaction.processor_fee
        };

        let refund = self
            .bounded(self.provider.refund_capture(&capture_id, amount))
            .await?;

        let refunded = self
            .transactions
            .transition_status(
                transaction_id,
                TransactionStatus::Completed,
                TransactionStatus::Refunded,
            )
            .await?
            .ok_or_else(|| {
                MarketError::InvalidState(format!(
                    "transaction {transaction_id} left completed state during refund"
                ))
            })?;

        info!(
            transaction_id,
            refund_id = %refund.refund_id,
            %amount,
            "settlement refunded"
        );
        self.events.dispatch(MarketEvent::TransactionRefunded {
            transaction: refunded.clone(),
        });
        Ok(refunded)
    }

    /// A buyer's purchases, newest first.
    pub async fn purchases(&self, buyer_id: UserId) -> Result<Vec<Transaction>> {
        self.transactions.transactions_for_buyer(buyer_id).await
    }

    /// A seller's sales, newest first.
    pub async fn sales(&self, seller_id: UserId) -> Result<Vec<Transaction>> {
        self.transactions.transactions_for_seller(seller_id).await
    }

    fn finalize_duplicate(
        &self,
        transaction: Transaction,
        provider_order_id: &str,
        provider_capture_id: &str,
    ) -> Result<Transaction> {
        if transaction.status == TransactionStatus::Completed
            && transaction.provider_capture_id.as_deref() == Some(provider_capture_id)
        {
            // Webhook redelivery; success, no side effects, but notable.
            warn!(
                transaction_id = transaction.id,
                provider_order_id, "duplicate capture callback ignored"
            );
            return Ok(transaction);
        }
        Err(MarketError::AlreadyFinalized {
            provider_order_id: provider_order_id.to_string(),
            status: transaction.status.as_str().to_string(),
        })
    }

    async fn open_provider_order(
        &self,
        transaction: &Transaction,
    ) -> Result<(Transaction, Option<String>)> {
        let request = CreateOrderRequest {
            amount: transaction.total_amount,
            description: format!(
                "Listing {} x{} via marketplace checkout",
                transaction.listing_id, transaction.quantity
            ),
            listing_id: transaction.listing_id,
            buyer_id: transaction.buyer_id,
            seller_id: transaction.seller_id,
            quantity: transaction.quantity,
        };

        let order = self
            .bounded(self.provider.create_order(request))
            .await
            .map_err(|e| {
                warn!(
                    transaction_id = transaction.id,
                    error = %e,
                    "provider order creation failed, pending transaction kept for retry"
                );
                MarketError::Provider {
                    message: e.to_string(),
                    transaction_id: Some(transaction.id),
                }
            })?;

        let updated = self
            .transactions
            .set_provider_order(transaction.id, &order.order_id)
            .await?
            .ok_or_else(|| {
                MarketError::InvalidState(format!(
                    "transaction {} left pending state during order creation",
                    transaction.id
                ))
            })?;

        Ok((updated, order.approve_url))
    }

    /// Bound an external call by the configured timeout.
    async fn bounded<T>(
        &self,
        call: impl std::future::Future<Output = Result<T>>,
    ) -> Result<T> {
        match tokio::time::timeout(self.provider_timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(MarketError::Provider {
                message: format!(
                    "payment provider did not answer within {:?}",
                    self.provider_timeout
                ),
                transaction_id: None,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryTransactionStore;
    use crate::provider::MockProvider;
    use chrono::Utc;
    use rust_decimal_macros::dec;
    use verdant_fees::{FeeConfigProvider, FeeSnapshot, StaticFeeSource};
    use verdant_offers::MemoryListingStore;
    use verdant_types::{Listing, ListingStatus, NoopSink, PriceType};

    const BUYER: UserId = 2;
    const SELLER: UserId = 3;

    fn listing(id: ListingId, quantity: i64, price: Decimal) -> Listing {
        Listing {
            id,
            seller_id: SELLER,
            price_type: PriceType::Fixed,
            fixed_price: Some(price),
            offer_min_price: None,
            accepts_offers: false,
            quantity,
            status: ListingStatus::Active,
            created_at: Utc::now(),
        }
    }

    struct Fixture {
        engine: SettlementEngine,
        transactions: Arc<MemoryTransactionStore>,
        listings: Arc<MemoryListingStore>,
        provider: Arc<MockProvider>,
    }

    fn fixture(rows: Vec<Listing>) -> Fixture {
        let listings = Arc::new(MemoryListingStore::new());
        for l in rows {
            listings.insert(l);
        }
        let transactions = Arc::new(MemoryTransactionStore::new());
        let provider = Arc::new(MockProvider::new());
        let fees = Arc::new(FeeConfigProvider::new(Arc::new(StaticFeeSource::new(
            FeeSnapshot::default(),
        ))));
        let engine = SettlementEngine::new(
            transactions.clone(),
            listings.clone(),
            fees,
            provider.clone(),
            Arc::new(NoopSink),
        );
        Fixture {
            engine,
            transactions,
            listings,
            provider,
        }
    }

    #[tokio::test]
    async fn initiate_computes_breakdown_and_opens_order() {
        let f = fixture(vec![listing(10, 5, dec!(10.00))]);
        let initiated = f
            .engine
            .initiate(BUYER, 10, 2, PaymentMethod::Paypal, SettlementSource::Direct)
            .await
            .unwrap();

        let tx = &initiated.transaction;
        assert_eq!(tx.status, TransactionStatus::Pending);
        assert_eq!(tx.subtotal, dec!(20.00));
        assert_eq!(tx.platform_fee, dec!(0.84));
        assert_eq!(tx.processor_fee, dec!(0.99));
        assert_eq!(tx.total_amount, dec!(21.83));
        assert_eq!(tx.seller_amount, dec!(18.17));
        assert_eq!(tx.provider_order_id.as_deref(), Some("MOCK-ORDER-1"));
        assert!(initiated.approve_url.is_some());
        // Stock is untouched until finalize.
        assert_eq!(f.listings.get(10).unwrap().quantity, 5);
    }

    #[tokio::test]
    async fn initiate_cash_skips_the_provider() {
        let f = fixture(vec![listing(10, 5, dec!(10.00))]);
        let initiated = f
            .engine
            .initiate(BUYER, 10, 2, PaymentMethod::Cash, SettlementSource::Direct)
            .await
            .unwrap();
        assert_eq!(initiated.transaction.processor_fee, Decimal::ZERO);
        assert_eq!(initiated.transaction.total_amount, dec!(20.84));
        assert!(initiated.transaction.provider_order_id.is_none());
        assert!(initiated.approve_url.is_none());
    }

    #[tokio::test]
    async fn initiate_rejects_excess_quantity_without_creating_a_row() {
        let f = fixture(vec![listing(10, 3, dec!(10.00))]);
        let err = f
            .engine
            .initiate(BUYER, 10, 5, PaymentMethod::Paypal, SettlementSource::Direct)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            MarketError::OutOfStock {
                requested: 5,
                available: 3,
                ..
            }
        ));
        assert!(f.transactions.is_empty());
    }

    #[tokio::test]
    async fn negotiated_settlement_uses_the_effective_price() {
        // Offer at 15 countered to 18 and accepted: subtotal comes from 18.
        let f = fixture(vec![listing(10, 5, dec!(25.00))]);
        let initiated = f
            .engine
            .initiate(
                BUYER,
                10,
                1,
                PaymentMethod::Paypal,
                SettlementSource::Offer {
                    offer_id: 77,
                    unit_price: dec!(18),
                },
            )
            .await
            .unwrap();
        assert_eq!(initiated.transaction.subtotal, dec!(18.00));
        assert_eq!(initiated.transaction.offer_id, Some(77));
    }

    #[tokio::test]
    async fn provider_failure_keeps_the_pending_row_for_retry() {
        let f = fixture(vec![listing(10, 5, dec!(10.00))]);
        f.provider.fail_orders(true);

        let err = f
            .engine
            .initiate(BUYER, 10, 1, PaymentMethod::Paypal, SettlementSource::Direct)
            .await
            .unwrap_err();
        let MarketError::Provider { transaction_id, .. } = err else {
            panic!("expected provider error, got {err:?}");
        };
        let tx_id = transaction_id.unwrap();

        let pending = f.transactions.get_transaction(tx_id).await.unwrap().unwrap();
        assert_eq!(pending.status, TransactionStatus::Pending);
        assert!(pending.provider_order_id.is_none());

        f.provider.fail_orders(false);
        let retried = f.engine.retry_order(BUYER, tx_id).await.unwrap();
        assert_eq!(retried.transaction.id, tx_id);
        assert!(retried.transaction.provider_order_id.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn provider_timeout_keeps_the_pending_row() {
        let f = fixture(vec![listing(10, 5, dec!(10.00))]);
        f.provider.hang_orders(true);

        let err = f
            .engine
            .initiate(BUYER, 10, 1, PaymentMethod::Paypal, SettlementSource::Direct)
            .await
            .unwrap_err();
        assert!(matches!(err, MarketError::Provider { transaction_id: Some(_), .. }));
        assert_eq!(f.transactions.len(), 1);
    }

    #[tokio::test]
    async fn finalize_completes_once_and_decrements_stock_once() {
        let f = fixture(vec![listing(10, 3, dec!(10.00))]);
        let initiated = f
            .engine
            .initiate(BUYER, 10, 2, PaymentMethod::Paypal, SettlementSource::Direct)
            .await
            .unwrap();
        let order_id = initiated.transaction.provider_order_id.clone().unwrap();

        let first = f.engine.finalize(&order_id, "CAP-1").await.unwrap();
        assert_eq!(first.status, TransactionStatus::Completed);
        assert_eq!(first.provider_capture_id.as_deref(), Some("CAP-1"));
        assert_eq!(f.listings.get(10).unwrap().quantity, 1);

        // Redelivered callback: same terminal state, stock untouched.
        let second = f.engine.finalize(&order_id, "CAP-1").await.unwrap();
        assert_eq!(second.status, TransactionStatus::Completed);
        assert_eq!(f.listings.get(10).unwrap().quantity, 1);
    }

    #[tokio::test]
    async fn finalize_with_different_capture_id_is_rejected() {
        let f = fixture(vec![listing(10, 3, dec!(10.00))]);
        let initiated = f
            .engine
            .initiate(BUYER, 10, 1, PaymentMethod::Paypal, SettlementSource::Direct)
            .await
            .unwrap();
        let order_id = initiated.transaction.provider_order_id.clone().unwrap();

        f.engine.finalize(&order_id, "CAP-1").await.unwrap();
        let err = f.engine.finalize(&order_id, "CAP-2").await.unwrap_err();
        assert!(matches!(err, MarketError::AlreadyFinalized { .. }));
    }

    #[tokio::test]
    async fn finalize_unknown_order_creates_nothing() {
        let f = fixture(vec![listing(10, 3, dec!(10.00))]);
        let err = f.engine.finalize("FORGED-ORDER", "CAP-1").await.unwrap_err();
        assert!(matches!(err, MarketError::NotFound(_)));
        assert!(f.transactions.is_empty());
    }

    #[tokio::test]
    async fn concurrent_finalize_decrements_stock_once() {
        let f = fixture(vec![listing(10, 2, dec!(10.00))]);
        let initiated = f
            .engine
            .initiate(BUYER, 10, 2, PaymentMethod::Paypal, SettlementSource::Direct)
            .await
            .unwrap();
        let order_id = initiated.transaction.provider_order_id.clone().unwrap();

        let (a, b) = tokio::join!(
            f.engine.finalize(&order_id, "CAP-1"),
            f.engine.finalize(&order_id, "CAP-1")
        );
        assert!(a.is_ok() && b.is_ok());
        let sold = f.listings.get(10).unwrap();
        assert_eq!(sold.quantity, 0);
        assert_eq!(sold.status, ListingStatus::Sold);
    }

    #[tokio::test]
    async fn selling_out_flips_the_listing_and_blocks_further_finalizes() {
        let f = fixture(vec![listing(10, 1, dec!(10.00))]);
        let first = f
            .engine
            .initiate(BUYER, 10, 1, PaymentMethod::Paypal, SettlementSource::Direct)
            .await
            .unwrap();
        // A second checkout opened before the first one captured.
        let second = f
            .engine
            .initiate(4, 10, 1, PaymentMethod::Paypal, SettlementSource::Direct)
            .await
            .unwrap();

        let first_order = first.transaction.provider_order_id.unwrap();
        let second_order = second.transaction.provider_order_id.unwrap();

        f.engine.finalize(&first_order, "CAP-1").await.unwrap();
        assert_eq!(f.listings.get(10).unwrap().status, ListingStatus::Sold);

        let err = f.engine.finalize(&second_order, "CAP-2").await.unwrap_err();
        assert!(matches!(err, MarketError::OutOfStock { .. }));
    }

    #[tokio::test]
    async fn cancel_is_buyer_only_and_never_touches_stock() {
        let f = fixture(vec![listing(10, 5, dec!(10.00))]);
        let initiated = f
            .engine
            .initiate(BUYER, 10, 2, PaymentMethod::Paypal, SettlementSource::Direct)
            .await
            .unwrap();
        let tx_id = initiated.transaction.id;

        assert!(matches!(
            f.engine.cancel(SELLER, tx_id).await,
            Err(MarketError::Unauthorized(_))
        ));

        let cancelled = f.engine.cancel(BUYER, tx_id).await.unwrap();
        assert_eq!(cancelled.status, TransactionStatus::Cancelled);
        assert_eq!(f.listings.get(10).unwrap().quantity, 5);

        // A capture callback for a cancelled checkout is rejected.
        let order_id = initiated.transaction.provider_order_id.unwrap();
        assert!(matches!(
            f.engine.finalize(&order_id, "CAP-1").await,
            Err(MarketError::AlreadyFinalized { .. })
        ));
    }

    #[tokio::test]
    async fn refund_calls_provider_and_keeps_stock() {
        let f = fixture(vec![listing(10, 3, dec!(10.00))]);
        let initiated = f
            .engine
            .initiate(BUYER, 10, 2, PaymentMethod::Paypal, SettlementSource::Direct)
            .await
            .unwrap();
        let order_id = initiated.transaction.provider_order_id.clone().unwrap();
        let completed = f.engine.finalize(&order_id, "CAP-1").await.unwrap();

        let refunded = f.engine.refund(completed.id, false).await.unwrap();
        assert_eq!(refunded.status, TransactionStatus::Refunded);

        // Processor-fee-exclusive amount: 21.83 - 0.99.
        let refunds = f.provider.refunds();
        assert_eq!(refunds, vec![("CAP-1".to_string(), dec!(20.84))]);

        // Stock is not restored on refund.
        assert_eq!(f.listings.get(10).unwrap().quantity, 1);

        // Refunded is terminal.
        assert!(matches!(
            f.engine.refund(completed.id, false).await,
            Err(MarketError::InvalidState(_))
        ));
    }

    #[tokio::test]
    async fn refund_can_include_the_processor_fee() {
        let f = fixture(vec![listing(10, 3, dec!(10.00))]);
        let initiated = f
            .engine
            .initiate(BUYER, 10, 2, PaymentMethod::Paypal, SettlementSource::Direct)
            .await
            .unwrap();
        let order_id = initiated.transaction.provider_order_id.clone().unwrap();
        let completed = f.engine.finalize(&order_id, "CAP-1").await.unwrap();

        f.engine.refund(completed.id, true).await.unwrap();
        assert_eq!(f.provider.refunds(), vec![("CAP-1".to_string(), dec!(21.83))]);
    }

    #[tokio::test]
    async fn histories_are_per_party_and_newest_first() {
        let f = fixture(vec![listing(10, 9, dec!(10.00))]);
        for _ in 0..2 {
            f.engine
                .initiate(BUYER, 10, 1, PaymentMethod::Cash, SettlementSource::Direct)
                .await
                .unwrap();
        }

        let purchases = f.engine.purchases(BUYER).await.unwrap();
        assert_eq!(purchases.len(), 2);
        assert!(purchases[0].id > purchases[1].id);
        assert_eq!(f.engine.sales(SELLER).await.unwrap().len(), 2);
        assert!(f.engine.purchases(SELLER).await.unwrap().is_empty());
    }
}
