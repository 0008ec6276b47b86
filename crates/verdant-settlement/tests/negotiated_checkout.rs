//! End-to-end negotiation and checkout: a buyer's offer is countered,
//! accepted at the counter price, settled through the provider, and
//! finalized exactly once.

use std::sync::Arc;

use chrono::Utc;
use rust_decimal_macros::dec;

use verdant_fees::{FeeConfigProvider, FeeSnapshot, StaticFeeSource};
use verdant_offers::{
    CounterAction, MemoryListingStore, MemoryOfferStore, OfferEngine, StaticOfferPolicy,
};
use verdant_settlement::{
    MemoryTransactionStore, MockProvider, SettlementEngine, SettlementSource,
};
use verdant_types::{
    Listing, ListingStatus, NoopSink, PaymentMethod, PriceType, TransactionStatus,
};

const BUYER: i64 = 2;
const SELLER: i64 = 3;

fn engines() -> (OfferEngine, SettlementEngine, Arc<MemoryListingStore>) {
    let listings = Arc::new(MemoryListingStore::new());
    listings.insert(Listing {
        id: 10,
        seller_id: SELLER,
        price_type: PriceType::Offer,
        fixed_price: None,
        offer_min_price: Some(dec!(10)),
        accepts_offers: true,
        quantity: 3,
        status: ListingStatus::Active,
        created_at: Utc::now(),
    });

    let offers = OfferEngine::new(
        Arc::new(MemoryOfferStore::new()),
        listings.clone(),
        Arc::new(StaticOfferPolicy::default()),
        Arc::new(NoopSink),
    );
    let settlement = SettlementEngine::new(
        Arc::new(MemoryTransactionStore::new()),
        listings.clone(),
        Arc::new(FeeConfigProvider::new(Arc::new(StaticFeeSource::new(
            FeeSnapshot::default(),
        )))),
        Arc::new(MockProvider::new()),
        Arc::new(NoopSink),
    );
    (offers, settlement, listings)
}

#[tokio::test]
async fn countered_offer_settles_at_the_counter_price() {
    let (offers, settlement, listings) = engines();

    // Buyer proposes 15, seller counters at 18, buyer takes it.
    let offer = offers.create(BUYER, 10, dec!(15), None).await.unwrap();
    offers.counter(SELLER, offer.id, dec!(18), None).await.unwrap();
    let accepted = offers
        .respond_to_counter(BUYER, offer.id, CounterAction::Accept)
        .await
        .unwrap();
    assert_eq!(accepted.effective_amount(), dec!(18));

    // The accepted deal goes to settlement at the effective price.
    let initiated = settlement
        .initiate(
            BUYER,
            10,
            1,
            PaymentMethod::Paypal,
            SettlementSource::Offer {
                offer_id: accepted.id,
                unit_price: accepted.effective_amount(),
            },
        )
        .await
        .unwrap();

    let tx = &initiated.transaction;
    assert_eq!(tx.subtotal, dec!(18.00));
    assert_eq!(tx.platform_fee, dec!(0.42));
    // 18.00 * 0.0249 + 0.49 = 0.9382 -> 0.94
    assert_eq!(tx.processor_fee, dec!(0.94));
    assert_eq!(tx.total_amount, dec!(19.36));
    assert_eq!(tx.seller_amount, dec!(16.64));
    assert_eq!(tx.offer_id, Some(accepted.id));

    // Capture callback finalizes once; a redelivery changes nothing.
    let order_id = tx.provider_order_id.clone().unwrap();
    let completed = settlement.finalize(&order_id, "CAP-7").await.unwrap();
    assert_eq!(completed.status, TransactionStatus::Completed);
    assert_eq!(listings.get(10).unwrap().quantity, 2);

    settlement.finalize(&order_id, "CAP-7").await.unwrap();
    assert_eq!(listings.get(10).unwrap().quantity, 2);
}
