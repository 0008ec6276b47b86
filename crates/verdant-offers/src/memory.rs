//! In-memory stores with the same compare-and-swap semantics as the
//! database repositories. Used by tests, demos and single-process tools.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use verdant_types::{
    Listing, ListingId, ListingStatus, ListingStore, NewOffer, Offer, OfferId, OfferStatus,
    OfferStore, OfferTransition, PageRequest, Paginated, Result, UserId,
};

/// In-memory listing store.
#[derive(Default)]
pub struct MemoryListingStore {
    listings: Mutex<HashMap<ListingId, Listing>>,
}

impl MemoryListingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, listing: Listing) {
        self.listings
            .lock()
            .unwrap()
            .insert(listing.id, listing);
    }

    pub fn get(&self, id: ListingId) -> Option<Listing> {
        self.listings.lock().unwrap().get(&id).cloned()
    }
}

#[async_trait]
impl ListingStore for MemoryListingStore {
    async fn get_listing(&self, id: ListingId) -> Result<Option<Listing>> {
        Ok(self.listings.lock().unwrap().get(&id).cloned())
    }

    async fn decrement_stock(&self, id: ListingId, quantity: i64) -> Result<Option<i64>> {
        let mut listings = self.listings.lock().unwrap();
        let Some(listing) = listings.get_mut(&id) else {
            return Ok(None);
        };
        if listing.status != ListingStatus::Active || listing.quantity < quantity {
            return Ok(None);
        }
        listing.quantity -= quantity;
        if listing.quantity == 0 {
            listing.status = ListingStatus::Sold;
        }
        Ok(Some(listing.quantity))
    }
}

/// In-memory offer store.
#[derive(Default)]
pub struct MemoryOfferStore {
    inner: Mutex<OfferTable>,
}

#[derive(Default)]
struct OfferTable {
    offers: HashMap<OfferId, Offer>,
    next_id: OfferId,
}

impl MemoryOfferStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Test helper: move an offer's deadline.
    pub fn backdate_expiry(&self, id: OfferId, expires_at: DateTime<Utc>) {
        if let Some(offer) = self.inner.lock().unwrap().offers.get_mut(&id) {
            offer.expires_at = Some(expires_at);
        }
    }
}

fn newest_first(offers: &mut [Offer]) {
    offers.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
}

fn paginate(mut matches: Vec<Offer>, page: PageRequest) -> Paginated<Offer> {
    newest_first(&mut matches);
    let total = matches.len() as i64;
    let items = matches
        .into_iter()
        .skip(page.offset() as usize)
        .take(page.limit() as usize)
        .collect();
    Paginated { items, total }
}

#[async_trait]
impl OfferStore for MemoryOfferStore {
    async fn insert_offer(&self, offer: NewOffer) -> Result<Offer> {
        let mut inner = self.inner.lock().unwrap();
        inner.next_id += 1;
        let row = Offer {
            id: inner.next_id,
            listing_id: offer.listing_id,
            buyer_id: offer.buyer_id,
            seller_id: offer.seller_id,
            offer_amount: offer.offer_amount,
            message: offer.message,
            status: OfferStatus::Pending,
            counter_amount: None,
            counter_message: None,
            expires_at: offer.expires_at,
            responded_at: None,
            created_at: Utc::now(),
        };
        inner.offers.insert(row.id, row.clone());
        Ok(row)
    }

    async fn get_offer(&self, id: OfferId) -> Result<Option<Offer>> {
        Ok(self.inner.lock().unwrap().offers.get(&id).cloned())
    }

    async fn transition_offer(
        &self,
        id: OfferId,
        from: OfferStatus,
        change: OfferTransition,
    ) -> Result<Option<Offer>> {
        let mut inner = self.inner.lock().unwrap();
        let Some(offer) = inner.offers.get_mut(&id) else {
            return Ok(None);
        };
        if offer.status != from {
            return Ok(None);
        }
        offer.status = change.to;
        if change.counter_amount.is_some() {
            offer.counter_amount = change.counter_amount;
            offer.counter_message = change.counter_message;
        }
        if change.responded_at.is_some() && offer.responded_at.is_none() {
            offer.responded_at = change.responded_at;
        }
        Ok(Some(offer.clone()))
    }

    async fn expire_due(&self, now: DateTime<Utc>) -> Result<u64> {
        let mut inner = self.inner.lock().unwrap();
        let mut changed = 0;
        for offer in inner.offers.values_mut() {
            if !offer.status.is_terminal() && offer.is_expired_at(now) {
                offer.status = OfferStatus::Expired;
                changed += 1;
            }
        }
        Ok(changed)
    }

    async fn offers_for_seller(
        &self,
        seller_id: UserId,
        page: PageRequest,
        status: Option<OfferStatus>,
    ) -> Result<Paginated<Offer>> {
        let inner = self.inner.lock().unwrap();
        let matches = inner
            .offers
            .values()
            .filter(|o| o.seller_id == seller_id && status.map_or(true, |s| o.status == s))
            .cloned()
            .collect();
        Ok(paginate(matches, page))
    }

    async fn offers_for_buyer(
        &self,
        buyer_id: UserId,
        page: PageRequest,
        status: Option<OfferStatus>,
    ) -> Result<Paginated<Offer>> {
        let inner = self.inner.lock().unwrap();
        let matches = inner
            .offers
            .values()
            .filter(|o| o.buyer_id == buyer_id && status.map_or(true, |s| o.status == s))
            .cloned()
            .collect();
        Ok(paginate(matches, page))
    }

    async fn pending_for_seller(&self, seller_id: UserId) -> Result<Vec<Offer>> {
        let inner = self.inner.lock().unwrap();
        let mut matches: Vec<Offer> = inner
            .offers
            .values()
            .filter(|o| o.seller_id == seller_id && o.status == OfferStatus::Pending)
            .cloned()
            .collect();
        newest_first(&mut matches);
        Ok(matches)
    }

    async fn countered_for_buyer(&self, buyer_id: UserId) -> Result<Vec<Offer>> {
        let inner = self.inner.lock().unwrap();
        let mut matches: Vec<Offer> = inner
            .offers
            .values()
            .filter(|o| o.buyer_id == buyer_id && o.status == OfferStatus::Countered)
            .cloned()
            .collect();
        newest_first(&mut matches);
        Ok(matches)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn new_offer(listing_id: ListingId, buyer_id: UserId) -> NewOffer {
        NewOffer {
            listing_id,
            buyer_id,
            seller_id: 3,
            offer_amount: dec!(15),
            message: None,
            expires_at: None,
        }
    }

    #[tokio::test]
    async fn transition_guard_rejects_stale_status() {
        let store = MemoryOfferStore::new();
        let offer = store.insert_offer(new_offer(10, 2)).await.unwrap();

        let first = store
            .transition_offer(
                offer.id,
                OfferStatus::Pending,
                OfferTransition::respond(OfferStatus::Accepted, Utc::now()),
            )
            .await
            .unwrap();
        assert!(first.is_some());

        let second = store
            .transition_offer(
                offer.id,
                OfferStatus::Pending,
                OfferTransition::respond(OfferStatus::Rejected, Utc::now()),
            )
            .await
            .unwrap();
        assert!(second.is_none());
    }

    #[tokio::test]
    async fn responded_at_is_set_only_once() {
        let store = MemoryOfferStore::new();
        let offer = store.insert_offer(new_offer(10, 2)).await.unwrap();

        let first_response = Utc::now();
        store
            .transition_offer(
                offer.id,
                OfferStatus::Pending,
                OfferTransition {
                    to: OfferStatus::Countered,
                    counter_amount: Some(dec!(18)),
                    counter_message: None,
                    responded_at: Some(first_response),
                },
            )
            .await
            .unwrap();

        let resolved = store
            .transition_offer(
                offer.id,
                OfferStatus::Countered,
                OfferTransition::respond(OfferStatus::Accepted, Utc::now()),
            )
            .await
            .unwrap()
            .unwrap();
        assert_eq!(resolved.responded_at, Some(first_response));
        assert_eq!(resolved.counter_amount, Some(dec!(18)));
    }

    #[tokio::test]
    async fn stock_decrement_is_conditional() {
        let store = MemoryListingStore::new();
        store.insert(Listing {
            id: 1,
            seller_id: 3,
            price_type: verdant_types::PriceType::Fixed,
            fixed_price: Some(dec!(10)),
            offer_min_price: None,
            accepts_offers: false,
            quantity: 2,
            status: ListingStatus::Active,
            created_at: Utc::now(),
        });

        assert_eq!(store.decrement_stock(1, 5).await.unwrap(), None);
        assert_eq!(store.decrement_stock(1, 2).await.unwrap(), Some(0));
        // Sold out: further decrements fail, status flipped.
        assert_eq!(store.decrement_stock(1, 1).await.unwrap(), None);
        assert_eq!(store.get(1).unwrap().status, ListingStatus::Sold);
    }
}
