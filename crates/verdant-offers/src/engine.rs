//! Offer negotiation engine

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use verdant_types::{
    EventSink, ListingId, ListingStore, MarketError, MarketEvent, NewOffer, Offer, OfferId,
    OfferStatus, OfferStore, OfferTransition, PageRequest, Paginated, Result, UserId,
};

/// Settings key for the offer validity window, in days.
pub const KEY_OFFER_EXPIRATION_DAYS: &str = "offer_expiration_days";

/// Fallback validity window when the settings store has no value.
pub const DEFAULT_OFFER_VALIDITY_DAYS: i64 = 7;

/// Where the negotiation policy comes from, typically the settings store.
#[async_trait]
pub trait OfferPolicySource: Send + Sync {
    /// Validity window applied to newly created offers.
    async fn offer_validity(&self) -> Result<Duration>;
}

/// Fixed policy for tests and tools without a settings store.
pub struct StaticOfferPolicy {
    pub validity: Duration,
}

impl Default for StaticOfferPolicy {
    fn default() -> Self {
        Self {
            validity: Duration::days(DEFAULT_OFFER_VALIDITY_DAYS),
        }
    }
}

#[async_trait]
impl OfferPolicySource for StaticOfferPolicy {
    async fn offer_validity(&self) -> Result<Duration> {
        Ok(self.validity)
    }
}

/// The buyer's answer to a counter-offer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CounterAction {
    Accept,
    Reject,
}

/// Offers requiring a party's action right now.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingActions {
    /// `pending` offers where the user is the seller.
    pub seller: Vec<Offer>,
    /// `countered` offers where the user is the buyer.
    pub buyer: Vec<Offer>,
}

/// Maximum length of buyer and seller free-text messages.
const MESSAGE_MAX: usize = 500;

/// The offer negotiation state machine.
pub struct OfferEngine {
    offers: Arc<dyn OfferStore>,
    listings: Arc<dyn ListingStore>,
    policy: Arc<dyn OfferPolicySource>,
    events: Arc<dyn EventSink>,
}

impl OfferEngine {
    pub fn new(
        offers: Arc<dyn OfferStore>,
        listings: Arc<dyn ListingStore>,
        policy: Arc<dyn OfferPolicySource>,
        events: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            offers,
            listings,
            policy,
            events,
        }
    }

    /// Buyer proposes a price for a listing.
    pub async fn create(
        &self,
        buyer_id: UserId,
        listing_id: ListingId,
        offer_amount: Decimal,
        message: Option<String>,
    ) -> Result<Offer> {
        if offer_amount <= Decimal::ZERO {
            return Err(MarketError::InvalidInput(format!(
                "offer amount must be positive, got {offer_amount}"
            )));
        }
        validate_message(&message)?;

        let listing = self
            .listings
            .get_listing(listing_id)
            .await?
            .ok_or_else(|| MarketError::NotFound(format!("listing {listing_id}")))?;

        if listing.seller_id == buyer_id {
            return Err(MarketError::InvalidInput(
                "cannot make an offer on your own listing".into(),
            ));
        }
        if !listing.is_purchasable() {
            return Err(MarketError::InvalidInput(format!(
                "listing {listing_id} is not available"
            )));
        }
        if !listing.is_negotiable() {
            return Err(MarketError::InvalidInput(format!(
                "listing {listing_id} does not accept offers"
            )));
        }
        if let Some(min) = listing.offer_min_price {
            if offer_amount < min {
                return Err(MarketError::InvalidInput(format!(
                    "offer {offer_amount} is below the minimum price {min}"
                )));
            }
        }

        let validity = match self.policy.offer_validity().await {
            Ok(v) => v,
            Err(e) => {
                warn!(error = %e, "offer validity unavailable, using default window");
                Duration::days(DEFAULT_OFFER_VALIDITY_DAYS)
            }
        };

        let offer = self
            .offers
            .insert_offer(NewOffer {
                listing_id,
                buyer_id,
                seller_id: listing.seller_id,
                offer_amount,
                message,
                expires_at: Some(Utc::now() + validity),
            })
            .await?;

        info!(
            offer_id = offer.id,
            listing_id, buyer_id, %offer_amount,
            "offer created"
        );
        self.events.dispatch(MarketEvent::OfferReceived {
            offer: offer.clone(),
        });
        Ok(offer)
    }

    /// Seller accepts a pending offer. The returned offer's
    /// [`Offer::effective_amount`] is the price settlement charges.
    pub async fn accept(&self, seller_id: UserId, offer_id: OfferId) -> Result<Offer> {
        let offer = self.load_actionable(offer_id).await?;
        require_seller(&offer, seller_id)?;
        require_status(&offer, OfferStatus::Pending)?;

        let updated = self
            .transition(offer_id, OfferStatus::Pending, OfferStatus::Accepted)
            .await?;
        info!(offer_id, seller_id, "offer accepted");
        self.events.dispatch(MarketEvent::OfferAccepted {
            offer: updated.clone(),
        });
        Ok(updated)
    }

    /// Seller rejects a pending offer.
    pub async fn reject(&self, seller_id: UserId, offer_id: OfferId) -> Result<Offer> {
        let offer = self.load_actionable(offer_id).await?;
        require_seller(&offer, seller_id)?;
        require_status(&offer, OfferStatus::Pending)?;

        let updated = self
            .transition(offer_id, OfferStatus::Pending, OfferStatus::Rejected)
            .await?;
        info!(offer_id, seller_id, "offer rejected");
        self.events.dispatch(MarketEvent::OfferRejected {
            offer: updated.clone(),
        });
        Ok(updated)
    }

    /// Seller proposes an alternative price on a pending offer.
    pub async fn counter(
        &self,
        seller_id: UserId,
        offer_id: OfferId,
        counter_amount: Decimal,
        counter_message: Option<String>,
    ) -> Result<Offer> {
        validate_message(&counter_message)?;
        let offer = self.load_actionable(offer_id).await?;
        require_seller(&offer, seller_id)?;
        require_status(&offer, OfferStatus::Pending)?;

        if counter_amount <= offer.offer_amount {
            return Err(MarketError::InvalidInput(format!(
                "counter {counter_amount} must exceed the original offer {}",
                offer.offer_amount
            )));
        }

        let updated = self
            .offers
            .transition_offer(
                offer_id,
                OfferStatus::Pending,
                OfferTransition {
                    to: OfferStatus::Countered,
                    counter_amount: Some(counter_amount),
                    counter_message,
                    responded_at: Some(Utc::now()),
                },
            )
            .await?
            .ok_or_else(|| invalid_state(offer_id, OfferStatus::Pending))?;

        info!(offer_id, seller_id, %counter_amount, "offer countered");
        self.events.dispatch(MarketEvent::OfferCountered {
            offer: updated.clone(),
        });
        Ok(updated)
    }

    /// Buyer answers a counter-offer. An acceptance settles at the counter
    /// amount.
    pub async fn respond_to_counter(
        &self,
        buyer_id: UserId,
        offer_id: OfferId,
        action: CounterAction,
    ) -> Result<Offer> {
        let offer = self.load_actionable(offer_id).await?;
        if offer.buyer_id != buyer_id {
            return Err(MarketError::Unauthorized(format!(
                "user {buyer_id} is not the buyer of offer {offer_id}"
            )));
        }
        require_status(&offer, OfferStatus::Countered)?;

        let to = match action {
            CounterAction::Accept => OfferStatus::Accepted,
            CounterAction::Reject => OfferStatus::Rejected,
        };
        let updated = self.transition(offer_id, OfferStatus::Countered, to).await?;

        info!(offer_id, buyer_id, action = ?action, "counter answered");
        let event = match action {
            CounterAction::Accept => MarketEvent::OfferAccepted {
                offer: updated.clone(),
            },
            CounterAction::Reject => MarketEvent::OfferRejected {
                offer: updated.clone(),
            },
        };
        self.events.dispatch(event);
        Ok(updated)
    }

    /// Read an offer; only its buyer or seller may.
    pub async fn get(&self, actor_id: UserId, offer_id: OfferId) -> Result<Offer> {
        let offer = self
            .offers
            .get_offer(offer_id)
            .await?
            .ok_or_else(|| MarketError::NotFound(format!("offer {offer_id}")))?;
        if offer.buyer_id != actor_id && offer.seller_id != actor_id {
            return Err(MarketError::Unauthorized(format!(
                "user {actor_id} has no access to offer {offer_id}"
            )));
        }
        Ok(offer)
    }

    /// Offers received by a seller, newest first.
    pub async fn incoming(
        &self,
        seller_id: UserId,
        page: PageRequest,
        status: Option<OfferStatus>,
    ) -> Result<Paginated<Offer>> {
        self.offers.expire_due(Utc::now()).await?;
        self.offers
            .offers_for_seller(seller_id, page.clamped(), status)
            .await
    }

    /// Offers placed by a buyer, newest first.
    pub async fn outgoing(
        &self,
        buyer_id: UserId,
        page: PageRequest,
        status: Option<OfferStatus>,
    ) -> Result<Paginated<Offer>> {
        self.offers.expire_due(Utc::now()).await?;
        self.offers
            .offers_for_buyer(buyer_id, page.clamped(), status)
            .await
    }

    /// Everything awaiting this user's action: pending offers they must
    /// answer as seller, counters they must answer as buyer.
    pub async fn pending_actions(&self, user_id: UserId) -> Result<PendingActions> {
        self.offers.expire_due(Utc::now()).await?;
        Ok(PendingActions {
            seller: self.offers.pending_for_seller(user_id).await?,
            buyer: self.offers.countered_for_buyer(user_id).await?,
        })
    }

    /// Sweep overdue offers to `expired`.
    pub async fn expire_due(&self) -> Result<u64> {
        self.offers.expire_due(Utc::now()).await
    }

    /// Load an offer and enforce its deadline at the call boundary. A
    /// non-terminal offer past its deadline is flipped to `expired` as a
    /// side effect of the failed call.
    async fn load_actionable(&self, offer_id: OfferId) -> Result<Offer> {
        let offer = self
            .offers
            .get_offer(offer_id)
            .await?
            .ok_or_else(|| MarketError::NotFound(format!("offer {offer_id}")))?;

        let now = Utc::now();
        if !offer.status.is_terminal() && offer.is_expired_at(now) {
            // Guarded flip: a racing transition may already have resolved
            // the offer, in which case the stored state wins.
            let _ = self
                .offers
                .transition_offer(
                    offer_id,
                    offer.status,
                    OfferTransition {
                        to: OfferStatus::Expired,
                        counter_amount: None,
                        counter_message: None,
                        responded_at: None,
                    },
                )
                .await?;
            return Err(MarketError::Expired {
                offer_id,
                expired_at: offer
                    .expires_at
                    .map(|t| t.to_rfc3339())
                    .unwrap_or_default(),
            });
        }
        Ok(offer)
    }

    async fn transition(
        &self,
        offer_id: OfferId,
        from: OfferStatus,
        to: OfferStatus,
    ) -> Result<Offer> {
        self.offers
            .transition_offer(offer_id, from, OfferTransition::respond(to, Utc::now()))
            .await?
            .ok_or_else(|| invalid_state(offer_id, from))
    }
}

fn validate_message(message: &Option<String>) -> Result<()> {
    if let Some(m) = message {
        if m.chars().count() > MESSAGE_MAX {
            return Err(MarketError::InvalidInput(format!(
                "message exceeds {MESSAGE_MAX} characters"
            )));
        }
    }
    Ok(())
}

fn require_seller(offer: &Offer, seller_id: UserId) -> Result<()> {
    if offer.seller_id != seller_id {
        return Err(MarketError::Unauthorized(format!(
            "user {seller_id} is not the seller of offer {}",
            offer.id
        )));
    }
    Ok(())
}

fn require_status(offer: &Offer, expected: OfferStatus) -> Result<()> {
    if offer.status != expected {
        return Err(MarketError::InvalidState(format!(
            "offer {} is {}, expected {}",
            offer.id,
            offer.status.as_str(),
            expected.as_str()
        )));
    }
    Ok(())
}

fn invalid_state(offer_id: OfferId, expected: OfferStatus) -> MarketError {
    MarketError::InvalidState(format!(
        "offer {offer_id} is no longer {}",
        expected.as_str()
    ))
}
