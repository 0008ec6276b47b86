//! Verdant Offers - price negotiation between buyers and sellers
//!
//! An offer is a buyer's proposed unit price for a listing. The seller may
//! accept, reject or counter it; a counter goes back to the buyer, who
//! accepts or rejects in turn. Offers carry a validity deadline and expire
//! lazily at the boundary of every state-changing call, so correctness
//! never depends on a background sweeper.
//!
//! State machine (B = buyer, S = seller):
//!
//! ```text
//!            create (B)
//!                |
//!             pending --accept (S)--------> accepted
//!                |    \--reject (S)-------> rejected
//!                |     \--counter (S)-----> countered
//!                |                             |
//!                |        respond (B, accept)--+--> accepted
//!                |        respond (B, reject)--+--> rejected
//!                \-- deadline passed ----> expired <---/
//! ```
//!
//! Every transition is a status-guarded conditional write; when two calls
//! race, exactly one wins and the loser observes `InvalidState`.

pub mod engine;
pub mod memory;

pub use engine::{
    CounterAction, OfferEngine, OfferPolicySource, PendingActions, StaticOfferPolicy,
    DEFAULT_OFFER_VALIDITY_DAYS, KEY_OFFER_EXPIRATION_DAYS,
};
pub use memory::{MemoryListingStore, MemoryOfferStore};
