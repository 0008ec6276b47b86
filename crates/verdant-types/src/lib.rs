//! Verdant Types - Canonical domain types for the marketplace engine
//!
//! This crate contains the foundational types for the offer negotiation and
//! fee-settlement engine, with zero dependencies on other verdant crates:
//!
//! - Numeric identity aliases (users, listings, offers, transactions)
//! - Listing, offer and transaction entities with closed status enums
//! - The shared error taxonomy with stable machine-readable kinds
//! - Pagination types for list queries
//! - Async storage traits the engines are written against
//! - Lifecycle events consumed by the notification dispatcher
//!
//! # Architectural Invariants
//!
//! 1. Statuses are closed enums; illegal transitions are rejected at the
//!    type boundary, never by ad-hoc string comparison
//! 2. Terminal states (`accepted`/`rejected`/`expired`,
//!    `completed`/`cancelled`/`refunded`) are never left again
//! 3. Every state-changing write is conditional on the current status

pub mod error;
pub mod event;
pub mod listing;
pub mod offer;
pub mod page;
pub mod store;
pub mod transaction;

pub use error::*;
pub use event::*;
pub use listing::*;
pub use offer::*;
pub use page::*;
pub use store::*;
pub use transaction::*;

/// User identifier, assigned by the surrounding platform.
pub type UserId = i64;

/// Listing identifier.
pub type ListingId = i64;

/// Offer identifier.
pub type OfferId = i64;

/// Transaction identifier.
pub type TransactionId = i64;
