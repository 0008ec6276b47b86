//! Verdant Settlement - turning accepted deals into captured charges
//!
//! The settlement engine consumes an accepted offer (or a direct fixed-price
//! purchase), computes the fee-inclusive total from one pinned fee snapshot,
//! creates an order with the external payment provider, and later reconciles
//! the provider's capture callback into a finalized transaction record.
//!
//! Finalization is idempotent by construction: it is keyed on the provider
//! order id and guarded by a conditional status write, so duplicate or
//! out-of-order webhook deliveries are detected before any side effect.
//! Inventory is decremented exactly once, at finalization.

pub mod engine;
pub mod memory;
pub mod provider;

pub use engine::{InitiatedSettlement, SettlementEngine, SettlementSource};
pub use memory::MemoryTransactionStore;
pub use provider::{CreateOrderRequest, MockProvider, PaymentProvider, ProviderOrder, ProviderRefund};
