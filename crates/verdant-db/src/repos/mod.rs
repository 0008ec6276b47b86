//! Repository implementations

mod listing;
mod offer;
mod settings;
mod transaction;

pub use listing::ListingRepo;
pub use offer::OfferRepo;
pub use settings::SettingsRepo;
pub use transaction::TransactionRepo;
