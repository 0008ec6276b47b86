//! Shared application state

use std::sync::Arc;

use verdant_db::SettingsRepo;
use verdant_fees::FeeConfigProvider;
use verdant_offers::OfferEngine;
use verdant_paypal::PayPalClient;
use verdant_settlement::SettlementEngine;

pub struct AppState {
    pub offers: Arc<OfferEngine>,
    pub settlement: Arc<SettlementEngine>,
    pub paypal: Arc<PayPalClient>,
    pub fees: Arc<FeeConfigProvider>,
    pub settings: Arc<SettingsRepo>,
}
