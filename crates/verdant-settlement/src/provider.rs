//! Payment provider contract
//!
//! The engine talks to the payment processor through this narrow
//! create/refund seam. Capture confirmation arrives from the provider's
//! side as a webhook, so there is no capture call here.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use rust_decimal::Decimal;

use verdant_types::{ListingId, MarketError, Result, UserId};

/// What the engine needs to open an order with the provider.
#[derive(Debug, Clone)]
pub struct CreateOrderRequest {
    /// Fee-inclusive charge total.
    pub amount: Decimal,
    pub description: String,
    pub listing_id: ListingId,
    pub buyer_id: UserId,
    pub seller_id: UserId,
    pub quantity: i64,
}

/// A provider order awaiting buyer approval and capture.
#[derive(Debug, Clone)]
pub struct ProviderOrder {
    pub order_id: String,
    /// Where the buyer approves the payment, if the provider uses redirects.
    pub approve_url: Option<String>,
}

/// A completed refund.
#[derive(Debug, Clone)]
pub struct ProviderRefund {
    pub refund_id: String,
}

/// External payment capability: create an order, refund a capture.
#[async_trait]
pub trait PaymentProvider: Send + Sync {
    async fn create_order(&self, request: CreateOrderRequest) -> Result<ProviderOrder>;

    async fn refund_capture(&self, capture_id: &str, amount: Decimal) -> Result<ProviderRefund>;
}

/// Deterministic in-process provider for tests and demos.
#[derive(Default)]
pub struct MockProvider {
    next_order: AtomicU64,
    next_refund: AtomicU64,
    fail_orders: AtomicBool,
    hang_orders: AtomicBool,
    refunds: Mutex<Vec<(String, Decimal)>>,
}

impl MockProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent `create_order` calls fail.
    pub fn fail_orders(&self, fail: bool) {
        self.fail_orders.store(fail, Ordering::SeqCst);
    }

    /// Make subsequent `create_order` calls hang past any sane timeout.
    pub fn hang_orders(&self, hang: bool) {
        self.hang_orders.store(hang, Ordering::SeqCst);
    }

    /// Refunds issued so far, in call order.
    pub fn refunds(&self) -> Vec<(String, Decimal)> {
        self.refunds.lock().unwrap().clone()
    }
}

#[async_trait]
impl PaymentProvider for MockProvider {
    async fn create_order(&self, request: CreateOrderRequest) -> Result<ProviderOrder> {
        if self.hang_orders.load(Ordering::SeqCst) {
            tokio::time::sleep(std::time::Duration::from_secs(3600)).await;
        }
        if self.fail_orders.load(Ordering::SeqCst) {
            return Err(MarketError::Provider {
                message: "mock provider refused the order".into(),
                transaction_id: None,
            });
        }
        let n = self.next_order.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(ProviderOrder {
            order_id: format!("MOCK-ORDER-{n}"),
            approve_url: Some(format!(
                "https://provider.example/approve/MOCK-ORDER-{n}?listing={}",
                request.listing_id
            )),
        })
    }

    async fn refund_capture(&self, capture_id: &str, amount: Decimal) -> Result<ProviderRefund> {
        let n = self.next_refund.fetch_add(1, Ordering::SeqCst) + 1;
        self.refunds
            .lock()
            .unwrap()
            .push((capture_id.to_string(), amount));
        Ok(ProviderRefund {
            refund_id: format!("MOCK-REFUND-{n}"),
        })
    }
}
