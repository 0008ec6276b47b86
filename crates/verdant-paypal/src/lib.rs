//! Verdant PayPal - REST client for the external payment capability
//!
//! Implements the narrow create/capture/refund contract the settlement
//! engine depends on, against the PayPal Orders v2 API:
//!
//! - OAuth2 client-credentials token, cached and refreshed 60 s early
//! - `POST /v2/checkout/orders` with intent CAPTURE
//! - `POST /v2/checkout/orders/{id}/capture`
//! - `POST /v2/payments/captures/{id}/refund`
//! - `POST /v1/notifications/verify-webhook-signature`
//!
//! All calls are bounded by the client timeout; failures surface as
//! `MarketError::Provider` and never panic.

pub mod client;
pub mod config;
pub mod types;

pub use client::PayPalClient;
pub use config::PayPalConfig;
pub use types::{CaptureOutcome, WebhookHeaders};
