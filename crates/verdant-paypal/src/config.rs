//! PayPal client configuration

use serde::{Deserialize, Serialize};

/// Sandbox API base, used unless the client is configured for live mode.
pub const SANDBOX_API_BASE: &str = "https://api.sandbox.paypal.com";

/// Live API base.
pub const LIVE_API_BASE: &str = "https://api.paypal.com";

/// PayPal client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PayPalConfig {
    /// API base URL (sandbox or live).
    pub api_base: String,
    pub client_id: String,
    pub client_secret: String,
    /// Webhook id registered with the provider, used for signature checks.
    pub webhook_id: String,
    /// Shop name shown on the provider's approval page.
    pub brand_name: String,
    /// Checkout currency.
    pub currency: String,
    /// Where the buyer lands after approving the payment.
    pub return_url: String,
    /// Where the buyer lands after aborting.
    pub cancel_url: String,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for PayPalConfig {
    fn default() -> Self {
        Self {
            api_base: SANDBOX_API_BASE.to_string(),
            client_id: String::new(),
            client_secret: String::new(),
            webhook_id: String::new(),
            brand_name: "Verdant".to_string(),
            currency: "EUR".to_string(),
            return_url: "http://localhost:3000/order/success".to_string(),
            cancel_url: "http://localhost:3000/order/cancel".to_string(),
            timeout_secs: 10,
        }
    }
}

impl PayPalConfig {
    /// Create config from environment variables. `PAYPAL_ENV=live` selects
    /// the live API base and the `_LIVE` credential pair; anything else
    /// runs against the sandbox.
    pub fn from_env() -> Self {
        let live = std::env::var("PAYPAL_ENV")
            .map(|v| v == "live")
            .unwrap_or(false);
        let (api_base, id_var, secret_var) = if live {
            (LIVE_API_BASE, "PAYPAL_CLIENT_ID_LIVE", "PAYPAL_CLIENT_SECRET_LIVE")
        } else {
            (
                SANDBOX_API_BASE,
                "PAYPAL_CLIENT_ID_SANDBOX",
                "PAYPAL_CLIENT_SECRET_SANDBOX",
            )
        };
        let app_url =
            std::env::var("APP_URL").unwrap_or_else(|_| "http://localhost:3000".to_string());

        Self {
            api_base: api_base.to_string(),
            client_id: std::env::var(id_var).unwrap_or_default(),
            client_secret: std::env::var(secret_var).unwrap_or_default(),
            webhook_id: std::env::var("PAYPAL_WEBHOOK_ID").unwrap_or_default(),
            brand_name: std::env::var("SHOP_BRAND_NAME").unwrap_or_else(|_| "Verdant".to_string()),
            currency: std::env::var("SHOP_CURRENCY").unwrap_or_else(|_| "EUR".to_string()),
            return_url: format!("{app_url}/order/success"),
            cancel_url: format!("{app_url}/order/cancel"),
            timeout_secs: std::env::var("PAYPAL_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(10),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_targets_the_sandbox() {
        let cfg = PayPalConfig::default();
        assert_eq!(cfg.api_base, SANDBOX_API_BASE);
        assert_eq!(cfg.currency, "EUR");
        assert_eq!(cfg.timeout_secs, 10);
    }
}
