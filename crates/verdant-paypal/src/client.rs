//! PayPal REST client

use std::time::Duration;

use async_trait::async_trait;
use base64::Engine as _;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use verdant_settlement::{CreateOrderRequest, PaymentProvider, ProviderOrder, ProviderRefund};
use verdant_types::{MarketError, Result};

use crate::config::PayPalConfig;
use crate::types::{
    AmountBreakdown, AmountWithBreakdown, ApplicationContext, CaptureOutcome, CaptureResponse,
    MoneyValue, OrderCustomId, OrderRequest, OrderResponse, PurchaseUnit, RefundResponse,
    TokenResponse, VerifySignatureRequest, VerifySignatureResponse, WebhookHeaders, format_amount,
};

struct CachedToken {
    access_token: String,
    expires_at: DateTime<Utc>,
}

impl CachedToken {
    fn is_valid(&self, now: DateTime<Utc>) -> bool {
        self.expires_at > now
    }
}

/// Client for the PayPal Orders v2 API.
pub struct PayPalClient {
    config: PayPalConfig,
    http: reqwest::Client,
    token: Mutex<Option<CachedToken>>,
}

impl PayPalClient {
    pub fn new(config: PayPalConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| provider_error(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            config,
            http,
            token: Mutex::new(None),
        })
    }

    /// Access token for API calls, cached and refreshed one minute before
    /// the provider-reported expiry.
    async fn access_token(&self) -> Result<String> {
        let mut cache = self.token.lock().await;
        let now = Utc::now();
        if let Some(token) = cache.as_ref() {
            if token.is_valid(now) {
                return Ok(token.access_token.clone());
            }
        }

        let auth = base64::engine::general_purpose::STANDARD.encode(format!(
            "{}:{}",
            self.config.client_id, self.config.client_secret
        ));
        let response = self
            .http
            .post(format!("{}/v1/oauth2/token", self.config.api_base))
            .header("Authorization", format!("Basic {auth}"))
            .header("Content-Type", "application/x-www-form-urlencoded")
            .body("grant_type=client_credentials")
            .send()
            .await
            .map_err(|e| provider_error(format!("token request failed: {e}")))?;

        let token: TokenResponse = Self::parse("authentication", response).await?;
        let access_token = token.access_token.clone();
        *cache = Some(CachedToken {
            access_token: token.access_token,
            expires_at: now + chrono::Duration::seconds((token.expires_in - 60).max(0)),
        });
        debug!("provider access token refreshed");
        Ok(access_token)
    }

    /// Capture an approved order. Returns the provider's capture reference
    /// that settlement finalization is keyed on.
    pub async fn capture_order(&self, order_id: &str) -> Result<CaptureOutcome> {
        let token = self.access_token().await?;
        let response = self
            .http
            .post(format!(
                "{}/v2/checkout/orders/{order_id}/capture",
                self.config.api_base
            ))
            .bearer_auth(token)
            .header("Content-Type", "application/json")
            .json(&serde_json::json!({}))
            .send()
            .await
            .map_err(|e| provider_error(format!("capture request failed: {e}")))?;

        let capture: CaptureResponse = Self::parse("capture", response).await?;
        let capture_id = capture
            .purchase_units
            .iter()
            .filter_map(|u| u.payments.as_ref())
            .flat_map(|p| p.captures.iter())
            .next()
            .map(|c| c.id.clone())
            .ok_or_else(|| provider_error("capture response carried no capture id".to_string()))?;

        Ok(CaptureOutcome {
            order_id: capture.id,
            capture_id,
            status: capture.status,
        })
    }

    /// Check a webhook delivery against the provider's verification
    /// endpoint. Events that do not verify must be dropped by the caller.
    pub async fn verify_webhook_signature(
        &self,
        headers: &WebhookHeaders,
        event_body: &serde_json::Value,
    ) -> Result<bool> {
        let token = self.access_token().await?;
        let request = VerifySignatureRequest {
            transmission_id: headers.transmission_id.clone(),
            transmission_time: headers.transmission_time.clone(),
            cert_url: headers.cert_url.clone(),
            auth_algo: headers.auth_algo.clone(),
            transmission_sig: headers.transmission_sig.clone(),
            webhook_id: self.config.webhook_id.clone(),
            webhook_event: event_body.clone(),
        };

        let response = self
            .http
            .post(format!(
                "{}/v1/notifications/verify-webhook-signature",
                self.config.api_base
            ))
            .bearer_auth(token)
            .json(&request)
            .send()
            .await
            .map_err(|e| provider_error(format!("signature verification failed: {e}")))?;

        let verdict: VerifySignatureResponse = Self::parse("signature verification", response).await?;
        let verified = verdict.verification_status == "SUCCESS";
        if !verified {
            warn!(
                status = %verdict.verification_status,
                "webhook signature did not verify"
            );
        }
        Ok(verified)
    }

    async fn parse<T: serde::de::DeserializeOwned>(
        what: &str,
        response: reqwest::Response,
    ) -> Result<T> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(provider_error(format!("{what} returned {status}: {body}")));
        }
        response
            .json::<T>()
            .await
            .map_err(|e| provider_error(format!("{what} response did not parse: {e}")))
    }
}

#[async_trait]
impl PaymentProvider for PayPalClient {
    async fn create_order(&self, request: CreateOrderRequest) -> Result<ProviderOrder> {
        let token = self.access_token().await?;
        let custom_id = OrderCustomId {
            listing_id: request.listing_id,
            buyer_id: request.buyer_id,
            seller_id: request.seller_id,
            quantity: request.quantity,
        };
        let payload = OrderRequest {
            intent: "CAPTURE".to_string(),
            purchase_units: vec![PurchaseUnit {
                reference_id: format!("listing-{}", request.listing_id),
                amount: AmountWithBreakdown {
                    currency_code: self.config.currency.clone(),
                    value: format_amount(request.amount),
                    breakdown: AmountBreakdown {
                        item_total: MoneyValue::new(&self.config.currency, request.amount),
                    },
                },
                description: request.description,
                custom_id: serde_json::to_string(&custom_id)
                    .map_err(|e| provider_error(format!("custom id did not encode: {e}")))?,
            }],
            application_context: ApplicationContext {
                brand_name: self.config.brand_name.clone(),
                locale: "de-DE".to_string(),
                user_action: "PAY_NOW".to_string(),
                return_url: self.config.return_url.clone(),
                cancel_url: self.config.cancel_url.clone(),
            },
        };

        let response = self
            .http
            .post(format!("{}/v2/checkout/orders", self.config.api_base))
            .bearer_auth(token)
            .json(&payload)
            .send()
            .await
            .map_err(|e| provider_error(format!("order creation failed: {e}")))?;

        let order: OrderResponse = Self::parse("order creation", response).await?;
        debug!(order_id = %order.id, "provider order created");
        Ok(ProviderOrder {
            approve_url: order.approve_url(),
            order_id: order.id,
        })
    }

    async fn refund_capture(&self, capture_id: &str, amount: Decimal) -> Result<ProviderRefund> {
        let token = self.access_token().await?;
        let response = self
            .http
            .post(format!(
                "{}/v2/payments/captures/{capture_id}/refund",
                self.config.api_base
            ))
            .bearer_auth(token)
            .json(&serde_json::json!({
                "amount": {
                    "currency_code": self.config.currency,
                    "value": format_amount(amount),
                }
            }))
            .send()
            .await
            .map_err(|e| provider_error(format!("refund failed: {e}")))?;

        let refund: RefundResponse = Self::parse("refund", response).await?;
        Ok(ProviderRefund {
            refund_id: refund.id,
        })
    }
}

fn provider_error(message: String) -> MarketError {
    MarketError::Provider {
        message,
        transaction_id: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;

    #[test]
    fn token_cache_expiry() {
        let now = Utc::now();
        let token = CachedToken {
            access_token: "t".into(),
            expires_at: now + ChronoDuration::seconds(30),
        };
        assert!(token.is_valid(now));
        assert!(!token.is_valid(now + ChronoDuration::seconds(31)));
    }

    #[test]
    fn client_builds_from_default_config() {
        assert!(PayPalClient::new(PayPalConfig::default()).is_ok());
    }
}
