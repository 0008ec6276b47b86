//! Wire types for the PayPal Orders v2 API

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

/// PayPal encodes money as a string with the currency's minor digits.
pub fn format_amount(amount: Decimal) -> String {
    format!(
        "{:.2}",
        amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
    )
}

#[derive(Debug, Serialize)]
pub struct MoneyValue {
    pub currency_code: String,
    pub value: String,
}

impl MoneyValue {
    pub fn new(currency: &str, amount: Decimal) -> Self {
        Self {
            currency_code: currency.to_string(),
            value: format_amount(amount),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct AmountWithBreakdown {
    pub currency_code: String,
    pub value: String,
    pub breakdown: AmountBreakdown,
}

#[derive(Debug, Serialize)]
pub struct AmountBreakdown {
    pub item_total: MoneyValue,
}

#[derive(Debug, Serialize)]
pub struct PurchaseUnit {
    pub reference_id: String,
    pub amount: AmountWithBreakdown,
    pub description: String,
    pub custom_id: String,
}

#[derive(Debug, Serialize)]
pub struct ApplicationContext {
    pub brand_name: String,
    pub locale: String,
    pub user_action: String,
    pub return_url: String,
    pub cancel_url: String,
}

#[derive(Debug, Serialize)]
pub struct OrderRequest {
    pub intent: String,
    pub purchase_units: Vec<PurchaseUnit>,
    pub application_context: ApplicationContext,
}

/// Parties referenced in the `custom_id` payload, echoed back on capture.
#[derive(Debug, Serialize, Deserialize)]
pub struct OrderCustomId {
    pub listing_id: i64,
    pub buyer_id: i64,
    pub seller_id: i64,
    pub quantity: i64,
}

#[derive(Debug, Deserialize)]
pub struct OrderResponse {
    pub id: String,
    #[serde(default)]
    pub links: Vec<Link>,
}

impl OrderResponse {
    /// The redirect the buyer approves the payment at.
    pub fn approve_url(&self) -> Option<String> {
        self.links
            .iter()
            .find(|l| l.rel == "approve")
            .map(|l| l.href.clone())
    }
}

#[derive(Debug, Deserialize)]
pub struct Link {
    pub href: String,
    pub rel: String,
}

#[derive(Debug, Deserialize)]
pub struct CaptureResponse {
    pub id: String,
    pub status: String,
    #[serde(default)]
    pub purchase_units: Vec<CapturedPurchaseUnit>,
}

#[derive(Debug, Deserialize)]
pub struct CapturedPurchaseUnit {
    pub payments: Option<CapturedPayments>,
}

#[derive(Debug, Deserialize)]
pub struct CapturedPayments {
    #[serde(default)]
    pub captures: Vec<Capture>,
}

#[derive(Debug, Deserialize)]
pub struct Capture {
    pub id: String,
    pub status: String,
}

/// A completed provider capture, as the settlement engine consumes it.
#[derive(Debug, Clone)]
pub struct CaptureOutcome {
    pub order_id: String,
    pub capture_id: String,
    pub status: String,
}

#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub expires_in: i64,
}

#[derive(Debug, Deserialize)]
pub struct RefundResponse {
    pub id: String,
    pub status: String,
}

/// Transmission headers PayPal sends with each webhook delivery.
#[derive(Debug, Clone)]
pub struct WebhookHeaders {
    pub transmission_id: String,
    pub transmission_time: String,
    pub cert_url: String,
    pub auth_algo: String,
    pub transmission_sig: String,
}

#[derive(Debug, Serialize)]
pub struct VerifySignatureRequest {
    pub transmission_id: String,
    pub transmission_time: String,
    pub cert_url: String,
    pub auth_algo: String,
    pub transmission_sig: String,
    pub webhook_id: String,
    pub webhook_event: serde_json::Value,
}

#[derive(Debug, Deserialize)]
pub struct VerifySignatureResponse {
    pub verification_status: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn amounts_carry_two_minor_digits() {
        assert_eq!(format_amount(dec!(21.83)), "21.83");
        assert_eq!(format_amount(dec!(20)), "20.00");
        assert_eq!(format_amount(dec!(0.988)), "0.99");
    }

    #[test]
    fn approve_url_comes_from_the_approve_link() {
        let json = r#"{
            "id": "5O190127TN364715T",
            "status": "CREATED",
            "links": [
                {"href": "https://api.sandbox.paypal.com/v2/checkout/orders/5O190127TN364715T", "rel": "self", "method": "GET"},
                {"href": "https://www.sandbox.paypal.com/checkoutnow?token=5O190127TN364715T", "rel": "approve", "method": "GET"}
            ]
        }"#;
        let order: OrderResponse = serde_json::from_str(json).unwrap();
        assert_eq!(order.id, "5O190127TN364715T");
        assert_eq!(
            order.approve_url().as_deref(),
            Some("https://www.sandbox.paypal.com/checkoutnow?token=5O190127TN364715T")
        );
    }

    #[test]
    fn capture_id_is_nested_in_purchase_units() {
        let json = r#"{
            "id": "5O190127TN364715T",
            "status": "COMPLETED",
            "purchase_units": [
                {"payments": {"captures": [{"id": "3C679366HH908993F", "status": "COMPLETED"}]}}
            ]
        }"#;
        let capture: CaptureResponse = serde_json::from_str(json).unwrap();
        let first = capture.purchase_units[0]
            .payments
            .as_ref()
            .unwrap()
            .captures
            .first()
            .unwrap();
        assert_eq!(first.id, "3C679366HH908993F");
    }
}
