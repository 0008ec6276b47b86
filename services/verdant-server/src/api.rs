//! RPC routes
//!
//! # Endpoints
//!
//! ## Offers
//! - `POST /api/v1/offers` - propose a price
//! - `POST /api/v1/offers/:id/accept` - seller accepts
//! - `POST /api/v1/offers/:id/reject` - seller rejects
//! - `POST /api/v1/offers/:id/counter` - seller counters
//! - `POST /api/v1/offers/:id/respond` - buyer answers a counter
//! - `GET  /api/v1/offers/incoming` - seller's received offers
//! - `GET  /api/v1/offers/mine` - buyer's placed offers
//! - `GET  /api/v1/offers/pending` - offers awaiting the caller
//! - `GET  /api/v1/offers/:id` - single offer (parties only)
//!
//! ## Settlement
//! - `POST /api/v1/transactions` - initiate a checkout
//! - `POST /api/v1/transactions/:id/cancel` - buyer abandons
//! - `POST /api/v1/transactions/:id/retry-order` - re-open a provider order
//! - `POST /api/v1/transactions/:id/refund` - admin refund
//! - `GET  /api/v1/transactions/purchases` / `/sales` - histories
//!
//! ## Provider callbacks & settings
//! - `POST /api/v1/paypal/capture` - buyer-approved capture
//! - `POST /api/v1/paypal/webhook` - signature-verified capture events
//! - `GET  /api/v1/settings/fees`, `PUT /api/v1/settings/:key`
//! - `GET  /health`

use std::sync::Arc;

use axum::extract::{FromRequestParts, Path, Query, State};
use axum::http::request::Parts;
use axum::http::HeaderMap;
use axum::response::Json;
use axum::routing::{get, post, put};
use axum::Router;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::warn;

use verdant_offers::{CounterAction, PendingActions};
use verdant_paypal::WebhookHeaders;
use verdant_settlement::{InitiatedSettlement, SettlementSource};
use verdant_types::{
    MarketError, Offer, OfferStatus, PageRequest, Paginated, PaymentMethod, Transaction, UserId,
};

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        // Offer negotiation
        .route("/api/v1/offers", post(create_offer))
        .route("/api/v1/offers/incoming", get(incoming_offers))
        .route("/api/v1/offers/mine", get(my_offers))
        .route("/api/v1/offers/pending", get(pending_offers))
        .route("/api/v1/offers/:id", get(get_offer))
        .route("/api/v1/offers/:id/accept", post(accept_offer))
        .route("/api/v1/offers/:id/reject", post(reject_offer))
        .route("/api/v1/offers/:id/counter", post(counter_offer))
        .route("/api/v1/offers/:id/respond", post(respond_to_counter))
        // Settlement
        .route("/api/v1/transactions", post(initiate_transaction))
        .route("/api/v1/transactions/purchases", get(purchases))
        .route("/api/v1/transactions/sales", get(sales))
        .route("/api/v1/transactions/:id/cancel", post(cancel_transaction))
        .route("/api/v1/transactions/:id/retry-order", post(retry_order))
        .route("/api/v1/transactions/:id/refund", post(refund_transaction))
        // Provider callbacks
        .route("/api/v1/paypal/capture", post(capture_order))
        .route("/api/v1/paypal/webhook", post(paypal_webhook))
        // Settings
        .route("/api/v1/settings/fees", get(fee_settings))
        .route("/api/v1/settings/:key", put(update_setting))
        // Health
        .route("/health", get(health))
        .with_state(state)
}

// ============================================================================
// Caller identity (injected by the upstream auth proxy)
// ============================================================================

#[derive(Debug, Clone, Copy)]
pub struct Caller {
    pub user_id: UserId,
    pub is_admin: bool,
}

impl Caller {
    fn require_admin(&self) -> ApiResult<()> {
        if !self.is_admin {
            return Err(MarketError::Unauthorized("administrators only".into()).into());
        }
        Ok(())
    }
}

#[axum::async_trait]
impl<S: Send + Sync> FromRequestParts<S> for Caller {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user_id = parts
            .headers
            .get("x-user-id")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<UserId>().ok())
            .ok_or_else(|| ApiError::unauthenticated("missing or invalid x-user-id header"))?;
        let is_admin = parts
            .headers
            .get("x-user-role")
            .and_then(|v| v.to_str().ok())
            .map(|r| r == "admin" || r == "super_admin")
            .unwrap_or(false);
        Ok(Caller { user_id, is_admin })
    }
}

// ============================================================================
// Wire types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    pub data: T,
}

fn ok<T: Serialize>(data: T) -> Json<ApiResponse<T>> {
    Json(ApiResponse {
        success: true,
        data,
    })
}

#[derive(Debug, Deserialize)]
pub struct CreateOfferRequest {
    pub listing_id: i64,
    pub offer_amount: Decimal,
    pub message: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
pub struct AcceptRequest {
    /// How the buyer will pay the settlement this acceptance starts.
    pub payment_method: Option<PaymentMethod>,
}

#[derive(Debug, Deserialize)]
pub struct CounterRequest {
    pub counter_amount: Decimal,
    pub counter_message: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RespondRequest {
    pub action: CounterAction,
    pub payment_method: Option<PaymentMethod>,
}

#[derive(Debug, Deserialize)]
pub struct OfferListQuery {
    pub page: Option<i64>,
    pub page_size: Option<i64>,
    pub status: Option<String>,
}

impl OfferListQuery {
    fn page_request(&self) -> PageRequest {
        PageRequest {
            page: self.page.unwrap_or(1),
            page_size: self.page_size.unwrap_or(verdant_types::DEFAULT_PAGE_SIZE),
        }
    }

    fn status_filter(&self) -> ApiResult<Option<OfferStatus>> {
        match &self.status {
            None => Ok(None),
            Some(raw) => OfferStatus::parse(raw)
                .map(Some)
                .ok_or_else(|| ApiError::bad_request(&format!("unknown offer status '{raw}'"))),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct InitiateRequest {
    pub listing_id: i64,
    pub quantity: i64,
    pub payment_method: PaymentMethod,
    /// Present when checking out an accepted negotiation.
    pub offer_id: Option<i64>,
}

#[derive(Debug, Deserialize, Default)]
pub struct RefundRequest {
    #[serde(default)]
    pub include_processor_fee: bool,
}

#[derive(Debug, Deserialize)]
pub struct CaptureRequest {
    pub order_id: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateSettingRequest {
    pub value: String,
}

// ============================================================================
// Offer handlers
// ============================================================================

async fn create_offer(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Json(req): Json<CreateOfferRequest>,
) -> ApiResult<Json<ApiResponse<Offer>>> {
    let offer = state
        .offers
        .create(caller.user_id, req.listing_id, req.offer_amount, req.message)
        .await?;
    Ok(ok(offer))
}

async fn accept_offer(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path(offer_id): Path<i64>,
    req: Option<Json<AcceptRequest>>,
) -> ApiResult<Json<ApiResponse<Offer>>> {
    let offer = state.offers.accept(caller.user_id, offer_id).await?;
    let method = req
        .and_then(|Json(r)| r.payment_method)
        .unwrap_or(PaymentMethod::Paypal);
    enqueue_settlement(&state, offer.clone(), method);
    Ok(ok(offer))
}

async fn reject_offer(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path(offer_id): Path<i64>,
) -> ApiResult<Json<ApiResponse<Offer>>> {
    let offer = state.offers.reject(caller.user_id, offer_id).await?;
    Ok(ok(offer))
}

async fn counter_offer(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path(offer_id): Path<i64>,
    Json(req): Json<CounterRequest>,
) -> ApiResult<Json<ApiResponse<Offer>>> {
    let offer = state
        .offers
        .counter(caller.user_id, offer_id, req.counter_amount, req.counter_message)
        .await?;
    Ok(ok(offer))
}

async fn respond_to_counter(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path(offer_id): Path<i64>,
    Json(req): Json<RespondRequest>,
) -> ApiResult<Json<ApiResponse<Offer>>> {
    let offer = state
        .offers
        .respond_to_counter(caller.user_id, offer_id, req.action)
        .await?;
    if req.action == CounterAction::Accept {
        let method = req.payment_method.unwrap_or(PaymentMethod::Paypal);
        enqueue_settlement(&state, offer.clone(), method);
    }
    Ok(ok(offer))
}

/// Acceptance hands the deal to the settlement orchestrator; the engines
/// stay decoupled and the negotiation response never waits on the payment
/// provider. A failed order creation leaves a pending transaction the
/// buyer retries from their purchases view.
fn enqueue_settlement(state: &Arc<AppState>, offer: Offer, method: PaymentMethod) {
    let state = state.clone();
    tokio::spawn(async move {
        let source = SettlementSource::Offer {
            offer_id: offer.id,
            unit_price: offer.effective_amount(),
        };
        if let Err(e) = state
            .settlement
            .initiate(offer.buyer_id, offer.listing_id, 1, method, source)
            .await
        {
            warn!(
                offer_id = offer.id,
                error = %e,
                "settlement initiation for accepted offer failed"
            );
        }
    });
}

async fn get_offer(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path(offer_id): Path<i64>,
) -> ApiResult<Json<ApiResponse<Offer>>> {
    let offer = state.offers.get(caller.user_id, offer_id).await?;
    Ok(ok(offer))
}

async fn incoming_offers(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Query(query): Query<OfferListQuery>,
) -> ApiResult<Json<ApiResponse<Paginated<Offer>>>> {
    let page = state
        .offers
        .incoming(caller.user_id, query.page_request(), query.status_filter()?)
        .await?;
    Ok(ok(page))
}

async fn my_offers(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Query(query): Query<OfferListQuery>,
) -> ApiResult<Json<ApiResponse<Paginated<Offer>>>> {
    let page = state
        .offers
        .outgoing(caller.user_id, query.page_request(), query.status_filter()?)
        .await?;
    Ok(ok(page))
}

async fn pending_offers(
    State(state): State<Arc<AppState>>,
    caller: Caller,
) -> ApiResult<Json<ApiResponse<PendingActions>>> {
    let actions = state.offers.pending_actions(caller.user_id).await?;
    Ok(ok(actions))
}

// ============================================================================
// Settlement handlers
// ============================================================================

async fn initiate_transaction(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Json(req): Json<InitiateRequest>,
) -> ApiResult<Json<ApiResponse<InitiatedSettlement>>> {
    let source = match req.offer_id {
        None => SettlementSource::Direct,
        Some(offer_id) => {
            let offer = state.offers.get(caller.user_id, offer_id).await?;
            if offer.buyer_id != caller.user_id {
                return Err(MarketError::Unauthorized(
                    "only the offer's buyer can check it out".into(),
                )
                .into());
            }
            if offer.status != OfferStatus::Accepted {
                return Err(MarketError::InvalidState(format!(
                    "offer {offer_id} is {}, only accepted offers settle",
                    offer.status.as_str()
                ))
                .into());
            }
            if offer.listing_id != req.listing_id {
                return Err(MarketError::InvalidInput(format!(
                    "offer {offer_id} does not belong to listing {}",
                    req.listing_id
                ))
                .into());
            }
            SettlementSource::Offer {
                offer_id,
                unit_price: offer.effective_amount(),
            }
        }
    };

    let initiated = state
        .settlement
        .initiate(
            caller.user_id,
            req.listing_id,
            req.quantity,
            req.payment_method,
            source,
        )
        .await?;
    Ok(ok(initiated))
}

async fn cancel_transaction(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path(transaction_id): Path<i64>,
) -> ApiResult<Json<ApiResponse<Transaction>>> {
    let tx = state.settlement.cancel(caller.user_id, transaction_id).await?;
    Ok(ok(tx))
}

async fn retry_order(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path(transaction_id): Path<i64>,
) -> ApiResult<Json<ApiResponse<InitiatedSettlement>>> {
    let initiated = state
        .settlement
        .retry_order(caller.user_id, transaction_id)
        .await?;
    Ok(ok(initiated))
}

async fn refund_transaction(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path(transaction_id): Path<i64>,
    req: Option<Json<RefundRequest>>,
) -> ApiResult<Json<ApiResponse<Transaction>>> {
    caller.require_admin()?;
    let include_fee = req.map(|Json(r)| r.include_processor_fee).unwrap_or(false);
    let tx = state.settlement.refund(transaction_id, include_fee).await?;
    Ok(ok(tx))
}

async fn purchases(
    State(state): State<Arc<AppState>>,
    caller: Caller,
) -> ApiResult<Json<ApiResponse<Vec<Transaction>>>> {
    Ok(ok(state.settlement.purchases(caller.user_id).await?))
}

async fn sales(
    State(state): State<Arc<AppState>>,
    caller: Caller,
) -> ApiResult<Json<ApiResponse<Vec<Transaction>>>> {
    Ok(ok(state.settlement.sales(caller.user_id).await?))
}

// ============================================================================
// Provider callbacks
// ============================================================================

/// Buyer-approved checkout: capture at the provider, then finalize. The
/// finalize step is idempotent, so a buyer double-submitting the return
/// page cannot double-decrement stock.
async fn capture_order(
    State(state): State<Arc<AppState>>,
    _caller: Caller,
    Json(req): Json<CaptureRequest>,
) -> ApiResult<Json<ApiResponse<Transaction>>> {
    let outcome = state.paypal.capture_order(&req.order_id).await?;
    let tx = state
        .settlement
        .finalize(&outcome.order_id, &outcome.capture_id)
        .await?;
    Ok(ok(tx))
}

/// Asynchronous capture events, possibly redelivered out of order. The
/// provider is not an authenticated caller; events must verify against the
/// provider's signature endpoint or they are dropped.
async fn paypal_webhook(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(event): Json<serde_json::Value>,
) -> ApiResult<Json<ApiResponse<serde_json::Value>>> {
    let webhook_headers = webhook_headers(&headers)?;
    if !state
        .paypal
        .verify_webhook_signature(&webhook_headers, &event)
        .await?
    {
        return Err(ApiError::bad_request("webhook signature did not verify"));
    }

    let event_type = event["event_type"].as_str().unwrap_or_default();
    if event_type != "PAYMENT.CAPTURE.COMPLETED" {
        return Ok(ok(serde_json::json!({ "ignored": event_type })));
    }

    let capture_id = event["resource"]["id"].as_str().ok_or_else(|| {
        ApiError::bad_request("capture event carries no resource id")
    })?;
    let order_id = event["resource"]["supplementary_data"]["related_ids"]["order_id"]
        .as_str()
        .ok_or_else(|| ApiError::bad_request("capture event carries no order id"))?;

    let tx = state.settlement.finalize(order_id, capture_id).await?;
    Ok(ok(serde_json::json!({ "transaction_id": tx.id })))
}

fn webhook_headers(headers: &HeaderMap) -> ApiResult<WebhookHeaders> {
    let get = |name: &str| -> ApiResult<String> {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .ok_or_else(|| ApiError::bad_request(&format!("missing {name} header")))
    };
    Ok(WebhookHeaders {
        transmission_id: get("paypal-transmission-id")?,
        transmission_time: get("paypal-transmission-time")?,
        cert_url: get("paypal-cert-url")?,
        auth_algo: get("paypal-auth-algo")?,
        transmission_sig: get("paypal-transmission-sig")?,
    })
}

// ============================================================================
// Settings & health
// ============================================================================

async fn fee_settings(
    State(state): State<Arc<AppState>>,
    _caller: Caller,
) -> ApiResult<Json<ApiResponse<verdant_fees::FeeSnapshot>>> {
    Ok(ok(state.fees.snapshot().await))
}

async fn update_setting(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path(key): Path<String>,
    Json(req): Json<UpdateSettingRequest>,
) -> ApiResult<Json<ApiResponse<serde_json::Value>>> {
    caller.require_admin()?;
    state
        .settings
        .set(&key, &req.value, Some(caller.user_id))
        .await?;
    Ok(ok(serde_json::json!({ "key": key })))
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn offer_list_query_parses_status() {
        let q = OfferListQuery {
            page: Some(2),
            page_size: Some(10),
            status: Some("countered".into()),
        };
        assert_eq!(q.page_request().offset(), 10);
        assert_eq!(q.status_filter().unwrap(), Some(OfferStatus::Countered));

        let bad = OfferListQuery {
            page: None,
            page_size: None,
            status: Some("withdrawn".into()),
        };
        assert!(bad.status_filter().is_err());
    }

    #[test]
    fn initiate_request_deserializes() {
        let req: InitiateRequest = serde_json::from_str(
            r#"{"listing_id": 10, "quantity": 2, "payment_method": "paypal", "offer_id": 5}"#,
        )
        .unwrap();
        assert_eq!(req.payment_method, PaymentMethod::Paypal);
        assert_eq!(req.offer_id, Some(5));
    }

    #[test]
    fn create_offer_request_deserializes_decimal() {
        let req: CreateOfferRequest =
            serde_json::from_str(r#"{"listing_id": 1, "offer_amount": "15.50"}"#).unwrap();
        assert_eq!(req.offer_amount, dec!(15.50));
        assert!(req.message.is_none());
    }
}
