//! Verdant Server
//!
//! RPC surface for the offer negotiation and fee-settlement engine.
//! Authentication happens upstream; handlers trust the caller identity the
//! auth proxy injects via the `x-user-id` / `x-user-role` headers. The
//! payment provider's capture path is unauthenticated but
//! signature-verified.

mod api;
mod error;
mod notify;
mod state;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::EnvFilter;

use verdant_db::{Database, DatabaseConfig};
use verdant_fees::FeeConfigProvider;
use verdant_offers::OfferEngine;
use verdant_paypal::{PayPalClient, PayPalConfig};
use verdant_settlement::SettlementEngine;

use crate::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let db = Database::connect(&DatabaseConfig::from_env())
        .await
        .context("database connection failed")?;
    db.migrate().await.context("migrations failed")?;

    let listings = Arc::new(db.listings());
    let offers_repo = Arc::new(db.offers());
    let transactions = Arc::new(db.transactions());
    let settings = Arc::new(db.settings());

    let fees = Arc::new(FeeConfigProvider::new(settings.clone()));
    let paypal = Arc::new(PayPalClient::new(PayPalConfig::from_env())?);
    let (events, dispatcher) = notify::spawn_dispatcher();

    let offers = Arc::new(OfferEngine::new(
        offers_repo,
        listings.clone(),
        settings.clone(),
        events.clone(),
    ));
    let settlement = Arc::new(SettlementEngine::new(
        transactions,
        listings,
        fees.clone(),
        paypal.clone(),
        events,
    ));

    let state = Arc::new(AppState {
        offers,
        settlement,
        paypal,
        fees,
        settings,
    });

    let app = api::router(state)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = std::env::var("BIND_ADDR")
        .unwrap_or_else(|_| "127.0.0.1:8080".to_string())
        .parse()
        .context("invalid BIND_ADDR")?;

    info!("Verdant server listening on {addr}");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    dispatcher.abort();
    Ok(())
}
