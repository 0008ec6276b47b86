//! Fire-and-forget notification dispatcher
//!
//! Engines hand lifecycle events to an unbounded channel; a background
//! task drains it and forwards to the notification delivery system. The
//! engines are never blocked on delivery, and a full or closed channel is
//! logged and dropped rather than failing the operation.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use verdant_types::{EventSink, MarketEvent};

pub struct ChannelSink {
    tx: mpsc::UnboundedSender<MarketEvent>,
}

impl EventSink for ChannelSink {
    fn dispatch(&self, event: MarketEvent) {
        if self.tx.send(event).is_err() {
            warn!("notification dispatcher gone, event dropped");
        }
    }
}

/// Start the dispatcher task and return the sink the engines publish to.
pub fn spawn_dispatcher() -> (Arc<ChannelSink>, JoinHandle<()>) {
    let (tx, mut rx) = mpsc::unbounded_channel::<MarketEvent>();
    let handle = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            // Delivery (mail, push, in-app) lives outside this engine;
            // record the event for the downstream consumer.
            info!(
                target: "verdant::notifications",
                event = event.name(),
                payload = %serde_json::to_string(&event).unwrap_or_default(),
                "notification event"
            );
        }
    });
    (Arc::new(ChannelSink { tx }), handle)
}
