//! Fee configuration provider
//!
//! Fee parameters live in the platform's settings store and are mutable by
//! administrators at runtime. The provider assembles them into an immutable
//! [`FeeSnapshot`] per calculation and caches the result for a short
//! staleness window; admin changes propagate within minutes, not instantly.
//!
//! When the source fails the provider falls back to the last-known-good
//! snapshot (initially the hardcoded defaults) and logs a warning instead of
//! blocking checkout. Callers that must not settle on stale numbers use
//! [`FeeConfigProvider::refresh`] and handle the error themselves.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use tokio::sync::RwLock;
use tracing::{debug, warn};

use verdant_types::{MarketError, Result};

use crate::FeeSnapshot;

/// Where fee parameters come from, typically the settings repository.
#[async_trait]
pub trait FeeConfigSource: Send + Sync {
    /// Load the currently configured parameters as a normalized snapshot
    /// (percentage already converted to a fraction).
    async fn load(&self) -> Result<FeeSnapshot>;
}

/// Fixed source for tests and tools that do not carry a settings store.
pub struct StaticFeeSource {
    snapshot: RwLock<Result<FeeSnapshot>>,
}

impl StaticFeeSource {
    pub fn new(snapshot: FeeSnapshot) -> Self {
        Self {
            snapshot: RwLock::new(Ok(snapshot)),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            snapshot: RwLock::new(Err(MarketError::FeeConfigUnavailable(message.into()))),
        }
    }

    pub async fn set(&self, snapshot: FeeSnapshot) {
        *self.snapshot.write().await = Ok(snapshot);
    }

    pub async fn fail_with(&self, message: &str) {
        *self.snapshot.write().await = Err(MarketError::FeeConfigUnavailable(message.into()));
    }
}

#[async_trait]
impl FeeConfigSource for StaticFeeSource {
    async fn load(&self) -> Result<FeeSnapshot> {
        self.snapshot.read().await.clone()
    }
}

struct CacheState {
    snapshot: FeeSnapshot,
    fetched_at: Option<DateTime<Utc>>,
}

/// TTL-cached snapshot provider with last-known-good fallback.
pub struct FeeConfigProvider {
    source: Arc<dyn FeeConfigSource>,
    ttl: Duration,
    state: RwLock<CacheState>,
}

impl FeeConfigProvider {
    /// Default staleness window for cached snapshots.
    pub const DEFAULT_TTL_SECS: i64 = 120;

    pub fn new(source: Arc<dyn FeeConfigSource>) -> Self {
        Self::with_ttl(source, Duration::seconds(Self::DEFAULT_TTL_SECS))
    }

    pub fn with_ttl(source: Arc<dyn FeeConfigSource>, ttl: Duration) -> Self {
        Self {
            source,
            ttl,
            state: RwLock::new(CacheState {
                snapshot: FeeSnapshot::default(),
                fetched_at: None,
            }),
        }
    }

    /// One consistent snapshot for the calling operation.
    ///
    /// Serves the cached value within the staleness window; otherwise loads
    /// from the source, falling back to the last-known-good snapshot when
    /// the load fails.
    pub async fn snapshot(&self) -> FeeSnapshot {
        let now = Utc::now();
        {
            let state = self.state.read().await;
            if let Some(at) = state.fetched_at {
                if now - at < self.ttl {
                    return state.snapshot;
                }
            }
        }

        match self.source.load().await {
            Ok(snapshot) => {
                let mut state = self.state.write().await;
                state.snapshot = snapshot;
                state.fetched_at = Some(now);
                debug!(?snapshot, "fee configuration refreshed");
                snapshot
            }
            Err(e) => {
                let state = self.state.read().await;
                warn!(
                    error = %e,
                    "fee configuration unavailable, using last-known-good snapshot"
                );
                state.snapshot
            }
        }
    }

    /// Force a load from the source, bypassing the cache. Fails with
    /// `FeeConfigUnavailable` instead of falling back.
    pub async fn refresh(&self) -> Result<FeeSnapshot> {
        let snapshot = self
            .source
            .load()
            .await
            .map_err(|e| MarketError::FeeConfigUnavailable(e.to_string()))?;
        let mut state = self.state.write().await;
        state.snapshot = snapshot;
        state.fetched_at = Some(Utc::now());
        Ok(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn snapshot(platform: Decimal) -> FeeSnapshot {
        FeeSnapshot {
            platform_fee_fixed: platform,
            ..FeeSnapshot::default()
        }
    }

    use rust_decimal::Decimal;

    #[tokio::test]
    async fn serves_cached_snapshot_within_ttl() {
        let source = Arc::new(StaticFeeSource::new(snapshot(dec!(0.42))));
        let provider = FeeConfigProvider::with_ttl(source.clone(), Duration::hours(1));

        assert_eq!(provider.snapshot().await.platform_fee_fixed, dec!(0.42));

        // Changed at the source, but the cache is still fresh.
        source.set(snapshot(dec!(0.55))).await;
        assert_eq!(provider.snapshot().await.platform_fee_fixed, dec!(0.42));
    }

    #[tokio::test]
    async fn refreshes_after_ttl() {
        let source = Arc::new(StaticFeeSource::new(snapshot(dec!(0.42))));
        let provider = FeeConfigProvider::with_ttl(source.clone(), Duration::zero());

        assert_eq!(provider.snapshot().await.platform_fee_fixed, dec!(0.42));
        source.set(snapshot(dec!(0.55))).await;
        assert_eq!(provider.snapshot().await.platform_fee_fixed, dec!(0.55));
    }

    #[tokio::test]
    async fn falls_back_to_last_known_good() {
        let source = Arc::new(StaticFeeSource::new(snapshot(dec!(0.42))));
        let provider = FeeConfigProvider::with_ttl(source.clone(), Duration::zero());

        assert_eq!(provider.snapshot().await.platform_fee_fixed, dec!(0.42));

        source.fail_with("settings store down").await;
        // Still serves the last successfully loaded snapshot.
        assert_eq!(provider.snapshot().await.platform_fee_fixed, dec!(0.42));
    }

    #[tokio::test]
    async fn falls_back_to_defaults_before_first_load() {
        let source = Arc::new(StaticFeeSource::failing("no settings yet"));
        let provider = FeeConfigProvider::with_ttl(source, Duration::zero());

        let s = provider.snapshot().await;
        assert_eq!(s, FeeSnapshot::default());
    }

    #[tokio::test]
    async fn refresh_surfaces_source_failure() {
        let source = Arc::new(StaticFeeSource::failing("down"));
        let provider = FeeConfigProvider::new(source);
        assert!(matches!(
            provider.refresh().await,
            Err(MarketError::FeeConfigUnavailable(_))
        ));
    }
}
