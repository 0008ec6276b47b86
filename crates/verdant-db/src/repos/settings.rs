//! Settings repository - generic key-value configuration store
//!
//! Holds the runtime-tunable fee parameters and negotiation limits as
//! string-encoded values. This repository is also the production
//! implementation of the fee-snapshot and offer-policy sources; missing or
//! unparseable values fall back to the seeded defaults with a warning
//! rather than blocking checkout.

use std::str::FromStr;

use async_trait::async_trait;
use chrono::Duration;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use sqlx::PgPool;
use tracing::warn;

use verdant_fees::{
    FeeConfigSource, FeeSnapshot, KEY_PLATFORM_FEE_FIXED, KEY_PROCESSOR_FEE_FIXED,
    KEY_PROCESSOR_FEE_PERCENTAGE,
};
use verdant_offers::{OfferPolicySource, DEFAULT_OFFER_VALIDITY_DAYS, KEY_OFFER_EXPIRATION_DAYS};
use verdant_types::{MarketError, Result, UserId};

use crate::models::SettingRow;
use crate::DbError;

pub struct SettingsRepo {
    pool: PgPool,
}

impl SettingsRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn get(&self, key: &str) -> Result<Option<String>> {
        let value =
            sqlx::query_scalar::<_, String>("SELECT value FROM system_settings WHERE key = $1")
                .bind(key)
                .fetch_optional(&self.pool)
                .await
                .map_err(DbError::from)?;
        Ok(value)
    }

    pub async fn set(&self, key: &str, value: &str, updated_by: Option<UserId>) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO system_settings (key, value, updated_by, updated_at)
            VALUES ($1, $2, $3, now())
            ON CONFLICT (key) DO UPDATE
            SET value = EXCLUDED.value, updated_by = EXCLUDED.updated_by, updated_at = now()
            "#,
        )
        .bind(key)
        .bind(value)
        .bind(updated_by)
        .execute(&self.pool)
        .await
        .map_err(DbError::from)?;
        Ok(())
    }

    pub async fn all(&self) -> Result<Vec<SettingRow>> {
        let rows = sqlx::query_as::<_, SettingRow>("SELECT * FROM system_settings ORDER BY key")
            .fetch_all(&self.pool)
            .await
            .map_err(DbError::from)?;
        Ok(rows)
    }

    /// Read a decimal setting, falling back when absent or unparseable.
    async fn decimal_or(&self, key: &str, fallback: Decimal) -> Result<Decimal> {
        match self.get(key).await? {
            None => Ok(fallback),
            Some(raw) => match Decimal::from_str(raw.trim()) {
                Ok(v) => Ok(v),
                Err(_) => {
                    warn!(key, value = %raw, "setting did not parse, using fallback");
                    Ok(fallback)
                }
            },
        }
    }
}

#[async_trait]
impl FeeConfigSource for SettingsRepo {
    async fn load(&self) -> Result<FeeSnapshot> {
        let defaults = FeeSnapshot::default();
        // The percentage is stored as a percent (2.49), not a fraction.
        let percent = self
            .decimal_or(KEY_PROCESSOR_FEE_PERCENTAGE, dec!(2.49))
            .await
            .map_err(|e| MarketError::FeeConfigUnavailable(e.to_string()))?;

        Ok(FeeSnapshot {
            platform_fee_fixed: self
                .decimal_or(KEY_PLATFORM_FEE_FIXED, defaults.platform_fee_fixed)
                .await
                .map_err(|e| MarketError::FeeConfigUnavailable(e.to_string()))?,
            processor_fee_percentage: percent / dec!(100),
            processor_fee_fixed: self
                .decimal_or(KEY_PROCESSOR_FEE_FIXED, defaults.processor_fee_fixed)
                .await
                .map_err(|e| MarketError::FeeConfigUnavailable(e.to_string()))?,
        })
    }
}

#[async_trait]
impl OfferPolicySource for SettingsRepo {
    async fn offer_validity(&self) -> Result<Duration> {
        let days = match self.get(KEY_OFFER_EXPIRATION_DAYS).await? {
            None => DEFAULT_OFFER_VALIDITY_DAYS,
            Some(raw) => match raw.trim().parse::<i64>() {
                Ok(d) if d >= 1 => d,
                _ => {
                    warn!(value = %raw, "offer expiration setting invalid, using default");
                    DEFAULT_OFFER_VALIDITY_DAYS
                }
            },
        };
        Ok(Duration::days(days))
    }
}
