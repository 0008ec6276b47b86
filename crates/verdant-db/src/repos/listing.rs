//! Listing repository

use async_trait::async_trait;
use sqlx::PgPool;

use verdant_types::{Listing, ListingId, ListingStore, Result};

use crate::models::ListingRow;

pub struct ListingRepo {
    pool: PgPool,
}

impl ListingRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ListingStore for ListingRepo {
    async fn get_listing(&self, id: ListingId) -> Result<Option<Listing>> {
        let row = sqlx::query_as::<_, ListingRow>("SELECT * FROM listings WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(crate::DbError::from)?;
        row.map(Listing::try_from).transpose().map_err(Into::into)
    }

    async fn decrement_stock(&self, id: ListingId, quantity: i64) -> Result<Option<i64>> {
        // Conditional decrement: fails (no row) instead of going negative,
        // and flips the listing to sold when the last unit goes.
        let remaining = sqlx::query_scalar::<_, i64>(
            r#"
            UPDATE listings
            SET quantity = quantity - $2,
                status = CASE WHEN quantity - $2 = 0 THEN 'sold' ELSE status END
            WHERE id = $1 AND status = 'active' AND quantity >= $2
            RETURNING quantity
            "#,
        )
        .bind(id)
        .bind(quantity)
        .fetch_optional(&self.pool)
        .await
        .map_err(crate::DbError::from)?;
        Ok(remaining)
    }
}
