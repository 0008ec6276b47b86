//! Offer repository
//!
//! All transitions are single status-guarded UPDATEs; the loser of a race
//! sees no row come back and the engine reports `InvalidState`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use verdant_types::{
    NewOffer, Offer, OfferId, OfferStatus, OfferStore, OfferTransition, PageRequest, Paginated,
    Result, UserId,
};

use crate::models::OfferRow;
use crate::DbError;

pub struct OfferRepo {
    pool: PgPool,
}

impl OfferRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn paged(
        &self,
        party_column: &'static str,
        party_id: UserId,
        page: PageRequest,
        status: Option<OfferStatus>,
    ) -> Result<Paginated<Offer>> {
        // party_column is one of two compile-time literals, never input.
        let (total, rows) = if let Some(status) = status {
            let total = sqlx::query_scalar::<_, i64>(&format!(
                "SELECT COUNT(*) FROM offers WHERE {party_column} = $1 AND status = $2"
            ))
            .bind(party_id)
            .bind(status.as_str())
            .fetch_one(&self.pool)
            .await
            .map_err(DbError::from)?;
            let rows = sqlx::query_as::<_, OfferRow>(&format!(
                "SELECT * FROM offers WHERE {party_column} = $1 AND status = $2 \
                 ORDER BY created_at DESC, id DESC LIMIT $3 OFFSET $4"
            ))
            .bind(party_id)
            .bind(status.as_str())
            .bind(page.limit())
            .bind(page.offset())
            .fetch_all(&self.pool)
            .await
            .map_err(DbError::from)?;
            (total, rows)
        } else {
            let total = sqlx::query_scalar::<_, i64>(&format!(
                "SELECT COUNT(*) FROM offers WHERE {party_column} = $1"
            ))
            .bind(party_id)
            .fetch_one(&self.pool)
            .await
            .map_err(DbError::from)?;
            let rows = sqlx::query_as::<_, OfferRow>(&format!(
                "SELECT * FROM offers WHERE {party_column} = $1 \
                 ORDER BY created_at DESC, id DESC LIMIT $2 OFFSET $3"
            ))
            .bind(party_id)
            .bind(page.limit())
            .bind(page.offset())
            .fetch_all(&self.pool)
            .await
            .map_err(DbError::from)?;
            (total, rows)
        };

        let items = rows
            .into_iter()
            .map(Offer::try_from)
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(Paginated { items, total })
    }

    async fn awaiting(
        &self,
        party_column: &'static str,
        party_id: UserId,
        status: OfferStatus,
    ) -> Result<Vec<Offer>> {
        let rows = sqlx::query_as::<_, OfferRow>(&format!(
            "SELECT * FROM offers WHERE {party_column} = $1 AND status = $2 \
             ORDER BY created_at DESC, id DESC"
        ))
        .bind(party_id)
        .bind(status.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(DbError::from)?;
        rows.into_iter()
            .map(|r| Offer::try_from(r).map_err(Into::into))
            .collect()
    }
}

#[async_trait]
impl OfferStore for OfferRepo {
    async fn insert_offer(&self, offer: NewOffer) -> Result<Offer> {
        let row = sqlx::query_as::<_, OfferRow>(
            r#"
            INSERT INTO offers (listing_id, buyer_id, seller_id, offer_amount, message, status, expires_at)
            VALUES ($1, $2, $3, $4, $5, 'pending', $6)
            RETURNING *
            "#,
        )
        .bind(offer.listing_id)
        .bind(offer.buyer_id)
        .bind(offer.seller_id)
        .bind(offer.offer_amount)
        .bind(&offer.message)
        .bind(offer.expires_at)
        .fetch_one(&self.pool)
        .await
        .map_err(DbError::from)?;
        Offer::try_from(row).map_err(Into::into)
    }

    async fn get_offer(&self, id: OfferId) -> Result<Option<Offer>> {
        let row = sqlx::query_as::<_, OfferRow>("SELECT * FROM offers WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(DbError::from)?;
        row.map(Offer::try_from).transpose().map_err(Into::into)
    }

    async fn transition_offer(
        &self,
        id: OfferId,
        from: OfferStatus,
        change: OfferTransition,
    ) -> Result<Option<Offer>> {
        // responded_at keeps its first value; counter fields are only
        // written when the transition carries them.
        let row = sqlx::query_as::<_, OfferRow>(
            r#"
            UPDATE offers
            SET status = $3,
                counter_amount = COALESCE($4, counter_amount),
                counter_message = COALESCE($5, counter_message),
                responded_at = COALESCE(responded_at, $6)
            WHERE id = $1 AND status = $2
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(from.as_str())
        .bind(change.to.as_str())
        .bind(change.counter_amount)
        .bind(&change.counter_message)
        .bind(change.responded_at)
        .fetch_optional(&self.pool)
        .await
        .map_err(DbError::from)?;
        row.map(Offer::try_from).transpose().map_err(Into::into)
    }

    async fn expire_due(&self, now: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query(
            r#"
            UPDATE offers
            SET status = 'expired'
            WHERE status IN ('pending', 'countered')
              AND expires_at IS NOT NULL
              AND expires_at < $1
            "#,
        )
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(DbError::from)?;
        Ok(result.rows_affected())
    }

    async fn offers_for_seller(
        &self,
        seller_id: UserId,
        page: PageRequest,
        status: Option<OfferStatus>,
    ) -> Result<Paginated<Offer>> {
        self.paged("seller_id", seller_id, page, status).await
    }

    async fn offers_for_buyer(
        &self,
        buyer_id: UserId,
        page: PageRequest,
        status: Option<OfferStatus>,
    ) -> Result<Paginated<Offer>> {
        self.paged("buyer_id", buyer_id, page, status).await
    }

    async fn pending_for_seller(&self, seller_id: UserId) -> Result<Vec<Offer>> {
        self.awaiting("seller_id", seller_id, OfferStatus::Pending)
            .await
    }

    async fn countered_for_buyer(&self, buyer_id: UserId) -> Result<Vec<Offer>> {
        self.awaiting("buyer_id", buyer_id, OfferStatus::Countered)
            .await
    }
}
