//! Transaction repository
//!
//! Finalize idempotency is anchored here: `complete` only moves a row out
//! of `pending`, and `provider_order_id` carries a unique index, so a
//! redelivered webhook can never complete twice or attach to a second row.

use async_trait::async_trait;
use sqlx::PgPool;

use verdant_types::{
    NewTransaction, Result, Transaction, TransactionId, TransactionStatus, TransactionStore, UserId,
};

use crate::models::TransactionRow;
use crate::DbError;

pub struct TransactionRepo {
    pool: PgPool,
}

impl TransactionRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn by_party(&self, party_column: &'static str, party_id: UserId) -> Result<Vec<Transaction>> {
        let rows = sqlx::query_as::<_, TransactionRow>(&format!(
            "SELECT * FROM transactions WHERE {party_column} = $1 ORDER BY created_at DESC, id DESC"
        ))
        .bind(party_id)
        .fetch_all(&self.pool)
        .await
        .map_err(DbError::from)?;
        rows.into_iter()
            .map(|r| Transaction::try_from(r).map_err(Into::into))
            .collect()
    }
}

#[async_trait]
impl TransactionStore for TransactionRepo {
    async fn insert_transaction(&self, tx: NewTransaction) -> Result<Transaction> {
        let row = sqlx::query_as::<_, TransactionRow>(
            r#"
            INSERT INTO transactions (listing_id, buyer_id, seller_id, offer_id, quantity,
                subtotal, platform_fee, processor_fee, total_amount, seller_amount,
                payment_method, status)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, 'pending')
            RETURNING *
            "#,
        )
        .bind(tx.listing_id)
        .bind(tx.buyer_id)
        .bind(tx.seller_id)
        .bind(tx.offer_id)
        .bind(tx.quantity)
        .bind(tx.subtotal)
        .bind(tx.platform_fee)
        .bind(tx.processor_fee)
        .bind(tx.total_amount)
        .bind(tx.seller_amount)
        .bind(tx.payment_method.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(DbError::from)?;
        Transaction::try_from(row).map_err(Into::into)
    }

    async fn get_transaction(&self, id: TransactionId) -> Result<Option<Transaction>> {
        let row = sqlx::query_as::<_, TransactionRow>("SELECT * FROM transactions WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(DbError::from)?;
        row.map(Transaction::try_from)
            .transpose()
            .map_err(Into::into)
    }

    async fn find_by_provider_order(&self, provider_order_id: &str) -> Result<Option<Transaction>> {
        let row = sqlx::query_as::<_, TransactionRow>(
            "SELECT * FROM transactions WHERE provider_order_id = $1",
        )
        .bind(provider_order_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(DbError::from)?;
        row.map(Transaction::try_from)
            .transpose()
            .map_err(Into::into)
    }

    async fn set_provider_order(
        &self,
        id: TransactionId,
        provider_order_id: &str,
    ) -> Result<Option<Transaction>> {
        let row = sqlx::query_as::<_, TransactionRow>(
            r#"
            UPDATE transactions
            SET provider_order_id = $2
            WHERE id = $1 AND status = 'pending'
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(provider_order_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(DbError::from)?;
        row.map(Transaction::try_from)
            .transpose()
            .map_err(Into::into)
    }

    async fn complete(
        &self,
        id: TransactionId,
        provider_capture_id: &str,
    ) -> Result<Option<Transaction>> {
        let row = sqlx::query_as::<_, TransactionRow>(
            r#"
            UPDATE transactions
            SET status = 'completed', provider_capture_id = $2
            WHERE id = $1 AND status = 'pending'
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(provider_capture_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(DbError::from)?;
        row.map(Transaction::try_from)
            .transpose()
            .map_err(Into::into)
    }

    async fn transition_status(
        &self,
        id: TransactionId,
        from: TransactionStatus,
        to: TransactionStatus,
    ) -> Result<Option<Transaction>> {
        let row = sqlx::query_as::<_, TransactionRow>(
            r#"
            UPDATE transactions
            SET status = $3
            WHERE id = $1 AND status = $2
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(from.as_str())
        .bind(to.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(DbError::from)?;
        row.map(Transaction::try_from)
            .transpose()
            .map_err(Into::into)
    }

    async fn transactions_for_buyer(&self, buyer_id: UserId) -> Result<Vec<Transaction>> {
        self.by_party("buyer_id", buyer_id).await
    }

    async fn transactions_for_seller(&self, seller_id: UserId) -> Result<Vec<Transaction>> {
        self.by_party("seller_id", seller_id).await
    }
}
