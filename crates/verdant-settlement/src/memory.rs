//! In-memory transaction store mirroring the database repository's
//! conditional-write semantics.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;

use verdant_types::{
    NewTransaction, Result, Transaction, TransactionId, TransactionStatus, TransactionStore, UserId,
};

/// In-memory transaction store.
#[derive(Default)]
pub struct MemoryTransactionStore {
    inner: Mutex<TransactionTable>,
}

#[derive(Default)]
struct TransactionTable {
    transactions: HashMap<TransactionId, Transaction>,
    next_id: TransactionId,
}

impl MemoryTransactionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().transactions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn newest_first(rows: &mut [Transaction]) {
    rows.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
}

#[async_trait]
impl TransactionStore for MemoryTransactionStore {
    async fn insert_transaction(&self, tx: NewTransaction) -> Result<Transaction> {
        let mut inner = self.inner.lock().unwrap();
        inner.next_id += 1;
        let row = Transaction {
            id: inner.next_id,
            listing_id: tx.listing_id,
            buyer_id: tx.buyer_id,
            seller_id: tx.seller_id,
            offer_id: tx.offer_id,
            quantity: tx.quantity,
            subtotal: tx.subtotal,
            platform_fee: tx.platform_fee,
            processor_fee: tx.processor_fee,
            total_amount: tx.total_amount,
            seller_amount: tx.seller_amount,
            payment_method: tx.payment_method,
            provider_order_id: None,
            provider_capture_id: None,
            status: TransactionStatus::Pending,
            created_at: Utc::now(),
        };
        inner.transactions.insert(row.id, row.clone());
        Ok(row)
    }

    async fn get_transaction(&self, id: TransactionId) -> Result<Option<Transaction>> {
        Ok(self.inner.lock().unwrap().transactions.get(&id).cloned())
    }

    async fn find_by_provider_order(&self, provider_order_id: &str) -> Result<Option<Transaction>> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .transactions
            .values()
            .find(|t| t.provider_order_id.as_deref() == Some(provider_order_id))
            .cloned())
    }

    async fn set_provider_order(
        &self,
        id: TransactionId,
        provider_order_id: &str,
    ) -> Result<Option<Transaction>> {
        let mut inner = self.inner.lock().unwrap();
        let Some(tx) = inner.transactions.get_mut(&id) else {
            return Ok(None);
        };
        if tx.status != TransactionStatus::Pending {
            return Ok(None);
        }
        tx.provider_order_id = Some(provider_order_id.to_string());
        Ok(Some(tx.clone()))
    }

    async fn complete(
        &self,
        id: TransactionId,
        provider_capture_id: &str,
    ) -> Result<Option<Transaction>> {
        let mut inner = self.inner.lock().unwrap();
        let Some(tx) = inner.transactions.get_mut(&id) else {
            return Ok(None);
        };
        if tx.status != TransactionStatus::Pending {
            return Ok(None);
        }
        tx.status = TransactionStatus::Completed;
        tx.provider_capture_id = Some(provider_capture_id.to_string());
        Ok(Some(tx.clone()))
    }

    async fn transition_status(
        &self,
        id: TransactionId,
        from: TransactionStatus,
        to: TransactionStatus,
    ) -> Result<Option<Transaction>> {
        let mut inner = self.inner.lock().unwrap();
        let Some(tx) = inner.transactions.get_mut(&id) else {
            return Ok(None);
        };
        if tx.status != from {
            return Ok(None);
        }
        tx.status = to;
        Ok(Some(tx.clone()))
    }

    async fn transactions_for_buyer(&self, buyer_id: UserId) -> Result<Vec<Transaction>> {
        let inner = self.inner.lock().unwrap();
        let mut rows: Vec<Transaction> = inner
            .transactions
            .values()
            .filter(|t| t.buyer_id == buyer_id)
            .cloned()
            .collect();
        newest_first(&mut rows);
        Ok(rows)
    }

    async fn transactions_for_seller(&self, seller_id: UserId) -> Result<Vec<Transaction>> {
        let inner = self.inner.lock().unwrap();
        let mut rows: Vec<Transaction> = inner
            .transactions
            .values()
            .filter(|t| t.seller_id == seller_id)
            .cloned()
            .collect();
        newest_first(&mut rows);
        Ok(rows)
    }
}
