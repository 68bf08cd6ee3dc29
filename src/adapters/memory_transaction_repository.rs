//! In-process TransactionRepository used by tests and the offline report command.

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::domain::{NewTransaction, Transaction, TransactionType};
use crate::ports::{RepositoryError, RepositoryResult, TransactionRepository};

#[derive(Default)]
pub struct InMemoryTransactionRepository {
    rows: RwLock<Vec<Transaction>>,
    unavailable: AtomicBool,
}

impl InMemoryTransactionRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent call fail, simulating an outage.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub async fn len(&self) -> usize {
        self.rows.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.rows.read().await.is_empty()
    }

    fn check_available(&self) -> RepositoryResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(RepositoryError::Unavailable("in-memory store offline".to_string()));
        }
        Ok(())
    }

    fn upsert_locked(rows: &mut Vec<Transaction>, tx: &NewTransaction) -> Transaction {
        let key = tx.key();
        if let Some(existing) = rows
            .iter_mut()
            .find(|row| (row.transaction_type, row.reference_id.as_str()) == key)
        {
            existing.occurred_on = tx.occurred_on;
            existing.amount = tx.amount.clone();
            existing.created_by = tx.created_by.clone();
            return existing.clone();
        }

        let row = Transaction::from_new(Uuid::new_v4(), tx.clone());
        rows.push(row.clone());
        row
    }
}

fn sorted(mut rows: Vec<Transaction>) -> Vec<Transaction> {
    rows.sort_by(|a, b| {
        (a.occurred_on, a.transaction_type.as_str(), &a.reference_id)
            .cmp(&(b.occurred_on, b.transaction_type.as_str(), &b.reference_id))
    });
    rows
}

#[async_trait]
impl TransactionRepository for InMemoryTransactionRepository {
    async fn upsert(&self, tx: &NewTransaction) -> RepositoryResult<Transaction> {
        self.check_available()?;
        let mut rows = self.rows.write().await;
        Ok(Self::upsert_locked(&mut rows, tx))
    }

    async fn upsert_many(&self, txs: &[NewTransaction]) -> RepositoryResult<Vec<Transaction>> {
        self.check_available()?;
        let mut rows = self.rows.write().await;
        Ok(txs.iter().map(|tx| Self::upsert_locked(&mut rows, tx)).collect())
    }

    async fn find_all(&self) -> RepositoryResult<Vec<Transaction>> {
        self.check_available()?;
        Ok(sorted(self.rows.read().await.clone()))
    }

    async fn find_by_type(&self, transaction_type: TransactionType) -> RepositoryResult<Vec<Transaction>> {
        self.check_available()?;
        let rows = self.rows.read().await;
        Ok(sorted(
            rows.iter()
                .filter(|row| row.transaction_type == transaction_type)
                .cloned()
                .collect(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bigdecimal::BigDecimal;
    use chrono::NaiveDate;

    fn new_tx(transaction_type: TransactionType, reference_id: &str, amount: i64) -> NewTransaction {
        NewTransaction {
            transaction_type,
            reference_id: reference_id.to_string(),
            occurred_on: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            amount: BigDecimal::from(amount),
            created_by: "A".to_string(),
        }
    }

    #[tokio::test]
    async fn test_upsert_is_idempotent() {
        let repo = InMemoryTransactionRepository::new();
        let tx = new_tx(TransactionType::Income, "i1", 500);

        let first = repo.upsert(&tx).await.unwrap();
        let second = repo.upsert(&tx).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(repo.len().await, 1);
    }

    #[tokio::test]
    async fn test_upsert_supersedes_same_key() {
        let repo = InMemoryTransactionRepository::new();
        let first = repo.upsert(&new_tx(TransactionType::Income, "i1", 500)).await.unwrap();
        let second = repo.upsert(&new_tx(TransactionType::Income, "i1", 750)).await.unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(second.amount, BigDecimal::from(750));
        assert_eq!(repo.len().await, 1);
    }

    #[tokio::test]
    async fn test_same_reference_across_types_are_distinct() {
        let repo = InMemoryTransactionRepository::new();
        repo.upsert_many(&[
            new_tx(TransactionType::Income, "x", 1),
            new_tx(TransactionType::Expense, "x", 2),
        ])
        .await
        .unwrap();

        assert_eq!(repo.len().await, 2);
        let expenses = repo.find_by_type(TransactionType::Expense).await.unwrap();
        assert_eq!(expenses.len(), 1);
        assert_eq!(expenses[0].amount, BigDecimal::from(2));
    }

    #[tokio::test]
    async fn test_unavailable_store_fails() {
        let repo = InMemoryTransactionRepository::new();
        repo.set_unavailable(true);

        let result = repo.upsert(&new_tx(TransactionType::Income, "i1", 1)).await;
        assert!(matches!(result, Err(RepositoryError::Unavailable(_))));
        assert!(repo.find_all().await.is_err());
    }
}
