//! Postgres implementation of TransactionRepository.

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use sqlx::{PgExecutor, PgPool};
use uuid::Uuid;

use crate::domain::{NewTransaction, Transaction, TransactionType};
use crate::ports::{RepositoryError, RepositoryResult, TransactionRepository};

const RETURNING_COLUMNS: &str = "id, transaction_type, reference_id, occurred_on, amount, created_by";

/// Postgres-backed transaction repository.
#[derive(Clone)]
pub struct PostgresTransactionRepository {
    pool: PgPool,
}

impl PostgresTransactionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Single-statement upsert, atomic per row. `updated_at` only moves when the
/// content actually changes, so redelivery leaves the row untouched.
async fn upsert_row<'e, E>(executor: E, tx: &NewTransaction) -> RepositoryResult<Transaction>
where
    E: PgExecutor<'e>,
{
    let row = sqlx::query_as::<_, TransactionRow>(&format!(
        r#"
        INSERT INTO transactions (
            id, transaction_type, reference_id, occurred_on, amount, created_by
        ) VALUES ($1, $2, $3, $4, $5, $6)
        ON CONFLICT (transaction_type, reference_id) DO UPDATE SET
            occurred_on = EXCLUDED.occurred_on,
            amount = EXCLUDED.amount,
            created_by = EXCLUDED.created_by,
            updated_at = CASE
                WHEN (transactions.occurred_on, transactions.amount, transactions.created_by)
                    IS DISTINCT FROM (EXCLUDED.occurred_on, EXCLUDED.amount, EXCLUDED.created_by)
                THEN NOW()
                ELSE transactions.updated_at
            END
        RETURNING {}
        "#,
        RETURNING_COLUMNS
    ))
    .bind(Uuid::new_v4())
    .bind(tx.transaction_type.as_str())
    .bind(&tx.reference_id)
    .bind(tx.occurred_on)
    .bind(&tx.amount)
    .bind(&tx.created_by)
    .fetch_one(executor)
    .await?;

    row.into_domain()
}

#[async_trait]
impl TransactionRepository for PostgresTransactionRepository {
    async fn upsert(&self, tx: &NewTransaction) -> RepositoryResult<Transaction> {
        upsert_row(&self.pool, tx).await
    }

    async fn upsert_many(&self, txs: &[NewTransaction]) -> RepositoryResult<Vec<Transaction>> {
        let mut db_tx = self.pool.begin().await?;

        let mut saved = Vec::with_capacity(txs.len());
        for tx in txs {
            saved.push(upsert_row(&mut *db_tx, tx).await?);
        }

        db_tx.commit().await?;
        Ok(saved)
    }

    async fn find_all(&self) -> RepositoryResult<Vec<Transaction>> {
        let rows = sqlx::query_as::<_, TransactionRow>(&format!(
            "SELECT {} FROM transactions ORDER BY occurred_on, transaction_type, reference_id",
            RETURNING_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(TransactionRow::into_domain).collect()
    }

    async fn find_by_type(&self, transaction_type: TransactionType) -> RepositoryResult<Vec<Transaction>> {
        let rows = sqlx::query_as::<_, TransactionRow>(&format!(
            "SELECT {} FROM transactions WHERE transaction_type = $1 ORDER BY occurred_on, reference_id",
            RETURNING_COLUMNS
        ))
        .bind(transaction_type.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(TransactionRow::into_domain).collect()
    }
}

/// Internal row type for SQLx. Not exposed outside the adapter.
#[derive(Debug, sqlx::FromRow)]
struct TransactionRow {
    id: Uuid,
    transaction_type: String,
    reference_id: String,
    occurred_on: NaiveDate,
    amount: BigDecimal,
    created_by: String,
}

impl TransactionRow {
    fn into_domain(self) -> RepositoryResult<Transaction> {
        let transaction_type = self
            .transaction_type
            .parse::<TransactionType>()
            .map_err(|e| RepositoryError::CorruptRow(format!("transaction {}: {}", self.id, e)))?;

        Ok(Transaction {
            id: self.id,
            transaction_type,
            reference_id: self.reference_id,
            occurred_on: self.occurred_on,
            amount: self.amount,
            created_by: self.created_by,
        })
    }
}
