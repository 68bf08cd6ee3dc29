//! Seams between the aggregation core and its infrastructure.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::{NewTransaction, SourceKind, SourceRecord, Transaction, TransactionType};
use crate::sources::SourceError;

#[derive(Error, Debug)]
pub enum RepositoryError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Corrupt row: {0}")]
    CorruptRow(String),

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

pub type RepositoryResult<T> = Result<T, RepositoryError>;

/// Durable store of normalized transactions keyed by `(type, reference_id)`.
#[async_trait]
pub trait TransactionRepository: Send + Sync {
    /// Inserts the row or supersedes the existing row with the same key.
    async fn upsert(&self, tx: &NewTransaction) -> RepositoryResult<Transaction>;

    /// Upserts every row and returns the persisted rows in input order.
    async fn upsert_many(&self, txs: &[NewTransaction]) -> RepositoryResult<Vec<Transaction>>;

    async fn find_all(&self) -> RepositoryResult<Vec<Transaction>>;

    async fn find_by_type(&self, transaction_type: TransactionType) -> RepositoryResult<Vec<Transaction>>;
}

/// Read access to the full record sets of the upstream services.
#[async_trait]
pub trait SourceGateway: Send + Sync {
    async fn fetch_all(&self, kind: SourceKind) -> Result<Vec<SourceRecord>, SourceError>;
}
