//! Transaction domain entity.
//! Framework-agnostic representation of a normalized ledger movement.

use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionType {
    Income,
    Expense,
    Investment,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Income => "INCOME",
            TransactionType::Expense => "EXPENSE",
            TransactionType::Investment => "INVESTMENT",
        }
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownTransactionType(pub String);

impl fmt::Display for UnknownTransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown transaction type '{}'", self.0)
    }
}

impl std::error::Error for UnknownTransactionType {}

impl FromStr for TransactionType {
    type Err = UnknownTransactionType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "INCOME" => Ok(TransactionType::Income),
            "EXPENSE" => Ok(TransactionType::Expense),
            "INVESTMENT" => Ok(TransactionType::Investment),
            _ => Err(UnknownTransactionType(s.to_string())),
        }
    }
}

/// A normalized record before the store has assigned it an identity.
///
/// Both the event ingestor and the aggregator produce values of this type, so
/// the same source state always yields the same row content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTransaction {
    pub transaction_type: TransactionType,
    pub reference_id: String,
    pub occurred_on: NaiveDate,
    pub amount: BigDecimal,
    pub created_by: String,
}

impl NewTransaction {
    /// Logical identity of the row in the store.
    pub fn key(&self) -> (TransactionType, &str) {
        (self.transaction_type, self.reference_id.as_str())
    }
}

/// A persisted transaction row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub transaction_type: TransactionType,
    pub reference_id: String,
    pub occurred_on: NaiveDate,
    pub amount: BigDecimal,
    pub created_by: String,
}

impl Transaction {
    pub fn from_new(id: Uuid, tx: NewTransaction) -> Self {
        Self {
            id,
            transaction_type: tx.transaction_type,
            reference_id: tx.reference_id,
            occurred_on: tx.occurred_on,
            amount: tx.amount,
            created_by: tx.created_by,
        }
    }
}
