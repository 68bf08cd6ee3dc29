//! Records owned by the upstream income, expense and investment services and
//! the rules that normalize them into [`NewTransaction`]s.

use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::transaction::{NewTransaction, TransactionType};

/// Which upstream service a record or event belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Income,
    Expense,
    Investment,
}

impl SourceKind {
    pub const ALL: [SourceKind; 3] = [SourceKind::Income, SourceKind::Expense, SourceKind::Investment];

    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::Income => "income",
            SourceKind::Expense => "expense",
            SourceKind::Investment => "investment",
        }
    }

    /// Collection path exposed by the owning service.
    pub fn collection_path(&self) -> &'static str {
        match self {
            SourceKind::Income => "/api/incomes",
            SourceKind::Expense => "/api/expenses",
            SourceKind::Investment => "/api/investments",
        }
    }

    pub fn transaction_type(&self) -> TransactionType {
        match self {
            SourceKind::Income => TransactionType::Income,
            SourceKind::Expense => TransactionType::Expense,
            SourceKind::Investment => TransactionType::Investment,
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "income" => Ok(SourceKind::Income),
            "expense" => Ok(SourceKind::Expense),
            "investment" => Ok(SourceKind::Investment),
            other => Err(format!("unknown source '{}', expected income, expense or investment", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Income {
    pub id: String,
    pub income_date: NaiveDate,
    #[serde(deserialize_with = "crate::utils::decimal::deserialize")]
    pub amount_received: BigDecimal,
    pub created_by: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Expense {
    pub id: String,
    pub expense_date: NaiveDate,
    #[serde(deserialize_with = "crate::utils::decimal::deserialize")]
    pub amount_paid: BigDecimal,
    pub created_by: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Investment {
    pub id: String,
    #[serde(deserialize_with = "crate::utils::decimal::deserialize")]
    pub current_balance: BigDecimal,
    pub created_by: String,
}

/// One upstream record of any kind.
#[derive(Debug, Clone, PartialEq)]
pub enum SourceRecord {
    Income(Income),
    Expense(Expense),
    Investment(Investment),
}

impl SourceRecord {
    /// Decodes a single JSON record for the given source.
    pub fn from_json(kind: SourceKind, payload: &[u8]) -> Result<Self, serde_json::Error> {
        Ok(match kind {
            SourceKind::Income => SourceRecord::Income(serde_json::from_slice(payload)?),
            SourceKind::Expense => SourceRecord::Expense(serde_json::from_slice(payload)?),
            SourceKind::Investment => SourceRecord::Investment(serde_json::from_slice(payload)?),
        })
    }

    /// Decodes a JSON array of records for the given source.
    pub fn list_from_json(kind: SourceKind, body: &[u8]) -> Result<Vec<Self>, serde_json::Error> {
        Ok(match kind {
            SourceKind::Income => serde_json::from_slice::<Vec<Income>>(body)?
                .into_iter()
                .map(SourceRecord::Income)
                .collect(),
            SourceKind::Expense => serde_json::from_slice::<Vec<Expense>>(body)?
                .into_iter()
                .map(SourceRecord::Expense)
                .collect(),
            SourceKind::Investment => serde_json::from_slice::<Vec<Investment>>(body)?
                .into_iter()
                .map(SourceRecord::Investment)
                .collect(),
        })
    }

    /// Maps the record into the unified transaction shape.
    ///
    /// Investments carry no event date, so they are stamped with `processed_on`.
    /// Both write paths pass the current UTC date, never the host's local date.
    pub fn normalize(&self, processed_on: NaiveDate) -> NewTransaction {
        match self {
            SourceRecord::Income(income) => NewTransaction {
                transaction_type: TransactionType::Income,
                reference_id: income.id.clone(),
                occurred_on: income.income_date,
                amount: income.amount_received.clone(),
                created_by: income.created_by.clone(),
            },
            SourceRecord::Expense(expense) => NewTransaction {
                transaction_type: TransactionType::Expense,
                reference_id: expense.id.clone(),
                occurred_on: expense.expense_date,
                amount: expense.amount_paid.clone(),
                created_by: expense.created_by.clone(),
            },
            SourceRecord::Investment(investment) => NewTransaction {
                transaction_type: TransactionType::Investment,
                reference_id: investment.id.clone(),
                occurred_on: processed_on,
                amount: investment.current_balance.clone(),
                created_by: investment.created_by.clone(),
            },
        }
    }
}
