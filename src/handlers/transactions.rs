use axum::{
    extract::{Query, State},
    Json,
};
use serde::Deserialize;

use crate::domain::Transaction;
use crate::error::AppError;
use crate::validation::parse_transaction_type;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct TransactionQuery {
    #[serde(rename = "type")]
    pub transaction_type: Option<String>,
}

/// Stored transactions, optionally narrowed to one type. Never calls upstream.
pub async fn list_transactions(
    State(state): State<AppState>,
    Query(query): Query<TransactionQuery>,
) -> Result<Json<Vec<Transaction>>, AppError> {
    let transactions = match query.transaction_type.as_deref() {
        Some(raw) => {
            let transaction_type = parse_transaction_type(raw)?;
            state.repository.find_by_type(transaction_type).await?
        }
        None => state.repository.find_all().await?,
    };

    Ok(Json(transactions))
}
