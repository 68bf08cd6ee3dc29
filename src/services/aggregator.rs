use chrono::{NaiveDate, Utc};
use std::sync::Arc;
use thiserror::Error;

use crate::domain::{DashboardReport, NewTransaction, ReportRange, SourceKind, SourceRecord};
use crate::ports::{RepositoryError, SourceGateway, TransactionRepository};

#[derive(Error, Debug)]
pub enum AggregationError {
    #[error("No transactions available from any source")]
    NoDataAvailable,

    #[error("Failed to persist transactions: {0}")]
    Store(#[from] RepositoryError),
}

/// Pulls live snapshots from the three sources, persists them and reduces
/// them into a dashboard report.
#[derive(Clone)]
pub struct Aggregator {
    gateway: Arc<dyn SourceGateway>,
    repository: Arc<dyn TransactionRepository>,
}

impl Aggregator {
    pub fn new(gateway: Arc<dyn SourceGateway>, repository: Arc<dyn TransactionRepository>) -> Self {
        Self { gateway, repository }
    }

    pub async fn build_report(&self, range: ReportRange) -> Result<DashboardReport, AggregationError> {
        self.build_report_on(range, Utc::now().date_naive()).await
    }

    /// Same as [`build_report`](Self::build_report) with an explicit
    /// processing date for investment snapshots.
    pub async fn build_report_on(
        &self,
        range: ReportRange,
        processed_on: NaiveDate,
    ) -> Result<DashboardReport, AggregationError> {
        // All three fetches live inside this future; dropping it cancels them.
        let (incomes, expenses, investments) = tokio::join!(
            self.fetch_or_empty(SourceKind::Income),
            self.fetch_or_empty(SourceKind::Expense),
            self.fetch_or_empty(SourceKind::Investment),
        );

        let normalized: Vec<NewTransaction> = incomes
            .iter()
            .chain(expenses.iter())
            .chain(investments.iter())
            .map(|record| record.normalize(processed_on))
            .collect();

        if normalized.is_empty() {
            tracing::warn!(range = range.0, "No transactions found for the given range");
            return Err(AggregationError::NoDataAvailable);
        }

        let persisted = self.repository.upsert_many(&normalized).await.map_err(|e| {
            tracing::error!(range = range.0, error = %e, "Error generating dashboard data");
            AggregationError::Store(e)
        })?;

        tracing::info!(
            range = range.0,
            incomes = incomes.len(),
            expenses = expenses.len(),
            investments = investments.len(),
            "Dashboard report built"
        );

        Ok(DashboardReport::from_transactions(persisted))
    }

    async fn fetch_or_empty(&self, kind: SourceKind) -> Vec<SourceRecord> {
        match self.gateway.fetch_all(kind).await {
            Ok(records) => records,
            Err(e) => {
                tracing::error!(source = %kind, error = %e, "Error fetching source records");
                Vec::new()
            }
        }
    }
}
