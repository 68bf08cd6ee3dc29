use chrono::{NaiveDate, Utc};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use crate::bus::{Delivery, EventStream};
use crate::domain::{NewTransaction, SourceKind, SourceRecord, Transaction};
use crate::ports::{RepositoryError, TransactionRepository};

const BUS_ERROR_BACKOFF_SECS: u64 = 5;
const STORE_RETRY_BACKOFF_SECS: u64 = 5;

#[derive(Error, Debug)]
pub enum IngestError {
    #[error("Malformed {channel} event: {source}")]
    Malformed {
        channel: SourceKind,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to persist {channel} event: {source}")]
    Store {
        channel: SourceKind,
        #[source]
        source: RepositoryError,
    },
}

/// What happened to one delivery.
#[derive(Debug)]
pub enum IngestOutcome {
    Persisted(Transaction),
    Discarded(String),
    /// Left unacknowledged; the consumer replays it before reading anything newer.
    Deferred(String),
}

/// Turns domain-change events into upserted transaction rows.
#[derive(Clone)]
pub struct EventIngestor {
    repository: Arc<dyn TransactionRepository>,
}

impl EventIngestor {
    pub fn new(repository: Arc<dyn TransactionRepository>) -> Self {
        Self { repository }
    }

    pub fn normalize(
        &self,
        channel: SourceKind,
        payload: &[u8],
        processed_on: NaiveDate,
    ) -> Result<NewTransaction, IngestError> {
        SourceRecord::from_json(channel, payload)
            .map(|record| record.normalize(processed_on))
            .map_err(|source| IngestError::Malformed { channel, source })
    }

    pub async fn ingest(&self, channel: SourceKind, payload: &[u8]) -> Result<Transaction, IngestError> {
        self.ingest_on(channel, payload, Utc::now().date_naive()).await
    }

    pub async fn ingest_on(
        &self,
        channel: SourceKind,
        payload: &[u8],
        processed_on: NaiveDate,
    ) -> Result<Transaction, IngestError> {
        let tx = self.normalize(channel, payload, processed_on)?;
        self.repository
            .upsert(&tx)
            .await
            .map_err(|source| IngestError::Store { channel, source })
    }

    /// Processes one delivery and acknowledges it unless persistence failed.
    pub async fn handle_delivery<S: EventStream + ?Sized>(&self, stream: &mut S, delivery: Delivery) -> IngestOutcome {
        let channel = stream.channel();

        let outcome = match self.ingest(channel, &delivery.payload).await {
            Ok(tx) => {
                info!(
                    channel = %channel,
                    reference_id = %tx.reference_id,
                    "Transaction saved from event"
                );
                IngestOutcome::Persisted(tx)
            }
            Err(e @ IngestError::Malformed { .. }) => {
                warn!(channel = %channel, delivery_id = %delivery.id, error = %e, "Discarding event");
                IngestOutcome::Discarded(e.to_string())
            }
            Err(e @ IngestError::Store { .. }) => {
                error!(channel = %channel, delivery_id = %delivery.id, error = %e, "Error processing event");
                return IngestOutcome::Deferred(e.to_string());
            }
        };

        if let Err(e) = stream.ack(&delivery.id).await {
            error!(channel = %channel, delivery_id = %delivery.id, error = %e, "Failed to acknowledge event");
        }

        outcome
    }
}

/// Long-lived consumer for one channel. Deliveries are handled strictly in
/// order; the loop ends when `shutdown` flips or its sender is dropped.
///
/// A delivery that cannot be persisted halts the channel: the rest of the
/// batch is left pending, and after a pause the stream is rewound so the
/// failed delivery is retried before any later one.
pub async fn run_consumer<S: EventStream>(
    ingestor: EventIngestor,
    mut stream: S,
    mut shutdown: watch::Receiver<bool>,
) {
    let channel = stream.channel();
    info!(channel = %channel, "Event consumer started");

    loop {
        if *shutdown.borrow() {
            break;
        }

        let batch = tokio::select! {
            _ = shutdown.changed() => break,
            batch = stream.next_batch() => batch,
        };

        let deliveries = match batch {
            Ok(deliveries) => deliveries,
            Err(e) => {
                error!(channel = %channel, error = %e, "Event channel read failed");
                tokio::select! {
                    _ = shutdown.changed() => break,
                    _ = sleep(Duration::from_secs(BUS_ERROR_BACKOFF_SECS)) => continue,
                }
            }
        };

        if !deliveries.is_empty() {
            debug!(channel = %channel, count = deliveries.len(), "Processing event batch");
        }

        let mut deferred = false;
        for delivery in deliveries {
            if let IngestOutcome::Deferred(_) = ingestor.handle_delivery(&mut stream, delivery).await {
                deferred = true;
                break;
            }
        }

        if deferred {
            warn!(
                channel = %channel,
                retry_in_secs = STORE_RETRY_BACKOFF_SECS,
                "Store unavailable, pausing channel"
            );
            stream.rewind();
            tokio::select! {
                _ = shutdown.changed() => break,
                _ = sleep(Duration::from_secs(STORE_RETRY_BACKOFF_SECS)) => {}
            }
        }
    }

    info!(channel = %channel, "Event consumer stopped");
}
