//! Durable event channels feeding the ingestor.

pub mod redis_stream;

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::SourceKind;

pub use redis_stream::{RedisStreamConsumer, RedisStreamPublisher};

/// Field of each stream entry that carries the JSON domain record.
pub const PAYLOAD_FIELD: &str = "payload";

#[derive(Error, Debug)]
pub enum BusError {
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),
}

/// One message pulled from a channel, not yet acknowledged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub id: String,
    pub payload: Vec<u8>,
}

/// A single channel read through a consumer group.
///
/// Unacknowledged deliveries are handed out again after a restart, which is
/// the only redelivery path.
#[async_trait]
pub trait EventStream: Send {
    fn channel(&self) -> SourceKind;

    /// Waits for the next batch. An empty batch means the wait timed out.
    async fn next_batch(&mut self) -> Result<Vec<Delivery>, BusError>;

    async fn ack(&mut self, delivery_id: &str) -> Result<(), BusError>;

    /// Makes the next read start over from this consumer's oldest
    /// unacknowledged delivery.
    fn rewind(&mut self);
}
