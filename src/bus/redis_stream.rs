use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::streams::{StreamId, StreamReadOptions, StreamReadReply};
use redis::AsyncCommands;

use super::{BusError, Delivery, EventStream, PAYLOAD_FIELD};
use crate::domain::SourceKind;

const DEFAULT_BATCH_SIZE: usize = 16;
const DEFAULT_BLOCK_MS: usize = 5_000;

/// Consumer-group reader over one Redis stream.
///
/// Starts by replaying this consumer's own pending entries (delivered before a
/// crash or a failed write, never acknowledged), then switches to new entries.
pub struct RedisStreamConsumer {
    conn: MultiplexedConnection,
    channel: SourceKind,
    stream_key: String,
    group: String,
    consumer: String,
    batch_size: usize,
    block_ms: usize,
    backlog_cursor: Option<String>,
}

impl RedisStreamConsumer {
    pub async fn connect(
        client: &redis::Client,
        channel: SourceKind,
        stream_key: String,
        group: String,
        consumer: String,
    ) -> Result<Self, BusError> {
        let mut conn = client.get_multiplexed_async_connection().await?;
        ensure_group(&mut conn, &stream_key, &group).await?;

        Ok(Self {
            conn,
            channel,
            stream_key,
            group,
            consumer,
            batch_size: DEFAULT_BATCH_SIZE,
            block_ms: DEFAULT_BLOCK_MS,
            backlog_cursor: Some("0".to_string()),
        })
    }

    pub fn with_block_ms(mut self, block_ms: usize) -> Self {
        self.block_ms = block_ms;
        self
    }

    pub fn stream_key(&self) -> &str {
        &self.stream_key
    }
}

async fn ensure_group(conn: &mut MultiplexedConnection, stream_key: &str, group: &str) -> Result<(), BusError> {
    let created: Result<(), redis::RedisError> = conn.xgroup_create_mkstream(stream_key, group, "0").await;
    match created {
        Ok(()) => {
            tracing::info!(stream = %stream_key, group = %group, "Created consumer group");
            Ok(())
        }
        Err(e) if e.code() == Some("BUSYGROUP") => Ok(()),
        Err(e) => Err(e.into()),
    }
}

fn to_delivery(entry: StreamId) -> Delivery {
    let payload = entry
        .map
        .get(PAYLOAD_FIELD)
        .and_then(|value| redis::from_redis_value::<Vec<u8>>(value).ok())
        .unwrap_or_default();

    Delivery {
        id: entry.id,
        payload,
    }
}

#[async_trait]
impl EventStream for RedisStreamConsumer {
    fn channel(&self) -> SourceKind {
        self.channel
    }

    async fn next_batch(&mut self) -> Result<Vec<Delivery>, BusError> {
        let options = StreamReadOptions::default()
            .group(&self.group, &self.consumer)
            .count(self.batch_size);

        let (start_id, options) = match &self.backlog_cursor {
            Some(cursor) => (cursor.clone(), options),
            None => (">".to_string(), options.block(self.block_ms)),
        };

        let reply: Option<StreamReadReply> = self
            .conn
            .xread_options(&[&self.stream_key], &[&start_id], &options)
            .await?;

        let entries: Vec<StreamId> = reply
            .map(|r| r.keys.into_iter().flat_map(|k| k.ids).collect())
            .unwrap_or_default();

        if self.backlog_cursor.is_some() {
            match entries.last() {
                Some(last) => self.backlog_cursor = Some(last.id.clone()),
                None => {
                    tracing::debug!(stream = %self.stream_key, "Pending backlog drained");
                    self.backlog_cursor = None;
                }
            }
        }

        Ok(entries.into_iter().map(to_delivery).collect())
    }

    async fn ack(&mut self, delivery_id: &str) -> Result<(), BusError> {
        let _: i64 = self
            .conn
            .xack(&self.stream_key, &self.group, &[delivery_id])
            .await?;
        Ok(())
    }

    fn rewind(&mut self) {
        self.backlog_cursor = Some("0".to_string());
    }
}

/// Appends domain records to a channel.
#[derive(Clone)]
pub struct RedisStreamPublisher {
    conn: MultiplexedConnection,
}

impl RedisStreamPublisher {
    pub async fn connect(client: &redis::Client) -> Result<Self, BusError> {
        let conn = client.get_multiplexed_async_connection().await?;
        Ok(Self { conn })
    }

    /// Publishes an already-encoded JSON record and returns the entry id.
    pub async fn publish_raw(&self, stream_key: &str, payload: &str) -> Result<String, BusError> {
        let mut conn = self.conn.clone();
        let id: String = conn.xadd(stream_key, "*", &[(PAYLOAD_FIELD, payload)]).await?;
        tracing::info!(stream = %stream_key, entry_id = %id, "Message sent");
        Ok(id)
    }
}
