//! Redis Stream consumer for execution replies

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use anyhow::{Result, anyhow};
use deadpool_redis::redis;

use athena_common::MessageHeaders;
use hermes::dispatcher::PAYLOAD_FIELD;

use crate::config::Config;
use crate::handler::{DropReason, ReplyHandler};
use crate::metrics;

/// Read entries never delivered to any consumer of the group.
const NEW_MESSAGES: &str = ">";

/// Re-read entries already delivered to this consumer but not acknowledged.
const OWN_PENDING: &str = "0";

/// One stream entry, split into metadata and body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamMessage {
    pub id: String,
    pub headers: MessageHeaders,
    pub payload: Option<Vec<u8>>,
}

/// Reply consumer; several may share one consumer group.
pub struct ReplyConsumer {
    config: Arc<Config>,
    consumer_name: String,
    redis_pool: deadpool_redis::Pool,
    handler: Arc<ReplyHandler>,
    shutdown: Arc<AtomicBool>,
}

impl ReplyConsumer {
    pub fn new(
        config: Arc<Config>,
        consumer_name: String,
        redis_pool: deadpool_redis::Pool,
        handler: Arc<ReplyHandler>,
        shutdown: Arc<AtomicBool>,
    ) -> Self {
        Self {
            config,
            consumer_name,
            redis_pool,
            handler,
            shutdown,
        }
    }

    /// Create the consumer group (and the stream) unless it exists
    pub async fn initialize(&self) -> Result<()> {
        let mut conn = self.redis_pool.get().await?;

        let result: Result<(), redis::RedisError> = redis::cmd("XGROUP")
            .arg("CREATE")
            .arg(&self.config.reply_stream)
            .arg(&self.config.consumer_group)
            .arg("0")
            .arg("MKSTREAM")
            .query_async(&mut *conn)
            .await;

        match result {
            Ok(_) => {
                tracing::info!(
                    "Created consumer group '{}' on stream '{}'",
                    self.config.consumer_group,
                    self.config.reply_stream
                );
            }
            Err(e) if e.to_string().contains("BUSYGROUP") => {
                tracing::debug!("Consumer group already exists");
            }
            Err(e) => {
                return Err(anyhow!("Failed to create consumer group: {}", e));
            }
        }

        Ok(())
    }

    /// Run the consumer loop until shutdown is requested
    pub async fn run(&self) -> Result<()> {
        tracing::info!(
            consumer = %self.consumer_name,
            group = %self.config.consumer_group,
            stream = %self.config.reply_stream,
            "Starting reply consumer"
        );

        if let Err(e) = self.recover_pending().await {
            if e.to_string().contains("NOGROUP") {
                tracing::warn!("Consumer group not found during recovery, re-initializing...");
                self.initialize().await?;
            } else {
                return Err(e);
            }
        }

        while !self.shutdown.load(Ordering::SeqCst) {
            match self.process_batch(NEW_MESSAGES).await {
                Ok(0) => {
                    // Idle: retry what this consumer left pending and pick up
                    // entries abandoned by dead consumers.
                    if let Err(e) = self.recover_pending().await {
                        tracing::warn!(consumer = %self.consumer_name, "Pending recovery failed: {}", e);
                    }
                }
                Ok(_) => {}
                Err(e) => {
                    let err_msg = e.to_string();
                    tracing::error!(consumer = %self.consumer_name, "Error reading replies: {}", err_msg);

                    if err_msg.contains("NOGROUP") {
                        tracing::warn!("Consumer group missing, re-initializing...");
                        if let Err(init_err) = self.initialize().await {
                            tracing::error!("Failed to re-initialize consumer group: {}", init_err);
                        }
                    }

                    tokio::time::sleep(Duration::from_secs(1)).await;
                }
            }
        }

        tracing::info!(consumer = %self.consumer_name, "Reply consumer shutting down");
        Ok(())
    }

    async fn recover_pending(&self) -> Result<()> {
        self.claim_idle_messages().await?;
        self.process_batch(OWN_PENDING).await?;
        Ok(())
    }

    /// Take over pending entries whose consumer has been idle too long
    async fn claim_idle_messages(&self) -> Result<()> {
        let mut conn = self.redis_pool.get().await?;

        let pending: Vec<(String, String, u64, u64)> = redis::cmd("XPENDING")
            .arg(&self.config.reply_stream)
            .arg(&self.config.consumer_group)
            .arg("IDLE")
            .arg(self.config.claim_idle_ms)
            .arg("-")
            .arg("+")
            .arg(self.config.batch_size)
            .query_async(&mut *conn)
            .await?;

        let abandoned: Vec<&str> = pending
            .iter()
            .filter(|(_, consumer, _, _)| *consumer != self.consumer_name)
            .map(|(id, _, _, _)| id.as_str())
            .collect();
        if abandoned.is_empty() {
            return Ok(());
        }

        tracing::info!(
            consumer = %self.consumer_name,
            count = abandoned.len(),
            "Claiming abandoned replies"
        );
        redis::cmd("XCLAIM")
            .arg(&self.config.reply_stream)
            .arg(&self.config.consumer_group)
            .arg(&self.consumer_name)
            .arg(self.config.claim_idle_ms)
            .arg(&abandoned)
            .arg("JUSTID")
            .query_async::<Vec<String>>(&mut *conn)
            .await?;

        Ok(())
    }

    /// Read and handle one batch. Returns the number of entries read.
    async fn process_batch(&self, start_id: &str) -> Result<usize> {
        let mut conn = self.redis_pool.get().await?;

        let mut cmd = redis::cmd("XREADGROUP");
        cmd.arg("GROUP")
            .arg(&self.config.consumer_group)
            .arg(&self.consumer_name)
            .arg("COUNT")
            .arg(self.config.batch_size);
        if start_id == NEW_MESSAGES {
            cmd.arg("BLOCK").arg(self.config.block_timeout_ms);
        }
        let result: Vec<redis::Value> = cmd
            .arg("STREAMS")
            .arg(&self.config.reply_stream)
            .arg(start_id)
            .query_async(&mut *conn)
            .await?;
        drop(conn);

        let messages = parse_stream_messages(&result)?;
        for message in &messages {
            self.handle_message(message).await?;
        }
        Ok(messages.len())
    }

    async fn handle_message(&self, message: &StreamMessage) -> Result<()> {
        let Some(payload) = message.payload.as_deref() else {
            tracing::warn!(message_id = %message.id, "Dropping reply without payload");
            metrics::record_drop(DropReason::Undecodable);
            return self.ack_message(&message.id).await;
        };

        match self.handler.handle(&message.headers, payload).await {
            Ok(outcome) => {
                metrics::record_outcome(outcome);
                self.ack_message(&message.id).await?;
                tracing::debug!(message_id = %message.id, ?outcome, "Reply handled");
            }
            Err(e) => {
                // Left pending; redelivered on the next recovery pass.
                metrics::record_failure();
                tracing::error!(message_id = %message.id, error = %e, "Failed to record reply");
            }
        }
        Ok(())
    }

    async fn ack_message(&self, message_id: &str) -> Result<()> {
        let mut conn = self.redis_pool.get().await?;

        redis::cmd("XACK")
            .arg(&self.config.reply_stream)
            .arg(&self.config.consumer_group)
            .arg(message_id)
            .query_async::<i64>(&mut *conn)
            .await?;

        Ok(())
    }
}

/// Parse an XREADGROUP response for a single stream.
///
/// Shape: `[[stream_name, [[message_id, [field, value, ...]], ...]]]`. The
/// field list is nil for entries deleted while pending.
pub fn parse_stream_messages(result: &[redis::Value]) -> Result<Vec<StreamMessage>> {
    let stream_data = match result.first() {
        Some(redis::Value::Array(data)) => data,
        None => return Ok(Vec::new()),
        _ => return Err(anyhow!("Invalid stream response format")),
    };

    let entries = match stream_data.get(1) {
        Some(redis::Value::Array(entries)) => entries,
        _ => return Err(anyhow!("No messages in response")),
    };

    let mut messages = Vec::with_capacity(entries.len());
    for entry in entries {
        let entry = match entry {
            redis::Value::Array(entry) => entry,
            _ => return Err(anyhow!("No message data")),
        };

        let id = match entry.first() {
            Some(redis::Value::BulkString(id)) => String::from_utf8_lossy(id).to_string(),
            _ => return Err(anyhow!("Invalid message ID")),
        };

        let mut headers = MessageHeaders::new();
        let mut payload = None;
        if let Some(redis::Value::Array(fields)) = entry.get(1) {
            for chunk in fields.chunks(2) {
                if let [redis::Value::BulkString(key), redis::Value::BulkString(value)] = chunk {
                    let key = String::from_utf8_lossy(key).to_string();
                    if key == PAYLOAD_FIELD {
                        payload = Some(value.clone());
                    } else {
                        headers.insert(key, String::from_utf8_lossy(value).to_string());
                    }
                }
            }
        }

        messages.push(StreamMessage { id, headers, payload });
    }

    Ok(messages)
}

#[cfg(test)]
mod tests {
    use super::*;
    use redis::Value;

    fn bulk(s: &str) -> Value {
        Value::BulkString(s.as_bytes().to_vec())
    }

    fn entry(id: &str, fields: &[(&str, &str)]) -> Value {
        let fields = fields
            .iter()
            .flat_map(|(k, v)| [bulk(k), bulk(v)])
            .collect();
        Value::Array(vec![bulk(id), Value::Array(fields)])
    }

    fn response(entries: Vec<Value>) -> Vec<Value> {
        vec![Value::Array(vec![bulk("execution_replies"), Value::Array(entries)])]
    }

    #[test]
    fn test_parse_splits_headers_from_payload() {
        let body = r#"{"type":"FINISHED","exitCode":0,"stdout":["ok"],"stderr":[]}"#;
        let result = response(vec![
            entry(
                "1700000000000-0",
                &[("Solution-Id", "42"), ("TestCase-Id", "7"), ("payload", body)],
            ),
            entry("1700000000000-1", &[("TestCase-Id", "8"), ("payload", "{}")]),
        ]);

        let messages = parse_stream_messages(&result).unwrap();
        assert_eq!(messages.len(), 2);

        let first = &messages[0];
        assert_eq!(first.id, "1700000000000-0");
        assert_eq!(first.headers.get("Solution-Id").map(String::as_str), Some("42"));
        assert_eq!(first.headers.get("TestCase-Id").map(String::as_str), Some("7"));
        assert!(!first.headers.contains_key("payload"));
        assert_eq!(first.payload.as_deref(), Some(body.as_bytes()));

        assert_eq!(messages[1].headers.len(), 1);
    }

    #[test]
    fn test_parse_empty_and_deleted_entries() {
        assert!(parse_stream_messages(&[]).unwrap().is_empty());
        assert!(parse_stream_messages(&response(vec![])).unwrap().is_empty());

        let deleted = Value::Array(vec![bulk("1-0"), Value::Nil]);
        let messages = parse_stream_messages(&response(vec![deleted])).unwrap();
        assert_eq!(messages[0].id, "1-0");
        assert!(messages[0].headers.is_empty());
        assert!(messages[0].payload.is_none());
    }

    #[test]
    fn test_parse_rejects_malformed_response() {
        assert!(parse_stream_messages(&[Value::Nil]).is_err());
        let no_id = Value::Array(vec![Value::Nil]);
        assert!(parse_stream_messages(&response(vec![no_id])).is_err());
    }
}
