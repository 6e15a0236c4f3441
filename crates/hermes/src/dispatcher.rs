//! Command dispatch over Redis Streams.

use std::sync::Arc;

use async_trait::async_trait;
use deadpool_redis::redis;

use athena_common::correlation::REPLY_CHANNEL_HEADER;
use athena_common::{AppError, AppResult, CorrelationKey, KeyCodec, MessageHeaders};

use crate::command::ExecutionCommand;
use crate::config::DispatchConfig;

/// Stream field holding the JSON command body.
pub const PAYLOAD_FIELD: &str = "payload";

/// Sends an execution request for one (solution, test case) pair.
///
/// Returns once the command is handed to the bus; the result arrives later
/// on the reply stream.
#[async_trait]
pub trait CommandDispatcher: Send + Sync {
    async fn request_execution(
        &self,
        command: &ExecutionCommand,
        key: CorrelationKey,
    ) -> AppResult<()>;
}

/// Flatten headers and payload into XADD field/value pairs.
///
/// Headers come first, sorted by name, followed by the payload field.
pub fn command_fields(headers: &MessageHeaders, payload: String) -> Vec<(String, String)> {
    let mut fields: Vec<(String, String)> = headers
        .iter()
        .map(|(name, value)| (name.clone(), value.clone()))
        .collect();
    fields.sort();
    fields.push((PAYLOAD_FIELD.to_string(), payload));
    fields
}

/// Publishes commands with `XADD` to the configured command stream.
pub struct StreamDispatcher {
    redis_pool: deadpool_redis::Pool,
    config: DispatchConfig,
    codec: Arc<dyn KeyCodec>,
}

impl StreamDispatcher {
    pub fn new(
        redis_pool: deadpool_redis::Pool,
        config: DispatchConfig,
        codec: Arc<dyn KeyCodec>,
    ) -> Self {
        Self {
            redis_pool,
            config,
            codec,
        }
    }

    /// Metadata attached to a command for `key`.
    pub fn headers_for(&self, key: &CorrelationKey) -> MessageHeaders {
        let mut headers = MessageHeaders::new();
        self.codec.write(key, &mut headers);
        headers.insert(
            REPLY_CHANNEL_HEADER.to_string(),
            self.config.reply_stream.clone(),
        );
        headers
    }
}

#[async_trait]
impl CommandDispatcher for StreamDispatcher {
    async fn request_execution(
        &self,
        command: &ExecutionCommand,
        key: CorrelationKey,
    ) -> AppResult<()> {
        let fields = command_fields(&self.headers_for(&key), command.to_json()?);

        let mut conn = self
            .redis_pool
            .get()
            .await
            .map_err(|e| AppError::Queue(format!("Failed to get Redis connection: {}", e)))?;

        let mut cmd = redis::cmd("XADD");
        cmd.arg(&self.config.command_stream);
        if let Some(maxlen) = self.config.command_stream_maxlen {
            cmd.arg("MAXLEN").arg("~").arg(maxlen);
        }
        cmd.arg("*");
        for (field, value) in &fields {
            cmd.arg(field).arg(value);
        }

        let stream_id: String = cmd
            .query_async(&mut *conn)
            .await
            .map_err(|e| AppError::Queue(format!("Failed to publish execution command: {}", e)))?;

        tracing::info!(
            solution_id = key.solution_id,
            test_case_id = key.test_case_id,
            stream_id = %stream_id,
            stream = %self.config.command_stream,
            "Execution command dispatched"
        );

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use athena_common::HeaderKeyCodec;
    use athena_common::correlation::{SOLUTION_ID_HEADER, TEST_CASE_ID_HEADER};

    fn test_dispatcher() -> StreamDispatcher {
        let pool = deadpool_redis::Config::from_url("redis://127.0.0.1:6379")
            .create_pool(Some(deadpool_redis::Runtime::Tokio1))
            .unwrap();
        StreamDispatcher::new(pool, DispatchConfig::default(), Arc::new(HeaderKeyCodec::default()))
    }

    #[tokio::test]
    async fn test_headers_carry_key_and_reply_channel() {
        let dispatcher = test_dispatcher();
        let headers = dispatcher.headers_for(&CorrelationKey::new(42, 7));

        assert_eq!(headers.get(SOLUTION_ID_HEADER).map(String::as_str), Some("42"));
        assert_eq!(headers.get(TEST_CASE_ID_HEADER).map(String::as_str), Some("7"));
        assert_eq!(
            headers.get(REPLY_CHANNEL_HEADER).map(String::as_str),
            Some("execution_replies")
        );
    }

    #[test]
    fn test_command_fields_order() {
        let mut headers = MessageHeaders::new();
        headers.insert(TEST_CASE_ID_HEADER.to_string(), "7".to_string());
        headers.insert(SOLUTION_ID_HEADER.to_string(), "42".to_string());
        headers.insert(REPLY_CHANNEL_HEADER.to_string(), "replies".to_string());

        let fields = command_fields(&headers, "{}".to_string());
        let names: Vec<&str> = fields.iter().map(|(name, _)| name.as_str()).collect();
        assert_eq!(names, vec!["Reply-Channel", "Solution-Id", "TestCase-Id", "payload"]);
        assert_eq!(fields[3].1, "{}");
    }

    #[test]
    fn test_key_is_not_in_payload() {
        let command = ExecutionCommand::new("fn main() {}", athena_common::Language::Rust);
        let payload = command.to_json().unwrap();
        assert!(!payload.contains("solutionId"));
        assert!(!payload.contains("Solution-Id"));
    }
}
