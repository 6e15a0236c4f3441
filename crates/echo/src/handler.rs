//! Correlates one reply message and hands it to the result processor.

use std::sync::Arc;

use athena_common::{
    AppError, AppResult, ExecutionResult, KeyCodec, MessageHeaders, ResultProcessor,
};

/// Why a reply was acknowledged without being recorded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    MissingCorrelation,
    Undecodable,
    UnknownEntity,
    Rejected,
}

impl DropReason {
    /// Metric label
    pub fn as_str(&self) -> &'static str {
        match self {
            DropReason::MissingCorrelation => "missing_correlation",
            DropReason::Undecodable => "undecodable",
            DropReason::UnknownEntity => "unknown_entity",
            DropReason::Rejected => "rejected",
        }
    }
}

/// What became of a handled reply. Both outcomes are acknowledged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Processed,
    Dropped(DropReason),
}

pub struct ReplyHandler {
    codec: Arc<dyn KeyCodec>,
    processor: Arc<dyn ResultProcessor>,
}

impl ReplyHandler {
    pub fn new(codec: Arc<dyn KeyCodec>, processor: Arc<dyn ResultProcessor>) -> Self {
        Self { codec, processor }
    }

    /// Correlate and record one reply.
    ///
    /// Errors caused by the message are turned into [`Outcome::Dropped`];
    /// only transport and storage failures are returned, so the message stays
    /// pending and is delivered again.
    pub async fn handle(&self, headers: &MessageHeaders, body: &[u8]) -> AppResult<Outcome> {
        let key = match self.codec.read(headers) {
            Ok(key) => key,
            Err(e) => {
                tracing::warn!(error = %e, "Dropping reply without correlation key");
                return Ok(Outcome::Dropped(DropReason::MissingCorrelation));
            }
        };

        let result = match ExecutionResult::decode(body) {
            Ok(result) => result,
            Err(e) => {
                tracing::warn!(
                    solution_id = key.solution_id,
                    test_case_id = key.test_case_id,
                    error = %e,
                    "Dropping undecodable reply"
                );
                return Ok(Outcome::Dropped(DropReason::Undecodable));
            }
        };

        match self.processor.process(key, result).await {
            Ok(()) => Ok(Outcome::Processed),
            Err(AppError::NotFound(msg)) => {
                tracing::warn!(
                    solution_id = key.solution_id,
                    test_case_id = key.test_case_id,
                    reason = %msg,
                    "Reply refers to unknown entities"
                );
                Ok(Outcome::Dropped(DropReason::UnknownEntity))
            }
            Err(e) if e.is_permanent() => {
                tracing::warn!(
                    solution_id = key.solution_id,
                    test_case_id = key.test_case_id,
                    error = %e,
                    "Reply rejected by processor"
                );
                Ok(Outcome::Dropped(DropReason::Rejected))
            }
            Err(e) => Err(e),
        }
    }
}
