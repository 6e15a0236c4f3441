//! Correlation of asynchronous execution replies with their requests.
//!
//! A command carries its [`CorrelationKey`] as message metadata; the executor
//! copies that metadata onto its reply. How the key is written to and read
//! from metadata is decided by a [`KeyCodec`].

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};
use crate::result::ExecutionResult;
use crate::types::{SolutionId, TestCaseId};

/// Header naming the solution of a command or reply.
pub const SOLUTION_ID_HEADER: &str = "Solution-Id";

/// Header naming the test case of a command or reply.
pub const TEST_CASE_ID_HEADER: &str = "TestCase-Id";

/// Header naming the stream the executor must reply to.
pub const REPLY_CHANNEL_HEADER: &str = "Reply-Channel";

/// Message metadata, separate from the message body.
pub type MessageHeaders = HashMap<String, String>;

/// Identifies the (solution, test case) pair an execution belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CorrelationKey {
    pub solution_id: SolutionId,
    pub test_case_id: TestCaseId,
}

impl CorrelationKey {
    pub fn new(solution_id: SolutionId, test_case_id: TestCaseId) -> Self {
        Self {
            solution_id,
            test_case_id,
        }
    }
}

impl std::fmt::Display for CorrelationKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "solution {} / test case {}", self.solution_id, self.test_case_id)
    }
}

/// Writes a correlation key into message metadata and reads it back.
pub trait KeyCodec: Send + Sync {
    fn write(&self, key: &CorrelationKey, headers: &mut MessageHeaders);

    /// Fails with [`AppError::MissingCorrelationData`] when a component is
    /// absent or not an integer.
    fn read(&self, headers: &MessageHeaders) -> AppResult<CorrelationKey>;
}

/// Carries the key as two independent decimal headers.
#[derive(Debug, Clone)]
pub struct HeaderKeyCodec {
    solution_header: String,
    test_case_header: String,
}

impl Default for HeaderKeyCodec {
    fn default() -> Self {
        Self::new(SOLUTION_ID_HEADER, TEST_CASE_ID_HEADER)
    }
}

impl HeaderKeyCodec {
    pub fn new(solution_header: impl Into<String>, test_case_header: impl Into<String>) -> Self {
        Self {
            solution_header: solution_header.into(),
            test_case_header: test_case_header.into(),
        }
    }

    fn read_id(&self, headers: &MessageHeaders, name: &str) -> AppResult<i64> {
        let raw = headers
            .get(name)
            .ok_or_else(|| AppError::MissingCorrelationData(format!("header '{}' is absent", name)))?;

        raw.trim().parse::<i64>().map_err(|_| {
            AppError::MissingCorrelationData(format!(
                "header '{}' is not an integer: '{}'",
                name, raw
            ))
        })
    }
}

impl KeyCodec for HeaderKeyCodec {
    fn write(&self, key: &CorrelationKey, headers: &mut MessageHeaders) {
        headers.insert(self.solution_header.clone(), key.solution_id.to_string());
        headers.insert(self.test_case_header.clone(), key.test_case_id.to_string());
    }

    fn read(&self, headers: &MessageHeaders) -> AppResult<CorrelationKey> {
        let solution_id = self.read_id(headers, &self.solution_header)?;
        let test_case_id = self.read_id(headers, &self.test_case_header)?;
        Ok(CorrelationKey::new(solution_id, test_case_id))
    }
}

/// Domain callback invoked for every correlated reply.
///
/// Implementations must be idempotent: applying the same result for the same
/// key twice leaves the same state as applying it once.
#[async_trait]
pub trait ResultProcessor: Send + Sync {
    /// Returns [`AppError::NotFound`] when the key does not name an existing
    /// (solution, test case) pair.
    async fn process(&self, key: CorrelationKey, result: ExecutionResult) -> AppResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(pairs: &[(&str, &str)]) -> MessageHeaders {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_header_codec_writes_both_components() {
        let codec = HeaderKeyCodec::default();
        let mut out = MessageHeaders::new();
        codec.write(&CorrelationKey::new(42, 7), &mut out);

        assert_eq!(out.get(SOLUTION_ID_HEADER).map(String::as_str), Some("42"));
        assert_eq!(out.get(TEST_CASE_ID_HEADER).map(String::as_str), Some("7"));
        assert_eq!(codec.read(&out).unwrap(), CorrelationKey::new(42, 7));
    }

    #[test]
    fn test_missing_component_is_rejected() {
        let codec = HeaderKeyCodec::default();

        let err = codec.read(&headers(&[(SOLUTION_ID_HEADER, "42")])).unwrap_err();
        assert!(matches!(err, AppError::MissingCorrelationData(_)));

        let err = codec.read(&headers(&[(TEST_CASE_ID_HEADER, "7")])).unwrap_err();
        assert!(matches!(err, AppError::MissingCorrelationData(_)));
    }

    #[test]
    fn test_non_integer_component_is_rejected() {
        let codec = HeaderKeyCodec::default();
        let err = codec
            .read(&headers(&[(SOLUTION_ID_HEADER, "forty-two"), (TEST_CASE_ID_HEADER, "7")]))
            .unwrap_err();
        assert!(matches!(err, AppError::MissingCorrelationData(_)));
    }

    #[test]
    fn test_custom_header_names() {
        let codec = HeaderKeyCodec::new("x-solution", "x-test-case");
        let parsed = codec
            .read(&headers(&[("x-solution", "1"), ("x-test-case", "2")]))
            .unwrap();
        assert_eq!(parsed, CorrelationKey::new(1, 2));
        assert!(codec
            .read(&headers(&[(SOLUTION_ID_HEADER, "1"), (TEST_CASE_ID_HEADER, "2")]))
            .is_err());
    }
}
