//! Execution outcome reported by the executor service.
//!
//! The wire form is a JSON object whose `type` field selects the variant:
//!
//! ```json
//! {"type": "FINISHED", "exitCode": 0, "stdout": ["ok"], "stderr": []}
//! {"type": "COMPILE_ERROR", "compilerErrors": ["syntax error line 3"]}
//! {"type": "TIMED_OUT"}
//! ```

use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};

/// Outcome of running one solution against one test case.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExecutionResult {
    /// The program ran to completion
    #[serde(rename_all = "camelCase")]
    Finished {
        exit_code: i32,
        stdout: Vec<String>,
        stderr: Vec<String>,
    },
    /// The program did not compile
    #[serde(rename_all = "camelCase")]
    CompileError { compiler_errors: Vec<String> },
    /// The program exceeded its timeout
    TimedOut,
    /// The sandbox could not be prepared
    InitializationError,
    /// The executor failed for an unspecified reason
    UnknownError,
}

/// Discriminator of an [`ExecutionResult`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExecutionResultKind {
    Finished,
    CompileError,
    TimedOut,
    InitializationError,
    UnknownError,
}

impl ExecutionResultKind {
    /// The value of the `type` tag on the wire.
    pub fn tag(&self) -> &'static str {
        match self {
            ExecutionResultKind::Finished => "FINISHED",
            ExecutionResultKind::CompileError => "COMPILE_ERROR",
            ExecutionResultKind::TimedOut => "TIMED_OUT",
            ExecutionResultKind::InitializationError => "INITIALIZATION_ERROR",
            ExecutionResultKind::UnknownError => "UNKNOWN_ERROR",
        }
    }
}

impl std::fmt::Display for ExecutionResultKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.tag())
    }
}

impl ExecutionResult {
    pub fn finished(exit_code: i32, stdout: Vec<String>, stderr: Vec<String>) -> Self {
        ExecutionResult::Finished {
            exit_code,
            stdout,
            stderr,
        }
    }

    pub fn compile_error(compiler_errors: Vec<String>) -> Self {
        ExecutionResult::CompileError { compiler_errors }
    }

    pub fn kind(&self) -> ExecutionResultKind {
        match self {
            ExecutionResult::Finished { .. } => ExecutionResultKind::Finished,
            ExecutionResult::CompileError { .. } => ExecutionResultKind::CompileError,
            ExecutionResult::TimedOut => ExecutionResultKind::TimedOut,
            ExecutionResult::InitializationError => ExecutionResultKind::InitializationError,
            ExecutionResult::UnknownError => ExecutionResultKind::UnknownError,
        }
    }

    /// Whether the program ran and exited with status 0.
    pub fn is_success(&self) -> bool {
        matches!(self, ExecutionResult::Finished { exit_code: 0, .. })
    }

    /// Decode a reply body.
    ///
    /// Unknown tags, missing variant fields and `null` lists (or `null`
    /// entries inside them) are rejected with [`AppError::Decode`].
    pub fn decode(payload: &[u8]) -> AppResult<Self> {
        serde_json::from_slice(payload)
            .map_err(|e| AppError::Decode(format!("invalid execution result: {}", e)))
    }

    pub fn decode_str(payload: &str) -> AppResult<Self> {
        Self::decode(payload.as_bytes())
    }

    pub fn encode(&self) -> AppResult<String> {
        serde_json::to_string(self)
            .map_err(|e| AppError::Internal(format!("failed to encode execution result: {}", e)))
    }

    pub fn to_value(&self) -> AppResult<serde_json::Value> {
        serde_json::to_value(self)
            .map_err(|e| AppError::Internal(format!("failed to encode execution result: {}", e)))
    }

    pub fn from_value(value: serde_json::Value) -> AppResult<Self> {
        serde_json::from_value(value)
            .map_err(|e| AppError::Decode(format!("invalid execution result: {}", e)))
    }
}
