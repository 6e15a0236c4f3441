//! Test case model

use serde::{Deserialize, Serialize};

use athena_common::{AppError, AppResult, ExerciseId, TestCaseId, Visibility};

/// Largest timeout that fits the `BIGINT` column
pub const MAX_TIMEOUT_MS: u64 = i64::MAX as u64;

/// Inputs and expected output for one execution of an exercise solution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestCase {
    pub id: TestCaseId,
    /// Owning exercise, fixed at creation
    pub exercise_id: ExerciseId,
    pub visibility: Visibility,
    /// Execution timeout in milliseconds; `None` uses the executor default
    pub timeout_ms: Option<u64>,
    pub program_arguments: Vec<String>,
    pub stdin: Vec<String>,
    pub expected_output: Vec<String>,
}

impl TestCase {
    pub fn new(
        exercise_id: ExerciseId,
        visibility: Visibility,
        timeout_ms: Option<u64>,
        program_arguments: Vec<String>,
        stdin: Vec<String>,
        expected_output: Vec<String>,
    ) -> AppResult<Self> {
        check_timeout(timeout_ms)?;
        check_expected_output(&expected_output)?;
        Ok(Self {
            id: 0,
            exercise_id,
            visibility,
            timeout_ms,
            program_arguments,
            stdin,
            expected_output,
        })
    }

    pub fn is_public(&self) -> bool {
        self.visibility == Visibility::Public
    }

    pub fn set_timeout_ms(&mut self, timeout_ms: Option<u64>) -> AppResult<()> {
        check_timeout(timeout_ms)?;
        self.timeout_ms = timeout_ms;
        Ok(())
    }

    pub fn set_expected_output(&mut self, expected_output: Vec<String>) -> AppResult<()> {
        check_expected_output(&expected_output)?;
        self.expected_output = expected_output;
        Ok(())
    }
}

fn check_timeout(timeout_ms: Option<u64>) -> AppResult<()> {
    match timeout_ms {
        Some(0) => Err(AppError::Validation("Test case timeout must be positive".to_string())),
        Some(ms) if ms > MAX_TIMEOUT_MS => Err(AppError::Validation(format!(
            "Test case timeout must not exceed {MAX_TIMEOUT_MS} ms"
        ))),
        _ => Ok(()),
    }
}

fn check_expected_output(expected_output: &[String]) -> AppResult<()> {
    if expected_output.is_empty() {
        return Err(AppError::Validation(
            "Test case expected output must not be empty".to_string(),
        ));
    }
    Ok(())
}
