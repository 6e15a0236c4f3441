//! Stored execution result

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use athena_common::{CorrelationKey, ExecutionResult, SolutionId, TestCaseId};

/// Latest execution result for a (solution, test case) pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionRecord {
    pub solution_id: SolutionId,
    pub test_case_id: TestCaseId,
    pub result: ExecutionResult,
    pub recorded_at: DateTime<Utc>,
}

impl ExecutionRecord {
    pub fn new(key: CorrelationKey, result: ExecutionResult, recorded_at: DateTime<Utc>) -> Self {
        Self {
            solution_id: key.solution_id,
            test_case_id: key.test_case_id,
            result,
            recorded_at,
        }
    }

    pub fn key(&self) -> CorrelationKey {
        CorrelationKey::new(self.solution_id, self.test_case_id)
    }
}
