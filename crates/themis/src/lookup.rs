//! Ownership lookups for the rule engine, answered from a [`Store`].

use std::sync::Arc;

use async_trait::async_trait;

use athena_common::{
    AppResult, ExamId, ExamState, ExerciseId, SolutionId, SubmissionId, TestCaseId,
};
use athena_rules::context::{OwnershipLookup, SolutionRef, SubmissionRef};

use crate::store::Store;

pub struct StoreLookup {
    store: Arc<dyn Store>,
}

impl StoreLookup {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl OwnershipLookup for StoreLookup {
    async fn exam_owners(&self, exam_id: ExamId) -> AppResult<Option<Vec<String>>> {
        Ok(self
            .store
            .find_exam(exam_id)
            .await?
            .map(|exam| exam.owners.into_iter().collect()))
    }

    async fn exam_state(&self, exam_id: ExamId) -> AppResult<Option<ExamState>> {
        Ok(self.store.find_exam(exam_id).await?.map(|exam| exam.state))
    }

    async fn exercise_exam(&self, exercise_id: ExerciseId) -> AppResult<Option<ExamId>> {
        Ok(self
            .store
            .find_exercise(exercise_id)
            .await?
            .map(|exercise| exercise.exam_id))
    }

    async fn test_case_exercise(&self, test_case_id: TestCaseId) -> AppResult<Option<ExerciseId>> {
        Ok(self
            .store
            .find_test_case(test_case_id)
            .await?
            .map(|test_case| test_case.exercise_id))
    }

    async fn submission(&self, submission_id: SubmissionId) -> AppResult<Option<SubmissionRef>> {
        Ok(self
            .store
            .find_submission(submission_id)
            .await?
            .map(|submission| SubmissionRef {
                exam_id: submission.exam_id,
                submitter: submission.submitter,
            }))
    }

    async fn solution(&self, solution_id: SolutionId) -> AppResult<Option<SolutionRef>> {
        Ok(self
            .store
            .find_solution(solution_id)
            .await?
            .map(|solution| SolutionRef {
                exercise_id: solution.exercise_id,
                submission_id: solution.submission_id,
            }))
    }
}
