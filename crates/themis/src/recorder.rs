//! Stores execution results delivered by the reply consumer.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;

use athena_common::{AppError, AppResult, CorrelationKey, ExecutionResult, ResultProcessor};

use crate::models::ExecutionRecord;
use crate::store::{Store, not_found};

/// Records the latest result of each (solution, test case) pair.
///
/// Processing the same reply twice leaves the same state behind.
pub struct ResultRecorder {
    store: Arc<dyn Store>,
}

impl ResultRecorder {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl ResultProcessor for ResultRecorder {
    async fn process(&self, key: CorrelationKey, result: ExecutionResult) -> AppResult<()> {
        let solution = self
            .store
            .find_solution(key.solution_id)
            .await?
            .ok_or_else(|| not_found("Solution", key.solution_id))?;
        let test_case = self
            .store
            .find_test_case(key.test_case_id)
            .await?
            .ok_or_else(|| not_found("Test case", key.test_case_id))?;
        if test_case.exercise_id != solution.exercise_id {
            return Err(AppError::NotFound(format!(
                "Test case {} is not part of exercise {}",
                test_case.id, solution.exercise_id
            )));
        }

        let kind = result.kind();
        self.store
            .upsert_result(ExecutionRecord::new(key, result, Utc::now()))
            .await?;

        tracing::info!(
            solution_id = key.solution_id,
            test_case_id = key.test_case_id,
            result = %kind,
            "Execution result recorded"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Exam, ExerciseSolution, Submission, TestCase};
    use crate::store::MemoryStore;
    use crate::test_utils::{exam_fixture, exercise_fixture, test_case_fixture};
    use athena_common::Visibility;
    use std::time::Duration;

    /// A submitted solution with one test case. Returns (store, key).
    async fn seeded() -> (Arc<dyn Store>, CorrelationKey) {
        let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
        let exam = store.insert_exam(exam_fixture("alice")).await.unwrap();
        let exercise = store
            .insert_exercise(exercise_fixture(exam.id), Box::new(|_: &Exam| Ok(())))
            .await
            .unwrap();
        let test_case = store
            .insert_test_case(test_case_fixture(exercise.id), Box::new(|_: &Exam| Ok(())))
            .await
            .unwrap();
        let submission = store
            .insert_submission(
                Submission::new(exam.id, "bob").unwrap(),
                Box::new(|_: &Exam| Ok(())),
            )
            .await
            .unwrap();
        let solution = ExerciseSolution::new(&exercise, &submission, "answer", None, None).unwrap();
        let solution = store
            .insert_solution(solution, Box::new(|_: &Submission| Ok(())))
            .await
            .unwrap();
        (store, CorrelationKey::new(solution.id, test_case.id))
    }

    #[tokio::test]
    async fn test_processing_is_idempotent() {
        let (store, key) = seeded().await;
        let recorder = ResultRecorder::new(store.clone());
        let result = ExecutionResult::finished(0, vec!["42".into()], vec![]);

        recorder.process(key, result.clone()).await.unwrap();
        let once = store.find_result(key).await.unwrap().unwrap();

        tokio::time::sleep(Duration::from_millis(5)).await;
        recorder.process(key, result.clone()).await.unwrap();
        let twice = store.find_result(key).await.unwrap().unwrap();

        assert_eq!(once, twice);
        let records = store.list_results(key.solution_id).await.unwrap();
        assert_eq!(records, vec![once]);
    }

    #[tokio::test]
    async fn test_later_result_replaces_earlier() {
        let (store, key) = seeded().await;
        let recorder = ResultRecorder::new(store.clone());

        recorder.process(key, ExecutionResult::TimedOut).await.unwrap();
        recorder
            .process(key, ExecutionResult::compile_error(vec!["line 1".into()]))
            .await
            .unwrap();

        let record = store.find_result(key).await.unwrap().unwrap();
        assert_eq!(record.result, ExecutionResult::compile_error(vec!["line 1".into()]));
    }

    #[tokio::test]
    async fn test_unknown_pair_is_not_found() {
        let (store, key) = seeded().await;
        let recorder = ResultRecorder::new(store.clone());

        let missing = CorrelationKey::new(key.solution_id, 9999);
        let err = recorder
            .process(missing, ExecutionResult::TimedOut)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));

        let missing = CorrelationKey::new(9999, key.test_case_id);
        let err = recorder
            .process(missing, ExecutionResult::TimedOut)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_test_case_of_other_exercise_is_not_found() {
        let (store, key) = seeded().await;
        let solution = store.find_solution(key.solution_id).await.unwrap().unwrap();
        let exercise = store.find_exercise(solution.exercise_id).await.unwrap().unwrap();
        let other_exercise = store
            .insert_exercise(exercise_fixture(exercise.exam_id), Box::new(|_: &Exam| Ok(())))
            .await
            .unwrap();
        let mut other_case = test_case_fixture(other_exercise.id);
        other_case.visibility = Visibility::Private;
        let other_case: TestCase = store
            .insert_test_case(other_case, Box::new(|_: &Exam| Ok(())))
            .await
            .unwrap();

        let recorder = ResultRecorder::new(store.clone());
        let err = recorder
            .process(
                CorrelationKey::new(key.solution_id, other_case.id),
                ExecutionResult::UnknownError,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
        assert!(store.list_results(key.solution_id).await.unwrap().is_empty());
    }
}
