//! Exercise solution service

use std::sync::Arc;

use validator::Validate;

use athena_common::{AppError, AppResult, CorrelationKey, SolutionId, SubmissionId, TestCaseId};
use athena_rules::AuthorizationGate;
use hermes::CommandDispatcher;

use crate::authorization::{
    require_solution_exam_owner, require_solution_read_access, require_solution_submitter,
    require_submission_read_access, require_submitter,
};
use crate::models::{ExecutionRecord, Exercise, ExerciseSolution, Submission};
use crate::payloads::{NewSolution, SolutionUpdate};
use crate::store::{Store, not_found};

use super::dispatch::{DispatchReport, build_command, dispatch_solution};

pub struct SolutionService {
    store: Arc<dyn Store>,
    gate: AuthorizationGate,
    dispatcher: Arc<dyn CommandDispatcher>,
}

impl SolutionService {
    pub fn new(store: Arc<dyn Store>, dispatcher: Arc<dyn CommandDispatcher>) -> Self {
        let gate = super::gate_for(store.clone());
        Self {
            store,
            gate,
            dispatcher,
        }
    }

    async fn load(&self, id: SolutionId) -> AppResult<ExerciseSolution> {
        self.store
            .find_solution(id)
            .await?
            .ok_or_else(|| not_found("Solution", id))
    }

    async fn load_exercise(&self, solution: &ExerciseSolution) -> AppResult<Exercise> {
        self.store
            .find_exercise(solution.exercise_id)
            .await?
            .ok_or_else(|| not_found("Exercise", solution.exercise_id))
    }

    /// Loads the solution for a re-run: it must exist, the principal must own
    /// its exam and the submission must already be placed.
    async fn load_for_retry(&self, principal: &str, id: SolutionId) -> AppResult<ExerciseSolution> {
        let solution = self.load(id).await?;
        require_solution_exam_owner(&self.gate.context(principal).with_solution(id)).await?;

        let submission = self
            .store
            .find_submission(solution.submission_id)
            .await?
            .ok_or_else(|| not_found("Submission", solution.submission_id))?;
        submission.ensure_submitted()?;
        Ok(solution)
    }

    pub async fn create(
        &self,
        principal: &str,
        submission_id: SubmissionId,
        payload: NewSolution,
    ) -> AppResult<ExerciseSolution> {
        payload.validate()?;
        let submission = self
            .store
            .find_submission(submission_id)
            .await?
            .ok_or_else(|| not_found("Submission", submission_id))?;
        require_submitter(&self.gate.context(principal).with_submission(submission_id)).await?;

        let exercise = self
            .store
            .find_exercise(payload.exercise_id)
            .await?
            .ok_or_else(|| not_found("Exercise", payload.exercise_id))?;

        let solution = ExerciseSolution::new(
            &exercise,
            &submission,
            payload.answer,
            payload.compiler_flags,
            payload.main_file_name,
        )?;
        let solution = self
            .store
            .insert_solution(
                solution,
                Box::new(|submission: &Submission| submission.ensure_unplaced()),
            )
            .await?;

        tracing::info!(
            submission_id,
            exercise_id = exercise.id,
            solution_id = solution.id,
            "Solution created"
        );
        Ok(solution)
    }

    pub async fn get(&self, principal: &str, id: SolutionId) -> AppResult<ExerciseSolution> {
        let solution = self.load(id).await?;
        require_solution_read_access(&self.gate.context(principal).with_solution(id)).await?;
        Ok(solution)
    }

    pub async fn list(
        &self,
        principal: &str,
        submission_id: SubmissionId,
    ) -> AppResult<Vec<ExerciseSolution>> {
        self.store
            .find_submission(submission_id)
            .await?
            .ok_or_else(|| not_found("Submission", submission_id))?;
        require_submission_read_access(&self.gate.context(principal).with_submission(submission_id))
            .await?;
        self.store.list_solutions(submission_id).await
    }

    pub async fn update(
        &self,
        principal: &str,
        id: SolutionId,
        payload: SolutionUpdate,
    ) -> AppResult<ExerciseSolution> {
        payload.validate()?;
        self.load(id).await?;
        require_solution_submitter(&self.gate.context(principal).with_solution(id)).await?;

        self.store
            .update_solution(
                id,
                Box::new(|submission: &Submission| submission.ensure_unplaced()),
                Box::new(move |solution: &mut ExerciseSolution| {
                    if let Some(answer) = payload.answer {
                        solution.answer = answer;
                    }
                    if payload.compiler_flags.is_some() {
                        solution.compiler_flags = payload.compiler_flags;
                    }
                    if payload.main_file_name.is_some() {
                        solution.main_file_name = payload.main_file_name;
                    }
                    Ok(())
                }),
            )
            .await
    }

    /// Request execution of a submitted solution against every test case of
    /// its exercise again.
    pub async fn retry_solution(&self, principal: &str, id: SolutionId) -> AppResult<DispatchReport> {
        let solution = self.load_for_retry(principal, id).await?;
        let exercise = self.load_exercise(&solution).await?;
        let test_cases = self.store.list_test_cases(exercise.id).await?;

        let report =
            dispatch_solution(self.dispatcher.as_ref(), &exercise, &solution, &test_cases).await;
        tracing::info!(
            solution_id = id,
            dispatched = report.dispatched.len(),
            failed = report.failed.len(),
            "Solution execution retried"
        );
        Ok(report)
    }

    /// Request execution of a submitted solution against one test case of its
    /// exercise again.
    pub async fn retry_test_case(
        &self,
        principal: &str,
        id: SolutionId,
        test_case_id: TestCaseId,
    ) -> AppResult<()> {
        let solution = self.load_for_retry(principal, id).await?;
        let test_case = self
            .store
            .find_test_case(test_case_id)
            .await?
            .ok_or_else(|| not_found("Test case", test_case_id))?;
        if test_case.exercise_id != solution.exercise_id {
            return Err(AppError::Validation(format!(
                "Test case {} does not belong to exercise {}",
                test_case_id, solution.exercise_id
            )));
        }
        let exercise = self.load_exercise(&solution).await?;

        let key = CorrelationKey::new(id, test_case_id);
        let command = build_command(&exercise, &solution, &test_case);
        self.dispatcher.request_execution(&command, key).await?;

        tracing::info!(solution_id = id, test_case_id, "Test case execution retried");
        Ok(())
    }

    /// Latest results recorded for a solution, ordered by test case
    pub async fn results(&self, principal: &str, id: SolutionId) -> AppResult<Vec<ExecutionRecord>> {
        self.load(id).await?;
        require_solution_read_access(&self.gate.context(principal).with_solution(id)).await?;
        self.store.list_results(id).await
    }

    pub async fn result(
        &self,
        principal: &str,
        id: SolutionId,
        test_case_id: TestCaseId,
    ) -> AppResult<ExecutionRecord> {
        self.load(id).await?;
        require_solution_read_access(&self.gate.context(principal).with_solution(id)).await?;
        self.store
            .find_result(CorrelationKey::new(id, test_case_id))
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!(
                    "No result for solution {} and test case {}",
                    id, test_case_id
                ))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payloads::NewSubmission;
    use crate::recorder::ResultRecorder;
    use crate::services::{ExamService, ExerciseService, SubmissionService, TestCaseService};
    use crate::store::MemoryStore;
    use crate::test_utils::{
        RecordingDispatcher, new_exam, new_exercise, new_solution, new_test_case,
    };
    use athena_common::{ExecutionResult, ResultProcessor, Visibility};

    struct Fixture {
        store: Arc<dyn Store>,
        exams: ExamService,
        exercises: ExerciseService,
        test_cases: TestCaseService,
        submissions: SubmissionService,
        solutions: SolutionService,
        dispatcher: Arc<RecordingDispatcher>,
    }

    fn fixture() -> Fixture {
        let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
        let dispatcher = Arc::new(RecordingDispatcher::default());
        Fixture {
            exams: ExamService::new(store.clone()),
            exercises: ExerciseService::new(store.clone()),
            test_cases: TestCaseService::new(store.clone()),
            submissions: SubmissionService::new(store.clone(), dispatcher.clone()),
            solutions: SolutionService::new(store.clone(), dispatcher.clone()),
            store,
            dispatcher,
        }
    }

    /// An exam in progress with one exercise, two test cases and an open
    /// submission by bob. Returns (exercise id, test case ids, submission id).
    async fn running_exam(f: &Fixture) -> (i64, Vec<i64>, i64) {
        let exam = f.exams.create("alice", new_exam("Final")).await.unwrap();
        let exercise = f.exercises.create("alice", exam.id, new_exercise()).await.unwrap();
        let mut test_case_ids = Vec::new();
        for visibility in [Visibility::Public, Visibility::Private] {
            let test_case = f
                .test_cases
                .create("alice", exercise.id, new_test_case(visibility))
                .await
                .unwrap();
            test_case_ids.push(test_case.id);
        }
        f.exams.start("alice", exam.id).await.unwrap();
        let submission = f
            .submissions
            .create("bob", NewSubmission { exam_id: exam.id })
            .await
            .unwrap();
        (exercise.id, test_case_ids, submission.id)
    }

    #[tokio::test]
    async fn test_solution_editing_closes_on_submit() {
        let f = fixture();
        let (exercise_id, _, submission_id) = running_exam(&f).await;

        let solution = f
            .solutions
            .create("bob", submission_id, new_solution(exercise_id))
            .await
            .unwrap();
        let err = f
            .solutions
            .create("bob", submission_id, new_solution(exercise_id))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));

        let update = SolutionUpdate {
            answer: Some("print(42)".to_string()),
            ..Default::default()
        };
        let updated = f.solutions.update("bob", solution.id, update).await.unwrap();
        assert_eq!(updated.answer, "print(42)");
        assert!(matches!(
            f.solutions.update("carol", solution.id, SolutionUpdate::default()).await,
            Err(AppError::Forbidden(_))
        ));

        f.submissions.submit("bob", submission_id).await.unwrap();
        let err = f
            .solutions
            .update("bob", solution.id, SolutionUpdate::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::IllegalState(_)));

        assert_eq!(f.solutions.list("alice", submission_id).await.unwrap(), vec![updated]);
    }

    #[tokio::test]
    async fn test_cross_exam_solution_rejected() {
        let f = fixture();
        let (_, _, submission_id) = running_exam(&f).await;

        let other = f.exams.create("alice", new_exam("Other")).await.unwrap();
        let foreign = f.exercises.create("alice", other.id, new_exercise()).await.unwrap();

        let err = f
            .solutions
            .create("bob", submission_id, new_solution(foreign.id))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn test_retry_requires_submitted() {
        let f = fixture();
        let (exercise_id, test_case_ids, submission_id) = running_exam(&f).await;
        let solution = f
            .solutions
            .create("bob", submission_id, new_solution(exercise_id))
            .await
            .unwrap();

        let err = f.solutions.retry_solution("alice", solution.id).await.unwrap_err();
        assert!(matches!(err, AppError::IllegalState(_)));

        f.submissions.submit("bob", submission_id).await.unwrap();
        assert_eq!(f.dispatcher.keys().len(), 2);

        let err = f.solutions.retry_solution("bob", solution.id).await.unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));

        let report = f.solutions.retry_solution("alice", solution.id).await.unwrap();
        assert_eq!(report.dispatched.len(), 2);

        f.solutions
            .retry_test_case("alice", solution.id, test_case_ids[1])
            .await
            .unwrap();
        let keys = f.dispatcher.keys();
        assert_eq!(keys.len(), 5);
        assert_eq!(keys[4], CorrelationKey::new(solution.id, test_case_ids[1]));
    }

    #[tokio::test]
    async fn test_retry_foreign_test_case_rejected() {
        let f = fixture();
        let (exercise_id, _, submission_id) = running_exam(&f).await;
        let solution = f
            .solutions
            .create("bob", submission_id, new_solution(exercise_id))
            .await
            .unwrap();
        f.submissions.submit("bob", submission_id).await.unwrap();

        let other = f.exams.create("alice", new_exam("Other")).await.unwrap();
        let foreign = f.exercises.create("alice", other.id, new_exercise()).await.unwrap();
        let foreign_case = f
            .test_cases
            .create("alice", foreign.id, new_test_case(Visibility::Public))
            .await
            .unwrap();

        let err = f
            .solutions
            .retry_test_case("alice", solution.id, foreign_case.id)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        let err = f
            .solutions
            .retry_test_case("alice", solution.id, 9999)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_results_are_readable_after_recording() {
        let f = fixture();
        let (exercise_id, test_case_ids, submission_id) = running_exam(&f).await;
        let solution = f
            .solutions
            .create("bob", submission_id, new_solution(exercise_id))
            .await
            .unwrap();
        f.submissions.submit("bob", submission_id).await.unwrap();

        let err = f
            .solutions
            .result("bob", solution.id, test_case_ids[0])
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));

        let recorder = ResultRecorder::new(f.store.clone());
        let key = CorrelationKey::new(solution.id, test_case_ids[0]);
        recorder
            .process(key, ExecutionResult::finished(0, vec!["3".into()], vec![]))
            .await
            .unwrap();

        let record = f
            .solutions
            .result("bob", solution.id, test_case_ids[0])
            .await
            .unwrap();
        assert!(record.result.is_success());
        assert_eq!(f.solutions.results("alice", solution.id).await.unwrap().len(), 1);
        assert!(matches!(
            f.solutions.results("carol", solution.id).await,
            Err(AppError::Forbidden(_))
        ));
    }
}
