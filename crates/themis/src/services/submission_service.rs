//! Submission service

use std::sync::Arc;

use athena_common::{AppResult, ExamId, SubmissionId};
use athena_rules::AuthorizationGate;
use hermes::CommandDispatcher;

use crate::authorization::{require_exam_owner, require_submission_read_access, require_submitter};
use crate::models::{Exam, Submission};
use crate::payloads::NewSubmission;
use crate::store::{Store, not_found};

use super::dispatch::{DispatchReport, dispatch_solution};

pub struct SubmissionService {
    store: Arc<dyn Store>,
    gate: AuthorizationGate,
    dispatcher: Arc<dyn CommandDispatcher>,
}

impl SubmissionService {
    pub fn new(store: Arc<dyn Store>, dispatcher: Arc<dyn CommandDispatcher>) -> Self {
        let gate = super::gate_for(store.clone());
        Self {
            store,
            gate,
            dispatcher,
        }
    }

    async fn load(&self, id: SubmissionId) -> AppResult<Submission> {
        self.store
            .find_submission(id)
            .await?
            .ok_or_else(|| not_found("Submission", id))
    }

    /// Open the principal's submission for an exam in progress
    pub async fn create(&self, principal: &str, payload: NewSubmission) -> AppResult<Submission> {
        let exam_id = payload.exam_id;
        self.store
            .find_exam(exam_id)
            .await?
            .ok_or_else(|| not_found("Exam", exam_id))?;

        let submission = Submission::new(exam_id, principal)?;
        let submission = self
            .store
            .insert_submission(submission, Box::new(|exam: &Exam| exam.ensure_in_progress()))
            .await?;

        tracing::info!(
            exam_id,
            submission_id = submission.id,
            submitter = principal,
            "Submission opened"
        );
        Ok(submission)
    }

    pub async fn get(&self, principal: &str, id: SubmissionId) -> AppResult<Submission> {
        let submission = self.load(id).await?;
        require_submission_read_access(&self.gate.context(principal).with_submission(id)).await?;
        Ok(submission)
    }

    /// All submissions of an exam, for its owners
    pub async fn list(&self, principal: &str, exam_id: ExamId) -> AppResult<Vec<Submission>> {
        self.store
            .find_exam(exam_id)
            .await?
            .ok_or_else(|| not_found("Exam", exam_id))?;
        require_exam_owner(&self.gate.context(principal).with_exam(exam_id)).await?;
        self.store.list_submissions(exam_id).await
    }

    /// Place the submission and request execution of every solution against
    /// every test case of its exercise.
    ///
    /// The state change is committed before dispatching; dispatch failures
    /// are reported, not rolled back.
    pub async fn submit(
        &self,
        principal: &str,
        id: SubmissionId,
    ) -> AppResult<(Submission, DispatchReport)> {
        self.load(id).await?;
        require_submitter(&self.gate.context(principal).with_submission(id)).await?;

        let submission = self
            .store
            .update_submission(
                id,
                Box::new(|exam: &Exam| exam.ensure_in_progress()),
                Box::new(|submission: &mut Submission| submission.submit()),
            )
            .await?;
        tracing::info!(submission_id = id, "Submission placed");

        let mut report = DispatchReport::default();
        for solution in self.store.list_solutions(id).await? {
            let exercise = self
                .store
                .find_exercise(solution.exercise_id)
                .await?
                .ok_or_else(|| not_found("Exercise", solution.exercise_id))?;
            let test_cases = self.store.list_test_cases(exercise.id).await?;
            report.merge(
                dispatch_solution(self.dispatcher.as_ref(), &exercise, &solution, &test_cases)
                    .await,
            );
        }

        tracing::info!(
            submission_id = id,
            dispatched = report.dispatched.len(),
            failed = report.failed.len(),
            "Executions requested"
        );
        Ok((submission, report))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::{ExamService, ExerciseService, SolutionService, TestCaseService};
    use crate::store::MemoryStore;
    use crate::test_utils::{
        RecordingDispatcher, new_exam, new_exercise, new_solution, new_test_case,
    };
    use athena_common::{AppError, CorrelationKey, SubmissionState, Visibility};

    struct Fixture {
        exams: ExamService,
        exercises: ExerciseService,
        test_cases: TestCaseService,
        submissions: SubmissionService,
        solutions: SolutionService,
        dispatcher: Arc<RecordingDispatcher>,
    }

    fn fixture(dispatcher: RecordingDispatcher) -> Fixture {
        let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
        let dispatcher = Arc::new(dispatcher);
        Fixture {
            exams: ExamService::new(store.clone()),
            exercises: ExerciseService::new(store.clone()),
            test_cases: TestCaseService::new(store.clone()),
            submissions: SubmissionService::new(store.clone(), dispatcher.clone()),
            solutions: SolutionService::new(store, dispatcher.clone()),
            dispatcher,
        }
    }

    #[tokio::test]
    async fn test_submit_dispatches_every_pair() {
        let f = fixture(RecordingDispatcher::default());
        let exam = f.exams.create("alice", new_exam("Final")).await.unwrap();
        let first = f.exercises.create("alice", exam.id, new_exercise()).await.unwrap();
        let second = f.exercises.create("alice", exam.id, new_exercise()).await.unwrap();
        let mut test_case_ids = Vec::new();
        for exercise_id in [first.id, first.id, second.id] {
            let test_case = f
                .test_cases
                .create("alice", exercise_id, new_test_case(Visibility::Private))
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
        let a = f
            .solutions
            .create("bob", submission.id, new_solution(first.id))
            .await
            .unwrap();
        let b = f
            .solutions
            .create("bob", submission.id, new_solution(second.id))
            .await
            .unwrap();

        let (submission, report) = f.submissions.submit("bob", submission.id).await.unwrap();
        assert_eq!(submission.state, SubmissionState::Submitted);
        assert!(report.is_complete());

        let mut dispatched = report.dispatched.clone();
        dispatched.sort();
        assert_eq!(
            dispatched,
            vec![
                CorrelationKey::new(a.id, test_case_ids[0]),
                CorrelationKey::new(a.id, test_case_ids[1]),
                CorrelationKey::new(b.id, test_case_ids[2]),
            ]
        );
        assert_eq!(f.dispatcher.keys().len(), 3);
    }

    #[tokio::test]
    async fn test_submit_twice_is_illegal() {
        let f = fixture(RecordingDispatcher::default());
        let exam = f.exams.create("alice", new_exam("Final")).await.unwrap();
        f.exams.start("alice", exam.id).await.unwrap();
        let submission = f
            .submissions
            .create("bob", NewSubmission { exam_id: exam.id })
            .await
            .unwrap();

        let err = f.submissions.submit("alice", submission.id).await.unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));

        f.submissions.submit("bob", submission.id).await.unwrap();
        let err = f.submissions.submit("bob", submission.id).await.unwrap_err();
        assert!(matches!(err, AppError::IllegalState(_)));
    }

    #[tokio::test]
    async fn test_dispatch_failures_are_reported() {
        let f = fixture(RecordingDispatcher::failing());
        let exam = f.exams.create("alice", new_exam("Final")).await.unwrap();
        let exercise = f.exercises.create("alice", exam.id, new_exercise()).await.unwrap();
        f.test_cases
            .create("alice", exercise.id, new_test_case(Visibility::Public))
            .await
            .unwrap();
        f.exams.start("alice", exam.id).await.unwrap();
        let submission = f
            .submissions
            .create("bob", NewSubmission { exam_id: exam.id })
            .await
            .unwrap();
        f.solutions
            .create("bob", submission.id, new_solution(exercise.id))
            .await
            .unwrap();

        let (submission, report) = f.submissions.submit("bob", submission.id).await.unwrap();
        assert_eq!(submission.state, SubmissionState::Submitted);
        assert!(!report.is_complete());
        assert_eq!(report.failed.len(), 1);
        assert!(matches!(report.failed[0].1, AppError::Queue(_)));
    }

    #[tokio::test]
    async fn test_submission_requires_running_exam() {
        let f = fixture(RecordingDispatcher::default());
        let exam = f.exams.create("alice", new_exam("Final")).await.unwrap();

        let err = f
            .submissions
            .create("bob", NewSubmission { exam_id: exam.id })
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::IllegalState(_)));

        f.exams.start("alice", exam.id).await.unwrap();
        let submission = f
            .submissions
            .create("bob", NewSubmission { exam_id: exam.id })
            .await
            .unwrap();
        let err = f
            .submissions
            .create("bob", NewSubmission { exam_id: exam.id })
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));

        assert!(f.submissions.get("alice", submission.id).await.is_ok());
        assert!(matches!(
            f.submissions.get("carol", submission.id).await,
            Err(AppError::Forbidden(_))
        ));
        assert_eq!(f.submissions.list("alice", exam.id).await.unwrap().len(), 1);
        assert!(matches!(
            f.submissions.list("bob", exam.id).await,
            Err(AppError::Forbidden(_))
        ));

        f.exams.finish("alice", exam.id).await.unwrap();
        let err = f.submissions.submit("bob", submission.id).await.unwrap_err();
        assert!(matches!(err, AppError::IllegalState(_)));
    }
}
