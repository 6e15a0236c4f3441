//! Authorization context and the lookups rules evaluate against.

use std::sync::Arc;

use async_trait::async_trait;

use athena_common::{
    AppResult, ExamId, ExamState, ExerciseId, SolutionId, SubmissionId, TestCaseId,
};

/// Owning exam and submitter of a submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionRef {
    pub exam_id: ExamId,
    pub submitter: String,
}

/// Owning exercise and submission of a solution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SolutionRef {
    pub exercise_id: ExerciseId,
    pub submission_id: SubmissionId,
}

/// Read-only access to the relations authorization rules need.
///
/// Every method returns `Ok(None)` when the entity does not exist.
#[async_trait]
pub trait OwnershipLookup: Send + Sync {
    async fn exam_owners(&self, exam_id: ExamId) -> AppResult<Option<Vec<String>>>;

    async fn exam_state(&self, exam_id: ExamId) -> AppResult<Option<ExamState>>;

    async fn exercise_exam(&self, exercise_id: ExerciseId) -> AppResult<Option<ExamId>>;

    async fn test_case_exercise(&self, test_case_id: TestCaseId) -> AppResult<Option<ExerciseId>>;

    async fn submission(&self, submission_id: SubmissionId) -> AppResult<Option<SubmissionRef>>;

    async fn solution(&self, solution_id: SolutionId) -> AppResult<Option<SolutionRef>>;
}

/// Authorization context for one principal and one target entity.
#[derive(Clone)]
pub struct AuthContext {
    /// Identity of the caller
    pub principal: String,
    /// Relation lookups
    pub lookup: Arc<dyn OwnershipLookup>,
    pub exam_id: Option<ExamId>,
    pub exercise_id: Option<ExerciseId>,
    pub test_case_id: Option<TestCaseId>,
    pub submission_id: Option<SubmissionId>,
    pub solution_id: Option<SolutionId>,
}

impl std::fmt::Debug for AuthContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthContext")
            .field("principal", &self.principal)
            .field("exam_id", &self.exam_id)
            .field("exercise_id", &self.exercise_id)
            .field("test_case_id", &self.test_case_id)
            .field("submission_id", &self.submission_id)
            .field("solution_id", &self.solution_id)
            .finish()
    }
}

impl AuthContext {
    pub fn new(principal: impl Into<String>, lookup: Arc<dyn OwnershipLookup>) -> Self {
        Self {
            principal: principal.into(),
            lookup,
            exam_id: None,
            exercise_id: None,
            test_case_id: None,
            submission_id: None,
            solution_id: None,
        }
    }

    pub fn with_exam(mut self, exam_id: ExamId) -> Self {
        self.exam_id = Some(exam_id);
        self
    }

    pub fn with_exercise(mut self, exercise_id: ExerciseId) -> Self {
        self.exercise_id = Some(exercise_id);
        self
    }

    pub fn with_test_case(mut self, test_case_id: TestCaseId) -> Self {
        self.test_case_id = Some(test_case_id);
        self
    }

    pub fn with_submission(mut self, submission_id: SubmissionId) -> Self {
        self.submission_id = Some(submission_id);
        self
    }

    pub fn with_solution(mut self, solution_id: SolutionId) -> Self {
        self.solution_id = Some(solution_id);
        self
    }

    /// Exam owning the given exercise. Lookup failures count as absence.
    pub(crate) async fn exam_of_exercise(&self, exercise_id: ExerciseId) -> Option<ExamId> {
        self.lookup.exercise_exam(exercise_id).await.ok().flatten()
    }

    pub(crate) async fn exam_of_test_case(&self, test_case_id: TestCaseId) -> Option<ExamId> {
        let exercise_id = self
            .lookup
            .test_case_exercise(test_case_id)
            .await
            .ok()
            .flatten()?;
        self.exam_of_exercise(exercise_id).await
    }

    pub(crate) async fn submission_ref(&self, submission_id: SubmissionId) -> Option<SubmissionRef> {
        self.lookup.submission(submission_id).await.ok().flatten()
    }

    pub(crate) async fn solution_ref(&self, solution_id: SolutionId) -> Option<SolutionRef> {
        self.lookup.solution(solution_id).await.ok().flatten()
    }

    /// Whether the principal is among the owners of the exam.
    pub(crate) async fn owns_exam(&self, exam_id: ExamId) -> bool {
        self.lookup
            .exam_owners(exam_id)
            .await
            .ok()
            .flatten()
            .map(|owners| owners.iter().any(|owner| owner == &self.principal))
            .unwrap_or(false)
    }

    pub(crate) async fn exam_started(&self, exam_id: ExamId) -> bool {
        self.lookup
            .exam_state(exam_id)
            .await
            .ok()
            .flatten()
            .map(|state| state.has_started())
            .unwrap_or(false)
    }
}
