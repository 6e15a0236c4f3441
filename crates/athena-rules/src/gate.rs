//! Boolean authorization predicates keyed by entity id and principal.
//!
//! The gate never fails: a missing entity or a failed lookup answers `false`
//! and the operation being guarded reports the not-found condition itself.

use std::sync::Arc;

use athena_common::{ExamId, ExerciseId, SolutionId, SubmissionId, TestCaseId};

use crate::auth_rules::{
    ExamHasStarted, ExerciseExamHasStarted, IsExamOwner, IsExerciseOwner, IsSolutionExamOwner,
    IsSolutionSubmitter, IsSubmissionExamOwner, IsSubmitter, IsTestCaseOwner,
    TestCaseExamHasStarted,
};
use crate::context::{AuthContext, OwnershipLookup};
use crate::specification::Specification;

#[derive(Clone)]
pub struct AuthorizationGate {
    lookup: Arc<dyn OwnershipLookup>,
}

impl AuthorizationGate {
    pub fn new(lookup: Arc<dyn OwnershipLookup>) -> Self {
        Self { lookup }
    }

    /// Build an evaluation context for the principal.
    pub fn context(&self, principal: &str) -> AuthContext {
        AuthContext::new(principal, self.lookup.clone())
    }

    pub async fn is_exam_owner(&self, exam_id: ExamId, principal: &str) -> bool {
        IsExamOwner
            .is_satisfied_by(&self.context(principal).with_exam(exam_id))
            .await
    }

    pub async fn is_exercise_owner(&self, exercise_id: ExerciseId, principal: &str) -> bool {
        IsExerciseOwner
            .is_satisfied_by(&self.context(principal).with_exercise(exercise_id))
            .await
    }

    pub async fn is_test_case_owner(&self, test_case_id: TestCaseId, principal: &str) -> bool {
        IsTestCaseOwner
            .is_satisfied_by(&self.context(principal).with_test_case(test_case_id))
            .await
    }

    /// The principal owns the exam the submission belongs to.
    pub async fn is_submission_owner(&self, submission_id: SubmissionId, principal: &str) -> bool {
        IsSubmissionExamOwner
            .is_satisfied_by(&self.context(principal).with_submission(submission_id))
            .await
    }

    /// The principal owns the exam the solution belongs to.
    pub async fn is_solution_owner(&self, solution_id: SolutionId, principal: &str) -> bool {
        IsSolutionExamOwner
            .is_satisfied_by(&self.context(principal).with_solution(solution_id))
            .await
    }

    pub async fn is_submitter(&self, submission_id: SubmissionId, principal: &str) -> bool {
        IsSubmitter
            .is_satisfied_by(&self.context(principal).with_submission(submission_id))
            .await
    }

    pub async fn is_solution_submitter(&self, solution_id: SolutionId, principal: &str) -> bool {
        IsSolutionSubmitter
            .is_satisfied_by(&self.context(principal).with_solution(solution_id))
            .await
    }

    pub async fn exam_has_started(&self, exam_id: ExamId) -> bool {
        ExamHasStarted
            .is_satisfied_by(&self.context("").with_exam(exam_id))
            .await
    }

    pub async fn exercise_has_started(&self, exercise_id: ExerciseId) -> bool {
        ExerciseExamHasStarted
            .is_satisfied_by(&self.context("").with_exercise(exercise_id))
            .await
    }

    pub async fn test_case_has_started(&self, test_case_id: TestCaseId) -> bool {
        TestCaseExamHasStarted
            .is_satisfied_by(&self.context("").with_test_case(test_case_id))
            .await
    }
}
