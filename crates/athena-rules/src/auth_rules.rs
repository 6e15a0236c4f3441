//! Authorization rules for exam resources.
//!
//! Ownership of exercises, test cases, submissions and solutions resolves to
//! the owner set of the exam they belong to. Every rule evaluates to `false`
//! when its target is missing from the context or does not exist.

use async_trait::async_trait;

use crate::context::AuthContext;
use crate::specification::Specification;

// =============================================================================
// Exam-scoped rules
// =============================================================================

/// The principal owns the context's exam.
/// Requires `ctx.exam_id` to be set.
pub struct IsExamOwner;

#[async_trait]
impl Specification<AuthContext> for IsExamOwner {
    async fn is_satisfied_by(&self, ctx: &AuthContext) -> bool {
        let Some(exam_id) = ctx.exam_id else {
            tracing::warn!("IsExamOwner evaluated without exam_id in context");
            return false;
        };
        ctx.owns_exam(exam_id).await
    }
}

/// The context's exam is in progress or finished.
/// Requires `ctx.exam_id` to be set.
pub struct ExamHasStarted;

#[async_trait]
impl Specification<AuthContext> for ExamHasStarted {
    async fn is_satisfied_by(&self, ctx: &AuthContext) -> bool {
        let Some(exam_id) = ctx.exam_id else {
            tracing::warn!("ExamHasStarted evaluated without exam_id in context");
            return false;
        };
        ctx.exam_started(exam_id).await
    }
}

// =============================================================================
// Exercise- and test-case-scoped rules
// =============================================================================

/// The principal owns the exam of the context's exercise.
/// Requires `ctx.exercise_id` to be set.
pub struct IsExerciseOwner;

#[async_trait]
impl Specification<AuthContext> for IsExerciseOwner {
    async fn is_satisfied_by(&self, ctx: &AuthContext) -> bool {
        let Some(exercise_id) = ctx.exercise_id else {
            tracing::warn!("IsExerciseOwner evaluated without exercise_id in context");
            return false;
        };
        match ctx.exam_of_exercise(exercise_id).await {
            Some(exam_id) => ctx.owns_exam(exam_id).await,
            None => false,
        }
    }
}

/// The exam of the context's exercise has started.
/// Requires `ctx.exercise_id` to be set.
pub struct ExerciseExamHasStarted;

#[async_trait]
impl Specification<AuthContext> for ExerciseExamHasStarted {
    async fn is_satisfied_by(&self, ctx: &AuthContext) -> bool {
        let Some(exercise_id) = ctx.exercise_id else {
            tracing::warn!("ExerciseExamHasStarted evaluated without exercise_id in context");
            return false;
        };
        match ctx.exam_of_exercise(exercise_id).await {
            Some(exam_id) => ctx.exam_started(exam_id).await,
            None => false,
        }
    }
}

/// The principal owns the exam of the context's test case.
/// Requires `ctx.test_case_id` to be set.
pub struct IsTestCaseOwner;

#[async_trait]
impl Specification<AuthContext> for IsTestCaseOwner {
    async fn is_satisfied_by(&self, ctx: &AuthContext) -> bool {
        let Some(test_case_id) = ctx.test_case_id else {
            tracing::warn!("IsTestCaseOwner evaluated without test_case_id in context");
            return false;
        };
        match ctx.exam_of_test_case(test_case_id).await {
            Some(exam_id) => ctx.owns_exam(exam_id).await,
            None => false,
        }
    }
}

/// The exam of the context's test case has started.
/// Requires `ctx.test_case_id` to be set.
pub struct TestCaseExamHasStarted;

#[async_trait]
impl Specification<AuthContext> for TestCaseExamHasStarted {
    async fn is_satisfied_by(&self, ctx: &AuthContext) -> bool {
        let Some(test_case_id) = ctx.test_case_id else {
            tracing::warn!("TestCaseExamHasStarted evaluated without test_case_id in context");
            return false;
        };
        match ctx.exam_of_test_case(test_case_id).await {
            Some(exam_id) => ctx.exam_started(exam_id).await,
            None => false,
        }
    }
}

// =============================================================================
// Submission- and solution-scoped rules
// =============================================================================

/// The principal handed in the context's submission.
/// Requires `ctx.submission_id` to be set.
pub struct IsSubmitter;

#[async_trait]
impl Specification<AuthContext> for IsSubmitter {
    async fn is_satisfied_by(&self, ctx: &AuthContext) -> bool {
        let Some(submission_id) = ctx.submission_id else {
            tracing::warn!("IsSubmitter evaluated without submission_id in context");
            return false;
        };
        ctx.submission_ref(submission_id)
            .await
            .map(|submission| submission.submitter == ctx.principal)
            .unwrap_or(false)
    }
}

/// The principal owns the exam the context's submission belongs to.
/// Requires `ctx.submission_id` to be set.
pub struct IsSubmissionExamOwner;

#[async_trait]
impl Specification<AuthContext> for IsSubmissionExamOwner {
    async fn is_satisfied_by(&self, ctx: &AuthContext) -> bool {
        let Some(submission_id) = ctx.submission_id else {
            tracing::warn!("IsSubmissionExamOwner evaluated without submission_id in context");
            return false;
        };
        match ctx.submission_ref(submission_id).await {
            Some(submission) => ctx.owns_exam(submission.exam_id).await,
            None => false,
        }
    }
}

/// The principal handed in the submission of the context's solution.
/// Requires `ctx.solution_id` to be set.
pub struct IsSolutionSubmitter;

#[async_trait]
impl Specification<AuthContext> for IsSolutionSubmitter {
    async fn is_satisfied_by(&self, ctx: &AuthContext) -> bool {
        let Some(solution_id) = ctx.solution_id else {
            tracing::warn!("IsSolutionSubmitter evaluated without solution_id in context");
            return false;
        };
        let Some(solution) = ctx.solution_ref(solution_id).await else {
            return false;
        };
        ctx.submission_ref(solution.submission_id)
            .await
            .map(|submission| submission.submitter == ctx.principal)
            .unwrap_or(false)
    }
}

/// The principal owns the exam of the context's solution.
/// Requires `ctx.solution_id` to be set.
pub struct IsSolutionExamOwner;

#[async_trait]
impl Specification<AuthContext> for IsSolutionExamOwner {
    async fn is_satisfied_by(&self, ctx: &AuthContext) -> bool {
        let Some(solution_id) = ctx.solution_id else {
            tracing::warn!("IsSolutionExamOwner evaluated without solution_id in context");
            return false;
        };
        let Some(solution) = ctx.solution_ref(solution_id).await else {
            return false;
        };
        match ctx.exam_of_exercise(solution.exercise_id).await {
            Some(exam_id) => ctx.owns_exam(exam_id).await,
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::specification::Spec;
    use crate::test_utils::sample_context;
    use athena_common::ExamState;

    #[tokio::test]
    async fn test_exam_owner() {
        let (lookup, ctx) = sample_context("alice");
        assert!(IsExamOwner.is_satisfied_by(&ctx.clone().with_exam(1)).await);
        assert!(!IsExamOwner.is_satisfied_by(&ctx.clone().with_exam(99)).await);
        assert!(!IsExamOwner.is_satisfied_by(&ctx).await);

        let stranger = crate::context::AuthContext::new("mallory", lookup).with_exam(1);
        assert!(!IsExamOwner.is_satisfied_by(&stranger).await);
    }

    #[tokio::test]
    async fn test_transitive_ownership() {
        let (_, ctx) = sample_context("alice");
        assert!(IsExerciseOwner.is_satisfied_by(&ctx.clone().with_exercise(10)).await);
        assert!(IsTestCaseOwner.is_satisfied_by(&ctx.clone().with_test_case(100)).await);
        assert!(IsSubmissionExamOwner.is_satisfied_by(&ctx.clone().with_submission(1000)).await);
        assert!(IsSolutionExamOwner.is_satisfied_by(&ctx.clone().with_solution(5000)).await);

        assert!(!IsExerciseOwner.is_satisfied_by(&ctx.clone().with_exercise(11)).await);
        assert!(!IsTestCaseOwner.is_satisfied_by(&ctx.clone().with_test_case(404)).await);
    }

    #[tokio::test]
    async fn test_submitter_rules() {
        let (lookup, _) = sample_context("alice");
        let student = crate::context::AuthContext::new("bob", lookup);

        assert!(IsSubmitter.is_satisfied_by(&student.clone().with_submission(1000)).await);
        assert!(IsSolutionSubmitter.is_satisfied_by(&student.clone().with_solution(5000)).await);
        assert!(!IsSubmissionExamOwner.is_satisfied_by(&student.clone().with_submission(1000)).await);
        assert!(!IsSubmitter.is_satisfied_by(&student.with_submission(1001)).await);
    }

    #[tokio::test]
    async fn test_started_rules_follow_exam_state() {
        let (lookup, ctx) = sample_context("alice");
        assert!(!ExamHasStarted.is_satisfied_by(&ctx.clone().with_exam(1)).await);
        assert!(!TestCaseExamHasStarted.is_satisfied_by(&ctx.clone().with_test_case(100)).await);

        lookup.set_state(1, ExamState::InProgress);
        assert!(ExamHasStarted.is_satisfied_by(&ctx.clone().with_exam(1)).await);
        assert!(TestCaseExamHasStarted.is_satisfied_by(&ctx.clone().with_test_case(100)).await);
        assert!(ExerciseExamHasStarted.is_satisfied_by(&ctx.clone().with_exercise(10)).await);

        lookup.set_state(1, ExamState::Finished);
        assert!(ExamHasStarted.is_satisfied_by(&ctx.with_exam(1)).await);
    }

    #[tokio::test]
    async fn test_composed_read_rule() {
        let (lookup, _) = sample_context("alice");
        let student = crate::context::AuthContext::new("bob", lookup.clone()).with_exam(1);
        let can_read = Spec(IsExamOwner) | Spec(ExamHasStarted);

        assert!(!can_read.is_satisfied_by(&student).await);
        lookup.set_state(1, ExamState::InProgress);
        assert!(can_read.is_satisfied_by(&student).await);
    }
}
