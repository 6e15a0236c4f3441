//! Authorization helpers using athena-rules specifications.
//!
//! Each helper evaluates a rule against a scoped [`AuthContext`] and turns a
//! failed rule into [`AppError::Forbidden`].

use athena_common::{AppError, AppResult};
use athena_rules::{
    auth_rules::{
        ExamHasStarted, ExerciseExamHasStarted, IsExamOwner, IsExerciseOwner,
        IsSolutionExamOwner, IsSolutionSubmitter, IsSubmissionExamOwner, IsSubmitter,
        IsTestCaseOwner, TestCaseExamHasStarted,
    },
    context::AuthContext,
    specification::{Spec, Specification},
};

fn forbidden(ctx: &AuthContext, action: &str) -> AppError {
    tracing::debug!(principal = %ctx.principal, ?ctx, action, "Authorization denied");
    AppError::Forbidden(format!("{} may not {}", ctx.principal, action))
}

/// Check that the principal owns the context's exam.
pub async fn require_exam_owner(ctx: &AuthContext) -> AppResult<()> {
    if !IsExamOwner.is_satisfied_by(ctx).await {
        return Err(forbidden(ctx, "manage this exam"));
    }
    Ok(())
}

/// Owners always read an exam; everyone else once it has started.
pub async fn require_exam_read_access(ctx: &AuthContext) -> AppResult<()> {
    let rule = Spec(IsExamOwner) | Spec(ExamHasStarted);
    if !rule.is_satisfied_by(ctx).await {
        return Err(forbidden(ctx, "read this exam"));
    }
    Ok(())
}

pub async fn require_exercise_owner(ctx: &AuthContext) -> AppResult<()> {
    if !IsExerciseOwner.is_satisfied_by(ctx).await {
        return Err(forbidden(ctx, "manage this exercise"));
    }
    Ok(())
}

pub async fn require_exercise_read_access(ctx: &AuthContext) -> AppResult<()> {
    let rule = Spec(IsExerciseOwner) | Spec(ExerciseExamHasStarted);
    if !rule.is_satisfied_by(ctx).await {
        return Err(forbidden(ctx, "read this exercise"));
    }
    Ok(())
}

pub async fn require_test_case_owner(ctx: &AuthContext) -> AppResult<()> {
    if !IsTestCaseOwner.is_satisfied_by(ctx).await {
        return Err(forbidden(ctx, "manage this test case"));
    }
    Ok(())
}

/// Private test cases are for owners only; public ones open up when the exam
/// starts.
pub async fn require_test_case_read_access(ctx: &AuthContext, is_public: bool) -> AppResult<()> {
    if IsTestCaseOwner.is_satisfied_by(ctx).await {
        return Ok(());
    }
    if is_public && TestCaseExamHasStarted.is_satisfied_by(ctx).await {
        return Ok(());
    }
    Err(forbidden(ctx, "read this test case"))
}

/// Check that the principal handed in the context's submission.
pub async fn require_submitter(ctx: &AuthContext) -> AppResult<()> {
    if !IsSubmitter.is_satisfied_by(ctx).await {
        return Err(forbidden(ctx, "change this submission"));
    }
    Ok(())
}

pub async fn require_submission_read_access(ctx: &AuthContext) -> AppResult<()> {
    let rule = Spec(IsSubmitter) | Spec(IsSubmissionExamOwner);
    if !rule.is_satisfied_by(ctx).await {
        return Err(forbidden(ctx, "read this submission"));
    }
    Ok(())
}

pub async fn require_solution_submitter(ctx: &AuthContext) -> AppResult<()> {
    if !IsSolutionSubmitter.is_satisfied_by(ctx).await {
        return Err(forbidden(ctx, "change this solution"));
    }
    Ok(())
}

pub async fn require_solution_read_access(ctx: &AuthContext) -> AppResult<()> {
    let rule = Spec(IsSolutionSubmitter) | Spec(IsSolutionExamOwner);
    if !rule.is_satisfied_by(ctx).await {
        return Err(forbidden(ctx, "read this solution"));
    }
    Ok(())
}

/// Re-running executions is reserved to the owners of the solution's exam.
pub async fn require_solution_exam_owner(ctx: &AuthContext) -> AppResult<()> {
    if !IsSolutionExamOwner.is_satisfied_by(ctx).await {
        return Err(forbidden(ctx, "re-run this solution"));
    }
    Ok(())
}
