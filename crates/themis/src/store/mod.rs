//! Persistence seam
//!
//! Mutations are passed in as closures so that every check-then-act runs
//! atomically inside the store: under the arena lock for [`MemoryStore`],
//! inside a transaction holding row locks for [`PgStore`]. A closure that
//! returns an error leaves the stored state untouched.
//!
//! Listings are ordered by id ascending.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;

use athena_common::{
    AppResult, CorrelationKey, ExamId, ExerciseId, SolutionId, SubmissionId, TestCaseId,
};

use crate::models::{Exam, ExecutionRecord, Exercise, ExerciseSolution, Submission, TestCase};

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// In-place change applied to a locked entity.
pub type Mutation<T> = Box<dyn FnOnce(&mut T) -> AppResult<()> + Send>;

/// Precondition checked against a locked parent before a child changes.
pub type Guard<T> = Box<dyn FnOnce(&T) -> AppResult<()> + Send>;

#[async_trait]
pub trait Store: Send + Sync {
    // Exams

    /// Store a new exam and return it with its assigned id.
    async fn insert_exam(&self, exam: Exam) -> AppResult<Exam>;

    async fn find_exam(&self, id: ExamId) -> AppResult<Option<Exam>>;

    async fn list_exams(&self) -> AppResult<Vec<Exam>>;

    async fn update_exam(&self, id: ExamId, mutation: Mutation<Exam>) -> AppResult<Exam>;

    /// Delete an exam together with its exercises, test cases, submissions,
    /// solutions and results.
    async fn delete_exam(&self, id: ExamId, guard: Guard<Exam>) -> AppResult<()>;

    // Exercises

    /// `guard` is checked against the owning exam.
    async fn insert_exercise(&self, exercise: Exercise, guard: Guard<Exam>) -> AppResult<Exercise>;

    async fn find_exercise(&self, id: ExerciseId) -> AppResult<Option<Exercise>>;

    async fn list_exercises(&self, exam_id: ExamId) -> AppResult<Vec<Exercise>>;

    async fn update_exercise(
        &self,
        id: ExerciseId,
        guard: Guard<Exam>,
        mutation: Mutation<Exercise>,
    ) -> AppResult<Exercise>;

    /// Delete an exercise together with its test cases.
    async fn delete_exercise(&self, id: ExerciseId, guard: Guard<Exam>) -> AppResult<()>;

    // Test cases

    /// `guard` is checked against the exam owning the test case's exercise.
    async fn insert_test_case(&self, test_case: TestCase, guard: Guard<Exam>) -> AppResult<TestCase>;

    async fn find_test_case(&self, id: TestCaseId) -> AppResult<Option<TestCase>>;

    async fn list_test_cases(&self, exercise_id: ExerciseId) -> AppResult<Vec<TestCase>>;

    async fn update_test_case(
        &self,
        id: TestCaseId,
        guard: Guard<Exam>,
        mutation: Mutation<TestCase>,
    ) -> AppResult<TestCase>;

    async fn delete_test_case(&self, id: TestCaseId, guard: Guard<Exam>) -> AppResult<()>;

    // Submissions

    /// Fails with `Conflict` when the submitter already has a submission for
    /// the exam.
    async fn insert_submission(
        &self,
        submission: Submission,
        guard: Guard<Exam>,
    ) -> AppResult<Submission>;

    async fn find_submission(&self, id: SubmissionId) -> AppResult<Option<Submission>>;

    async fn list_submissions(&self, exam_id: ExamId) -> AppResult<Vec<Submission>>;

    async fn update_submission(
        &self,
        id: SubmissionId,
        guard: Guard<Exam>,
        mutation: Mutation<Submission>,
    ) -> AppResult<Submission>;

    // Solutions

    /// `guard` is checked against the owning submission. Fails with
    /// `Conflict` when the submission already has a solution for the
    /// exercise.
    async fn insert_solution(
        &self,
        solution: ExerciseSolution,
        guard: Guard<Submission>,
    ) -> AppResult<ExerciseSolution>;

    async fn find_solution(&self, id: SolutionId) -> AppResult<Option<ExerciseSolution>>;

    async fn list_solutions(&self, submission_id: SubmissionId) -> AppResult<Vec<ExerciseSolution>>;

    async fn update_solution(
        &self,
        id: SolutionId,
        guard: Guard<Submission>,
        mutation: Mutation<ExerciseSolution>,
    ) -> AppResult<ExerciseSolution>;

    // Results

    /// Insert or replace the result for the record's pair. A record whose
    /// result equals the stored one leaves the stored record untouched.
    async fn upsert_result(&self, record: ExecutionRecord) -> AppResult<()>;

    async fn find_result(&self, key: CorrelationKey) -> AppResult<Option<ExecutionRecord>>;

    async fn list_results(&self, solution_id: SolutionId) -> AppResult<Vec<ExecutionRecord>>;
}

pub(crate) fn not_found(entity: &str, id: i64) -> athena_common::AppError {
    athena_common::AppError::NotFound(format!("{} {} not found", entity, id))
}
