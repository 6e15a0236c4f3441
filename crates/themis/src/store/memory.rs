//! In-memory arena store.
//!
//! Every entity kind lives in its own id-keyed map; one async mutex guards the
//! whole arena so each operation observes and changes a consistent graph.

use std::collections::BTreeMap;

use async_trait::async_trait;
use tokio::sync::Mutex;

use athena_common::{
    AppError, AppResult, CorrelationKey, ExamId, ExerciseId, SolutionId, SubmissionId,
    TestCaseId,
};

use super::{Guard, Mutation, Store, not_found};
use crate::models::{Exam, ExecutionRecord, Exercise, ExerciseSolution, Submission, TestCase};

#[derive(Default)]
struct Arena {
    last_id: i64,
    exams: BTreeMap<ExamId, Exam>,
    exercises: BTreeMap<ExerciseId, Exercise>,
    test_cases: BTreeMap<TestCaseId, TestCase>,
    submissions: BTreeMap<SubmissionId, Submission>,
    solutions: BTreeMap<SolutionId, ExerciseSolution>,
    results: BTreeMap<CorrelationKey, ExecutionRecord>,
}

impl Arena {
    fn next_id(&mut self) -> i64 {
        self.last_id += 1;
        self.last_id
    }

    fn exam(&self, id: ExamId) -> AppResult<&Exam> {
        self.exams.get(&id).ok_or_else(|| not_found("Exam", id))
    }

    fn exercise(&self, id: ExerciseId) -> AppResult<&Exercise> {
        self.exercises.get(&id).ok_or_else(|| not_found("Exercise", id))
    }

    fn test_case(&self, id: TestCaseId) -> AppResult<&TestCase> {
        self.test_cases.get(&id).ok_or_else(|| not_found("Test case", id))
    }

    fn submission(&self, id: SubmissionId) -> AppResult<&Submission> {
        self.submissions.get(&id).ok_or_else(|| not_found("Submission", id))
    }

    fn solution(&self, id: SolutionId) -> AppResult<&ExerciseSolution> {
        self.solutions.get(&id).ok_or_else(|| not_found("Solution", id))
    }

    fn exam_of_exercise(&self, exercise_id: ExerciseId) -> AppResult<&Exam> {
        let exercise = self.exercise(exercise_id)?;
        self.exam(exercise.exam_id)
    }

    fn exam_of_test_case(&self, test_case_id: TestCaseId) -> AppResult<&Exam> {
        let test_case = self.test_case(test_case_id)?;
        self.exam_of_exercise(test_case.exercise_id)
    }

    fn remove_solution_results(&mut self, solution_ids: &[SolutionId]) {
        self.results
            .retain(|key, _| !solution_ids.contains(&key.solution_id));
    }

    fn remove_exercise_tree(&mut self, exercise_id: ExerciseId) {
        let test_case_ids: Vec<TestCaseId> = self
            .test_cases
            .values()
            .filter(|tc| tc.exercise_id == exercise_id)
            .map(|tc| tc.id)
            .collect();
        let solution_ids: Vec<SolutionId> = self
            .solutions
            .values()
            .filter(|s| s.exercise_id == exercise_id)
            .map(|s| s.id)
            .collect();

        self.results
            .retain(|key, _| !test_case_ids.contains(&key.test_case_id));
        self.remove_solution_results(&solution_ids);
        self.test_cases.retain(|_, tc| tc.exercise_id != exercise_id);
        self.solutions.retain(|_, s| s.exercise_id != exercise_id);
        self.exercises.remove(&exercise_id);
    }
}

/// Store backed by process memory. Used by tests and single-process setups.
#[derive(Default)]
pub struct MemoryStore {
    arena: Mutex<Arena>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn insert_exam(&self, mut exam: Exam) -> AppResult<Exam> {
        let mut arena = self.arena.lock().await;
        exam.id = arena.next_id();
        arena.exams.insert(exam.id, exam.clone());
        Ok(exam)
    }

    async fn find_exam(&self, id: ExamId) -> AppResult<Option<Exam>> {
        Ok(self.arena.lock().await.exams.get(&id).cloned())
    }

    async fn list_exams(&self) -> AppResult<Vec<Exam>> {
        Ok(self.arena.lock().await.exams.values().cloned().collect())
    }

    async fn update_exam(&self, id: ExamId, mutation: Mutation<Exam>) -> AppResult<Exam> {
        let mut arena = self.arena.lock().await;
        let mut draft = arena.exam(id)?.clone();
        mutation(&mut draft)?;
        draft.id = id;
        arena.exams.insert(id, draft.clone());
        Ok(draft)
    }

    async fn delete_exam(&self, id: ExamId, guard: Guard<Exam>) -> AppResult<()> {
        let mut arena = self.arena.lock().await;
        guard(arena.exam(id)?)?;

        let exercise_ids: Vec<ExerciseId> = arena
            .exercises
            .values()
            .filter(|e| e.exam_id == id)
            .map(|e| e.id)
            .collect();
        for exercise_id in exercise_ids {
            arena.remove_exercise_tree(exercise_id);
        }

        let submission_ids: Vec<SubmissionId> = arena
            .submissions
            .values()
            .filter(|s| s.exam_id == id)
            .map(|s| s.id)
            .collect();
        let solution_ids: Vec<SolutionId> = arena
            .solutions
            .values()
            .filter(|s| submission_ids.contains(&s.submission_id))
            .map(|s| s.id)
            .collect();
        arena.remove_solution_results(&solution_ids);
        arena
            .solutions
            .retain(|_, s| !submission_ids.contains(&s.submission_id));
        arena.submissions.retain(|_, s| s.exam_id != id);
        arena.exams.remove(&id);
        Ok(())
    }

    async fn insert_exercise(&self, mut exercise: Exercise, guard: Guard<Exam>) -> AppResult<Exercise> {
        let mut arena = self.arena.lock().await;
        guard(arena.exam(exercise.exam_id)?)?;
        exercise.id = arena.next_id();
        arena.exercises.insert(exercise.id, exercise.clone());
        Ok(exercise)
    }

    async fn find_exercise(&self, id: ExerciseId) -> AppResult<Option<Exercise>> {
        Ok(self.arena.lock().await.exercises.get(&id).cloned())
    }

    async fn list_exercises(&self, exam_id: ExamId) -> AppResult<Vec<Exercise>> {
        let arena = self.arena.lock().await;
        Ok(arena
            .exercises
            .values()
            .filter(|e| e.exam_id == exam_id)
            .cloned()
            .collect())
    }

    async fn update_exercise(
        &self,
        id: ExerciseId,
        guard: Guard<Exam>,
        mutation: Mutation<Exercise>,
    ) -> AppResult<Exercise> {
        let mut arena = self.arena.lock().await;
        let current = arena.exercise(id)?.clone();
        guard(arena.exam(current.exam_id)?)?;

        let mut draft = current.clone();
        mutation(&mut draft)?;
        draft.id = id;
        draft.exam_id = current.exam_id;
        arena.exercises.insert(id, draft.clone());
        Ok(draft)
    }

    async fn delete_exercise(&self, id: ExerciseId, guard: Guard<Exam>) -> AppResult<()> {
        let mut arena = self.arena.lock().await;
        guard(arena.exam_of_exercise(id)?)?;
        arena.remove_exercise_tree(id);
        Ok(())
    }

    async fn insert_test_case(&self, mut test_case: TestCase, guard: Guard<Exam>) -> AppResult<TestCase> {
        let mut arena = self.arena.lock().await;
        guard(arena.exam_of_exercise(test_case.exercise_id)?)?;
        test_case.id = arena.next_id();
        arena.test_cases.insert(test_case.id, test_case.clone());
        Ok(test_case)
    }

    async fn find_test_case(&self, id: TestCaseId) -> AppResult<Option<TestCase>> {
        Ok(self.arena.lock().await.test_cases.get(&id).cloned())
    }

    async fn list_test_cases(&self, exercise_id: ExerciseId) -> AppResult<Vec<TestCase>> {
        let arena = self.arena.lock().await;
        Ok(arena
            .test_cases
            .values()
            .filter(|tc| tc.exercise_id == exercise_id)
            .cloned()
            .collect())
    }

    async fn update_test_case(
        &self,
        id: TestCaseId,
        guard: Guard<Exam>,
        mutation: Mutation<TestCase>,
    ) -> AppResult<TestCase> {
        let mut arena = self.arena.lock().await;
        let current = arena.test_case(id)?.clone();
        guard(arena.exam_of_exercise(current.exercise_id)?)?;

        let mut draft = current.clone();
        mutation(&mut draft)?;
        draft.id = id;
        draft.exercise_id = current.exercise_id;
        arena.test_cases.insert(id, draft.clone());
        Ok(draft)
    }

    async fn delete_test_case(&self, id: TestCaseId, guard: Guard<Exam>) -> AppResult<()> {
        let mut arena = self.arena.lock().await;
        guard(arena.exam_of_test_case(id)?)?;
        arena.results.retain(|key, _| key.test_case_id != id);
        arena.test_cases.remove(&id);
        Ok(())
    }

    async fn insert_submission(
        &self,
        mut submission: Submission,
        guard: Guard<Exam>,
    ) -> AppResult<Submission> {
        let mut arena = self.arena.lock().await;
        guard(arena.exam(submission.exam_id)?)?;

        let duplicate = arena
            .submissions
            .values()
            .any(|s| s.exam_id == submission.exam_id && s.submitter == submission.submitter);
        if duplicate {
            return Err(AppError::Conflict(format!(
                "{} already has a submission for exam {}",
                submission.submitter, submission.exam_id
            )));
        }

        submission.id = arena.next_id();
        arena.submissions.insert(submission.id, submission.clone());
        Ok(submission)
    }

    async fn find_submission(&self, id: SubmissionId) -> AppResult<Option<Submission>> {
        Ok(self.arena.lock().await.submissions.get(&id).cloned())
    }

    async fn list_submissions(&self, exam_id: ExamId) -> AppResult<Vec<Submission>> {
        let arena = self.arena.lock().await;
        Ok(arena
            .submissions
            .values()
            .filter(|s| s.exam_id == exam_id)
            .cloned()
            .collect())
    }

    async fn update_submission(
        &self,
        id: SubmissionId,
        guard: Guard<Exam>,
        mutation: Mutation<Submission>,
    ) -> AppResult<Submission> {
        let mut arena = self.arena.lock().await;
        let current = arena.submission(id)?.clone();
        guard(arena.exam(current.exam_id)?)?;

        let mut draft = current.clone();
        mutation(&mut draft)?;
        draft.id = id;
        draft.exam_id = current.exam_id;
        draft.submitter = current.submitter;
        arena.submissions.insert(id, draft.clone());
        Ok(draft)
    }

    async fn insert_solution(
        &self,
        mut solution: ExerciseSolution,
        guard: Guard<Submission>,
    ) -> AppResult<ExerciseSolution> {
        let mut arena = self.arena.lock().await;
        let submission = arena.submission(solution.submission_id)?;
        let exercise = arena.exercise(solution.exercise_id)?;
        if exercise.exam_id != submission.exam_id {
            return Err(AppError::Validation(format!(
                "Exercise {} and submission {} belong to different exams",
                exercise.id, submission.id
            )));
        }
        guard(submission)?;

        let duplicate = arena.solutions.values().any(|s| {
            s.submission_id == solution.submission_id && s.exercise_id == solution.exercise_id
        });
        if duplicate {
            return Err(AppError::Conflict(format!(
                "Submission {} already has a solution for exercise {}",
                solution.submission_id, solution.exercise_id
            )));
        }

        solution.id = arena.next_id();
        arena.solutions.insert(solution.id, solution.clone());
        Ok(solution)
    }

    async fn find_solution(&self, id: SolutionId) -> AppResult<Option<ExerciseSolution>> {
        Ok(self.arena.lock().await.solutions.get(&id).cloned())
    }

    async fn list_solutions(&self, submission_id: SubmissionId) -> AppResult<Vec<ExerciseSolution>> {
        let arena = self.arena.lock().await;
        Ok(arena
            .solutions
            .values()
            .filter(|s| s.submission_id == submission_id)
            .cloned()
            .collect())
    }

    async fn update_solution(
        &self,
        id: SolutionId,
        guard: Guard<Submission>,
        mutation: Mutation<ExerciseSolution>,
    ) -> AppResult<ExerciseSolution> {
        let mut arena = self.arena.lock().await;
        let current = arena.solution(id)?.clone();
        guard(arena.submission(current.submission_id)?)?;

        let mut draft = current.clone();
        mutation(&mut draft)?;
        draft.id = id;
        draft.exercise_id = current.exercise_id;
        draft.submission_id = current.submission_id;
        arena.solutions.insert(id, draft.clone());
        Ok(draft)
    }

    async fn upsert_result(&self, record: ExecutionRecord) -> AppResult<()> {
        let mut arena = self.arena.lock().await;
        arena.solution(record.solution_id)?;
        arena.test_case(record.test_case_id)?;
        let unchanged = arena
            .results
            .get(&record.key())
            .is_some_and(|existing| existing.result == record.result);
        if !unchanged {
            arena.results.insert(record.key(), record);
        }
        Ok(())
    }

    async fn find_result(&self, key: CorrelationKey) -> AppResult<Option<ExecutionRecord>> {
        Ok(self.arena.lock().await.results.get(&key).cloned())
    }

    async fn list_results(&self, solution_id: SolutionId) -> AppResult<Vec<ExecutionRecord>> {
        let arena = self.arena.lock().await;
        Ok(arena
            .results
            .values()
            .filter(|r| r.solution_id == solution_id)
            .cloned()
            .collect())
    }
}
