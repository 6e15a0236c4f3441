//! Exercise service

use std::sync::Arc;

use validator::Validate;

use athena_common::{AppResult, ExamId, ExerciseId};
use athena_rules::AuthorizationGate;

use crate::authorization::{
    require_exam_owner, require_exam_read_access, require_exercise_owner,
    require_exercise_read_access,
};
use crate::models::{Exam, Exercise};
use crate::payloads::{ExerciseUpdate, NewExercise};
use crate::store::{Store, not_found};

pub struct ExerciseService {
    store: Arc<dyn Store>,
    gate: AuthorizationGate,
}

impl ExerciseService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        let gate = super::gate_for(store.clone());
        Self { store, gate }
    }

    async fn load(&self, id: ExerciseId) -> AppResult<Exercise> {
        self.store
            .find_exercise(id)
            .await?
            .ok_or_else(|| not_found("Exercise", id))
    }

    /// Add an exercise to an upcoming exam
    pub async fn create(
        &self,
        principal: &str,
        exam_id: ExamId,
        payload: NewExercise,
    ) -> AppResult<Exercise> {
        payload.validate()?;
        self.store
            .find_exam(exam_id)
            .await?
            .ok_or_else(|| not_found("Exam", exam_id))?;
        require_exam_owner(&self.gate.context(principal).with_exam(exam_id)).await?;

        let exercise = Exercise::new(
            exam_id,
            payload.question,
            payload.language,
            payload.solution_template,
        )?;
        let exercise = self
            .store
            .insert_exercise(exercise, Box::new(|exam: &Exam| exam.ensure_upcoming()))
            .await?;

        tracing::info!(exam_id, exercise_id = exercise.id, "Exercise created");
        Ok(exercise)
    }

    pub async fn get(&self, principal: &str, id: ExerciseId) -> AppResult<Exercise> {
        let exercise = self.load(id).await?;
        require_exercise_read_access(&self.gate.context(principal).with_exercise(id)).await?;
        Ok(exercise)
    }

    /// Exercises of an exam, ordered by id
    pub async fn list(&self, principal: &str, exam_id: ExamId) -> AppResult<Vec<Exercise>> {
        self.store
            .find_exam(exam_id)
            .await?
            .ok_or_else(|| not_found("Exam", exam_id))?;
        require_exam_read_access(&self.gate.context(principal).with_exam(exam_id)).await?;
        self.store.list_exercises(exam_id).await
    }

    pub async fn update(
        &self,
        principal: &str,
        id: ExerciseId,
        payload: ExerciseUpdate,
    ) -> AppResult<Exercise> {
        payload.validate()?;
        self.load(id).await?;
        require_exercise_owner(&self.gate.context(principal).with_exercise(id)).await?;

        self.store
            .update_exercise(
                id,
                Box::new(|exam: &Exam| exam.ensure_upcoming()),
                Box::new(move |exercise: &mut Exercise| {
                    if let Some(question) = payload.question {
                        exercise.set_question(question)?;
                    }
                    if let Some(language) = payload.language {
                        exercise.language = language;
                    }
                    if let Some(template) = payload.solution_template {
                        exercise.solution_template = Some(template);
                    }
                    Ok(())
                }),
            )
            .await
    }

    /// Delete an exercise of an upcoming exam with its test cases
    pub async fn delete(&self, principal: &str, id: ExerciseId) -> AppResult<()> {
        self.load(id).await?;
        require_exercise_owner(&self.gate.context(principal).with_exercise(id)).await?;
        self.store
            .delete_exercise(id, Box::new(|exam: &Exam| exam.ensure_upcoming()))
            .await?;

        tracing::info!(exercise_id = id, "Exercise deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::ExamService;
    use crate::store::MemoryStore;
    use crate::test_utils::{new_exam, new_exercise};
    use athena_common::{AppError, Language};

    #[tokio::test]
    async fn test_exercise_lifecycle() {
        let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
        let exams = ExamService::new(store.clone());
        let exercises = ExerciseService::new(store.clone());

        let exam = exams.create("alice", new_exam("Quiz")).await.unwrap();
        let exercise = exercises.create("alice", exam.id, new_exercise()).await.unwrap();
        assert_eq!(exercise.exam_id, exam.id);

        let err = exercises.create("bob", exam.id, new_exercise()).await.unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
        assert!(matches!(
            exercises.get("bob", exercise.id).await,
            Err(AppError::Forbidden(_))
        ));

        let update = ExerciseUpdate {
            language: Some(Language::Rust),
            ..Default::default()
        };
        let updated = exercises.update("alice", exercise.id, update).await.unwrap();
        assert_eq!(updated.language, Language::Rust);

        exams.start("alice", exam.id).await.unwrap();
        assert_eq!(exercises.get("bob", exercise.id).await.unwrap(), updated);

        let err = exercises.create("alice", exam.id, new_exercise()).await.unwrap_err();
        assert!(matches!(err, AppError::IllegalState(_)));
        let err = exercises.delete("alice", exercise.id).await.unwrap_err();
        assert!(matches!(err, AppError::IllegalState(_)));
        let err = exercises
            .update("alice", exercise.id, ExerciseUpdate::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::IllegalState(_)));
    }

    #[tokio::test]
    async fn test_empty_question_rejected() {
        let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
        let exams = ExamService::new(store.clone());
        let exercises = ExerciseService::new(store);

        let exam = exams.create("alice", new_exam("Quiz")).await.unwrap();
        let mut payload = new_exercise();
        payload.question = String::new();
        let err = exercises.create("alice", exam.id, payload).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }
}
