//! Exercise model

use serde::{Deserialize, Serialize};

use athena_common::{AppError, AppResult, ExamId, ExerciseId, Language};

/// A programming question within an exam.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Exercise {
    pub id: ExerciseId,
    /// Owning exam, fixed at creation
    pub exam_id: ExamId,
    pub question: String,
    pub language: Language,
    pub solution_template: Option<String>,
}

impl Exercise {
    pub fn new(
        exam_id: ExamId,
        question: impl Into<String>,
        language: Language,
        solution_template: Option<String>,
    ) -> AppResult<Self> {
        let question = question.into();
        check_question(&question)?;
        Ok(Self {
            id: 0,
            exam_id,
            question,
            language,
            solution_template,
        })
    }

    pub fn set_question(&mut self, question: impl Into<String>) -> AppResult<()> {
        let question = question.into();
        check_question(&question)?;
        self.question = question;
        Ok(())
    }
}

fn check_question(question: &str) -> AppResult<()> {
    if question.is_empty() {
        return Err(AppError::Validation("Exercise question must not be empty".to_string()));
    }
    Ok(())
}
