//! Exercise solution model

use serde::{Deserialize, Serialize};

use athena_common::{AppError, AppResult, ExerciseId, SolutionId, SubmissionId};

use super::{Exercise, Submission};

/// A student's answer to one exercise, part of a submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExerciseSolution {
    pub id: SolutionId,
    pub exercise_id: ExerciseId,
    pub submission_id: SubmissionId,
    pub answer: String,
    pub compiler_flags: Option<String>,
    pub main_file_name: Option<String>,
}

impl ExerciseSolution {
    /// Pair a submission with an exercise. Both must belong to the same exam.
    pub fn new(
        exercise: &Exercise,
        submission: &Submission,
        answer: impl Into<String>,
        compiler_flags: Option<String>,
        main_file_name: Option<String>,
    ) -> AppResult<Self> {
        if exercise.exam_id != submission.exam_id {
            return Err(AppError::Validation(format!(
                "Exercise {} belongs to exam {}, submission {} to exam {}",
                exercise.id, exercise.exam_id, submission.id, submission.exam_id
            )));
        }
        Ok(Self {
            id: 0,
            exercise_id: exercise.id,
            submission_id: submission.id,
            answer: answer.into(),
            compiler_flags,
            main_file_name,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use athena_common::Language;

    #[test]
    fn test_cross_exam_pairing_rejected() {
        let mut exercise = Exercise::new(1, "Sum two numbers", Language::Java, None).unwrap();
        exercise.id = 10;
        let mut submission = Submission::new(2, "bob").unwrap();
        submission.id = 20;

        let result = ExerciseSolution::new(&exercise, &submission, "class A {}", None, None);
        assert!(matches!(result, Err(AppError::Validation(_))));

        submission.exam_id = 1;
        let solution =
            ExerciseSolution::new(&exercise, &submission, "class A {}", None, Some("A.java".into()))
                .unwrap();
        assert_eq!(solution.exercise_id, 10);
        assert_eq!(solution.submission_id, 20);
    }
}
