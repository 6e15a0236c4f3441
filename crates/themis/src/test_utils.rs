//! Shared fixtures for unit tests.

use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{Duration, Utc};

use athena_common::{
    AppError, AppResult, CorrelationKey, ExamId, ExerciseId, Language, Visibility,
};
use hermes::{CommandDispatcher, ExecutionCommand};

use crate::models::{Exam, Exercise, TestCase};
use crate::payloads::{NewExam, NewExercise, NewSolution, NewTestCase};

/// An upcoming 90 minute exam starting tomorrow.
pub fn exam_fixture(owner: &str) -> Exam {
    let now = Utc::now();
    Exam::new(
        "Fixture exam",
        now + Duration::days(1),
        Duration::minutes(90),
        owner,
        now,
    )
    .unwrap()
}

pub fn exercise_fixture(exam_id: ExamId) -> Exercise {
    Exercise::new(exam_id, "Add two numbers", Language::Python, None).unwrap()
}

pub fn test_case_fixture(exercise_id: ExerciseId) -> TestCase {
    TestCase::new(
        exercise_id,
        Visibility::Public,
        Some(2000),
        vec![],
        vec!["1 2".to_string()],
        vec!["3".to_string()],
    )
    .unwrap()
}

pub fn new_exam(description: &str) -> NewExam {
    NewExam {
        description: description.to_string(),
        starting_at: Utc::now() + Duration::days(1),
        duration_ms: 90 * 60 * 1000,
    }
}

pub fn new_exercise() -> NewExercise {
    NewExercise {
        question: "Add two numbers read from stdin".to_string(),
        language: Language::Python,
        solution_template: None,
    }
}

pub fn new_test_case(visibility: Visibility) -> NewTestCase {
    NewTestCase {
        visibility,
        timeout_ms: Some(2000),
        program_arguments: vec![],
        stdin: vec!["1 2".to_string()],
        expected_output: vec!["3".to_string()],
    }
}

pub fn new_solution(exercise_id: ExerciseId) -> NewSolution {
    NewSolution {
        exercise_id,
        answer: "a, b = map(int, input().split())\nprint(a + b)".to_string(),
        compiler_flags: None,
        main_file_name: None,
    }
}

/// Dispatcher that remembers every request, optionally failing all of them.
#[derive(Default)]
pub struct RecordingDispatcher {
    requests: Mutex<Vec<(CorrelationKey, ExecutionCommand)>>,
    fail: bool,
}

impl RecordingDispatcher {
    pub fn failing() -> Self {
        Self {
            requests: Mutex::default(),
            fail: true,
        }
    }

    pub fn keys(&self) -> Vec<CorrelationKey> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .map(|(key, _)| *key)
            .collect()
    }
}

#[async_trait]
impl CommandDispatcher for RecordingDispatcher {
    async fn request_execution(
        &self,
        command: &ExecutionCommand,
        key: CorrelationKey,
    ) -> AppResult<()> {
        if self.fail {
            return Err(AppError::Queue("stream unavailable".to_string()));
        }
        self.requests.lock().unwrap().push((key, command.clone()));
        Ok(())
    }
}
