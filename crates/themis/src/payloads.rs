//! Creation and update payloads
//!
//! Structural checks run through `validator`; checks that depend on the
//! current time or on lifecycle state are enforced by the models.

use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use validator::{Validate, ValidationError};

use athena_common::{ExamId, ExerciseId, Language, Visibility};

use crate::models::exam::MAX_DESCRIPTION_LENGTH;
use crate::models::test_case::MAX_TIMEOUT_MS;

const MAX_DESCRIPTION: u64 = MAX_DESCRIPTION_LENGTH as u64;

/// Create exam request
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NewExam {
    #[validate(length(min = 1, max = MAX_DESCRIPTION))]
    pub description: String,

    /// Scheduled start, must lie in the future
    pub starting_at: DateTime<Utc>,

    /// Planned duration in milliseconds
    #[validate(range(min = 1))]
    pub duration_ms: i64,
}

impl NewExam {
    pub fn duration(&self) -> Duration {
        Duration::milliseconds(self.duration_ms)
    }
}

/// Update exam request; absent fields are left unchanged
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct ExamUpdate {
    #[validate(length(min = 1, max = MAX_DESCRIPTION))]
    pub description: Option<String>,

    pub starting_at: Option<DateTime<Utc>>,

    #[validate(range(min = 1))]
    pub duration_ms: Option<i64>,
}

impl ExamUpdate {
    pub fn is_empty(&self) -> bool {
        self.description.is_none() && self.starting_at.is_none() && self.duration_ms.is_none()
    }
}

/// Create exercise request
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NewExercise {
    #[validate(length(min = 1))]
    pub question: String,

    pub language: Language,

    pub solution_template: Option<String>,
}

/// Update exercise request
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct ExerciseUpdate {
    #[validate(length(min = 1))]
    pub question: Option<String>,

    pub language: Option<Language>,

    pub solution_template: Option<String>,
}

/// Create test case request
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NewTestCase {
    pub visibility: Visibility,

    #[validate(range(min = 1, max = MAX_TIMEOUT_MS))]
    pub timeout_ms: Option<u64>,

    #[serde(default)]
    pub program_arguments: Vec<String>,

    #[serde(default)]
    pub stdin: Vec<String>,

    #[validate(length(min = 1))]
    pub expected_output: Vec<String>,
}

/// Update test case request
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct TestCaseUpdate {
    pub visibility: Option<Visibility>,

    #[validate(range(min = 1, max = MAX_TIMEOUT_MS))]
    pub timeout_ms: Option<u64>,

    pub program_arguments: Option<Vec<String>>,

    pub stdin: Option<Vec<String>>,

    #[validate(length(min = 1))]
    pub expected_output: Option<Vec<String>>,
}

/// Open a submission for an exam; the caller becomes the submitter
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NewSubmission {
    pub exam_id: ExamId,
}

/// Create solution request
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NewSolution {
    pub exercise_id: ExerciseId,

    pub answer: String,

    pub compiler_flags: Option<String>,

    #[validate(custom(function = "validate_not_blank"))]
    pub main_file_name: Option<String>,
}

/// Update solution request
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct SolutionUpdate {
    pub answer: Option<String>,

    pub compiler_flags: Option<String>,

    #[validate(custom(function = "validate_not_blank"))]
    pub main_file_name: Option<String>,
}

fn validate_not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::new("blank"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use athena_common::AppError;

    #[test]
    fn test_exam_payload_validation() {
        let valid = NewExam {
            description: "Midterm".to_string(),
            starting_at: Utc::now(),
            duration_ms: 90 * 60 * 1000,
        };
        assert!(valid.validate().is_ok());
        assert_eq!(valid.duration(), Duration::minutes(90));

        let too_long = NewExam {
            description: "x".repeat(65),
            ..valid.clone()
        };
        let err: AppError = too_long.validate().unwrap_err().into();
        assert!(matches!(err, AppError::Validation(_)));

        let no_time = NewExam {
            duration_ms: 0,
            ..valid
        };
        assert!(no_time.validate().is_err());
    }

    #[test]
    fn test_partial_updates() {
        assert!(ExamUpdate::default().is_empty());
        assert!(ExamUpdate::default().validate().is_ok());

        let update = ExamUpdate {
            description: Some(String::new()),
            ..Default::default()
        };
        assert!(update.validate().is_err());

        let update = TestCaseUpdate {
            expected_output: Some(vec![]),
            ..Default::default()
        };
        assert!(update.validate().is_err());
    }

    #[test]
    fn test_test_case_payload_from_json() {
        let payload: NewTestCase = serde_json::from_str(
            r#"{"visibility":"PRIVATE","timeout_ms":500,"expected_output":["3"]}"#,
        )
        .unwrap();
        assert!(payload.validate().is_ok());
        assert!(payload.stdin.is_empty());

        let nulls = serde_json::from_str::<NewTestCase>(
            r#"{"visibility":"PUBLIC","expected_output":["3", null]}"#,
        );
        assert!(nulls.is_err());
    }

    #[test]
    fn test_timeout_must_fit_storage() {
        let payload: NewTestCase = serde_json::from_str(&format!(
            r#"{{"visibility":"PUBLIC","timeout_ms":{},"expected_output":["3"]}}"#,
            u64::MAX
        ))
        .unwrap();
        assert!(payload.validate().is_err());

        let update = TestCaseUpdate {
            timeout_ms: Some(MAX_TIMEOUT_MS + 1),
            ..Default::default()
        };
        assert!(update.validate().is_err());

        let update = TestCaseUpdate {
            timeout_ms: Some(MAX_TIMEOUT_MS),
            ..Default::default()
        };
        assert!(update.validate().is_ok());
    }

    #[test]
    fn test_blank_main_file_name() {
        let payload = NewSolution {
            exercise_id: 1,
            answer: "print(1)".to_string(),
            compiler_flags: None,
            main_file_name: Some("  ".to_string()),
        };
        assert!(payload.validate().is_err());
    }
}
