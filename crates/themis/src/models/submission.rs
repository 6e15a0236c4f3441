//! Exam solution submission model

use serde::{Deserialize, Serialize};

use athena_common::{AppError, AppResult, ExamId, SubmissionId, SubmissionState};

/// One student's hand-in for an exam.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Submission {
    pub id: SubmissionId,
    pub exam_id: ExamId,
    pub submitter: String,
    pub state: SubmissionState,
}

impl Submission {
    pub fn new(exam_id: ExamId, submitter: impl Into<String>) -> AppResult<Self> {
        let submitter = submitter.into();
        if submitter.trim().is_empty() {
            return Err(AppError::Validation("Submitter must not be blank".to_string()));
        }
        Ok(Self {
            id: 0,
            exam_id,
            submitter,
            state: SubmissionState::Unplaced,
        })
    }

    /// UNPLACED -> SUBMITTED. One way.
    pub fn submit(&mut self) -> AppResult<()> {
        if self.state != SubmissionState::Unplaced {
            return Err(AppError::IllegalState(format!(
                "Submission {} was already submitted",
                self.id
            )));
        }
        self.state = SubmissionState::Submitted;
        Ok(())
    }

    pub fn ensure_unplaced(&self) -> AppResult<()> {
        if self.state != SubmissionState::Unplaced {
            return Err(AppError::IllegalState(format!(
                "Submission {} is submitted; its solutions can no longer change",
                self.id
            )));
        }
        Ok(())
    }

    pub fn ensure_submitted(&self) -> AppResult<()> {
        if self.state != SubmissionState::Submitted {
            return Err(AppError::IllegalState(format!(
                "Submission {} has not been submitted yet",
                self.id
            )));
        }
        Ok(())
    }
}
