//! Common types used across Athena crates.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Exam ID type
pub type ExamId = i64;

/// Exercise ID type
pub type ExerciseId = i64;

/// Test case ID type
pub type TestCaseId = i64;

/// Exam solution submission ID type
pub type SubmissionId = i64;

/// Exercise solution ID type
pub type SolutionId = i64;

/// Exam lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExamState {
    /// Exam has not started yet; the only mutable state
    Upcoming,
    /// Exam is running
    InProgress,
    /// Exam has ended
    Finished,
}

impl ExamState {
    /// Whether the exam has been started (running or already over).
    pub fn has_started(&self) -> bool {
        matches!(self, ExamState::InProgress | ExamState::Finished)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ExamState::Upcoming => "UPCOMING",
            ExamState::InProgress => "IN_PROGRESS",
            ExamState::Finished => "FINISHED",
        }
    }
}

impl Default for ExamState {
    fn default() -> Self {
        ExamState::Upcoming
    }
}

impl std::fmt::Display for ExamState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExamState {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "UPCOMING" => Ok(ExamState::Upcoming),
            "IN_PROGRESS" => Ok(ExamState::InProgress),
            "FINISHED" => Ok(ExamState::Finished),
            other => Err(AppError::Decode(format!("unknown exam state '{}'", other))),
        }
    }
}

/// Submission lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SubmissionState {
    /// Solutions can still be edited
    Unplaced,
    /// Handed in; solutions are frozen and get executed
    Submitted,
}

impl SubmissionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubmissionState::Unplaced => "UNPLACED",
            SubmissionState::Submitted => "SUBMITTED",
        }
    }
}

impl Default for SubmissionState {
    fn default() -> Self {
        SubmissionState::Unplaced
    }
}

impl std::fmt::Display for SubmissionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SubmissionState {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "UNPLACED" => Ok(SubmissionState::Unplaced),
            "SUBMITTED" => Ok(SubmissionState::Submitted),
            other => Err(AppError::Decode(format!("unknown submission state '{}'", other))),
        }
    }
}

/// Test case visibility towards students
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Visibility {
    Public,
    Private,
}

impl Visibility {
    pub fn as_str(&self) -> &'static str {
        match self {
            Visibility::Public => "PUBLIC",
            Visibility::Private => "PRIVATE",
        }
    }
}

impl std::fmt::Display for Visibility {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Visibility {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PUBLIC" => Ok(Visibility::Public),
            "PRIVATE" => Ok(Visibility::Private),
            other => Err(AppError::Decode(format!("unknown visibility '{}'", other))),
        }
    }
}

/// Programming language of an exercise
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Java,
    C,
    Cpp,
    Python,
    Rust,
    Go,
    Javascript,
}

impl Language {
    pub fn as_str(&self) -> &'static str {
        match self {
            Language::Java => "java",
            Language::C => "c",
            Language::Cpp => "cpp",
            Language::Python => "python",
            Language::Rust => "rust",
            Language::Go => "go",
            Language::Javascript => "javascript",
        }
    }
}

impl std::fmt::Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Language {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "java" => Ok(Language::Java),
            "c" => Ok(Language::C),
            "cpp" | "c++" => Ok(Language::Cpp),
            "python" => Ok(Language::Python),
            "rust" => Ok(Language::Rust),
            "go" => Ok(Language::Go),
            "javascript" => Ok(Language::Javascript),
            other => Err(AppError::Decode(format!("unknown language '{}'", other))),
        }
    }
}

/// Pagination parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pagination {
    pub page: u32,
    pub per_page: u32,
}

impl Default for Pagination {
    fn default() -> Self {
        Pagination {
            page: 1,
            per_page: 20,
        }
    }
}

impl Pagination {
    pub fn new(page: u32, per_page: u32) -> Self {
        Pagination {
            page: page.max(1),
            per_page: per_page.clamp(1, 100),
        }
    }

    /// Calculate offset for SQL queries
    pub fn offset(&self) -> u64 {
        u64::from(self.page.saturating_sub(1)) * u64::from(self.per_page)
    }

    /// Get limit for SQL queries
    pub fn limit(&self) -> u32 {
        self.per_page
    }
}

/// Paginated response wrapper
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaginatedResponse<T> {
    pub data: Vec<T>,
    pub page: u32,
    pub per_page: u32,
    pub total: u64,
    pub total_pages: u32,
}

impl<T> PaginatedResponse<T> {
    pub fn new(data: Vec<T>, page: u32, per_page: u32, total: u64) -> Self {
        let total_pages = ((total as f64) / (per_page.max(1) as f64)).ceil() as u32;
        PaginatedResponse {
            data,
            page,
            per_page,
            total,
            total_pages,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exam_state_round_trip() {
        for state in [ExamState::Upcoming, ExamState::InProgress, ExamState::Finished] {
            assert_eq!(state.as_str().parse::<ExamState>().unwrap(), state);
        }
        assert!("RUNNING".parse::<ExamState>().is_err());
    }

    #[test]
    fn test_has_started() {
        assert!(!ExamState::Upcoming.has_started());
        assert!(ExamState::InProgress.has_started());
        assert!(ExamState::Finished.has_started());
    }

    #[test]
    fn test_language_parsing() {
        assert_eq!("Java".parse::<Language>().unwrap(), Language::Java);
        assert_eq!("c++".parse::<Language>().unwrap(), Language::Cpp);
        assert!("cobol".parse::<Language>().is_err());
        assert_eq!(serde_json::to_string(&Language::Python).unwrap(), "\"python\"");
    }

    #[test]
    fn test_pagination_offset() {
        let page = Pagination::new(3, 20);
        assert_eq!(page.offset(), 40);
        assert_eq!(page.limit(), 20);

        let clamped = Pagination::new(0, 1000);
        assert_eq!(clamped.page, 1);
        assert_eq!(clamped.per_page, 100);
    }

    #[test]
    fn test_pagination_offset_of_last_page() {
        let page = Pagination::new(u32::MAX, 100);
        assert_eq!(page.offset(), (u64::from(u32::MAX) - 1) * 100);

        let unclamped: Pagination =
            serde_json::from_str(&format!(r#"{{"page":0,"per_page":{}}}"#, u32::MAX)).unwrap();
        assert_eq!(unclamped.offset(), 0);
    }

    #[test]
    fn test_paginated_total_pages() {
        let response = PaginatedResponse::new(vec![1, 2, 3], 1, 2, 5);
        assert_eq!(response.total_pages, 3);
    }
}
