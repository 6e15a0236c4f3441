//! Exam model and lifecycle state machine

use std::collections::BTreeSet;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use athena_common::{AppError, AppResult, ExamId, ExamState};

use super::duration_ms;

/// Maximum exam description length in characters
pub const MAX_DESCRIPTION_LENGTH: usize = 64;

/// A timed exam.
///
/// Created in [`ExamState::Upcoming`]; `start` moves it to `InProgress` and
/// `finish` to `Finished`. Description, timing and duration can only change
/// while upcoming.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Exam {
    pub id: ExamId,
    pub description: String,
    pub starting_at: DateTime<Utc>,
    #[serde(with = "duration_ms")]
    pub duration: Duration,
    pub state: ExamState,
    pub actual_starting_moment: Option<DateTime<Utc>>,
    #[serde(with = "duration_ms::option")]
    pub actual_duration: Option<Duration>,
    pub owners: BTreeSet<String>,
}

impl Exam {
    /// Build a new upcoming exam. The id is assigned when the exam is stored.
    pub fn new(
        description: impl Into<String>,
        starting_at: DateTime<Utc>,
        duration: Duration,
        owner: impl Into<String>,
        now: DateTime<Utc>,
    ) -> AppResult<Self> {
        let description = description.into();
        let owner = owner.into();

        check_description(&description)?;
        check_starting_at(starting_at, now)?;
        check_duration(duration)?;
        check_owner(&owner)?;

        Ok(Self {
            id: 0,
            description,
            starting_at,
            duration,
            state: ExamState::Upcoming,
            actual_starting_moment: None,
            actual_duration: None,
            owners: BTreeSet::from([owner]),
        })
    }

    pub fn is_owner(&self, principal: &str) -> bool {
        self.owners.contains(principal)
    }

    /// Fails with `IllegalState` unless the exam is upcoming.
    pub fn ensure_upcoming(&self) -> AppResult<()> {
        if self.state != ExamState::Upcoming {
            return Err(AppError::IllegalState(format!(
                "Exam {} is {}; only upcoming exams can be modified",
                self.id, self.state
            )));
        }
        Ok(())
    }

    /// Fails with `IllegalState` unless the exam is in progress.
    pub fn ensure_in_progress(&self) -> AppResult<()> {
        if self.state != ExamState::InProgress {
            return Err(AppError::IllegalState(format!(
                "Exam {} is {}, not IN_PROGRESS",
                self.id, self.state
            )));
        }
        Ok(())
    }

    pub fn set_description(&mut self, description: impl Into<String>) -> AppResult<()> {
        self.ensure_upcoming()?;
        let description = description.into();
        check_description(&description)?;
        self.description = description;
        Ok(())
    }

    pub fn set_starting_at(&mut self, starting_at: DateTime<Utc>, now: DateTime<Utc>) -> AppResult<()> {
        self.ensure_upcoming()?;
        check_starting_at(starting_at, now)?;
        self.starting_at = starting_at;
        Ok(())
    }

    pub fn set_duration(&mut self, duration: Duration) -> AppResult<()> {
        self.ensure_upcoming()?;
        check_duration(duration)?;
        self.duration = duration;
        Ok(())
    }

    /// UPCOMING -> IN_PROGRESS, recording the actual starting moment.
    pub fn start(&mut self, now: DateTime<Utc>) -> AppResult<()> {
        if self.state != ExamState::Upcoming {
            return Err(AppError::IllegalState(format!(
                "Exam {} cannot be started while {}",
                self.id, self.state
            )));
        }
        self.state = ExamState::InProgress;
        self.actual_starting_moment = Some(now);
        Ok(())
    }

    /// IN_PROGRESS -> FINISHED, recording how long the exam actually ran.
    pub fn finish(&mut self, now: DateTime<Utc>) -> AppResult<()> {
        if self.state != ExamState::InProgress {
            return Err(AppError::IllegalState(format!(
                "Exam {} cannot be finished while {}",
                self.id, self.state
            )));
        }
        let started = self.actual_starting_moment.unwrap_or(now);
        self.state = ExamState::Finished;
        self.actual_duration = Some((now - started).max(Duration::zero()));
        Ok(())
    }

    pub fn add_owner(&mut self, owner: impl Into<String>) -> AppResult<()> {
        self.ensure_upcoming()?;
        let owner = owner.into();
        check_owner(&owner)?;
        self.owners.insert(owner);
        Ok(())
    }

    /// Removing an unknown owner is a no-op; removing the last one fails.
    pub fn remove_owner(&mut self, owner: &str) -> AppResult<()> {
        self.ensure_upcoming()?;
        if !self.owners.contains(owner) {
            return Ok(());
        }
        if self.owners.len() == 1 {
            return Err(AppError::Validation(
                "An exam must keep at least one owner".to_string(),
            ));
        }
        self.owners.remove(owner);
        Ok(())
    }
}

fn check_description(description: &str) -> AppResult<()> {
    let length = description.chars().count();
    if length == 0 || length > MAX_DESCRIPTION_LENGTH {
        return Err(AppError::Validation(format!(
            "Exam description must be between 1 and {} characters",
            MAX_DESCRIPTION_LENGTH
        )));
    }
    Ok(())
}

fn check_starting_at(starting_at: DateTime<Utc>, now: DateTime<Utc>) -> AppResult<()> {
    if starting_at <= now {
        return Err(AppError::Validation(
            "Exam starting moment must be in the future".to_string(),
        ));
    }
    Ok(())
}

fn check_duration(duration: Duration) -> AppResult<()> {
    if duration <= Duration::zero() {
        return Err(AppError::Validation(
            "Exam duration must be positive".to_string(),
        ));
    }
    Ok(())
}

fn check_owner(owner: &str) -> AppResult<()> {
    if owner.trim().is_empty() {
        return Err(AppError::Validation("Exam owner must not be blank".to_string()));
    }
    Ok(())
}
