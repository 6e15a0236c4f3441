//! Exam service

use std::sync::Arc;

use chrono::{Duration, Utc};
use validator::Validate;

use athena_common::{AppError, AppResult, ExamId, PaginatedResponse, Pagination};
use athena_rules::AuthorizationGate;

use crate::authorization::{require_exam_owner, require_exam_read_access};
use crate::models::Exam;
use crate::payloads::{ExamUpdate, NewExam};
use crate::store::{Store, not_found};

/// Exam lifecycle and ownership operations
pub struct ExamService {
    store: Arc<dyn Store>,
    gate: AuthorizationGate,
}

impl ExamService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        let gate = super::gate_for(store.clone());
        Self { store, gate }
    }

    async fn load(&self, id: ExamId) -> AppResult<Exam> {
        self.store
            .find_exam(id)
            .await?
            .ok_or_else(|| not_found("Exam", id))
    }

    async fn load_owned(&self, principal: &str, id: ExamId) -> AppResult<Exam> {
        let exam = self.load(id).await?;
        require_exam_owner(&self.gate.context(principal).with_exam(id)).await?;
        Ok(exam)
    }

    /// Create an upcoming exam owned by the principal
    pub async fn create(&self, principal: &str, payload: NewExam) -> AppResult<Exam> {
        payload.validate()?;
        let exam = Exam::new(
            payload.description.clone(),
            payload.starting_at,
            payload.duration(),
            principal,
            Utc::now(),
        )?;

        let exam = self.store.insert_exam(exam).await?;
        tracing::info!(exam_id = exam.id, owner = principal, "Exam created");
        Ok(exam)
    }

    /// Get exam by ID
    pub async fn get(&self, principal: &str, id: ExamId) -> AppResult<Exam> {
        let exam = self.load(id).await?;
        require_exam_read_access(&self.gate.context(principal).with_exam(id)).await?;
        Ok(exam)
    }

    /// List the exams the principal may read, ordered by id
    pub async fn list(
        &self,
        principal: &str,
        pagination: &Pagination,
    ) -> AppResult<PaginatedResponse<Exam>> {
        let visible: Vec<Exam> = self
            .store
            .list_exams()
            .await?
            .into_iter()
            .filter(|exam| exam.is_owner(principal) || exam.state.has_started())
            .collect();

        let total = visible.len() as u64;
        let page = visible
            .into_iter()
            .skip(usize::try_from(pagination.offset()).unwrap_or(usize::MAX))
            .take(pagination.limit() as usize)
            .collect();

        Ok(PaginatedResponse::new(
            page,
            pagination.page,
            pagination.per_page,
            total,
        ))
    }

    /// Change description, start time or duration of an upcoming exam
    pub async fn update(&self, principal: &str, id: ExamId, payload: ExamUpdate) -> AppResult<Exam> {
        payload.validate()?;
        if payload.is_empty() {
            return Err(AppError::Validation("Exam update contains no changes".into()));
        }
        self.load_owned(principal, id).await?;

        let now = Utc::now();
        let exam = self
            .store
            .update_exam(
                id,
                Box::new(move |exam: &mut Exam| {
                    exam.ensure_upcoming()?;
                    if let Some(description) = payload.description {
                        exam.set_description(description)?;
                    }
                    if let Some(starting_at) = payload.starting_at {
                        exam.set_starting_at(starting_at, now)?;
                    }
                    if let Some(duration_ms) = payload.duration_ms {
                        exam.set_duration(Duration::milliseconds(duration_ms))?;
                    }
                    Ok(())
                }),
            )
            .await?;

        tracing::info!(exam_id = id, "Exam updated");
        Ok(exam)
    }

    /// UPCOMING -> IN_PROGRESS
    pub async fn start(&self, principal: &str, id: ExamId) -> AppResult<Exam> {
        self.load_owned(principal, id).await?;
        let exam = self
            .store
            .update_exam(id, Box::new(|exam: &mut Exam| exam.start(Utc::now())))
            .await?;

        tracing::info!(exam_id = id, started_at = ?exam.actual_starting_moment, "Exam started");
        Ok(exam)
    }

    /// IN_PROGRESS -> FINISHED
    pub async fn finish(&self, principal: &str, id: ExamId) -> AppResult<Exam> {
        self.load_owned(principal, id).await?;
        let exam = self
            .store
            .update_exam(id, Box::new(|exam: &mut Exam| exam.finish(Utc::now())))
            .await?;

        tracing::info!(
            exam_id = id,
            actual_duration_ms = exam.actual_duration.map(|d| d.num_milliseconds()),
            "Exam finished"
        );
        Ok(exam)
    }

    /// Delete an upcoming exam with its exercises and test cases
    pub async fn delete(&self, principal: &str, id: ExamId) -> AppResult<()> {
        self.load_owned(principal, id).await?;
        self.store
            .delete_exam(id, Box::new(|exam: &Exam| exam.ensure_upcoming()))
            .await?;

        tracing::info!(exam_id = id, "Exam deleted");
        Ok(())
    }

    pub async fn add_owner(&self, principal: &str, id: ExamId, owner: &str) -> AppResult<Exam> {
        self.load_owned(principal, id).await?;
        let owner = owner.to_string();
        self.store
            .update_exam(id, Box::new(move |exam: &mut Exam| exam.add_owner(owner)))
            .await
    }

    pub async fn remove_owner(&self, principal: &str, id: ExamId, owner: &str) -> AppResult<Exam> {
        self.load_owned(principal, id).await?;
        let owner = owner.to_string();
        self.store
            .update_exam(id, Box::new(move |exam: &mut Exam| exam.remove_owner(&owner)))
            .await
    }
}
