//! Test case service

use std::sync::Arc;

use validator::Validate;

use athena_common::{AppResult, ExerciseId, TestCaseId};
use athena_rules::AuthorizationGate;

use crate::authorization::{
    require_exercise_owner, require_exercise_read_access, require_test_case_owner,
    require_test_case_read_access,
};
use crate::models::{Exam, TestCase};
use crate::payloads::{NewTestCase, TestCaseUpdate};
use crate::store::{Store, not_found};

pub struct TestCaseService {
    store: Arc<dyn Store>,
    gate: AuthorizationGate,
}

impl TestCaseService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        let gate = super::gate_for(store.clone());
        Self { store, gate }
    }

    async fn load(&self, id: TestCaseId) -> AppResult<TestCase> {
        self.store
            .find_test_case(id)
            .await?
            .ok_or_else(|| not_found("Test case", id))
    }

    pub async fn create(
        &self,
        principal: &str,
        exercise_id: ExerciseId,
        payload: NewTestCase,
    ) -> AppResult<TestCase> {
        payload.validate()?;
        self.store
            .find_exercise(exercise_id)
            .await?
            .ok_or_else(|| not_found("Exercise", exercise_id))?;
        require_exercise_owner(&self.gate.context(principal).with_exercise(exercise_id)).await?;

        let test_case = TestCase::new(
            exercise_id,
            payload.visibility,
            payload.timeout_ms,
            payload.program_arguments,
            payload.stdin,
            payload.expected_output,
        )?;
        let test_case = self
            .store
            .insert_test_case(test_case, Box::new(|exam: &Exam| exam.ensure_upcoming()))
            .await?;

        tracing::info!(exercise_id, test_case_id = test_case.id, "Test case created");
        Ok(test_case)
    }

    pub async fn get(&self, principal: &str, id: TestCaseId) -> AppResult<TestCase> {
        let test_case = self.load(id).await?;
        require_test_case_read_access(
            &self.gate.context(principal).with_test_case(id),
            test_case.is_public(),
        )
        .await?;
        Ok(test_case)
    }

    /// Test cases of an exercise visible to the principal: all of them for
    /// owners, the public ones for everyone else once the exam has started.
    pub async fn list(&self, principal: &str, exercise_id: ExerciseId) -> AppResult<Vec<TestCase>> {
        self.store
            .find_exercise(exercise_id)
            .await?
            .ok_or_else(|| not_found("Exercise", exercise_id))?;

        let test_cases = self.store.list_test_cases(exercise_id).await?;
        if self.gate.is_exercise_owner(exercise_id, principal).await {
            return Ok(test_cases);
        }

        require_exercise_read_access(&self.gate.context(principal).with_exercise(exercise_id))
            .await?;
        Ok(test_cases.into_iter().filter(TestCase::is_public).collect())
    }

    pub async fn update(
        &self,
        principal: &str,
        id: TestCaseId,
        payload: TestCaseUpdate,
    ) -> AppResult<TestCase> {
        payload.validate()?;
        self.load(id).await?;
        require_test_case_owner(&self.gate.context(principal).with_test_case(id)).await?;

        self.store
            .update_test_case(
                id,
                Box::new(|exam: &Exam| exam.ensure_upcoming()),
                Box::new(move |test_case: &mut TestCase| {
                    if let Some(visibility) = payload.visibility {
                        test_case.visibility = visibility;
                    }
                    if payload.timeout_ms.is_some() {
                        test_case.set_timeout_ms(payload.timeout_ms)?;
                    }
                    if let Some(arguments) = payload.program_arguments {
                        test_case.program_arguments = arguments;
                    }
                    if let Some(stdin) = payload.stdin {
                        test_case.stdin = stdin;
                    }
                    if let Some(expected_output) = payload.expected_output {
                        test_case.set_expected_output(expected_output)?;
                    }
                    Ok(())
                }),
            )
            .await
    }

    pub async fn delete(&self, principal: &str, id: TestCaseId) -> AppResult<()> {
        self.load(id).await?;
        require_test_case_owner(&self.gate.context(principal).with_test_case(id)).await?;
        self.store
            .delete_test_case(id, Box::new(|exam: &Exam| exam.ensure_upcoming()))
            .await?;

        tracing::info!(test_case_id = id, "Test case deleted");
        Ok(())
    }
}
