//! Fixed relation graph for rule tests.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use athena_common::{
    AppResult, ExamId, ExamState, ExerciseId, SolutionId, SubmissionId, TestCaseId,
};

use crate::context::{AuthContext, OwnershipLookup, SolutionRef, SubmissionRef};

#[derive(Default)]
pub struct FakeLookup {
    owners: HashMap<ExamId, Vec<String>>,
    states: Mutex<HashMap<ExamId, ExamState>>,
    exercises: HashMap<ExerciseId, ExamId>,
    test_cases: HashMap<TestCaseId, ExerciseId>,
    submissions: HashMap<SubmissionId, SubmissionRef>,
    solutions: HashMap<SolutionId, SolutionRef>,
}

impl FakeLookup {
    pub fn set_state(&self, exam_id: ExamId, state: ExamState) {
        self.states.lock().unwrap().insert(exam_id, state);
    }
}

#[async_trait]
impl OwnershipLookup for FakeLookup {
    async fn exam_owners(&self, exam_id: ExamId) -> AppResult<Option<Vec<String>>> {
        Ok(self.owners.get(&exam_id).cloned())
    }

    async fn exam_state(&self, exam_id: ExamId) -> AppResult<Option<ExamState>> {
        Ok(self.states.lock().unwrap().get(&exam_id).copied())
    }

    async fn exercise_exam(&self, exercise_id: ExerciseId) -> AppResult<Option<ExamId>> {
        Ok(self.exercises.get(&exercise_id).copied())
    }

    async fn test_case_exercise(&self, test_case_id: TestCaseId) -> AppResult<Option<ExerciseId>> {
        Ok(self.test_cases.get(&test_case_id).copied())
    }

    async fn submission(&self, submission_id: SubmissionId) -> AppResult<Option<SubmissionRef>> {
        Ok(self.submissions.get(&submission_id).cloned())
    }

    async fn solution(&self, solution_id: SolutionId) -> AppResult<Option<SolutionRef>> {
        Ok(self.solutions.get(&solution_id).copied())
    }
}

/// Exam 1 (owner alice) with exercise 10, test case 100, submission 1000 by
/// bob, submission 1001 by dave and solution 5000. Exam 2 (owner carol) with
/// exercise 11.
pub fn sample_lookup() -> Arc<FakeLookup> {
    let mut lookup = FakeLookup::default();
    lookup.owners.insert(1, vec!["alice".to_string()]);
    lookup.owners.insert(2, vec!["carol".to_string()]);
    lookup.states.lock().unwrap().insert(1, ExamState::Upcoming);
    lookup.states.lock().unwrap().insert(2, ExamState::Upcoming);
    lookup.exercises.insert(10, 1);
    lookup.exercises.insert(11, 2);
    lookup.test_cases.insert(100, 10);
    lookup.submissions.insert(
        1000,
        SubmissionRef {
            exam_id: 1,
            submitter: "bob".to_string(),
        },
    );
    lookup.submissions.insert(
        1001,
        SubmissionRef {
            exam_id: 1,
            submitter: "dave".to_string(),
        },
    );
    lookup.solutions.insert(
        5000,
        SolutionRef {
            exercise_id: 10,
            submission_id: 1000,
        },
    );
    Arc::new(lookup)
}

pub fn sample_context(principal: &str) -> (Arc<FakeLookup>, AuthContext) {
    let lookup = sample_lookup();
    let ctx = AuthContext::new(principal, lookup.clone());
    (lookup, ctx)
}
