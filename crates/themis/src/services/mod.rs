//! Business logic services
//!
//! Services are built by constructor around a shared [`Store`]. Every
//! operation takes the acting principal explicitly, loads its target
//! (`NotFound` when missing), authorizes, then applies the change through
//! the store's atomic mutation methods.

pub mod dispatch;
pub mod exam_service;
pub mod exercise_service;
pub mod solution_service;
pub mod submission_service;
pub mod test_case_service;

use std::sync::Arc;

use athena_rules::AuthorizationGate;

use crate::lookup::StoreLookup;
use crate::store::Store;

pub use dispatch::DispatchReport;
pub use exam_service::ExamService;
pub use exercise_service::ExerciseService;
pub use solution_service::SolutionService;
pub use submission_service::SubmissionService;
pub use test_case_service::TestCaseService;

/// Authorization gate answering from `store`.
pub fn gate_for(store: Arc<dyn Store>) -> AuthorizationGate {
    AuthorizationGate::new(Arc::new(StoreLookup::new(store)))
}
