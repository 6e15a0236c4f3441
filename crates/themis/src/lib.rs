//! Themis - exam lifecycle, submissions and execution results for Athena
//!
//! Exams move UPCOMING -> IN_PROGRESS -> FINISHED; exercises and test cases
//! may only change while an exam is upcoming. Submissions are opened while an
//! exam runs and, once placed, every solution is sent for execution against
//! the test cases of its exercise through a [`hermes::CommandDispatcher`].
//! Replies come back through [`ResultRecorder`].

pub mod authorization;
pub mod lookup;
pub mod models;
pub mod payloads;
pub mod recorder;
pub mod services;
pub mod store;

#[cfg(test)]
mod test_utils;

pub use recorder::ResultRecorder;
pub use services::{
    DispatchReport, ExamService, ExerciseService, SolutionService, SubmissionService,
    TestCaseService,
};
pub use store::{MemoryStore, PgStore, Store};
