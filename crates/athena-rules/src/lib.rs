//! Specification-pattern authorization for Athena.
//!
//! Small async predicates ([`specification::Specification`]) are composed into
//! authorization rules over an [`context::AuthContext`]. The rules only need a
//! read-only [`context::OwnershipLookup`]; they never mutate anything.
//!
//! # Example
//!
//! ```ignore
//! use athena_rules::prelude::*;
//!
//! let can_read = Spec(IsExamOwner) | Spec(ExamHasStarted);
//! let ctx = AuthContext::new("alice", lookup).with_exam(exam_id);
//!
//! if can_read.is_satisfied_by(&ctx).await {
//!     // show the exam
//! }
//! ```

pub mod auth_rules;
pub mod context;
pub mod gate;
pub mod specification;

#[cfg(test)]
mod test_utils;

pub use gate::AuthorizationGate;

/// Prelude module - import everything you need with `use athena_rules::prelude::*`
pub mod prelude {
    pub use crate::auth_rules::*;
    pub use crate::context::{AuthContext, OwnershipLookup, SolutionRef, SubmissionRef};
    pub use crate::gate::AuthorizationGate;
    pub use crate::specification::{
        AlwaysFalse, AlwaysTrue, And, BoxedSpec, Not, Or, Spec, Specification,
    };
}
