//! Common types, errors, and wire models for Athena services.

pub mod correlation;
pub mod error;
pub mod result;
pub mod types;

pub use correlation::{CorrelationKey, HeaderKeyCodec, KeyCodec, MessageHeaders, ResultProcessor};
pub use error::{AppError, AppResult};
pub use result::{ExecutionResult, ExecutionResultKind};
pub use types::*;
