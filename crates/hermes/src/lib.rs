//! Hermes - execution command dispatch for Athena
//!
//! Publishes fire-and-forget execution commands to the executor's command
//! stream. The correlation key travels as stream fields next to the JSON
//! payload so the reply can be matched without inspecting the body.

pub mod command;
pub mod config;
pub mod dispatcher;

pub use command::ExecutionCommand;
pub use config::{ConfigError, DispatchConfig};
pub use dispatcher::{CommandDispatcher, StreamDispatcher};
