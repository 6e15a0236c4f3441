//! Execution command payload.

use serde::{Deserialize, Serialize};

use athena_common::{AppError, AppResult, Language};

/// Body of a command message: what to run and how.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionCommand {
    /// Source code of the solution
    pub code: String,
    /// Arguments passed to the program
    pub program_arguments: Vec<String>,
    /// Lines fed to standard input
    pub stdin: Vec<String>,
    /// Execution timeout; `None` leaves the executor default
    pub timeout_ms: Option<u64>,
    pub language: Language,
    pub compiler_flags: Option<String>,
    pub main_file_name: Option<String>,
}

impl ExecutionCommand {
    pub fn new(code: impl Into<String>, language: Language) -> Self {
        Self {
            code: code.into(),
            program_arguments: Vec::new(),
            stdin: Vec::new(),
            timeout_ms: None,
            language,
            compiler_flags: None,
            main_file_name: None,
        }
    }

    pub fn with_inputs(mut self, program_arguments: Vec<String>, stdin: Vec<String>) -> Self {
        self.program_arguments = program_arguments;
        self.stdin = stdin;
        self
    }

    pub fn with_timeout_ms(mut self, timeout_ms: Option<u64>) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    pub fn with_compiler_flags(mut self, compiler_flags: Option<String>) -> Self {
        self.compiler_flags = compiler_flags;
        self
    }

    pub fn with_main_file_name(mut self, main_file_name: Option<String>) -> Self {
        self.main_file_name = main_file_name;
        self
    }

    pub fn to_json(&self) -> AppResult<String> {
        serde_json::to_string(self)
            .map_err(|e| AppError::Internal(format!("Failed to encode execution command: {}", e)))
    }
}
