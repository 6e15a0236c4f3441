//! Turning (solution, test case) pairs into execution commands.

use futures::future::join_all;

use athena_common::{AppError, CorrelationKey};
use hermes::{CommandDispatcher, ExecutionCommand};

use crate::models::{Exercise, ExerciseSolution, TestCase};

/// Outcome of dispatching a batch of pairs.
#[derive(Debug, Default)]
pub struct DispatchReport {
    pub dispatched: Vec<CorrelationKey>,
    pub failed: Vec<(CorrelationKey, AppError)>,
}

impl DispatchReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn merge(&mut self, other: DispatchReport) {
        self.dispatched.extend(other.dispatched);
        self.failed.extend(other.failed);
    }
}

pub fn build_command(
    exercise: &Exercise,
    solution: &ExerciseSolution,
    test_case: &TestCase,
) -> ExecutionCommand {
    ExecutionCommand::new(solution.answer.clone(), exercise.language)
        .with_inputs(test_case.program_arguments.clone(), test_case.stdin.clone())
        .with_timeout_ms(test_case.timeout_ms)
        .with_compiler_flags(solution.compiler_flags.clone())
        .with_main_file_name(solution.main_file_name.clone())
}

/// Request one execution per test case. Failures are collected, not retried.
pub async fn dispatch_solution(
    dispatcher: &dyn CommandDispatcher,
    exercise: &Exercise,
    solution: &ExerciseSolution,
    test_cases: &[TestCase],
) -> DispatchReport {
    let requests = test_cases.iter().map(|test_case| async move {
        let key = CorrelationKey::new(solution.id, test_case.id);
        let command = build_command(exercise, solution, test_case);
        (key, dispatcher.request_execution(&command, key).await)
    });

    let mut report = DispatchReport::default();
    for (key, outcome) in join_all(requests).await {
        match outcome {
            Ok(()) => report.dispatched.push(key),
            Err(e) => {
                tracing::error!(
                    solution_id = key.solution_id,
                    test_case_id = key.test_case_id,
                    error = %e,
                    "Failed to dispatch execution"
                );
                report.failed.push((key, e));
            }
        }
    }
    report
}
