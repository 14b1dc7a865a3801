//! The external test-execution contract (§1, §5, §6).
//!
//! The actual sandbox that runs a candidate test case and produces a
//! coverage trace is out of scope for this crate. What `calculate_fitness`
//! (domain::goal_manager) needs from it is the thin, serializable
//! execution-result shape of §6, behind a trait so the bundled CLI and
//! integration tests can supply a scripted fake instead of a real sandbox.

use indexmap::IndexSet;
use serde::{Deserialize, Serialize};

use crate::domain::test_case::{TestCase, TestCaseId};
use crate::error::ExecutorError;

/// One observed exception during a test run.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExceptionEvent {
    pub class: String,
    pub method: String,
    pub exception_type: String,
}

impl ExceptionEvent {
    /// The class+method+exception-type key used by the exception-coverage
    /// registry (§4.6 step 5).
    pub fn key(&self) -> String {
        format!("{}.{}:{}", self.class, self.method, self.exception_type)
    }
}

/// Coverage trace produced by running one test case.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExecutionOutcome {
    /// The test timed out under its wall-clock budget.
    pub timeout: bool,
    /// The test raised an execution-time error unrelated to any target
    /// (a VM crash, a sandbox fault) rather than an exception under test.
    pub error: bool,
    pub covered_true_branches: IndexSet<i32>,
    pub covered_false_branches: IndexSet<i32>,
    pub covered_branchless_methods: IndexSet<String>,
    pub exceptions: Vec<ExceptionEvent>,
}

impl ExecutionOutcome {
    /// True when the result carries no usable coverage evidence (§4.6
    /// step 1): a timeout or an execution fault.
    pub fn is_failure(&self) -> bool {
        self.timeout || self.error
    }
}

/// Runs one test case and reports what it covered.
///
/// A real implementation would spawn a worker under a wall-clock timeout
/// and instrument the program under test; the crate only depends on this
/// trait so the search loop can be exercised against a scripted fake.
pub trait TestExecutor: Send {
    /// Executes `test`, returning its coverage trace.
    ///
    /// # Errors
    /// Returns [`ExecutorError`] if the executor itself fails, as distinct
    /// from the test under evaluation timing out or throwing (those are
    /// reported via [`ExecutionOutcome::timeout`] / `error`, not as `Err`).
    fn execute(&mut self, test: &dyn TestCase) -> Result<ExecutionOutcome, ExecutorError>;
}

/// A [`TestExecutor`] that plays back a scripted [`ExecutionOutcome`] per
/// test id, with no real bytecode execution. Used by the bundled CLI demo
/// and by the integration tests exercising the six scenarios of §8.
#[derive(Debug, Clone, Default)]
pub struct MockExecutor {
    scripts: std::collections::HashMap<TestCaseId, ExecutionOutcome>,
}

impl MockExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the outcome to play back for `test_id`.
    pub fn script(mut self, test_id: TestCaseId, outcome: ExecutionOutcome) -> Self {
        self.scripts.insert(test_id, outcome);
        self
    }
}

impl TestExecutor for MockExecutor {
    fn execute(&mut self, test: &dyn TestCase) -> Result<ExecutionOutcome, ExecutorError> {
        Ok(self.scripts.get(&test.id()).cloned().unwrap_or_default())
    }
}
