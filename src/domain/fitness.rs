//! The `FitnessFunction` contract.
//!
//! Per-criterion distance computation is explicitly out of scope (§1): the
//! real implementation has to inspect bytecode-level predicates, mutant
//! diffs, and so on. What the goal manager needs from it is exactly the
//! black-box contract of §2.1 -- a non-negative real distance, zero iff
//! covered -- evaluated against whatever the external test executor
//! reported for one test run.

use crate::domain::test_case::TestCase;
use crate::executor::ExecutionOutcome;

/// Computes how far a test is from covering one target.
///
/// `0.0` means covered. Implementations must never return a negative
/// number or NaN; the goal manager treats any `d <= 0.0` as covered.
pub trait FitnessFunction: Send + Sync {
    /// Distance of `test` (given the outcome of executing it) from
    /// covering this function's target.
    fn distance(&self, test: &dyn TestCase, outcome: &ExecutionOutcome) -> f64;
}

/// A fitness function that reports distances from a fixed lookup table,
/// keyed by test id. Used by tests and the bundled CLI demo in place of a
/// real bytecode-level distance computation.
#[derive(Debug, Clone, Default)]
pub struct ScriptedFitness {
    distances: std::collections::HashMap<crate::domain::test_case::TestCaseId, f64>,
    default: f64,
}

impl ScriptedFitness {
    /// A fitness function that always reports `default` regardless of test.
    pub fn constant(default: f64) -> Self {
        Self {
            distances: std::collections::HashMap::new(),
            default,
        }
    }

    /// Overrides the distance reported for a specific test id.
    pub fn with(mut self, test: crate::domain::test_case::TestCaseId, distance: f64) -> Self {
        self.distances.insert(test, distance);
        self
    }
}

impl FitnessFunction for ScriptedFitness {
    fn distance(&self, test: &dyn TestCase, _outcome: &ExecutionOutcome) -> f64 {
        self.distances.get(&test.id()).copied().unwrap_or(self.default)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::test_case::{SimpleTestCase, TestCaseId};
    use crate::executor::ExecutionOutcome;

    #[test]
    fn scripted_fitness_falls_back_to_default() {
        let f = ScriptedFitness::constant(3.0).with(TestCaseId(1), 0.0);
        let covered = SimpleTestCase::new(TestCaseId(1), 5);
        let uncovered = SimpleTestCase::new(TestCaseId(2), 5);
        let outcome = ExecutionOutcome::default();
        assert_eq!(f.distance(&covered, &outcome), 0.0);
        assert_eq!(f.distance(&uncovered, &outcome), 3.0);
    }
}
