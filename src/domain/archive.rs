//! The archive (§3, §4.3, §4.9): retained tests and the best test per
//! covered target, plus the archive-statement stopping condition.

use indexmap::{IndexMap, IndexSet};

use crate::domain::target::TargetId;
use crate::domain::test_case::{TestCase, TestCaseId};

/// Outcome of offering a test to the archive for one target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// The budget was exceeded; the archive was not mutated.
    BudgetExceeded,
    /// The target was newly covered by this test.
    NewlyCovered,
    /// The target was already covered and `test` replaced the previous
    /// best (smaller, and `size() > 1`).
    Replaced,
    /// The target was already covered and this test did not improve on
    /// the existing best; the test is still recorded as covering it.
    NoImprovement,
}

/// Size-bounded retention store mapping tests to what they cover, and each
/// target to its best (smallest, `size() > 1`) covering test.
#[derive(Debug, Clone, Default)]
pub struct Archive {
    /// test id -> targets it covers (append-only per test).
    covers: IndexMap<TestCaseId, IndexSet<TargetId>>,
    /// target id -> (best test id, its size).
    best: IndexMap<TargetId, (TestCaseId, u32)>,
    statement_count: u32,
    max_statements: u32,
    budget_exceeded: bool,
}

impl Archive {
    pub fn new(max_statements: u32) -> Self {
        Self {
            max_statements,
            ..Self::default()
        }
    }

    /// Records that `test` covers `target`, per the procedure of §4.3:
    /// provisionally charges the statement budget for previously-unseen
    /// tests, latching the stopping condition (and refusing the update)
    /// if that would exceed `max_statements`; otherwise updates the
    /// best-test-per-target slot (never evicting the prior best, per the
    /// open-question decision in `DESIGN.md`) and appends to the test's
    /// covered list.
    pub fn update_covered_goals(&mut self, target: TargetId, test: &dyn TestCase) -> UpdateOutcome {
        let test_id = test.id();
        let is_new_test = !self.covers.contains_key(&test_id);

        if is_new_test {
            let projected = self.statement_count + test.size();
            if projected > self.max_statements {
                self.budget_exceeded = true;
                return UpdateOutcome::BudgetExceeded;
            }
            self.statement_count = projected;
        }

        let outcome = match self.best.get(&target).copied() {
            None => {
                self.best.insert(target, (test_id, test.size()));
                UpdateOutcome::NewlyCovered
            }
            Some((_, best_size)) if test.size() < best_size && test.size() > 1 => {
                self.best.insert(target, (test_id, test.size()));
                UpdateOutcome::Replaced
            }
            Some(_) => UpdateOutcome::NoImprovement,
        };

        self.covers.entry(test_id).or_default().insert(target);
        outcome
    }

    /// True once a provisional addition would exceed `max_statements`.
    pub fn is_budget_exceeded(&self) -> bool {
        self.budget_exceeded
    }

    /// Cumulative statement count charged against the budget.
    pub fn statement_count(&self) -> u32 {
        self.statement_count
    }

    /// All retained tests.
    pub fn tests(&self) -> impl Iterator<Item = TestCaseId> + '_ {
        self.covers.keys().copied()
    }

    /// Targets a retained test covers.
    pub fn covers_of(&self, test: TestCaseId) -> IndexSet<TargetId> {
        self.covers.get(&test).cloned().unwrap_or_default()
    }

    /// The current best test for a covered target.
    pub fn best_for(&self, target: TargetId) -> Option<TestCaseId> {
        self.best.get(&target).map(|(id, _)| *id)
    }

    /// Number of retained tests.
    pub fn len(&self) -> usize {
        self.covers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.covers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::test_case::SimpleTestCase;

    #[test]
    fn first_cover_is_newly_covered() {
        let mut archive = Archive::new(1000);
        let test = SimpleTestCase::new(TestCaseId(1), 10);
        let outcome = archive.update_covered_goals(TargetId(1), &test);
        assert_eq!(outcome, UpdateOutcome::NewlyCovered);
        assert_eq!(archive.best_for(TargetId(1)), Some(TestCaseId(1)));
    }

    #[test]
    fn smaller_test_replaces_best_but_size_one_never_replaces() {
        let mut archive = Archive::new(1000);
        let big = SimpleTestCase::new(TestCaseId(1), 10);
        archive.update_covered_goals(TargetId(1), &big);

        let tiny = SimpleTestCase::new(TestCaseId(2), 1);
        let outcome = archive.update_covered_goals(TargetId(1), &tiny);
        assert_eq!(outcome, UpdateOutcome::NoImprovement);
        assert_eq!(archive.best_for(TargetId(1)), Some(TestCaseId(1)));

        let small = SimpleTestCase::new(TestCaseId(3), 5);
        let outcome = archive.update_covered_goals(TargetId(1), &small);
        assert_eq!(outcome, UpdateOutcome::Replaced);
        assert_eq!(archive.best_for(TargetId(1)), Some(TestCaseId(3)));
    }

    #[test]
    fn replacement_does_not_evict_the_previous_best_from_the_archive() {
        let mut archive = Archive::new(1000);
        let big = SimpleTestCase::new(TestCaseId(1), 10);
        archive.update_covered_goals(TargetId(1), &big);
        let small = SimpleTestCase::new(TestCaseId(2), 5);
        archive.update_covered_goals(TargetId(1), &small);

        assert!(archive.tests().any(|id| id == TestCaseId(1)));
    }

    #[test]
    fn exceeding_budget_latches_and_refuses_the_update() {
        let mut archive = Archive::new(50);
        let t10 = SimpleTestCase::new(TestCaseId(1), 10);
        let t20 = SimpleTestCase::new(TestCaseId(2), 20);
        let t25 = SimpleTestCase::new(TestCaseId(3), 25);

        assert_eq!(archive.update_covered_goals(TargetId(1), &t10), UpdateOutcome::NewlyCovered);
        assert_eq!(archive.update_covered_goals(TargetId(2), &t20), UpdateOutcome::NewlyCovered);
        assert_eq!(
            archive.update_covered_goals(TargetId(3), &t25),
            UpdateOutcome::BudgetExceeded
        );
        assert!(archive.is_budget_exceeded());
        assert_eq!(archive.statement_count(), 30);
    }

    #[test]
    fn every_archived_test_covers_at_least_one_target() {
        let mut archive = Archive::new(1000);
        let test = SimpleTestCase::new(TestCaseId(1), 5);
        archive.update_covered_goals(TargetId(1), &test);
        for t in archive.tests() {
            assert!(!archive.covers_of(t).is_empty());
        }
    }
}
