//! Stopping conditions (§4.8 termination, §4.9 archive-statement budget).
//!
//! The archive-statement budget is a latch plus a counter owned by the
//! archive itself (§4.9); the other conditions enumerated in §4.8
//! (generation count, wall-clock time) are modeled the same way so the
//! outer loop can poll a single composite without special-casing any one
//! of them.

use std::time::{Duration, Instant};

/// A snapshot of search progress, polled once per generation (§4.8
/// "checked between generations").
pub struct SearchStatus {
    pub generation: u32,
    pub evaluations: u64,
    pub elapsed: Duration,
    pub archive_budget_exceeded: bool,
}

/// One terminal condition for the search loop.
pub trait StoppingCondition: Send {
    fn is_finished(&self, status: &SearchStatus) -> bool;
    fn name(&self) -> &'static str;
}

/// Stops once the archive-statement budget latch (§4.9) is set.
#[derive(Debug, Default)]
pub struct ArchiveBudgetStop;

impl StoppingCondition for ArchiveBudgetStop {
    fn is_finished(&self, status: &SearchStatus) -> bool {
        status.archive_budget_exceeded
    }

    fn name(&self) -> &'static str {
        "archive-statement-budget"
    }
}

/// Stops after a fixed number of generations.
#[derive(Debug)]
pub struct MaxGenerationsStop(pub u32);

impl StoppingCondition for MaxGenerationsStop {
    fn is_finished(&self, status: &SearchStatus) -> bool {
        status.generation >= self.0
    }

    fn name(&self) -> &'static str {
        "max-generations"
    }
}

/// Stops after a fixed number of fitness evaluations.
#[derive(Debug)]
pub struct MaxEvaluationsStop(pub u64);

impl StoppingCondition for MaxEvaluationsStop {
    fn is_finished(&self, status: &SearchStatus) -> bool {
        status.evaluations >= self.0
    }

    fn name(&self) -> &'static str {
        "max-evaluations"
    }
}

/// Stops after a wall-clock budget elapses.
#[derive(Debug)]
pub struct MaxTimeStop(pub Duration);

impl StoppingCondition for MaxTimeStop {
    fn is_finished(&self, status: &SearchStatus) -> bool {
        status.elapsed >= self.0
    }

    fn name(&self) -> &'static str {
        "max-time"
    }
}

/// A composite that fires when any of its members fires.
#[derive(Default)]
pub struct StoppingConditions {
    conditions: Vec<Box<dyn StoppingCondition>>,
}

impl StoppingConditions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, condition: Box<dyn StoppingCondition>) -> Self {
        self.conditions.push(condition);
        self
    }

    /// The name of the first condition that fired, if any.
    pub fn first_fired(&self, status: &SearchStatus) -> Option<&'static str> {
        self.conditions.iter().find(|c| c.is_finished(status)).map(|c| c.name())
    }

    pub fn is_finished(&self, status: &SearchStatus) -> bool {
        self.first_fired(status).is_some()
    }
}

/// Tracks generation count, evaluation count, and a start instant so
/// [`SearchStatus`] snapshots can be produced each generation.
pub struct SearchClock {
    started_at: Instant,
    generation: u32,
    evaluations: u64,
}

impl SearchClock {
    pub fn start() -> Self {
        Self { started_at: Instant::now(), generation: 0, evaluations: 0 }
    }

    pub fn record_evaluation(&mut self) {
        self.evaluations += 1;
    }

    pub fn advance_generation(&mut self) {
        self.generation += 1;
    }

    pub fn generation(&self) -> u32 {
        self.generation
    }

    pub fn snapshot(&self, archive_budget_exceeded: bool) -> SearchStatus {
        SearchStatus {
            generation: self.generation,
            evaluations: self.evaluations,
            elapsed: self.started_at.elapsed(),
            archive_budget_exceeded,
        }
    }
}
