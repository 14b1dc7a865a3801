//! The outer search loop state machine (§4.8): DynaMOSA and PreMOSA.

use indexmap::{IndexMap, IndexSet};

use crate::domain::goal_manager::{GoalManager, TriggerReason};
use crate::domain::target::TargetId;
use crate::domain::test_case::{SimpleTestCase, TestCase, TestCaseId};
use crate::error::ExecutorError;
use crate::executor::{ExecutionOutcome, TestExecutor};
use crate::search::breeder::Breeder;
use crate::search::ranking::{rank_and_select, ObjectiveVector};
use crate::search::stopping::{SearchClock, StoppingConditions};

/// Which non-buggy-inclusion trigger policy governs this run (§4.8).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Variant {
    /// Fires only on exhaustion of the buggy partition.
    DynaMosa,
    /// Adds stagnation and zero-coverage triggers on top of DynaMOSA's.
    PreMosa {
        iterations_without_improvement: u32,
        zero_coverage_trigger: u32,
    },
}

/// Tunables for one search run, drawn from the `SearchConfig` fields of §6.
pub struct SearchLoopConfig {
    pub population_size: usize,
    pub variant: Variant,
}

/// Per-criterion coverage summary, part of the exit contract of §6.
#[derive(Debug, Clone)]
pub struct CoverageSummary {
    pub covered: usize,
    pub uncovered: usize,
}

impl CoverageSummary {
    pub fn ratio(&self) -> f64 {
        let total = self.covered + self.uncovered;
        if total == 0 {
            1.0
        } else {
            self.covered as f64 / total as f64
        }
    }
}

/// The result of a completed search run.
pub struct SearchOutcome {
    pub generations: u32,
    pub evaluations: u64,
    pub stopped_by: Option<&'static str>,
    pub archived_tests: Vec<TestCaseId>,
    pub overall: CoverageSummary,
}

/// Drives the many-objective search over a [`GoalManager`], breeding with
/// a [`Breeder`] and executing with a [`TestExecutor`].
pub struct SearchLoop {
    manager: GoalManager,
    config: SearchLoopConfig,
    clock: SearchClock,
    stagnation_counter: u32,
    last_uncovered_len: Option<usize>,
}

impl SearchLoop {
    pub fn new(manager: GoalManager, config: SearchLoopConfig) -> Self {
        Self {
            manager,
            config,
            clock: SearchClock::start(),
            stagnation_counter: 0,
            last_uncovered_len: None,
        }
    }

    pub fn manager(&self) -> &GoalManager {
        &self.manager
    }

    /// Runs the search to completion against `initial_population`, using
    /// `breeder` to produce offspring and `executor` to evaluate tests,
    /// until any condition in `stopping` fires.
    pub fn run(
        &mut self,
        initial_population: Vec<SimpleTestCase>,
        breeder: &mut dyn Breeder,
        executor: &mut dyn TestExecutor,
        stopping: &StoppingConditions,
    ) -> Result<SearchOutcome, ExecutorError> {
        // Startup (§4.8): no buggy goals means an immediate trigger before
        // the first evaluation sweep.
        if self.manager.current().is_empty() && !self.manager.trigger_fired() {
            self.manager.fire_non_buggy_trigger(TriggerReason::NoBuggyGoals);
        }

        let mut tests: IndexMap<TestCaseId, SimpleTestCase> =
            initial_population.into_iter().map(|t| (t.id(), t)).collect();
        let mut outcomes: IndexMap<TestCaseId, ExecutionOutcome> = IndexMap::new();
        let mut objectives_cache: IndexMap<TestCaseId, ObjectiveVector> = IndexMap::new();

        let mut parents: IndexSet<TestCaseId> = tests.keys().copied().collect();
        for id in parents.clone() {
            self.evaluate(id, &tests, &mut outcomes, executor)?;
        }

        let stopped_by = loop {
            let status = self.clock.snapshot(self.manager.archive().is_budget_exceeded());
            if let Some(reason) = stopping.first_fired(&status) {
                break Some(reason);
            }

            let parent_tests: Vec<SimpleTestCase> =
                parents.iter().filter_map(|id| tests.get(id).cloned()).collect();
            let offspring = breeder.breed(&parent_tests);
            for child in offspring {
                tests.insert(child.id(), child);
            }

            let combined: IndexSet<TestCaseId> = parents
                .iter()
                .copied()
                .chain(tests.keys().copied().filter(|id| !parents.contains(id)))
                .collect();

            for id in &combined {
                if !outcomes.contains_key(id) {
                    self.evaluate(*id, &tests, &mut outcomes, executor)?;
                }
            }

            self.manager.adjust_goals();

            let objectives: IndexSet<TargetId> = self.manager.current().clone();
            for id in &combined {
                let outcome = outcomes.get(id).cloned().unwrap_or_default();
                if let Some(test) = tests.get(id) {
                    objectives_cache.insert(*id, self.objective_vector(&objectives, test, &outcome));
                }
            }

            let selected = rank_and_select(&objectives, &objectives_cache, &combined, self.config.population_size);
            parents = selected.into_iter().collect();

            self.apply_trigger_policy();
            self.clock.advance_generation();
        };

        let archived_tests: Vec<TestCaseId> = self.manager.archive().tests().collect();
        let overall = CoverageSummary {
            covered: self.manager.covered().len(),
            uncovered: self.manager.uncovered().len(),
        };

        let status = self.clock.snapshot(self.manager.archive().is_budget_exceeded());
        tracing::info!(
            covered = overall.covered,
            uncovered = overall.uncovered,
            ratio = overall.ratio(),
            generations = status.generation,
            "search run finished"
        );

        Ok(SearchOutcome {
            generations: status.generation,
            evaluations: status.evaluations,
            stopped_by,
            archived_tests,
            overall,
        })
    }

    fn evaluate(
        &mut self,
        id: TestCaseId,
        tests: &IndexMap<TestCaseId, SimpleTestCase>,
        outcomes: &mut IndexMap<TestCaseId, ExecutionOutcome>,
        executor: &mut dyn TestExecutor,
    ) -> Result<(), ExecutorError> {
        let Some(test) = tests.get(&id) else { return Ok(()) };
        let (_, outcome) = self.manager.calculate_fitness(test, executor)?;
        outcomes.insert(id, outcome);
        self.clock.record_evaluation();
        Ok(())
    }

    fn objective_vector(
        &self,
        objectives: &IndexSet<TargetId>,
        test: &SimpleTestCase,
        outcome: &ExecutionOutcome,
    ) -> ObjectiveVector {
        let mut vector = ObjectiveVector::new();
        for id in objectives {
            if let Some(fitness) = self.manager.fitness_of(*id) {
                vector.insert(*id, fitness.distance(test, outcome));
            }
        }
        vector
    }

    fn apply_trigger_policy(&mut self) {
        if self.manager.trigger_fired() {
            return;
        }
        let uncovered_len = self.manager.uncovered().len();
        match self.config.variant {
            Variant::DynaMosa => {
                if self.manager.uncovered().is_empty() {
                    self.manager.fire_non_buggy_trigger(TriggerReason::Exhaustion);
                }
            }
            Variant::PreMosa { iterations_without_improvement, zero_coverage_trigger } => {
                if self.manager.uncovered().is_empty() {
                    self.manager.fire_non_buggy_trigger(TriggerReason::Exhaustion);
                    return;
                }
                match self.last_uncovered_len {
                    Some(prev) if uncovered_len < prev => self.stagnation_counter = 0,
                    _ => self.stagnation_counter += 1,
                }
                if self.stagnation_counter >= iterations_without_improvement {
                    self.manager.fire_non_buggy_trigger(TriggerReason::Stagnation);
                } else if self.manager.archive().is_empty() && self.clock.generation() >= zero_coverage_trigger {
                    self.manager.fire_non_buggy_trigger(TriggerReason::ZeroCoverage);
                }
            }
        }
        self.last_uncovered_len = Some(uncovered_len);
    }
}
