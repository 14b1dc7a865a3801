//! The goal manager: the flattened, composed replacement for the source's
//! `StructuralGoalManager -> MultiCriteriaManager -> PredictiveCriteriaManager`
//! inheritance chain (§4.3-§4.6, §9).
//!
//! Rather than subclassing, the predictive (buggy/non-buggy) behavior is
//! configurable state on one struct: a [`StructuralGraph`], a
//! [`DependencyMap`], and two [`crate::domain::branch_lookup::LayeredBranchLookup`]
//! layers, with explicit activator methods instead of overridden
//! constructors.

use std::collections::VecDeque;
use std::sync::Arc;

use indexmap::{IndexMap, IndexSet};

use crate::domain::archive::{Archive, UpdateOutcome};
use crate::domain::branch_lookup::LayeredBranchLookup;
use crate::domain::dependency::{attachment_point_for, attaches_at_method_entry, should_attach, DependencyMap};
use crate::domain::fitness::FitnessFunction;
use crate::domain::graph::{ControlDependenceSource, StructuralGraph};
use crate::domain::target::{Target, TargetId, TargetKind};
use crate::domain::test_case::TestCase;
use crate::executor::{ExceptionEvent, ExecutionOutcome, TestExecutor};

/// Reason the non-buggy inclusion trigger fired, for the single log line
/// emitted when it does (§10.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerReason {
    /// No buggy goals existed at startup.
    NoBuggyGoals,
    /// `uncovered` (buggy partition) became empty (DynaMOSA).
    Exhaustion,
    /// `uncovered` size hasn't decreased for `ITERATIONS_WO_IMPROVEMENT`
    /// generations (PreMOSA).
    Stagnation,
    /// Nothing has ever been covered by `ZERO_COVERAGE_TRIGGER` (PreMOSA).
    ZeroCoverage,
}

/// The goal manager: holds the uncovered/current/covered triad, the
/// structural graph, dependency map, layered branch lookup tables, the
/// archive, and the buggy/non-buggy partition state.
pub struct GoalManager {
    goals: IndexMap<TargetId, Target>,
    fitness: IndexMap<TargetId, Arc<dyn FitnessFunction>>,
    graph: StructuralGraph,
    dependencies: DependencyMap,
    branch_lookup: LayeredBranchLookup,

    uncovered: IndexSet<TargetId>,
    current: IndexSet<TargetId>,
    covered: IndexSet<TargetId>,

    non_buggy_goals: IndexSet<TargetId>,
    methods: IndexSet<TargetId>,
    non_buggy_methods: IndexSet<TargetId>,

    archive: Archive,
    cover_count: IndexMap<TargetId, u32>,
    num_paths: IndexMap<TargetId, u64>,
    exception_registry: IndexSet<String>,

    trigger_fired: bool,
}

impl GoalManager {
    /// `O(1)`-ish membership test choosing whichever side is smaller
    /// (§4.3).
    pub fn is_already_covered(&self, target: TargetId) -> bool {
        if self.uncovered.len() <= self.covered.len() {
            !self.uncovered.contains(&target)
        } else {
            self.covered.contains(&target)
        }
    }

    pub fn uncovered(&self) -> &IndexSet<TargetId> {
        &self.uncovered
    }

    pub fn current(&self) -> &IndexSet<TargetId> {
        &self.current
    }

    pub fn covered(&self) -> &IndexSet<TargetId> {
        &self.covered
    }

    pub fn archive(&self) -> &Archive {
        &self.archive
    }

    pub fn non_buggy_uncovered_len(&self) -> usize {
        self.non_buggy_goals.len()
    }

    pub fn target(&self, id: TargetId) -> Option<&Target> {
        self.goals.get(&id)
    }

    /// The fitness function registered for `id`, used by the outer search
    /// loop to recompute objective vectors against a cached execution
    /// outcome without re-invoking the test executor.
    pub fn fitness_of(&self, id: TargetId) -> Option<Arc<dyn FitnessFunction>> {
        self.fitness.get(&id).cloned()
    }

    pub fn trigger_fired(&self) -> bool {
        self.trigger_fired
    }

    /// Count of covered targets of a given kind.
    pub fn covered_of_class(&self, kind: TargetKind) -> usize {
        self.covered.iter().filter(|id| self.goals.get(id).is_some_and(|t| t.kind == kind)).count()
    }

    /// Count of uncovered targets of a given kind (active partition only).
    pub fn uncovered_of_class(&self, kind: TargetKind) -> usize {
        self.uncovered.iter().filter(|id| self.goals.get(id).is_some_and(|t| t.kind == kind)).count()
    }

    /// Registers `test` as covering `target` (§4.3 `update_covered_goals`).
    fn update_covered_goals(&mut self, target: TargetId, test: &dyn TestCase) -> UpdateOutcome {
        let outcome = self.archive.update_covered_goals(target, test);
        if outcome == UpdateOutcome::BudgetExceeded {
            return outcome;
        }
        *self.cover_count.entry(target).or_insert(0) += 1;
        if self.uncovered.shift_remove(&target) {
            self.covered.insert(target);
        } else if !self.covered.contains(&target) {
            // Target was never in `uncovered` (e.g. a non-buggy goal
            // covered via the fast path before the trigger fired); still
            // record it as covered.
            self.covered.insert(target);
        }
        outcome
    }

    /// The fitness evaluation procedure of §4.6.
    ///
    /// Executes `test` via `executor`; on timeout/error every goal that
    /// was current at call start is treated as `+inf` distance and the
    /// call returns without further mutation. Otherwise performs the lazy
    /// BFS over `current`, expanding structural children and
    /// dependency-attached targets as their gating branch is covered,
    /// then the archive fast path, exception coverage, and method
    /// coverage passes.
    ///
    /// Returns the objective vector (one distance per target that was
    /// current when this call started) the outer search loop's ranking
    /// step uses for this test this generation, paired with the
    /// [`ExecutionOutcome`] this call executed the test to produce, so
    /// callers needing the raw trace again (e.g. to re-score against a
    /// changed objective set) don't have to execute the test a second
    /// time.
    pub fn calculate_fitness(
        &mut self,
        test: &dyn TestCase,
        executor: &mut dyn TestExecutor,
    ) -> Result<(IndexMap<TargetId, f64>, ExecutionOutcome), crate::error::ExecutorError> {
        let original_current: IndexSet<TargetId> = self.current.iter().copied().collect();
        let outcome = executor.execute(test)?;
        if outcome.is_failure() {
            let objectives = original_current.into_iter().map(|id| (id, f64::INFINITY)).collect();
            return Ok((objectives, outcome));
        }

        let mut objective_values: IndexMap<TargetId, f64> = IndexMap::new();
        let mut visited_methods: IndexSet<TargetId> = IndexSet::new();
        let mut visited_targets: IndexSet<TargetId> = IndexSet::new();
        let mut worklist: VecDeque<TargetId> = self.current.iter().copied().collect();

        while let Some(id) = worklist.pop_front() {
            if !visited_targets.insert(id) {
                continue;
            }
            let Some(target) = self.goals.get(&id).cloned() else {
                tracing::warn!(target = %id, "invariant violation: target id not in goal arena");
                continue;
            };
            let Some(fitness) = self.fitness.get(&id).cloned() else {
                tracing::warn!(target = %id, "invariant violation: no fitness function registered");
                continue;
            };
            let distance = fitness.distance(test, &outcome);
            if original_current.contains(&id) {
                objective_values.insert(id, distance);
            }

            if distance <= 0.0 {
                if matches!(target.kind, TargetKind::Method | TargetKind::MethodNoException) {
                    visited_methods.insert(id);
                }
                self.update_covered_goals(id, test);
                if self.archive.is_budget_exceeded() {
                    return Ok((objective_values, outcome));
                }
                if target.kind.is_branch_like() {
                    for child in self.graph.children(id) {
                        worklist.push_back(child);
                    }
                    if let Some(meta) = &target.branch {
                        for dep in self.dependencies.dependents_of_branch(meta.branch_id, meta.expression_value) {
                            worklist.push_back(dep);
                        }
                    }
                }
            } else {
                self.current.insert(id);
            }
        }

        self.archive_fast_path(test, &outcome);
        self.record_exception_coverage(test, &outcome);
        self.record_method_coverage(test, &outcome, &visited_methods);

        Ok((objective_values, outcome))
    }

    /// §4.6 step 4: archives targets covered along the execution path
    /// whose gating parent was covered long ago and so was never visited
    /// by the BFS this generation.
    fn archive_fast_path(&mut self, test: &dyn TestCase, outcome: &ExecutionOutcome) {
        for branch_id in &outcome.covered_true_branches {
            if let Some(target) = self.branch_lookup.active().true_branch(*branch_id) {
                self.update_covered_goals(target, test);
            }
        }
        for branch_id in &outcome.covered_false_branches {
            if let Some(target) = self.branch_lookup.active().false_branch(*branch_id) {
                self.update_covered_goals(target, test);
            }
        }
        for method in &outcome.covered_branchless_methods {
            if let Some(target) = self.branch_lookup.active().branchless_method(method) {
                self.update_covered_goals(target, test);
                // `BranchlessMethod` targets never sit in the structural
                // graph, so this fast path is the only place their
                // dependents (§4.2) are ever discovered; promote them to
                // `current` the same way a covered branch's structural
                // children are, in calculate_fitness's BFS.
                for dep in self.dependencies.dependents_of_branchless_method(target) {
                    self.current.insert(dep);
                }
            }
        }
    }

    /// §4.6 step 5: derives covered exceptions and registers newly-seen
    /// exception keys globally.
    fn record_exception_coverage(&mut self, test: &dyn TestCase, outcome: &ExecutionOutcome) {
        for event in &outcome.exceptions {
            let key = event.key();
            if let Some(id) = self.find_exception_target(event) {
                self.update_covered_goals(id, test);
            }
            if self.exception_registry.insert(key.clone()) {
                tracing::info!(exception = %key, "first-seen exception registered");
            }
        }
    }

    fn find_exception_target(&self, event: &ExceptionEvent) -> Option<TargetId> {
        self.goals
            .values()
            .find(|t| t.kind == TargetKind::Exception && t.label == event.key())
            .map(|t| t.id)
    }

    /// §4.6 step 6: for every method target not already visited by the
    /// BFS, compute distance directly and archive if zero.
    fn record_method_coverage(
        &mut self,
        test: &dyn TestCase,
        outcome: &ExecutionOutcome,
        visited_methods: &IndexSet<TargetId>,
    ) {
        for id in self.methods.clone() {
            if visited_methods.contains(&id) {
                continue;
            }
            let Some(fitness) = self.fitness.get(&id).cloned() else {
                continue;
            };
            if fitness.distance(test, outcome) <= 0.0 {
                self.update_covered_goals(id, test);
            }
        }
    }

    /// `activate_non_buggy_current_goals` (§4.5): adds every non-buggy
    /// root branch to `current`.
    pub fn activate_non_buggy_current_goals(&mut self) {
        for root in self.graph.roots().clone() {
            if self.non_buggy_goals.contains(&root) {
                self.current.insert(root);
            }
        }
    }

    /// `activate_non_buggy_uncovered` (§4.5): `uncovered |= non_buggy_goals`.
    pub fn activate_non_buggy_uncovered(&mut self) {
        for id in self.non_buggy_goals.clone() {
            if !self.covered.contains(&id) {
                self.uncovered.insert(id);
            }
        }
    }

    /// `activate_non_buggy_methods` (§4.5): `methods |= non_buggy_methods`,
    /// and, like the other activators, folds the newly-active ids into
    /// `uncovered` so they're counted until covered.
    pub fn activate_non_buggy_methods(&mut self) {
        for id in self.non_buggy_methods.clone() {
            self.methods.insert(id);
            if !self.covered.contains(&id) {
                self.uncovered.insert(id);
            }
        }
    }

    /// `activate_non_buggy_branch_maps` (§4.5): merges the shadow branch
    /// lookup layer into the active one.
    pub fn activate_non_buggy_branch_maps(&mut self) {
        self.branch_lookup.activate_shadow();
    }

    /// Fires all four activators, in the order mandated by §4.5, and logs
    /// once. A no-op if already fired.
    pub fn fire_non_buggy_trigger(&mut self, reason: TriggerReason) {
        if self.trigger_fired {
            return;
        }
        self.activate_non_buggy_current_goals();
        self.activate_non_buggy_uncovered();
        self.activate_non_buggy_methods();
        self.activate_non_buggy_branch_maps();
        self.trigger_fired = true;
        tracing::info!(?reason, "non-buggy goal partition activated");
    }

    /// Goal adjustment / path balancing (§4.7): for each branch id with
    /// both true and false targets active, compares `numTests/numPaths`
    /// ratios and swaps `current` membership toward the under-tested
    /// sibling.
    pub fn adjust_goals(&mut self) {
        let branch_ids: IndexSet<i32> = self.branch_lookup.active().branch_ids().collect();
        for branch_id in branch_ids {
            let (Some(true_id), Some(false_id)) = (
                self.branch_lookup.active().true_branch(branch_id),
                self.branch_lookup.active().false_branch(branch_id),
            ) else {
                continue;
            };
            let paths_true = self.num_paths.get(&true_id).copied().unwrap_or(1).max(1);
            let paths_false = self.num_paths.get(&false_id).copied().unwrap_or(1).max(1);
            let tests_true = f64::from(self.cover_count.get(&true_id).copied().unwrap_or(0));
            let tests_false = f64::from(self.cover_count.get(&false_id).copied().unwrap_or(0));

            let ratio_true = tests_true / paths_true as f64;
            let ratio_false = tests_false / paths_false as f64;

            if ratio_true > ratio_false {
                self.current.shift_remove(&true_id);
                self.current.insert(false_id);
                tracing::debug!(branch_id, "goal adjustment: swapped true -> false");
            } else if ratio_true < ratio_false {
                self.current.shift_remove(&false_id);
                self.current.insert(true_id);
                tracing::debug!(branch_id, "goal adjustment: swapped false -> true");
            }
        }
    }
}

/// Raw goal input, as handed in from the external goal-input interface
/// (§6): a fitness function plus enough identity to partition and wire it
/// into the graph/branch lookup.
pub struct GoalInput {
    pub target: Target,
    pub fitness: Arc<dyn FitnessFunction>,
    /// Controlling `(branch_id, expression_value)` pairs for a branch
    /// target, from the external control-flow extractor (§1, §4.1).
    pub controlling_predicates: Vec<(i32, bool)>,
    /// The `"class.method"` identity of the method this target's
    /// instruction lives in, used to resolve the synthesized
    /// branchless-method slot (§4.2) for non-branch targets and to
    /// register a `BranchlessMethod` target itself. `Target` carries no
    /// such identity for non-branch kinds (`BranchMeta` is reserved for
    /// `Branch`/`CBranch`), so it travels here instead.
    pub enclosing_method: Option<String>,
}

impl GoalInput {
    /// Constructs a goal input with no enclosing-method association
    /// (branch targets, and non-branch targets with a known controlling
    /// predicate, don't need one).
    pub fn new(target: Target, fitness: Arc<dyn FitnessFunction>, controlling_predicates: Vec<(i32, bool)>) -> Self {
        Self { target, fitness, controlling_predicates, enclosing_method: None }
    }

    /// Attaches the enclosing `"class.method"` identity, required for a
    /// `BranchlessMethod` target itself and for any non-branch target
    /// that falls back to a branchless slot (no controlling predicate).
    pub fn with_enclosing_method(mut self, qualified_method: impl Into<String>) -> Self {
        self.enclosing_method = Some(qualified_method.into());
        self
    }
}

/// Builds a [`GoalManager`] from raw goal input (§4.4 `MultiCriteriaManager`
/// build, §4.5 `PredictiveCriteriaManager` partitioning).
pub struct GoalManagerBuilder {
    inputs: Vec<GoalInput>,
    max_archive_statements: u32,
}

impl GoalManagerBuilder {
    pub fn new(max_archive_statements: u32) -> Self {
        Self { inputs: Vec::new(), max_archive_statements }
    }

    pub fn add(mut self, input: GoalInput) -> Self {
        self.inputs.push(input);
        self
    }

    /// Builds the goal manager, performing:
    /// - structural graph construction over the branch-like subset (§4.1),
    /// - dependency attachment for every enabled, non-exception criterion (§4.2),
    /// - buggy/non-buggy partitioning of branch and method targets (§4.5),
    /// - the once-at-build independent-path count per branch target (§4.4).
    pub fn build(self) -> Result<GoalManager, crate::error::GoalBuildError> {
        let branch_source = InputControlDependence::from(&self.inputs);

        let goals: Vec<Target> = self.inputs.iter().map(|i| i.target.clone()).collect();
        validate_branch_slots(&goals)?;

        let graph = StructuralGraph::new(&goals, &branch_source);

        let mut goal_map = IndexMap::new();
        let mut fitness_map = IndexMap::new();
        let mut branch_lookup = LayeredBranchLookup::new();
        let mut dependencies = DependencyMap::new();
        let mut uncovered = IndexSet::new();
        let mut non_buggy_goals = IndexSet::new();
        let mut methods = IndexSet::new();
        let mut non_buggy_methods = IndexSet::new();

        for input in &self.inputs {
            let target = input.target.clone();
            goal_map.insert(target.id, target.clone());
            fitness_map.insert(target.id, input.fitness.clone());

            match target.kind {
                TargetKind::Branch | TargetKind::CBranch => {
                    let meta = target.branch.as_ref().expect("branch target missing BranchMeta");
                    if target.buggy {
                        uncovered.insert(target.id);
                        branch_lookup.active_mut().insert_branch(meta.branch_id, meta.expression_value, target.id);
                    } else {
                        non_buggy_goals.insert(target.id);
                        branch_lookup.shadow_mut().insert_branch(meta.branch_id, meta.expression_value, target.id);
                    }
                }
                TargetKind::Method | TargetKind::MethodNoException => {
                    if target.buggy {
                        methods.insert(target.id);
                        uncovered.insert(target.id);
                    } else {
                        non_buggy_methods.insert(target.id);
                    }
                }
                TargetKind::BranchlessMethod => {
                    uncovered.insert(target.id);
                    if let Some(qualified_method) = &input.enclosing_method {
                        branch_lookup.active_mut().insert_branchless_method(qualified_method.clone(), target.id);
                    }
                }
                _ => {
                    uncovered.insert(target.id);
                }
            }
        }

        // Dependency augmentation (§4.2): attach every enabled, non-exception
        // non-branch target to its innermost controlling branch+value, or a
        // synthesized branchless-method slot for its enclosing method.
        // `Method`/`MethodNoException` targets always attach at method
        // entry (the branchless slot), regardless of any reported
        // controlling predicate.
        for input in &self.inputs {
            let target = &input.target;
            if target.kind.is_branch_like() || !should_attach(target) {
                continue;
            }
            let controlling = if attaches_at_method_entry(target.kind) {
                None
            } else {
                input.controlling_predicates.first().copied()
            };
            if let Some((branch_id, _)) = controlling {
                if !branch_lookup.has_branch(branch_id) {
                    return Err(crate::error::GoalBuildError::EmptyBranchSlots(branch_id));
                }
            }
            let branchless_id = input
                .enclosing_method
                .as_deref()
                .and_then(|m| branchless_method_id_for(&self.inputs, m))
                .unwrap_or(target.id);
            let point = attachment_point_for(controlling, branchless_id);
            dependencies.attach(point, target.id);
        }

        // Independent-path counts, computed once at build (§4.4).
        let mut num_paths = IndexMap::new();
        for target in &goals {
            if target.kind.is_branch_like() {
                num_paths.insert(target.id, graph.num_independent_paths(target.id));
            }
        }

        // Seed `current` with buggy root branches (§4.4); if none exist
        // the caller fires the trigger immediately at startup (§4.8).
        let current: IndexSet<TargetId> =
            graph.roots().iter().copied().filter(|id| uncovered.contains(id)).collect();

        Ok(GoalManager {
            goals: goal_map,
            fitness: fitness_map,
            graph,
            dependencies,
            branch_lookup,
            uncovered,
            current,
            covered: IndexSet::new(),
            non_buggy_goals,
            methods,
            non_buggy_methods,
            archive: Archive::new(self.max_archive_statements),
            cover_count: IndexMap::new(),
            num_paths,
            exception_registry: IndexSet::new(),
            trigger_fired: false,
        })
    }
}

fn branchless_method_id_for(inputs: &[GoalInput], qualified_method: &str) -> Option<TargetId> {
    inputs
        .iter()
        .find(|i| i.target.kind == TargetKind::BranchlessMethod && i.enclosing_method.as_deref() == Some(qualified_method))
        .map(|i| i.target.id)
}

fn validate_branch_slots(goals: &[Target]) -> Result<(), crate::error::GoalBuildError> {
    let mut owners: IndexMap<i32, (String, String)> = IndexMap::new();
    for t in goals {
        if !t.kind.is_branch_like() {
            continue;
        }
        let Some(meta) = &t.branch else { continue };
        let owner = (meta.class_name.clone(), meta.method_name.clone());
        if let Some(existing) = owners.get(&meta.branch_id) {
            if *existing != owner {
                return Err(crate::error::GoalBuildError::BranchIdCollision {
                    branch_id: meta.branch_id,
                    first: format!("{}.{}", existing.0, existing.1),
                    second: format!("{}.{}", owner.0, owner.1),
                });
            }
        } else {
            owners.insert(meta.branch_id, owner);
        }
    }
    Ok(())
}

struct InputControlDependence {
    table: IndexMap<TargetId, Vec<(i32, bool)>>,
}

impl From<&Vec<GoalInput>> for InputControlDependence {
    fn from(inputs: &Vec<GoalInput>) -> Self {
        let table = inputs.iter().map(|i| (i.target.id, i.controlling_predicates.clone())).collect();
        Self { table }
    }
}

impl ControlDependenceSource for InputControlDependence {
    fn controlling_predicates(&self, target: &Target) -> Vec<(i32, bool)> {
        self.table.get(&target.id).cloned().unwrap_or_default()
    }
}
