//! Integration tests for the six concrete scenarios of the goal-manager /
//! search-loop contract: trigger conditions, path balancing, the archive
//! budget, and first-discovery exception coverage.

use std::sync::Arc;

use mosaic_search::domain::fitness::ScriptedFitness;
use mosaic_search::domain::goal_manager::{GoalInput, GoalManagerBuilder};
use mosaic_search::domain::target::{BranchMeta, Target, TargetId, TargetKind};
use mosaic_search::domain::test_case::{SimpleTestCase, TestCase, TestCaseId};
use mosaic_search::executor::{ExceptionEvent, ExecutionOutcome, MockExecutor};
use mosaic_search::search::{
    ArchiveBudgetStop, CloneBreeder, MaxGenerationsStop, SearchLoop, SearchLoopConfig,
    StoppingConditions, Variant,
};

fn branch_meta(branch_id: i32, value: bool) -> BranchMeta {
    BranchMeta {
        branch_id,
        expression_value: value,
        class_name: "pkg.Foo".to_string(),
        method_name: "bar()".to_string(),
        context: None,
    }
}

fn branch_goal(id: u64, branch_id: i32, value: bool, buggy: bool, covering_test: TestCaseId) -> GoalInput {
    GoalInput::new(
        Target::branch(TargetId(id), TargetKind::Branch, buggy, branch_meta(branch_id, value)),
        Arc::new(ScriptedFitness::constant(5.0).with(covering_test, 0.0)),
        vec![],
    )
}

/// Scenario 1: all goals non-buggy, so the trigger fires at startup before
/// the first generation and every non-buggy root branch becomes current.
#[test]
fn scenario_1_trigger_on_no_buggy_goals() {
    let mut builder = GoalManagerBuilder::new(10_000);
    for i in 0..10u64 {
        builder = builder.add(branch_goal(i, i as i32, true, false, TestCaseId(999)));
    }
    let manager = builder.build().expect("goal manager build");

    let mut search = SearchLoop::new(
        manager,
        SearchLoopConfig { population_size: 5, variant: Variant::DynaMosa },
    );
    let population = vec![SimpleTestCase::new(TestCaseId(1), 3)];
    let mut breeder = CloneBreeder::new(1000);
    let mut executor = MockExecutor::new();
    let stopping = StoppingConditions::new().with(Box::new(MaxGenerationsStop(0)));

    search.run(population, &mut breeder, &mut executor, &stopping).unwrap();

    assert!(search.manager().trigger_fired());
    for i in 0..10u64 {
        assert!(search.manager().current().contains(&TargetId(i)));
    }
}

/// Scenario 2: 3 buggy branch goals all covered by the initial population.
/// After the first generation the trigger has fired on exhaustion and
/// `uncovered` now holds the absorbed non-buggy partition.
#[test]
fn scenario_2_trigger_on_exhaustion() {
    let mut builder = GoalManagerBuilder::new(10_000);
    for i in 0..3u64 {
        builder = builder.add(GoalInput::new(
            Target::branch(TargetId(i), TargetKind::Branch, true, branch_meta(i as i32, true)),
            Arc::new(ScriptedFitness::constant(0.0)),
            vec![],
        ));
    }
    // A non-buggy goal, hidden until the trigger fires.
    builder = builder.add(branch_goal(100, 100, true, false, TestCaseId(999)));

    let manager = builder.build().unwrap();
    let mut search = SearchLoop::new(
        manager,
        SearchLoopConfig { population_size: 5, variant: Variant::DynaMosa },
    );
    let population = vec![SimpleTestCase::new(TestCaseId(1), 3)];
    let mut breeder = CloneBreeder::new(1000);
    let mut executor = MockExecutor::new();
    let stopping = StoppingConditions::new().with(Box::new(MaxGenerationsStop(1)));

    search.run(population, &mut breeder, &mut executor, &stopping).unwrap();

    assert!(search.manager().trigger_fired());
    assert!(search.manager().uncovered().contains(&TargetId(100)));
}

/// Scenario 3: branch id 17 has 2 independent paths on each side; after
/// generation 1 the archive shows 4 tests on the true side and 0 on the
/// false side. `adjust_goals` should swap `current` membership toward the
/// under-tested false side.
#[test]
fn scenario_3_path_balancing_swaps_toward_under_tested_sibling() {
    // The true side is always covered, the false side never is, so four
    // evaluations accumulate four true-side covers and zero false-side
    // covers, regardless of test identity.
    let builder = GoalManagerBuilder::new(10_000)
        .add(GoalInput::new(
            Target::branch(TargetId(1), TargetKind::Branch, true, branch_meta(17, true)),
            Arc::new(ScriptedFitness::constant(0.0)),
            vec![],
        ))
        .add(GoalInput::new(
            Target::branch(TargetId(2), TargetKind::Branch, true, branch_meta(17, false)),
            Arc::new(ScriptedFitness::constant(5.0)),
            vec![],
        ));
    let mut manager = builder.build().unwrap();

    let mut executor = MockExecutor::new();
    for i in 0..4u64 {
        let test = SimpleTestCase::new(TestCaseId(i), 3);
        manager.calculate_fitness(&test, &mut executor).unwrap();
    }

    assert!(manager.current().contains(&TargetId(1)));
    manager.adjust_goals();

    assert!(!manager.current().contains(&TargetId(1)));
    assert!(manager.current().contains(&TargetId(2)));
}

/// Scenario 4: `MAX_ARCHIVE_STATEMENTS = 50`; tests of size 10, 20, 25 are
/// fed via three distinct, independently-covering targets. The first two
/// are accepted, the third refused; `is_finished` then reports true.
#[test]
fn scenario_4_archive_budget_latches_and_refuses_the_third_test() {
    let builder = GoalManagerBuilder::new(50)
        .add(branch_goal(1, 1, true, true, TestCaseId(1)))
        .add(branch_goal(2, 2, true, true, TestCaseId(2)))
        .add(branch_goal(3, 3, true, true, TestCaseId(3)));
    let mut manager = builder.build().unwrap();
    let mut executor = MockExecutor::new();

    manager.calculate_fitness(&SimpleTestCase::new(TestCaseId(1), 10), &mut executor).unwrap();
    assert!(!manager.archive().is_budget_exceeded());
    manager.calculate_fitness(&SimpleTestCase::new(TestCaseId(2), 20), &mut executor).unwrap();
    assert!(!manager.archive().is_budget_exceeded());
    manager.calculate_fitness(&SimpleTestCase::new(TestCaseId(3), 25), &mut executor).unwrap();

    assert!(manager.archive().is_budget_exceeded());

    let stopping = StoppingConditions::new().with(Box::new(ArchiveBudgetStop));
    let status = mosaic_search::search::SearchClock::start().snapshot(manager.archive().is_budget_exceeded());
    assert!(stopping.is_finished(&status));
}

/// Scenario 5: an execution reports a previously-unseen exception key; it
/// is covered and registered. `ExceptionEvent::key` composes the
/// class+method+type identity used both by the goal manager's exception
/// target lookup and by the global registry.
#[test]
fn scenario_5_first_discovery_exception_is_covered_and_registered() {
    let exception_target = Target::new(
        TargetId(1),
        TargetKind::Exception,
        true,
        "pkg.Foo.bar():NullPointerException".to_string(),
    );
    let builder = GoalManagerBuilder::new(10_000).add(GoalInput::new(
        exception_target,
        Arc::new(ScriptedFitness::constant(5.0)),
        vec![],
    ));
    let mut manager = builder.build().unwrap();

    let mut outcome = ExecutionOutcome::default();
    outcome.exceptions.push(ExceptionEvent {
        class: "pkg.Foo".to_string(),
        method: "bar()".to_string(),
        exception_type: "NullPointerException".to_string(),
    });
    let mut executor = MockExecutor::new().script(TestCaseId(1), outcome);
    let test = SimpleTestCase::new(TestCaseId(1), 2);

    manager.calculate_fitness(&test, &mut executor).unwrap();

    assert!(manager.covered().contains(&TargetId(1)));
}

/// Scenario 6: `ITERATIONS_WO_IMPROVEMENT = 5`; run 5 generations with no
/// decrease in buggy `uncovered`. The 5th generation ends with the
/// non-buggy partition merged in.
#[test]
fn scenario_6_premosa_stagnation_trigger() {
    let builder = GoalManagerBuilder::new(10_000)
        .add(branch_goal(1, 1, true, true, TestCaseId(9999)))
        .add(branch_goal(100, 100, true, false, TestCaseId(9999)));
    let manager = builder.build().unwrap();

    let mut search = SearchLoop::new(
        manager,
        SearchLoopConfig {
            population_size: 5,
            variant: Variant::PreMosa { iterations_without_improvement: 5, zero_coverage_trigger: 1000 },
        },
    );
    let population = vec![SimpleTestCase::new(TestCaseId(1), 3)];
    let mut breeder = CloneBreeder::new(1000);
    let mut executor = MockExecutor::new();
    let stopping = StoppingConditions::new().with(Box::new(MaxGenerationsStop(5)));

    search.run(population, &mut breeder, &mut executor, &stopping).unwrap();

    assert!(search.manager().trigger_fired());
    assert!(search.manager().uncovered().contains(&TargetId(100)));
}

/// Round-trip law: a branch covered via the execution trace's fast path
/// (§4.6 step 4) lands in `covered` regardless of whether it was ever a
/// member of `current`.
#[test]
fn fast_path_archives_targets_outside_current() {
    let builder = GoalManagerBuilder::new(10_000)
        .add(branch_goal(1, 1, true, true, TestCaseId(1)))
        .add(GoalInput::new(
            Target::branch(TargetId(2), TargetKind::Branch, true, branch_meta(2, true)),
            Arc::new(ScriptedFitness::constant(5.0).with(TestCaseId(1), 0.0)),
            vec![(1, true)],
        ));
    let mut manager = builder.build().unwrap();
    assert!(!manager.current().contains(&TargetId(2)));

    let mut outcome = ExecutionOutcome::default();
    outcome.covered_true_branches.insert(2);
    let mut executor = MockExecutor::new().script(TestCaseId(7), outcome);
    let test = SimpleTestCase::new(TestCaseId(7), 4);

    // Target 2 was never current (target 1 is the only root); the BFS
    // never visits it, yet the fast path should still archive it because
    // the execution trace names branch id 2's true side directly.
    manager.calculate_fitness(&test, &mut executor).unwrap();

    assert!(manager.covered().contains(&TargetId(2)));
    assert_eq!(test.size(), 4);
}
