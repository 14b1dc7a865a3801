//! CLI surface (§10.7): a thin driver around the library. Loads config,
//! loads goals and defect scores, builds the goal manager, runs the
//! search loop against a mocked executor, and prints the per-criterion
//! coverage summary.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use serde::Deserialize;

use crate::config::ConfigLoader;
use crate::domain::fitness::ScriptedFitness;
use crate::domain::goal_manager::{GoalInput, GoalManagerBuilder};
use crate::domain::target::{BranchMeta, Target, TargetId, TargetKind};
use crate::domain::test_case::{SimpleTestCase, TestCaseId};
use crate::error::SearchError;
use crate::executor::MockExecutor;
use crate::search::{CloneBreeder, SearchLoop, SearchLoopConfig, StoppingConditions, Variant};

#[derive(Parser)]
#[command(name = "mosaic-search")]
#[command(about = "Many-objective, defect-guided test generation search engine", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Runs a search to completion against a goals file.
    Run {
        /// Path to a JSON file describing the coverage goals (see `GoalFile`).
        #[arg(long)]
        goals: PathBuf,

        /// Directory of defect-score CSV files, overriding config.
        #[arg(long)]
        dp_dir: Option<PathBuf>,

        /// Path to a YAML configuration file.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Maximum number of generations to run.
        #[arg(long, default_value_t = 100)]
        max_generations: u32,
    },
}

/// One goal record as read from the goals JSON file.
#[derive(Debug, Deserialize)]
struct GoalRecord {
    id: u64,
    kind: TargetKind,
    buggy: bool,
    #[serde(default)]
    label: Option<String>,
    #[serde(default)]
    branch: Option<BranchMeta>,
    #[serde(default)]
    controlling_predicates: Vec<(i32, bool)>,
    /// `"class.method"` identity, required for a `BranchlessMethod` record
    /// itself and for any non-branch record with no controlling predicate
    /// (see `GoalInput::enclosing_method`).
    #[serde(default)]
    enclosing_method: Option<String>,
}

/// Top-level shape of a goals file: a flat list of goal records.
#[derive(Debug, Deserialize)]
struct GoalFile {
    goals: Vec<GoalRecord>,
}

fn load_goal_inputs(path: &Path) -> Result<Vec<GoalInput>, SearchError> {
    let raw = std::fs::read_to_string(path).map_err(|source| SearchError::DefectScoreIo {
        path: path.display().to_string(),
        source,
    })?;
    let file: GoalFile = serde_json::from_str(&raw)
        .map_err(|e| crate::error::ConfigError::LoadFailed(e.to_string()))?;

    Ok(file
        .goals
        .into_iter()
        .map(|record| {
            let target = match record.kind {
                TargetKind::Branch | TargetKind::CBranch => {
                    let meta = record.branch.unwrap_or(BranchMeta {
                        branch_id: 0,
                        expression_value: true,
                        class_name: "unknown".to_string(),
                        method_name: "unknown()".to_string(),
                        context: None,
                    });
                    Target::branch(TargetId(record.id), record.kind, record.buggy, meta)
                }
                _ => Target::new(
                    TargetId(record.id),
                    record.kind,
                    record.buggy,
                    record.label.unwrap_or_else(|| format!("target#{}", record.id)),
                ),
            };
            // The real distance function is out of scope (§1); the demo
            // CLI wires every goal to a constant-distance stand-in that a
            // real integration would replace with a bytecode-level
            // fitness function.
            let mut input = GoalInput::new(
                target,
                Arc::new(ScriptedFitness::constant(1.0)),
                record.controlling_predicates,
            );
            if let Some(qualified_method) = record.enclosing_method {
                input = input.with_enclosing_method(qualified_method);
            }
            input
        })
        .collect())
}

/// Runs the `run` subcommand end to end.
pub fn run(goals: &Path, dp_dir: Option<&Path>, config_path: Option<&Path>, max_generations: u32) -> Result<(), SearchError> {
    let mut config = ConfigLoader::load_from_optional_file(config_path)?;
    if let Some(dir) = dp_dir {
        config.dp_dir = Some(dir.display().to_string());
    }

    crate::logging::install(&config.logging)?;

    let inputs = load_goal_inputs(goals)?;

    if let Some(dir) = &config.dp_dir {
        let known_methods: std::collections::HashSet<String> = inputs
            .iter()
            .filter_map(|i| {
                i.target
                    .branch
                    .as_ref()
                    .map(BranchMeta::qualified_method)
                    .or_else(|| i.enclosing_method.clone())
            })
            .collect();
        let scores = crate::defect::load_defect_scores(Path::new(dir), &known_methods)?;
        tracing::info!(methods_scored = scores.len(), "loaded defect scores");
    }

    let manager = inputs
        .into_iter()
        .fold(GoalManagerBuilder::new(config.max_archive_statements), GoalManagerBuilder::add)
        .build()?;

    let loop_config = SearchLoopConfig {
        population_size: config.population as usize,
        variant: Variant::PreMosa {
            iterations_without_improvement: config.iterations_wo_improvement,
            zero_coverage_trigger: config.zero_coverage_trigger,
        },
    };

    let mut search = SearchLoop::new(manager, loop_config);
    let initial_population: Vec<SimpleTestCase> =
        (0..config.population).map(|i| SimpleTestCase::new(TestCaseId(u64::from(i)), 1)).collect();

    let stopping = StoppingConditions::new()
        .with(Box::new(crate::search::MaxGenerationsStop(max_generations)))
        .with(Box::new(crate::search::ArchiveBudgetStop));

    let mut breeder = CloneBreeder::new(u64::from(config.population));
    let mut executor = MockExecutor::new();

    let outcome = search.run(initial_population, &mut breeder, &mut executor, &stopping)?;

    println!(
        "generations={} evaluations={} archived_tests={} coverage={:.1}% (covered={}, uncovered={})",
        outcome.generations,
        outcome.evaluations,
        outcome.archived_tests.len(),
        outcome.overall.ratio() * 100.0,
        outcome.overall.covered,
        outcome.overall.uncovered,
    );
    if let Some(reason) = outcome.stopped_by {
        println!("stopped by: {reason}");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn goal_file_parses_branch_and_method_records() {
        let json = r#"{
            "goals": [
                {"id": 1, "kind": "Branch", "buggy": true, "branch": {"branch_id": 1, "expression_value": true, "class_name": "pkg.Foo", "method_name": "bar()", "context": null}},
                {"id": 2, "kind": "Method", "buggy": false, "label": "pkg.Foo.bar()", "enclosing_method": "pkg.Foo.bar()"}
            ]
        }"#;
        let file: GoalFile = serde_json::from_str(json).unwrap();
        assert_eq!(file.goals.len(), 2);
        assert_eq!(file.goals[0].kind, TargetKind::Branch);
        assert_eq!(file.goals[1].enclosing_method.as_deref(), Some("pkg.Foo.bar()"));
    }

    #[test]
    fn load_goal_inputs_carries_enclosing_method_for_branchless_slots() {
        use std::io::Write;
        let json = r#"{
            "goals": [
                {"id": 1, "kind": "BranchlessMethod", "buggy": false, "label": "pkg.Foo.bar()", "enclosing_method": "pkg.Foo.bar()"},
                {"id": 2, "kind": "Line", "buggy": true, "label": "pkg.Foo.bar():17", "enclosing_method": "pkg.Foo.bar()"}
            ]
        }"#;
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{json}").unwrap();
        let inputs = load_goal_inputs(file.path()).unwrap();
        assert_eq!(inputs.len(), 2);
        assert_eq!(inputs[0].enclosing_method.as_deref(), Some("pkg.Foo.bar()"));
        assert_eq!(inputs[1].enclosing_method.as_deref(), Some("pkg.Foo.bar()"));
    }
}
