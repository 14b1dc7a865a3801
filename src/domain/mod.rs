//! Domain layer: targets, the structural graph, dependency augmentation,
//! branch lookup tables, the archive, and the goal manager that composes
//! them (§3, §4).

pub mod archive;
pub mod branch_lookup;
pub mod dependency;
pub mod fitness;
pub mod goal_manager;
pub mod graph;
pub mod target;
pub mod test_case;

pub use archive::Archive;
pub use fitness::FitnessFunction;
pub use goal_manager::{GoalInput, GoalManager, GoalManagerBuilder, TriggerReason};
pub use graph::StructuralGraph;
pub use target::{BranchMeta, Criterion, Target, TargetId, TargetKind};
pub use test_case::{SimpleTestCase, TestCase, TestCaseId};
