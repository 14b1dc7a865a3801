//! The outer generational search loop: breeding, ranking, stopping
//! conditions, and the DynaMOSA/PreMOSA state machine that ties them
//! together (§4.8).

pub mod breeder;
pub mod loop_;
pub mod ranking;
pub mod stopping;

pub use breeder::{Breeder, CloneBreeder};
pub use loop_::{CoverageSummary, SearchLoop, SearchLoopConfig, SearchOutcome, Variant};
pub use ranking::{crowding_distance, fast_non_dominated_sort, preference_front, rank_and_select, ObjectiveVector};
pub use stopping::{
    ArchiveBudgetStop, MaxEvaluationsStop, MaxGenerationsStop, MaxTimeStop, SearchClock, SearchStatus,
    StoppingCondition, StoppingConditions,
};
