//! Typed error hierarchy for the search engine.
//!
//! Mirrors the error taxonomy of the specification: configuration errors are
//! fatal at startup, goal-build errors are fatal while constructing the goal
//! manager, and everything the search loop can recover from (missing defect
//! goals, execution timeouts, invariant slips) is surfaced through
//! `tracing::warn!` at the call site rather than through `Result`.

use thiserror::Error;

/// Errors raised while loading or validating configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The configuration failed to merge from its layered sources.
    #[error("failed to load configuration: {0}")]
    LoadFailed(String),

    /// `POPULATION` was zero or otherwise out of bounds.
    #[error("invalid population size: {0}, must be greater than 0")]
    InvalidPopulation(u32),

    /// `MAX_ARCHIVE_STATEMENTS` was zero.
    #[error("invalid archive statement budget: {0}, must be greater than 0")]
    InvalidArchiveBudget(u32),

    /// `ITERATIONS_WO_IMPROVEMENT` was zero.
    #[error("invalid iterations-without-improvement threshold: {0}, must be greater than 0")]
    InvalidStagnationThreshold(u32),

    /// An unknown coverage criterion name appeared in configuration.
    #[error("unknown coverage criterion: {0}")]
    UnknownCriterion(String),

    /// `DP_DIR` does not exist or is not a directory.
    #[error("defect-score directory does not exist: {0}")]
    MissingDefectScoreDir(String),

    /// An unrecognized log level or format string.
    #[error("invalid log level: {0}")]
    InvalidLogLevel(String),
}

/// Errors raised while constructing the goal manager from raw goal input.
#[derive(Error, Debug)]
pub enum GoalBuildError {
    /// Two branch targets shared a `branchId` but disagreed on the owning
    /// class/method, which would make the branch lookup tables ambiguous.
    #[error(
        "branch id {branch_id} is claimed by both {first} and {second}; branch ids must be unique per class/method"
    )]
    BranchIdCollision {
        branch_id: i32,
        first: String,
        second: String,
    },

    /// A non-branch target's controlling predicate names a `branchId` with
    /// no corresponding `Branch`/`CBranch` goal input at all, so the branch
    /// lookup tables have no true or false slot for it to attach through.
    #[error("branch id {0} has no populated expression-value slot")]
    EmptyBranchSlots(i32),

    /// The defect-score loader referenced a method absent from the method
    /// pool derived from the goal input.
    #[error("defect score entry refers to unknown method: {0}")]
    GoalMissing(String),
}

/// Errors surfaced by the pluggable [`crate::executor::TestExecutor`].
#[derive(Error, Debug)]
pub enum ExecutorError {
    /// The executor itself failed (process spawn failure, I/O error, etc.)
    /// independent of the test case under evaluation.
    #[error("test executor failed: {0}")]
    Failed(String),
}

/// Umbrella error returned by the outer search-loop entry point.
#[derive(Error, Debug)]
pub enum SearchError {
    /// Propagated from configuration loading.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Propagated from goal-manager construction.
    #[error(transparent)]
    GoalBuild(#[from] GoalBuildError),

    /// Propagated from the test executor.
    #[error(transparent)]
    Executor(#[from] ExecutorError),

    /// Propagated from defect-score CSV parsing.
    #[error("failed to read defect score file {path}: {source}")]
    DefectScoreIo {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Propagated from `csv` row parsing.
    #[error("malformed defect score row in {path}: {source}")]
    DefectScoreParse {
        path: String,
        #[source]
        source: csv::Error,
    },
}

/// Convenience alias for fallible search-engine operations.
pub type SearchResult<T> = Result<T, SearchError>;
