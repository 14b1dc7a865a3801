//! The `TestCase` contract the goal manager and archive operate on.
//!
//! The outer search driver's population representation -- how a test case
//! is actually generated, crossed over and mutated -- is out of scope
//! (§1). What the core needs is the thin slice described in §3: a stable
//! identity and a statement count.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Stable identity for a test case, used as the archive key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TestCaseId(pub u64);

impl fmt::Display for TestCaseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "test#{}", self.0)
    }
}

/// Opaque candidate solution in the population.
///
/// Implementations are supplied by the outer search driver; this crate
/// only ever calls [`TestCase::id`] and [`TestCase::size`].
pub trait TestCase: fmt::Debug + Send + Sync {
    /// Stable identity, unique within one search run.
    fn id(&self) -> TestCaseId;

    /// Number of executable statements in the test, used both by the
    /// archive's best-per-target replacement rule and by the
    /// archive-statement stopping condition.
    fn size(&self) -> u32;
}

/// A minimal, in-memory [`TestCase`] used by the bundled CLI demo and by
/// integration tests that do not need a real generated test body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimpleTestCase {
    pub id: TestCaseId,
    pub size: u32,
}

impl SimpleTestCase {
    pub fn new(id: TestCaseId, size: u32) -> Self {
        Self { id, size }
    }
}

impl TestCase for SimpleTestCase {
    fn id(&self) -> TestCaseId {
        self.id
    }

    fn size(&self) -> u32 {
        self.size
    }
}
