//! Branch lookup tables (§3, §4.6 step 4): `trueBranch`/`falseBranch` maps
//! from branch id to target, plus the branchless-method map, kept as two
//! parallel layers (active and shadow) so the predictive manager can hide
//! non-buggy branches until the trigger fires.

use indexmap::IndexMap;

use crate::domain::target::TargetId;

/// One layer of branch lookup tables.
#[derive(Debug, Clone, Default)]
pub struct BranchLookup {
    true_branch: IndexMap<i32, TargetId>,
    false_branch: IndexMap<i32, TargetId>,
    branchless_method: IndexMap<String, TargetId>,
}

impl BranchLookup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_branch(&mut self, branch_id: i32, expression_value: bool, target: TargetId) {
        if expression_value {
            self.true_branch.insert(branch_id, target);
        } else {
            self.false_branch.insert(branch_id, target);
        }
    }

    pub fn insert_branchless_method(&mut self, qualified_method: String, target: TargetId) {
        self.branchless_method.insert(qualified_method, target);
    }

    pub fn true_branch(&self, branch_id: i32) -> Option<TargetId> {
        self.true_branch.get(&branch_id).copied()
    }

    pub fn false_branch(&self, branch_id: i32) -> Option<TargetId> {
        self.false_branch.get(&branch_id).copied()
    }

    pub fn branchless_method(&self, qualified_method: &str) -> Option<TargetId> {
        self.branchless_method.get(qualified_method).copied()
    }

    /// All distinct branch ids with at least one populated side in this
    /// layer, used by goal-adjustment path balancing (§4.7).
    pub fn branch_ids(&self) -> impl Iterator<Item = i32> + '_ {
        self.true_branch.keys().chain(self.false_branch.keys()).copied()
    }

    fn merge_from(&mut self, other: &BranchLookup) {
        for (id, target) in &other.true_branch {
            self.true_branch.insert(*id, *target);
        }
        for (id, target) in &other.false_branch {
            self.false_branch.insert(*id, *target);
        }
        for (method, target) in &other.branchless_method {
            self.branchless_method.insert(method.clone(), *target);
        }
    }
}

/// Active (buggy) and shadow (non-buggy) branch lookup layers.
///
/// The invariant from §3 holds per call site: for a given branch id and
/// expression value, exactly one of the two layers ever populates that
/// slot, because goal construction routes each branch target to exactly
/// one layer by its buggy-flag.
#[derive(Debug, Clone, Default)]
pub struct LayeredBranchLookup {
    active: BranchLookup,
    shadow: BranchLookup,
    merged: bool,
}

impl LayeredBranchLookup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn active(&self) -> &BranchLookup {
        &self.active
    }

    pub fn active_mut(&mut self) -> &mut BranchLookup {
        &mut self.active
    }

    pub fn shadow_mut(&mut self) -> &mut BranchLookup {
        &mut self.shadow
    }

    /// True if `branch_id` has at least one populated expression-value
    /// slot in either layer, active or shadow.
    pub fn has_branch(&self, branch_id: i32) -> bool {
        self.active.branch_ids().any(|id| id == branch_id) || self.shadow.branch_ids().any(|id| id == branch_id)
    }

    /// Merges the shadow layer into the active layer (§4.5,
    /// `activate_non_buggy_branch_maps`). Idempotent.
    pub fn activate_shadow(&mut self) {
        if self.merged {
            return;
        }
        let shadow = std::mem::take(&mut self.shadow);
        self.active.merge_from(&shadow);
        self.merged = true;
    }
}
